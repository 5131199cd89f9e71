//! `equipment-data-processing` turns uploaded chemical-equipment CSV files into per-owner datasets
//! with precomputed statistics, keeps a bounded history per owner, and renders PDF reports.
//!
//! The primary entrypoint is [`service::EquipmentService`], which wires the pipeline together:
//!
//! 1. [`ingestion`] validates the header and parses rows into [`types::EquipmentRecord`]s
//! 2. [`processing`] computes average/minimum/maximum per parameter and the type distribution
//! 3. [`storage`] commits the dataset atomically and evicts the owner's oldest datasets past the
//!    retention cap (five by default)
//! 4. [`report`] projects a stored dataset into a paginated PDF
//!
//! ## Upload format
//!
//! A header row naming exactly these columns (any order, extra columns ignored):
//!
//! - `Equipment Name`, `Type`: text
//! - `Flowrate`, `Pressure`, `Temperature`: finite decimal numbers
//!
//! A missing column rejects the upload with [`ProcessingError::Schema`] listing every missing
//! label. Rows with an empty or non-numeric cell are dropped; the rest are kept in file order.
//! A file whose rows are all dropped still becomes a (empty) dataset.
//!
//! ## Quick example
//!
//! ```rust
//! use equipment_data_processing::service::EquipmentService;
//! use equipment_data_processing::types::OwnerId;
//!
//! # fn main() -> Result<(), equipment_data_processing::ProcessingError> {
//! let service = EquipmentService::in_memory();
//! let owner = OwnerId::new("alice");
//!
//! let csv = "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
//!            P-101,Pump,120,5.2,80\n\
//!            V-201,Valve,40,,60\n";
//! let summary = service.upload(&owner, "plant.csv", csv)?;
//! assert_eq!(summary.record_count, 1);
//!
//! let pdf = service.get_report(&owner, summary.id)?;
//! assert!(pdf.starts_with(b"%PDF"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`service`]: the operations exposed to a transport
//! - [`ingestion`]: upload validation and CSV parsing
//! - [`processing`]: single-pass statistics and type distribution
//! - [`storage`]: dataset repositories, backing artifacts and retention
//! - [`report`]: report document model, layout and PDF encoding
//! - [`types`]: records, datasets and identifiers
//! - [`config`], [`logging`], [`observability`]: settings, `tracing` setup and operator hooks
//! - [`error`]: the error type shared across the pipeline

pub mod config;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod observability;
pub mod processing;
pub mod report;
pub mod service;
pub mod storage;
pub mod types;

pub use error::{ErrorKind, ErrorReport, ProcessingError, ProcessingResult};
pub use service::EquipmentService;
