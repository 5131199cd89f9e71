//! Upload parsing.
//!
//! Most callers go through [`crate::service::EquipmentService::upload`]. The pieces are public for
//! callers that only need validation:
//! - [`csv`]: header validation, per-cell typed parse, incomplete-row dropping
//! - [`unified`]: the [`Upload`] envelope and format detection

pub mod csv;
pub mod unified;

pub use self::csv::{parse_equipment_csv, CellError, ParsedTable};
pub use unified::{parse_upload, IngestionFormat, Upload};
