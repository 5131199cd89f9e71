//! In-memory statistics over parsed records.
//!
//! [`aggregate()`] folds a record slice once, producing the [`crate::types::StatisticsSnapshot`]
//! stored at commit time and the [`TypeDistribution`] used by summaries and reports.
//!
//! ```rust
//! use equipment_data_processing::processing::aggregate;
//! use equipment_data_processing::types::EquipmentRecord;
//!
//! let records = vec![
//!     EquipmentRecord {
//!         name: "P-101".into(),
//!         category: "Pump".into(),
//!         flowrate: 120.0,
//!         pressure: 5.5,
//!         temperature: 80.0,
//!     },
//!     EquipmentRecord {
//!         name: "V-7".into(),
//!         category: "Valve".into(),
//!         flowrate: 40.0,
//!         pressure: 2.5,
//!         temperature: 60.0,
//!     },
//! ];
//!
//! let agg = aggregate(&records);
//! let snapshot = agg.snapshot.unwrap();
//! assert_eq!(snapshot.flowrate.avg, 80.0);
//! assert_eq!(snapshot.pressure.min, 2.5);
//! assert_eq!(agg.distribution.len(), 2);
//! ```

pub mod aggregate;

pub use aggregate::{aggregate, percentage, Aggregate, TypeDistribution};
