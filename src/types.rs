//! Core data model types.
//!
//! Uploads are validated against a fixed [`Schema`] (the five equipment columns), turned into
//! [`EquipmentRecord`]s, and committed as a [`Dataset`] carrying a precomputed
//! [`StatisticsSnapshot`].

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header label of the equipment name column.
pub const COLUMN_NAME: &str = "Equipment Name";
/// Header label of the equipment type (category) column.
pub const COLUMN_TYPE: &str = "Type";
/// Header label of the flowrate column.
pub const COLUMN_FLOWRATE: &str = "Flowrate";
/// Header label of the pressure column.
pub const COLUMN_PRESSURE: &str = "Pressure";
/// Header label of the temperature column.
pub const COLUMN_TEMPERATURE: &str = "Temperature";

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Finite 64-bit floating point number.
    Float64,
    /// Non-empty UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Exact header label.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the expected shape of incoming data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// The fixed five-column equipment contract, in canonical order.
    pub fn equipment() -> Self {
        Self::new(vec![
            Field::new(COLUMN_NAME, DataType::Utf8),
            Field::new(COLUMN_TYPE, DataType::Utf8),
            Field::new(COLUMN_FLOWRATE, DataType::Float64),
            Field::new(COLUMN_PRESSURE, DataType::Float64),
            Field::new(COLUMN_TEMPERATURE, DataType::Float64),
        ])
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A successfully parsed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
}

/// One validated equipment reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub name: String,
    pub category: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

/// The three numeric parameters every record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Flowrate,
    Pressure,
    Temperature,
}

impl Parameter {
    /// All parameters in report order.
    pub const ALL: [Parameter; 3] = [Self::Flowrate, Self::Pressure, Self::Temperature];

    /// Display label, identical to the CSV header label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Flowrate => COLUMN_FLOWRATE,
            Self::Pressure => COLUMN_PRESSURE,
            Self::Temperature => COLUMN_TEMPERATURE,
        }
    }

    /// Read this parameter from a record.
    pub fn value_of(self, record: &EquipmentRecord) -> f64 {
        match self {
            Self::Flowrate => record.flowrate,
            Self::Pressure => record.pressure,
            Self::Temperature => record.temperature,
        }
    }
}

/// Verified identity that datasets belong to. Supplied by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned dataset identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub u64);

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{avg, min, max}` of one numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Aggregate computed once at commit time and stored with the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub flowrate: FieldStats,
    pub pressure: FieldStats,
    pub temperature: FieldStats,
}

impl StatisticsSnapshot {
    /// Stats for one parameter.
    pub fn get(&self, parameter: Parameter) -> FieldStats {
        match parameter {
            Parameter::Flowrate => self.flowrate,
            Parameter::Pressure => self.pressure,
            Parameter::Temperature => self.temperature,
        }
    }
}

/// One ingested file plus its derived statistics.
///
/// `statistics` is `None` exactly when `record_count == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub owner: OwnerId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Backing copy of the original upload, if one was written.
    pub source_path: Option<PathBuf>,
    pub record_count: usize,
    pub statistics: Option<StatisticsSnapshot>,
}

/// The persisted unit: a dataset and the records it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDataset {
    pub dataset: Dataset,
    pub records: Vec<EquipmentRecord>,
}

/// List-view projection of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetListing {
    pub id: DatasetId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
}

impl From<&Dataset> for DatasetListing {
    fn from(ds: &Dataset) -> Self {
        Self {
            id: ds.id,
            name: ds.name.clone(),
            created_at: ds.created_at,
            record_count: ds.record_count,
        }
    }
}

/// Occurrences of one equipment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub category: String,
    pub count: usize,
}

/// Statistics snapshot plus type distribution, as returned by upload and summary reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub id: DatasetId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
    pub statistics: Option<StatisticsSnapshot>,
    /// Sorted by descending count, ties in first-seen order.
    pub type_distribution: Vec<TypeCount>,
}
