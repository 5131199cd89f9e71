use serde::Serialize;
use thiserror::Error;

use crate::types::DatasetId;

/// Convenience result type for pipeline operations.
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Error type returned by ingestion, storage, and report functions.
///
/// A single enum shared across the whole upload → commit → report pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The upload is not well-formed delimited text.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A persisted dataset document could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The header row lacks one or more required columns. Lists every missing column.
    #[error("Missing required columns: {}", .missing_columns.join(", "))]
    Schema { missing_columns: Vec<String> },

    /// The upload does not advertise a supported format.
    #[error("File must be a CSV (got '{filename}')")]
    UnsupportedFormat { filename: String },

    /// Unknown dataset id, or a dataset owned by someone else.
    #[error("dataset {id} not found")]
    NotFound { id: DatasetId },

    /// The report document could not be built or written.
    #[error("failed to render report: {message}")]
    Render { message: String },

    /// The persistence layer rejected a write or delete.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Invalid configuration value or logging setup.
    #[error("config error: {message}")]
    Config { message: String },
}

impl ProcessingError {
    pub(crate) fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub(crate) fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Stable classification for transports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema { .. } => ErrorKind::Schema,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Csv(_) => ErrorKind::MalformedInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Render { .. } => ErrorKind::Render,
            Self::Io(_) | Self::Json(_) | Self::Storage { .. } => ErrorKind::Storage,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// The missing header labels, when this is a schema error.
    pub fn missing_columns(&self) -> Option<&[String]> {
        match self {
            Self::Schema { missing_columns } => Some(missing_columns.as_slice()),
            _ => None,
        }
    }
}

/// Coarse error classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    UnsupportedFormat,
    MalformedInput,
    NotFound,
    Render,
    Storage,
    Config,
}

/// Structured, serializable error body for a transport to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_columns: Vec<String>,
}

impl From<&ProcessingError> for ErrorReport {
    fn from(err: &ProcessingError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            missing_columns: err.missing_columns().map(<[String]>::to_vec).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ErrorReport, ProcessingError};
    use crate::types::DatasetId;

    #[test]
    fn schema_error_lists_every_missing_column() {
        let err = ProcessingError::Schema {
            missing_columns: vec!["Type".to_string(), "Pressure".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required columns: Type, Pressure");

        let report = ErrorReport::from(&err);
        assert_eq!(report.kind, ErrorKind::Schema);
        assert_eq!(report.missing_columns, vec!["Type", "Pressure"]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "schema");
        assert_eq!(json["missing_columns"][1], "Pressure");
    }

    #[test]
    fn render_and_not_found_are_distinct_kinds() {
        let nf = ProcessingError::NotFound { id: DatasetId(7) };
        let render = ProcessingError::render("boom");
        assert_eq!(nf.kind(), ErrorKind::NotFound);
        assert_eq!(render.kind(), ErrorKind::Render);
        assert_ne!(nf.kind(), render.kind());

        let json = serde_json::to_value(ErrorReport::from(&nf)).unwrap();
        assert!(json.get("missing_columns").is_none());
        assert_eq!(json["message"], "dataset 7 not found");
    }
}
