//! Upload envelope and format dispatch.
//!
//! A transport hands the core an [`Upload`] (filename + raw bytes). [`parse_upload`] turns it into
//! a [`ParsedTable`]. Only CSV is supported; the `.csv` extension check applies to local files read
//! through [`Upload::from_path`], transports make their own call.

use std::fmt;
use std::path::Path;

use crate::error::{ProcessingError, ProcessingResult};

use super::csv::{parse_equipment_csv, ParsedTable};

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionFormat {
    /// Comma-separated values.
    Csv,
}

impl IngestionFormat {
    /// Parse an ingestion format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Infer the format from a filename, failing with [`ProcessingError::UnsupportedFormat`].
    pub fn from_filename(filename: &str) -> ProcessingResult<Self> {
        Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| ProcessingError::UnsupportedFormat {
                filename: filename.to_owned(),
            })
    }
}

/// Raw upload as delivered by a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-supplied filename; becomes the dataset name.
    pub filename: String,
    /// Full file contents.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("filename", &self.filename)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file as an upload. The file must carry a `.csv` extension.
    pub fn from_path(path: impl AsRef<Path>) -> ProcessingResult<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_owned();
        IngestionFormat::from_filename(&filename)?;
        let bytes = std::fs::read(path)?;
        Ok(Self { filename, bytes })
    }
}

/// Parse an upload's bytes into validated records.
pub fn parse_upload(upload: &Upload) -> ProcessingResult<ParsedTable> {
    parse_equipment_csv(&upload.bytes)
}
