//! CSV parsing for equipment uploads.

use std::fmt;
use std::io::Read;

use tracing::debug;

use crate::error::{ProcessingError, ProcessingResult};
use crate::types::{DataType, EquipmentRecord, Schema, Value};

/// Rows that survived validation, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTable {
    pub records: Vec<EquipmentRecord>,
    /// Data rows discarded because a cell was missing or unparseable.
    pub dropped_rows: usize,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// Why a single cell was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum CellError {
    /// Absent, or empty after trimming.
    Missing,
    /// Text that does not parse as a number.
    NotANumber(String),
    /// Parsed, but NaN or infinite.
    NonFinite(f64),
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing value"),
            Self::NotANumber(raw) => write!(f, "not a number: '{raw}'"),
            Self::NonFinite(v) => write!(f, "non-finite number: {v}"),
        }
    }
}

/// Parse an in-memory upload.
///
/// Rules:
///
/// - The first row is the header and must contain all five equipment columns (order can differ,
///   labels must match exactly).
/// - A row with any missing or unparseable cell is dropped; the rest of the file still loads.
/// - A header with no data rows, or a file whose rows are all dropped, yields an empty table.
pub fn parse_equipment_csv(bytes: &[u8]) -> ProcessingResult<ParsedTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    parse_equipment_from_reader(&mut rdr)
}

/// Parse equipment rows from an existing CSV reader.
///
/// Build the reader with `flexible(true)` so short rows are dropped rather than rejected.
pub fn parse_equipment_from_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
) -> ProcessingResult<ParsedTable> {
    let schema = Schema::equipment();
    let headers = rdr.headers()?.clone();

    // Map schema fields -> CSV column indexes, collecting every miss before failing.
    let mut col_idxs = Vec::with_capacity(schema.fields.len());
    let mut missing_columns = Vec::new();
    for field in &schema.fields {
        match headers.iter().position(|h| h == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => missing_columns.push(field.name.clone()),
        }
    }
    if !missing_columns.is_empty() {
        return Err(ProcessingError::Schema { missing_columns });
    }

    let mut table = ParsedTable::default();
    for (row_idx0, result) in rdr.records().enumerate() {
        // 1-based, and the header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;

        let cells: Result<Vec<Value>, (usize, CellError)> = schema
            .fields
            .iter()
            .zip(col_idxs.iter())
            .enumerate()
            .map(|(i, (field, &csv_idx))| {
                parse_cell(field.data_type, record.get(csv_idx)).map_err(|e| (i, e))
            })
            .collect();

        match cells {
            Ok(values) => match into_record(values) {
                Some(rec) => table.records.push(rec),
                None => table.dropped_rows += 1,
            },
            Err((field_idx, reason)) => {
                debug!(
                    row = user_row,
                    column = %schema.fields[field_idx].name,
                    %reason,
                    "dropping incomplete row"
                );
                table.dropped_rows += 1;
            }
        }
    }

    Ok(table)
}

/// Typed parse of one cell.
pub fn parse_cell(data_type: DataType, raw: Option<&str>) -> Result<Value, CellError> {
    let trimmed = raw.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return Err(CellError::Missing);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Float64 => {
            let v = trimmed
                .parse::<f64>()
                .map_err(|_| CellError::NotANumber(trimmed.to_owned()))?;
            if v.is_finite() {
                Ok(Value::Float64(v))
            } else {
                Err(CellError::NonFinite(v))
            }
        }
    }
}

fn into_record(values: Vec<Value>) -> Option<EquipmentRecord> {
    let cells: [Value; 5] = values.try_into().ok()?;
    match cells {
        [
            Value::Utf8(name),
            Value::Utf8(category),
            Value::Float64(flowrate),
            Value::Float64(pressure),
            Value::Float64(temperature),
        ] => Some(EquipmentRecord {
            name,
            category,
            flowrate,
            pressure,
            temperature,
        }),
        _ => None,
    }
}
