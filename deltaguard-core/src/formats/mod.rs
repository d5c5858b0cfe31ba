//! Tabular file formats for object storage.
//!
//! Objects are encoded by key suffix: `.parquet` uses Parquet via arrow,
//! everything else is CSV with a header row. Local imports also accept
//! Excel workbooks.

mod csv;
mod parquet;
mod xlsx;

use std::path::Path;

use crate::{Result, error::DeltaGuardError, models::Recordset};

pub use self::csv::NA_MARKERS;

/// Encoding of one stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    /// Selects the format from an object key (case-insensitive suffix).
    pub fn from_key(key: &str) -> Self {
        if key.to_ascii_lowercase().ends_with(".parquet") {
            TableFormat::Parquet
        } else {
            TableFormat::Csv
        }
    }

    /// Decodes a whole object. Empty input yields an empty recordset.
    ///
    /// # Errors
    /// Returns `Read` when the bytes are not valid for the format
    pub fn decode(&self, bytes: &[u8]) -> Result<Recordset> {
        if bytes.is_empty() {
            return Ok(Recordset::empty(Vec::new()));
        }
        match self {
            TableFormat::Csv => csv::decode(bytes),
            TableFormat::Parquet => parquet::decode(bytes),
        }
    }

    /// Encodes a whole recordset.
    ///
    /// # Errors
    /// Returns `Write` when the encoder rejects the data
    pub fn encode(&self, data: &Recordset) -> Result<Vec<u8>> {
        match self {
            TableFormat::Csv => csv::encode(data),
            TableFormat::Parquet => parquet::encode(data),
        }
    }
}

impl std::fmt::Display for TableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableFormat::Csv => write!(f, "csv"),
            TableFormat::Parquet => write!(f, "parquet"),
        }
    }
}

/// Loads a local CSV file.
pub fn read_csv_file(path: impl AsRef<Path>) -> Result<Recordset> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| DeltaGuardError::io(format!("Failed to read {}", path.display()), e))?;
    TableFormat::Csv.decode(&bytes)
}

/// Loads a local table file: `.xlsx`/`.xls` as a workbook, anything else as CSV.
///
/// # Errors
/// Returns `Read` for an unreadable workbook, `Io` for an unreadable CSV file
pub fn read_table_file(path: impl AsRef<Path>) -> Result<Recordset> {
    let path = path.as_ref();
    let is_workbook = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls"));
    if is_workbook {
        xlsx::read(path)
    } else {
        read_csv_file(path)
    }
}
