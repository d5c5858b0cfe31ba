//! Core data models shared by every provider and pipeline stage.
//!
//! The [`Recordset`] is the universal in-memory table: an ordered list of
//! typed columns plus rows of JSON values. Reads produce one, writes consume
//! one, and the quality and correction stages operate on one.

use std::collections::BTreeMap;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, error::DeltaGuardError};

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    Redshift,
    #[serde(rename = "bigquery")]
    BigQuery,
    Snowflake,
    S3,
}

impl BackendKind {
    /// All backends, in display order
    pub const ALL: [BackendKind; 7] = [
        BackendKind::Sqlite,
        BackendKind::Postgres,
        BackendKind::MySql,
        BackendKind::Redshift,
        BackendKind::BigQuery,
        BackendKind::Snowflake,
        BackendKind::S3,
    ];

    /// Stable lowercase tag used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Postgres => "postgres",
            BackendKind::MySql => "mysql",
            BackendKind::Redshift => "redshift",
            BackendKind::BigQuery => "bigquery",
            BackendKind::Snowflake => "snowflake",
            BackendKind::S3 => "s3",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DeltaGuardError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .or(match normalized.as_str() {
                "postgresql" => Some(BackendKind::Postgres),
                "sqlite3" => Some(BackendKind::Sqlite),
                _ => None,
            })
            .ok_or_else(|| DeltaGuardError::configuration(format!("Unknown backend '{}'", s)))
    }
}

/// Logical column type used for DDL inference and quality heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Json,
    Unknown,
}

impl ColumnKind {
    /// Infers a kind from the non-null values of one column.
    ///
    /// Integers mixed with floats widen to `Float`; any other mix, or
    /// strings, yields `Text`. A column of only nulls is `Unknown`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> ColumnKind {
        values
            .into_iter()
            .filter_map(Self::of_value)
            .reduce(Self::widen)
            .unwrap_or(ColumnKind::Unknown)
    }

    /// Kind of a single cell; `None` for null.
    pub fn of_value(value: &Value) -> Option<ColumnKind> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnKind::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(ColumnKind::Integer),
            Value::Number(_) => Some(ColumnKind::Float),
            Value::String(_) => Some(ColumnKind::Text),
            Value::Array(_) | Value::Object(_) => Some(ColumnKind::Json),
        }
    }

    /// Combines two kinds observed for the same column.
    pub fn widen(self, other: ColumnKind) -> ColumnKind {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Unknown, k) | (k, ColumnKind::Unknown) => k,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }

    /// Whether string heuristics (truncation) apply to this kind
    pub fn is_text(&self) -> bool {
        matches!(self, ColumnKind::Text)
    }
}

/// A named, typed column of a [`Recordset`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One row of cells, aligned with the recordset's columns
pub type Row = Vec<Value>;

/// Ordered, named-column collection of rows.
///
/// Every row holds exactly one cell per column. Row order is preserved by
/// all operations, which keeps "first occurrence" semantics and limited
/// previews meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recordset {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Recordset {
    /// Builds a recordset, rejecting rows whose width differs from the header.
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Result<Self> {
        let width = columns.len();
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(DeltaGuardError::configuration(format!(
                "Row {} has {} cells but the recordset has {} columns",
                index,
                row.len(),
                width
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Header-only recordset
    pub fn empty(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a recordset from column names, inferring each column's kind.
    pub fn from_rows<S: Into<String>>(names: Vec<S>, rows: Vec<Row>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let kind = ColumnKind::infer(rows.iter().filter_map(|row| row.get(index)));
                Column::new(name, kind)
            })
            .collect();
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<Column>, Vec<Row>) {
        (self.columns, self.rows)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Appends a row, checking its width.
    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DeltaGuardError::configuration(format!(
                "Row has {} cells but the recordset has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Copy of the rows in `range`, sharing this header.
    pub fn slice(&self, range: Range<usize>) -> Recordset {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        Recordset {
            columns: self.columns.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Keeps at most `limit` leading rows. `None` and `Some(0)` keep all.
    pub fn truncate(&mut self, limit: Option<usize>) {
        if let Some(limit) = effective_limit(limit) {
            self.rows.truncate(limit);
        }
    }

    /// Leading rows as a new recordset; `None` and `Some(0)` copy everything.
    pub fn head(&self, limit: Option<usize>) -> Recordset {
        match effective_limit(limit) {
            Some(n) => self.slice(0..n),
            None => self.clone(),
        }
    }

    /// Sequential sub-recordsets of at most `size` rows sharing this header.
    pub fn chunks(&self, size: usize) -> Vec<Recordset> {
        self.chunk_ranges(size)
            .into_iter()
            .map(|range| self.slice(range))
            .collect()
    }

    /// Sequential row ranges of at most `size` rows covering the recordset.
    ///
    /// An empty recordset yields no ranges. `size` must be non-zero.
    pub fn chunk_ranges(&self, size: usize) -> Vec<Range<usize>> {
        let size = size.max(1);
        (0..self.rows.len())
            .step_by(size)
            .map(|start| start..(start.saturating_add(size)).min(self.rows.len()))
            .collect()
    }

    /// Keeps the rows for which `keep` returns true, preserving order.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&Row) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Concatenates `other` below `self`, aligning columns by name.
    ///
    /// Columns only present in `other` are appended to the header; cells
    /// missing on either side become null. Kinds of shared columns widen.
    pub fn concat(mut self, other: Recordset) -> Recordset {
        let mut mapping = Vec::with_capacity(other.columns.len());
        for column in &other.columns {
            match self.column_index(&column.name) {
                Some(index) => {
                    let merged = self.columns[index].kind.widen(column.kind);
                    self.columns[index].kind = merged;
                    mapping.push(index);
                }
                None => {
                    self.columns.push(column.clone());
                    mapping.push(self.columns.len() - 1);
                }
            }
        }

        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, Value::Null);
        }
        for row in other.rows {
            let mut aligned = vec![Value::Null; width];
            for (value, &target) in row.into_iter().zip(&mapping) {
                aligned[target] = value;
            }
            self.rows.push(aligned);
        }
        self
    }
}

/// Normalizes a read limit: only positive values restrict the result.
pub fn effective_limit(limit: Option<usize>) -> Option<usize> {
    limit.filter(|&n| n > 0)
}

/// Write behavior for [`crate::providers::Provider::write_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Add rows, creating the table if absent
    Append,
    /// Discard existing contents, then write
    Replace,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Append => write!(f, "append"),
            WriteMode::Replace => write!(f, "replace"),
        }
    }
}

/// Capabilities that can be probed on a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = DeltaGuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Capability::Read),
            "write" => Ok(Capability::Write),
            other => Err(DeltaGuardError::configuration(format!(
                "Unknown capability '{}'",
                other
            ))),
        }
    }
}

/// Result of a best-effort permission probe.
///
/// Advisory only: permissions can change between the probe and the
/// operation that relies on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionReport {
    granted: BTreeMap<Capability, bool>,
}

impl PermissionReport {
    pub fn insert(&mut self, capability: Capability, granted: bool) {
        self.granted.insert(capability, granted);
    }

    /// Whether the capability was probed and granted. Unprobed is false.
    pub fn is_granted(&self, capability: Capability) -> bool {
        self.granted.get(&capability).copied().unwrap_or(false)
    }

    /// Whether every probed capability was granted
    pub fn all_granted(&self) -> bool {
        self.granted.values().all(|&granted| granted)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        self.granted.iter().map(|(&cap, &granted)| (cap, granted))
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
