//! Wire types of the Snowflake SQL API (v2) and result value conversion.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    models::{Column, ColumnKind},
    providers::helpers::float_value,
};

/// Response code of a statement that is still running
pub const STILL_RUNNING: &str = "333334";

/// One positional binding; every value is sent as text
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Binding {
    #[serde(rename = "type")]
    pub binding_type: &'static str,
    pub value: Option<String>,
}

impl Binding {
    pub fn text(value: Option<String>) -> Self {
        Self {
            binding_type: "TEXT",
            value,
        }
    }
}

/// Body of `POST /api/v2/statements`
#[derive(Debug, Serialize)]
pub struct StatementRequest<'a> {
    pub statement: &'a str,
    pub timeout: u64,
    pub database: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Binding>,
}

/// Statement status or result page
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub statement_handle: Option<String>,
    #[serde(default)]
    pub result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub stats: Option<DmlStats>,
}

impl StatementResponse {
    pub fn is_running(&self) -> bool {
        self.result_set_meta_data.is_none() && self.code.as_deref() == Some(STILL_RUNNING)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetaData {
    #[serde(default)]
    pub num_rows: u64,
    #[serde(default)]
    pub row_type: Vec<RowType>,
    #[serde(default)]
    pub partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub scale: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    #[serde(default)]
    pub row_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmlStats {
    #[serde(default)]
    pub num_rows_inserted: u64,
    #[serde(default)]
    pub num_rows_deleted: u64,
    #[serde(default)]
    pub num_rows_updated: u64,
}

/// Column kind reported by a row type
pub fn row_type_kind(row_type: &RowType) -> ColumnKind {
    match row_type.column_type.to_ascii_lowercase().as_str() {
        "fixed" if row_type.scale.unwrap_or(0) == 0 => ColumnKind::Integer,
        "fixed" | "real" => ColumnKind::Float,
        "boolean" => ColumnKind::Boolean,
        "variant" | "object" | "array" => ColumnKind::Json,
        t if t.starts_with("timestamp") || t == "date" => ColumnKind::Timestamp,
        "text" => ColumnKind::Text,
        _ => ColumnKind::Unknown,
    }
}

pub fn columns_of(meta: &ResultSetMetaData) -> Vec<Column> {
    meta.row_type
        .iter()
        .map(|row_type| Column::new(row_type.name.clone(), row_type_kind(row_type)))
        .collect()
}

/// Converts a `jsonv2` cell (always a string or null) by its row type.
pub fn cell_value(raw: Option<&str>, row_type: &RowType) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    let kind = row_type.column_type.to_ascii_lowercase();
    match row_type_kind(row_type) {
        ColumnKind::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        ColumnKind::Float => raw
            .parse::<f64>()
            .map(float_value)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        ColumnKind::Boolean => match raw {
            "true" | "TRUE" | "1" => Value::Bool(true),
            "false" | "FALSE" | "0" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        ColumnKind::Json => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
        ColumnKind::Timestamp if kind == "date" => raw
            .parse::<i64>()
            .ok()
            .and_then(|days| {
                NaiveDate::from_ymd_opt(1970, 1, 1)
                    .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days)))
            })
            .map(|date| Value::String(date.to_string()))
            .unwrap_or_else(|| Value::String(raw.to_string())),
        ColumnKind::Timestamp => epoch_timestamp(raw)
            .map(Value::String)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        ColumnKind::Text | ColumnKind::Unknown => Value::String(raw.to_string()),
    }
}

/// Renders `seconds.fraction` (optionally followed by a timezone offset in
/// minutes) as RFC 3339 UTC.
fn epoch_timestamp(raw: &str) -> Option<String> {
    let seconds_part = raw.split_whitespace().next()?;
    let (secs, fraction) = seconds_part.split_once('.').unwrap_or((seconds_part, "0"));
    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = format!("{:0<9}", fraction).get(..9)?.parse().ok()?;
    DateTime::from_timestamp(secs, nanos).map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
