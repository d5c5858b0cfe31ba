//! CSV codec with per-column kind inference.

use serde_json::Value;

use crate::{
    Result,
    error::DeltaGuardError,
    models::{Column, ColumnKind, Recordset},
    providers::helpers::{float_value, value_to_text},
};

/// Cell texts decoded as null
pub const NA_MARKERS: &[&str] = &["", "NA", "NaN", "nan", "null", "NULL", "None", "N/A", "#N/A"];

pub(super) fn decode(bytes: &[u8]) -> Result<Recordset> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let names: Vec<String> = reader
        .headers()
        .map_err(|e| DeltaGuardError::read_failed("Invalid CSV header", e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut cells: Vec<Vec<Option<String>>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            DeltaGuardError::read_failed(format!("Invalid CSV record {}", line + 1), e)
        })?;
        cells.push(
            record
                .iter()
                .map(|field| (!NA_MARKERS.contains(&field)).then(|| field.to_string()))
                .collect(),
        );
    }

    let kinds: Vec<ColumnKind> = (0..names.len())
        .map(|i| infer_kind(cells.iter().filter_map(|row| row[i].as_deref())))
        .collect();

    let rows = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&kinds)
                .map(|(cell, kind)| cell.map_or(Value::Null, |text| parse_cell(text, *kind)))
                .collect()
        })
        .collect();

    let columns = names
        .into_iter()
        .zip(kinds)
        .map(|(name, kind)| Column::new(name, kind))
        .collect();
    Recordset::new(columns, rows)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Narrowest kind every non-null cell parses as.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    let mut cells = cells.peekable();
    if cells.peek().is_none() {
        return ColumnKind::Unknown;
    }
    if cells.clone().all(|c| c.parse::<i64>().is_ok()) {
        ColumnKind::Integer
    } else if cells.clone().all(|c| c.parse::<f64>().is_ok()) {
        ColumnKind::Float
    } else if cells.all(|c| parse_bool(c).is_some()) {
        ColumnKind::Boolean
    } else {
        ColumnKind::Text
    }
}

fn parse_cell(text: String, kind: ColumnKind) -> Value {
    match kind {
        ColumnKind::Integer => text.parse::<i64>().map_or(Value::String(text), Value::from),
        ColumnKind::Float => text
            .parse::<f64>()
            .map_or_else(|_| Value::String(text), float_value),
        ColumnKind::Boolean => parse_bool(&text).map_or(Value::String(text), Value::Bool),
        _ => Value::String(text),
    }
}

fn encode_cell(value: &Value) -> String {
    match value {
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => value_to_text(other),
    }
}

pub(super) fn encode(data: &Recordset) -> Result<Vec<u8>> {
    if data.width() == 0 {
        return Ok(Vec::new());
    }
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    let write_err = |e: ::csv::Error| DeltaGuardError::write_failed("CSV encoding failed", e);

    writer.write_record(data.column_names()).map_err(write_err)?;
    for row in data.rows() {
        writer
            .write_record(row.iter().map(encode_cell))
            .map_err(write_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| DeltaGuardError::write_failed("CSV encoding failed", e.into_error()))
}
