//! Excel workbooks (first worksheet, header row first) via calamine.

use std::path::Path;

use calamine::{Data, DataType, Reader, open_workbook_auto};
use serde_json::Value;

use super::NA_MARKERS;
use crate::{
    Result,
    error::DeltaGuardError,
    models::{Column, ColumnKind, Recordset},
    providers::helpers::float_value,
};

pub(super) fn read(path: &Path) -> Result<Recordset> {
    let read_err = |e: calamine::Error| {
        DeltaGuardError::read_failed(format!("Failed to read workbook {}", path.display()), e)
    };
    let mut workbook = open_workbook_auto(path).map_err(read_err)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(read_err)?,
        None => return Ok(Recordset::empty(Vec::new())),
    };

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Recordset::empty(Vec::new()));
    };
    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("column_{}", i + 1),
            other => other.to_string(),
        })
        .collect();

    let mut cells: Vec<Vec<Value>> = rows
        .map(|row| {
            (0..names.len())
                .map(|i| row.get(i).map_or(Value::Null, cell_value))
                .collect()
        })
        .collect();

    for index in 0..names.len() {
        if is_whole_number_column(cells.iter().map(|row| &row[index])) {
            for row in &mut cells {
                if let Some(n) = row[index].as_f64() {
                    row[index] = Value::from(n as i64);
                }
            }
        }
    }

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Column::new(name, ColumnKind::infer(cells.iter().map(|row| &row[i]))))
        .collect();
    Recordset::new(columns, cells)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(n) => Value::from(*n),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if NA_MARKERS.contains(&s.as_str()) => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map_or(Value::Null, |dt| {
                Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}

/// Excel stores every number as a float; a column of only whole numbers
/// reads back as integers.
fn is_whole_number_column<'a>(mut values: impl Iterator<Item = &'a Value>) -> bool {
    let mut seen = false;
    let whole = values.all(|value| match value {
        Value::Null => true,
        Value::Number(n) => {
            seen = true;
            n.as_f64()
                .is_some_and(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        }
        _ => false,
    });
    whole && seen
}
