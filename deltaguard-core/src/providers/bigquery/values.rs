//! Conversion between BigQuery JSON cells and recordset values.

use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value};

use super::api::{FieldSchema, TableSchema};
use crate::{
    models::{Column, ColumnKind, Recordset},
    providers::{
        helpers::{Cell, float_value},
        sql::{SqlDialect, kind_from_type_name},
    },
};

/// Column kind of a result field; repeated fields are JSON arrays.
pub fn field_kind(field: &FieldSchema) -> ColumnKind {
    if field.is_repeated() {
        ColumnKind::Json
    } else {
        kind_from_type_name(&field.field_type)
    }
}

pub fn columns_of(schema: &TableSchema) -> Vec<Column> {
    schema
        .fields
        .iter()
        .map(|field| Column::new(field.name.clone(), field_kind(field)))
        .collect()
}

/// Converts one API cell (`{"v": ...}` payload) by its field schema.
pub fn cell_value(raw: &Value, field: &FieldSchema) -> Value {
    if field.is_repeated() {
        return match raw {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| scalar_value(item.get("v").unwrap_or(&Value::Null), field))
                    .collect(),
            ),
            _ => Value::Null,
        };
    }
    scalar_value(raw, field)
}

fn scalar_value(raw: &Value, field: &FieldSchema) -> Value {
    let text = match raw {
        Value::Null => return Value::Null,
        Value::String(s) => s.as_str(),
        // RECORD cells arrive as {"f": [{"v": ..}, ..]}
        Value::Object(_) => return record_value(raw, &field.fields),
        other => return other.clone(),
    };

    match field.field_type.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT64" => text
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(text.to_string())),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .parse::<f64>()
            .map(float_value)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        "BOOLEAN" | "BOOL" => match text.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        "TIMESTAMP" => Value::String(timestamp_text(text)),
        "JSON" => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

fn record_value(raw: &Value, fields: &[FieldSchema]) -> Value {
    let cells = raw
        .get("f")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let object: Map<String, Value> = fields
        .iter()
        .zip(cells)
        .map(|(field, cell)| {
            (
                field.name.clone(),
                cell_value(cell.get("v").unwrap_or(&Value::Null), field),
            )
        })
        .collect();
    Value::Object(object)
}

/// TIMESTAMP cells are epoch seconds as a float string; render RFC 3339.
fn timestamp_text(raw: &str) -> String {
    raw.parse::<f64>()
        .ok()
        .and_then(|seconds| {
            let micros = (seconds * 1_000_000.0).round() as i64;
            DateTime::from_timestamp_micros(micros)
        })
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_else(|| raw.to_string())
}

/// Table schema inferred from a recordset header.
pub fn schema_for(recordset: &Recordset) -> TableSchema {
    TableSchema {
        fields: recordset
            .columns()
            .iter()
            .map(|column| FieldSchema {
                name: column.name.clone(),
                field_type: SqlDialect::BigQuery.column_type(column.kind).to_string(),
                mode: Some("NULLABLE".to_string()),
                fields: Vec::new(),
            })
            .collect(),
    }
}

/// Newline-delimited JSON body for a load job.
pub fn ndjson(recordset: &Recordset) -> String {
    let mut body = String::new();
    for row in recordset.rows() {
        let object: Map<String, Value> = recordset
            .columns()
            .iter()
            .zip(row)
            .filter_map(|(column, value)| {
                let cell = match Cell::from_value(value, column.kind) {
                    Cell::Int(v) => v.map(|n| Value::Number(n.into())),
                    Cell::Float(v) => v.map(float_value),
                    Cell::Bool(v) => v.map(Value::Bool),
                    Cell::Text(v) => v.map(Value::String),
                };
                cell.map(|cell| (column.name.clone(), cell))
            })
            .collect();
        body.push_str(&Value::Object(object).to_string());
        body.push('\n');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, field_type: &str) -> FieldSchema {
        FieldSchema {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: None,
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_scalar_conversion_by_type() {
        assert_eq!(cell_value(&json!("42"), &field("n", "INTEGER")), json!(42));
        assert_eq!(cell_value(&json!("2.5"), &field("x", "FLOAT")), json!(2.5));
        assert_eq!(cell_value(&json!("true"), &field("b", "BOOLEAN")), json!(true));
        assert_eq!(cell_value(&json!(null), &field("s", "STRING")), json!(null));
        assert_eq!(
            cell_value(&json!("1700000000.0"), &field("t", "TIMESTAMP")),
            json!("2023-11-14T22:13:20Z")
        );
    }

    #[test]
    fn test_repeated_and_record_cells() {
        let tags = FieldSchema {
            mode: Some("REPEATED".to_string()),
            ..field("tags", "STRING")
        };
        assert_eq!(
            cell_value(&json!([{"v": "a"}, {"v": "b"}]), &tags),
            json!(["a", "b"])
        );
        assert_eq!(field_kind(&tags), ColumnKind::Json);

        let address = FieldSchema {
            fields: vec![field("city", "STRING"), field("zip", "INT64")],
            ..field("address", "RECORD")
        };
        assert_eq!(
            cell_value(&json!({"f": [{"v": "Oslo"}, {"v": "150"}]}), &address),
            json!({"city": "Oslo", "zip": 150})
        );
    }

    #[test]
    fn test_ndjson_omits_nulls_and_stringifies_json() {
        let data = Recordset::from_rows(
            vec!["id", "meta", "note"],
            vec![
                vec![json!(1), json!({"k": 1}), json!(null)],
                vec![json!(2), json!(null), json!("hi")],
            ],
        )
        .unwrap();
        assert_eq!(
            ndjson(&data),
            "{\"id\":1,\"meta\":\"{\\\"k\\\":1}\"}\n{\"id\":2,\"note\":\"hi\"}\n"
        );

        let schema = schema_for(&data);
        let types: Vec<&str> = schema.fields.iter().map(|f| f.field_type.as_str()).collect();
        assert_eq!(types, vec!["INT64", "STRING", "STRING"]);
    }
}
