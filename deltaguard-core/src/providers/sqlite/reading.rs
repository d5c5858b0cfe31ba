//! Table reads for SQLite.

use base64::Engine;
use serde_json::Value;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::{
    Result,
    error::DeltaGuardError,
    models::{Column, ColumnKind, Recordset},
    providers::{
        helpers::float_value,
        sql::{SqlDialect, kind_from_type_name},
    },
};

/// Column names and declared types, in table order.
///
/// # Errors
/// Returns `Read` when the table does not exist
pub(super) async fn table_header(pool: &SqlitePool, table: &str) -> Result<Vec<Column>> {
    let header: Vec<(String, String)> =
        sqlx::query_as("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(pool)
            .await
            .map_err(|e| {
                DeltaGuardError::read_failed(format!("Failed to inspect table '{}'", table), e)
            })?;

    if header.is_empty() {
        return Err(DeltaGuardError::read_failed(
            format!("Table '{}' does not exist", table),
            "no such table",
        ));
    }

    Ok(header
        .into_iter()
        .map(|(name, declared)| Column::new(name, kind_from_type_name(&declared)))
        .collect())
}

pub(super) async fn read_table(
    pool: &SqlitePool,
    table: &str,
    limit: Option<usize>,
) -> Result<Recordset> {
    let dialect = SqlDialect::Sqlite;
    let columns = table_header(pool, table).await?;

    let select_list = columns
        .iter()
        .map(|c| dialect.quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let query = dialect.select(&dialect.quote(table), &select_list, limit);

    let rows = sqlx::query(&query).fetch_all(pool).await.map_err(|e| {
        DeltaGuardError::read_failed(format!("Failed to read table '{}'", table), e)
    })?;

    let decoded: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(index, column)| coerce(extract_column_value(row, index), column.kind))
                .collect()
        })
        .collect();

    // Columns declared without a type take the kind of their values
    let columns = columns
        .into_iter()
        .enumerate()
        .map(|(index, column)| match column.kind {
            ColumnKind::Unknown => Column::new(
                column.name,
                ColumnKind::infer(decoded.iter().map(|row| &row[index])),
            ),
            _ => column,
        })
        .collect();

    tracing::debug!(table, rows = decoded.len(), "SQLite table read");
    Recordset::new(columns, decoded)
}

/// Extracts a cell by trying storage types in order of likelihood.
fn extract_column_value(row: &SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(float_value).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Value::String(base64::engine::general_purpose::STANDARD.encode(bytes));
    }
    Value::Null
}

/// Applies the declared column kind to a dynamically typed cell.
fn coerce(value: Value, kind: ColumnKind) -> Value {
    match (kind, value) {
        (ColumnKind::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(i) => Value::Bool(i != 0),
            None => Value::Number(n),
        },
        (ColumnKind::Json, Value::String(s)) => {
            serde_json::from_str(&s).unwrap_or(Value::String(s))
        }
        (_, other) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_boolean_and_json() {
        assert_eq!(coerce(json!(1), ColumnKind::Boolean), json!(true));
        assert_eq!(coerce(json!(0), ColumnKind::Boolean), json!(false));
        assert_eq!(coerce(json!("{\"a\":1}"), ColumnKind::Json), json!({"a": 1}));
        assert_eq!(coerce(json!("not json"), ColumnKind::Json), json!("not json"));
        assert_eq!(coerce(json!(1), ColumnKind::Integer), json!(1));
    }
}
