//! Table reads for MySQL.

use serde_json::Value;
use sqlx::{MySqlPool, Row, mysql::MySqlRow};

use super::DIALECT;
use crate::{
    Result,
    error::DeltaGuardError,
    models::{Column, ColumnKind, Recordset},
    providers::{helpers::float_value, sql::kind_from_type_name},
};

/// Columns of `database.table` in ordinal order.
///
/// `column_type` is used instead of `data_type` so `tinyint(1)` is
/// recognised as boolean.
pub(super) async fn table_header(
    pool: &MySqlPool,
    database: &str,
    table: &str,
) -> Result<Vec<Column>> {
    let header: Vec<(String, String)> = sqlx::query_as(
        "SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR) \
         FROM information_schema.columns \
         WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
    )
    .bind(database)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        DeltaGuardError::read_failed(format!("Failed to inspect table '{}.{}'", database, table), e)
    })?;

    if header.is_empty() {
        return Err(DeltaGuardError::read_failed(
            format!("Table '{}.{}' does not exist", database, table),
            "no such table",
        ));
    }

    Ok(header
        .into_iter()
        .map(|(name, column_type)| Column::new(name, kind_from_type_name(&column_type)))
        .collect())
}

pub(super) async fn read_table(
    pool: &MySqlPool,
    database: &str,
    table: &str,
    limit: Option<usize>,
) -> Result<Recordset> {
    let columns = table_header(pool, database, table).await?;

    let select_list = columns
        .iter()
        .map(|c| DIALECT.cast_column(c))
        .collect::<Vec<_>>()
        .join(", ");
    let query = DIALECT.select(&DIALECT.qualify(&[database, table]), &select_list, limit);

    let rows = sqlx::query(&query).fetch_all(pool).await.map_err(|e| {
        DeltaGuardError::read_failed(format!("Failed to read table '{}.{}'", database, table), e)
    })?;

    let decoded = rows
        .iter()
        .map(|row| decode_row(row, &columns))
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| {
            DeltaGuardError::read_failed(format!("Failed to decode rows of '{}'", table), e)
        })?;

    Recordset::new(columns, decoded)
}

fn decode_row(row: &MySqlRow, columns: &[Column]) -> std::result::Result<Vec<Value>, sqlx::Error> {
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            Ok(match column.kind {
                ColumnKind::Integer => row
                    .try_get::<Option<i64>, _>(index)?
                    .map_or(Value::Null, |n| Value::Number(n.into())),
                // Booleans arrive as CAST(.. AS SIGNED)
                ColumnKind::Boolean => row
                    .try_get::<Option<i64>, _>(index)?
                    .map_or(Value::Null, |n| Value::Bool(n != 0)),
                ColumnKind::Float => row
                    .try_get::<Option<f64>, _>(index)?
                    .map_or(Value::Null, float_value),
                ColumnKind::Json => row.try_get::<Option<String>, _>(index)?.map_or(
                    Value::Null,
                    |s| serde_json::from_str(&s).unwrap_or(Value::String(s)),
                ),
                _ => row
                    .try_get::<Option<String>, _>(index)?
                    .map_or(Value::Null, Value::String),
            })
        })
        .collect()
}
