//! Table reads for PostgreSQL and Redshift.
//!
//! Every column is cast to one of `BIGINT`, `DOUBLE PRECISION`, `BOOLEAN`
//! or text, so rows decode the same way regardless of the stored types.

use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Result,
    error::DeltaGuardError,
    models::{Column, ColumnKind, Recordset},
    providers::{
        helpers::float_value,
        sql::{SqlDialect, kind_from_type_name},
    },
};

/// Columns of `schema.table` in ordinal order.
///
/// # Errors
/// Returns `Read` when the table does not exist
pub(super) async fn table_header(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<Column>> {
    let header: Vec<(String, String)> = sqlx::query_as(
        "SELECT column_name::text, data_type::text FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        DeltaGuardError::read_failed(format!("Failed to inspect table '{}.{}'", schema, table), e)
    })?;

    if header.is_empty() {
        return Err(DeltaGuardError::read_failed(
            format!("Table '{}.{}' does not exist", schema, table),
            "no such table",
        ));
    }

    Ok(header
        .into_iter()
        .map(|(name, data_type)| Column::new(name, kind_from_type_name(&data_type)))
        .collect())
}

pub(super) async fn read_table(
    pool: &PgPool,
    dialect: SqlDialect,
    schema: &str,
    table: &str,
    limit: Option<usize>,
) -> Result<Recordset> {
    let columns = table_header(pool, schema, table).await?;

    let select_list = columns
        .iter()
        .map(|c| dialect.cast_column(c))
        .collect::<Vec<_>>()
        .join(", ");
    let query = dialect.select(&dialect.qualify(&[schema, table]), &select_list, limit);
    tracing::debug!(%query, "Reading table");

    let rows = sqlx::query(&query).fetch_all(pool).await.map_err(|e| {
        DeltaGuardError::read_failed(format!("Failed to read table '{}.{}'", schema, table), e)
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

fn decode_row(row: &PgRow, columns: &[Column]) -> std::result::Result<Vec<Value>, sqlx::Error> {
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            Ok(match column.kind {
                ColumnKind::Integer => row
                    .try_get::<Option<i64>, _>(index)?
                    .map_or(Value::Null, |n| Value::Number(n.into())),
                ColumnKind::Float => row
                    .try_get::<Option<f64>, _>(index)?
                    .map_or(Value::Null, float_value),
                ColumnKind::Boolean => row
                    .try_get::<Option<bool>, _>(index)?
                    .map_or(Value::Null, Value::Bool),
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
