//! Transactional writes for PostgreSQL and Redshift.
//!
//! Text cells are bound as `text` parameters. When an append targets an
//! existing column of another type (`timestamptz`, `jsonb`, `numeric`,
//! ...), the placeholder is cast to that column's type.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    Result,
    error::DeltaGuardError,
    models::{Recordset, WriteMode},
    providers::{
        helpers::{Cell, push_cell, rows_per_statement},
        sql::SqlDialect,
    },
};

/// Bind parameter ceiling of the extended query protocol
const MAX_PARAMS: usize = 65_535;

/// Creates or replaces `schema.table`, then inserts every row in one
/// transaction.
pub(super) async fn write_table(
    pool: &PgPool,
    dialect: SqlDialect,
    schema: &str,
    table: &str,
    data: &Recordset,
    mode: WriteMode,
) -> Result<u64> {
    let target = &dialect.qualify(&[schema, table]);
    if data.width() == 0 {
        tracing::warn!(table = target, "Recordset has no columns; nothing written");
        return Ok(0);
    }

    let write_err =
        |e: sqlx::Error| DeltaGuardError::write_failed(format!("Failed to write {}", target), e);

    let mut tx = pool.begin().await.map_err(write_err)?;

    if mode == WriteMode::Replace {
        sqlx::query(&dialect.drop_table(target))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
    }
    let create = dialect.create_table(target, data.columns(), mode == WriteMode::Append);
    sqlx::query(&create).execute(&mut *tx).await.map_err(write_err)?;

    let stored: Vec<StoredColumn> = sqlx::query_as(
        "SELECT column_name::text, data_type::text, udt_schema::text, udt_name::text \
         FROM information_schema.columns WHERE table_schema = $1 AND table_name = $2",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(&mut *tx)
    .await
    .map_err(write_err)?;
    let casts = text_casts(data, &stored);

    let prefix = dialect.insert_prefix(target, data.columns());
    for batch in data.rows().chunks(rows_per_statement(MAX_PARAMS, data.width())) {
        let mut builder = QueryBuilder::<Postgres>::new(&prefix);
        builder.push_values(batch, |mut separated, row| {
            for ((value, column), cast) in row.iter().zip(data.columns()).zip(&casts) {
                let cell = Cell::from_value(value, column.kind);
                let is_text = matches!(cell, Cell::Text(_));
                push_cell!(separated, cell);
                if let Some(cast) = cast.as_deref().filter(|_| is_text) {
                    separated.push_unseparated(cast);
                }
            }
        });
        builder.build().execute(&mut *tx).await.map_err(write_err)?;
    }

    tx.commit().await.map_err(write_err)?;
    tracing::info!(table = target, rows = data.len(), %mode, "Table written");
    Ok(data.len() as u64)
}

/// `(column_name, data_type, udt_schema, udt_name)` of an existing column
type StoredColumn = (String, String, String, String);

/// Cast suffix for text placeholders, aligned with the recordset columns.
///
/// `None` where the stored column is text-typed or absent.
fn text_casts(data: &Recordset, stored: &[StoredColumn]) -> Vec<Option<String>> {
    let by_name: HashMap<&str, &StoredColumn> =
        stored.iter().map(|c| (c.0.as_str(), c)).collect();
    data.columns()
        .iter()
        .map(|column| {
            let (_, data_type, udt_schema, udt_name) = by_name.get(column.name.as_str())?;
            if is_text_type(data_type) {
                return None;
            }
            Some(format!(
                "::{}.{}",
                SqlDialect::Postgres.quote(udt_schema),
                SqlDialect::Postgres.quote(udt_name)
            ))
        })
        .collect()
}

fn is_text_type(data_type: &str) -> bool {
    matches!(
        data_type.to_ascii_lowercase().as_str(),
        "text" | "character varying" | "character" | "name"
    )
}
