//! Writes for MySQL.

use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::DIALECT;
use crate::{
    Result,
    error::DeltaGuardError,
    models::{Recordset, WriteMode},
    providers::helpers::{Cell, push_cell, rows_per_statement},
};

/// Prepared statement placeholder ceiling
const MAX_PARAMS: usize = 65_535;

/// Creates or replaces `target`, then inserts every row.
///
/// The inserts share one transaction; the preceding DDL commits on its own.
pub(super) async fn write_table(
    pool: &MySqlPool,
    target: &str,
    data: &Recordset,
    mode: WriteMode,
) -> Result<u64> {
    if data.width() == 0 {
        tracing::warn!(table = target, "Recordset has no columns; nothing written");
        return Ok(0);
    }

    let write_err =
        |e: sqlx::Error| DeltaGuardError::write_failed(format!("Failed to write {}", target), e);

    if mode == WriteMode::Replace {
        sqlx::query(&DIALECT.drop_table(target))
            .execute(pool)
            .await
            .map_err(write_err)?;
    }
    let create = DIALECT.create_table(target, data.columns(), mode == WriteMode::Append);
    sqlx::query(&create).execute(pool).await.map_err(write_err)?;

    let mut tx = pool.begin().await.map_err(write_err)?;
    let prefix = DIALECT.insert_prefix(target, data.columns());
    for batch in data.rows().chunks(rows_per_statement(MAX_PARAMS, data.width())) {
        let mut builder = QueryBuilder::<MySql>::new(&prefix);
        builder.push_values(batch, |mut separated, row| {
            for (value, column) in row.iter().zip(data.columns()) {
                push_cell!(separated, Cell::from_value(value, column.kind));
            }
        });
        builder.build().execute(&mut *tx).await.map_err(write_err)?;
    }
    tx.commit().await.map_err(write_err)?;

    tracing::info!(table = target, rows = data.len(), %mode, "Table written");
    Ok(data.len() as u64)
}
