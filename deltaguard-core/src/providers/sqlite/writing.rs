//! Transactional writes for SQLite.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    Result,
    error::DeltaGuardError,
    models::{Recordset, WriteMode},
    providers::{
        helpers::{Cell, is_uniform, push_cell, rows_per_statement},
        sql::SqlDialect,
    },
};

/// Bind parameter ceiling per statement (SQLITE_MAX_VARIABLE_NUMBER)
const MAX_PARAMS: usize = 32_000;

/// Creates or replaces the table, then inserts every row in one transaction.
pub(super) async fn write_table(
    pool: &SqlitePool,
    table: &str,
    data: &Recordset,
    mode: WriteMode,
) -> Result<u64> {
    if data.width() == 0 {
        tracing::warn!(table, "Recordset has no columns; nothing written");
        return Ok(0);
    }

    let dialect = SqlDialect::Sqlite;
    let target = dialect.quote(table);
    let write_err =
        |e: sqlx::Error| DeltaGuardError::write_failed(format!("Failed to write '{}'", table), e);

    let mut tx = pool.begin().await.map_err(write_err)?;

    if mode == WriteMode::Replace {
        sqlx::query(&dialect.drop_table(&target))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
    }
    // Mixed-type and all-null columns are declared without a type and bound
    // per value, keeping each value's storage class
    let untyped: Vec<bool> = data
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| !is_uniform(data.rows().iter().map(|row| &row[i]), c.kind))
        .collect();
    let create = dialect.create_table_with_untyped(
        &target,
        data.columns(),
        &untyped,
        mode == WriteMode::Append,
    );
    sqlx::query(&create).execute(&mut *tx).await.map_err(write_err)?;

    let prefix = dialect.insert_prefix(&target, data.columns());
    for batch in data.rows().chunks(rows_per_statement(MAX_PARAMS, data.width())) {
        let mut builder = QueryBuilder::<Sqlite>::new(&prefix);
        builder.push_values(batch, |mut separated, row| {
            for ((value, column), &dynamic) in row.iter().zip(data.columns()).zip(&untyped) {
                let cell = if dynamic {
                    Cell::native(value)
                } else {
                    Cell::from_value(value, column.kind)
                };
                push_cell!(separated, cell);
            }
        });
        builder.build().execute(&mut *tx).await.map_err(write_err)?;
    }

    tx.commit().await.map_err(write_err)?;
    tracing::debug!(table, rows = data.len(), %mode, "SQLite table written");
    Ok(data.len() as u64)
}
