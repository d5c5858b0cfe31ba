//! Full-table migration between two providers.
//!
//! The source table is read once, then written to the destination as
//! sequential `Append` chunks. There is no retry and no rollback: when a
//! chunk fails, the chunks before it stay committed and the error reports
//! how far the migration got.

use crate::{
    Result,
    error::DeltaGuardError,
    models::{Capability, Recordset, WriteMode},
    providers::Provider,
};

/// Rows per destination write unless the caller chooses otherwise
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Copies `table` from `source` to `destination` in chunks.
///
/// An empty source table still produces exactly one write of the empty
/// recordset so the destination table exists afterwards. Returns the total
/// rows reported written by the destination.
///
/// # Errors
/// - `Configuration` when `chunk_size` is zero
/// - the source's read error, unchanged
/// - `Migration` naming the failed row range and the rows already committed
pub async fn migrate(
    source: &mut dyn Provider,
    destination: &mut dyn Provider,
    table: &str,
    chunk_size: usize,
) -> Result<u64> {
    if chunk_size == 0 {
        return Err(DeltaGuardError::configuration(
            "chunk_size must be greater than zero",
        ));
    }

    let data = source.read_table(table, None).await?;
    tracing::info!(
        table,
        source = %source.backend(),
        destination = %destination.backend(),
        rows = data.len(),
        chunk_size,
        "Starting migration"
    );

    if data.is_empty() {
        destination
            .write_table(table, &data, WriteMode::Append)
            .await
            .map_err(|e| migration_error(table, 0, 0, 0, e))?;
        return Ok(0);
    }

    let mut committed: u64 = 0;
    for range in data.chunk_ranges(chunk_size) {
        let chunk = data.slice(range.clone());
        let written = destination
            .write_table(table, &chunk, WriteMode::Append)
            .await
            .map_err(|e| migration_error(table, range.start, range.end, committed, e))?;
        committed += written;
        tracing::debug!(table, start = range.start, end = range.end, committed, "Chunk written");
    }

    tracing::info!(table, rows = committed, "Migration complete");
    Ok(committed)
}

fn migration_error(
    table: &str,
    start: usize,
    end: usize,
    committed: u64,
    source: DeltaGuardError,
) -> DeltaGuardError {
    DeltaGuardError::Migration {
        table: table.to_string(),
        start,
        end,
        committed,
        source: Box::new(source),
    }
}

/// Checks both sides before a migration: connectivity, then read access on
/// the source and write access on the destination.
///
/// # Errors
/// `Connection` naming the unreachable side, or `PermissionDenied`
pub async fn preflight(source: &mut dyn Provider, destination: &mut dyn Provider) -> Result<()> {
    ensure_reachable("source", source).await?;
    ensure_reachable("destination", destination).await?;

    crate::providers::require_permission(source, Capability::Read).await?;
    crate::providers::require_permission(destination, Capability::Write).await?;
    tracing::debug!("Preflight checks passed");
    Ok(())
}

async fn ensure_reachable(side: &str, provider: &mut dyn Provider) -> Result<()> {
    if provider.test_connection().await {
        return Ok(());
    }
    Err(DeltaGuardError::connection_failed(
        format!("Cannot connect to {} ({})", side, provider.backend()),
        "connection test failed",
    ))
}

/// Appends caller-supplied rows to `table`, returning the rows written.
pub async fn append_recordset(
    provider: &mut dyn Provider,
    table: &str,
    data: &Recordset,
) -> Result<u64> {
    let written = provider.write_table(table, data, WriteMode::Append).await?;
    tracing::info!(table, rows = written, backend = %provider.backend(), "Rows appended");
    Ok(written)
}
