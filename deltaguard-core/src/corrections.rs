//! Corrective rewrites and guarded deletes.
//!
//! Every mutating path here first runs the provider's write probe and fails
//! with `PermissionDenied` when it reports false.

use crate::{
    Result,
    models::{Capability, WriteMode},
    providers::{Provider, require_permission},
    quality::first_occurrences,
};

/// Removes exact duplicate rows from `table`, keeping first occurrences in
/// their original order. Returns the number of rows removed.
///
/// The table is deleted and rewritten with `Replace`; a failure between the
/// two steps can leave the table missing. When nothing is duplicated the
/// table is not touched.
///
/// # Errors
/// `PermissionDenied` without write access, otherwise the provider's error
pub async fn apply_corrections(provider: &mut dyn Provider, table: &str) -> Result<u64> {
    require_permission(provider, Capability::Write).await?;

    let mut data = provider.read_table(table, None).await?;
    let before = data.len();
    let keep = first_occurrences(data.rows());
    let removed = keep.iter().filter(|kept| !**kept).count();
    if removed == 0 {
        tracing::info!(table, "No duplicates found; table left unchanged");
        return Ok(0);
    }

    let mut mask = keep.into_iter();
    data.retain_rows(|_| mask.next().unwrap_or(true));

    provider.delete_table(table).await?;
    provider.write_table(table, &data, WriteMode::Replace).await?;

    tracing::info!(
        table,
        backend = %provider.backend(),
        before,
        removed,
        "Duplicate rows removed"
    );
    Ok(removed as u64)
}

/// Deletes rows matching `predicate` (all rows when `None`) after a write
/// probe.
pub async fn delete_rows_guarded(
    provider: &mut dyn Provider,
    table: &str,
    predicate: Option<&str>,
) -> Result<u64> {
    require_permission(provider, Capability::Write).await?;
    let deleted = provider.delete_rows(table, predicate).await?;
    tracing::info!(table, deleted, "Rows deleted");
    Ok(deleted)
}

/// Drops `table` after a write probe.
pub async fn delete_table_guarded(provider: &mut dyn Provider, table: &str) -> Result<()> {
    require_permission(provider, Capability::Write).await?;
    provider.delete_table(table).await?;
    tracing::info!(table, "Table deleted");
    Ok(())
}
