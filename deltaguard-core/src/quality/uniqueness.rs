//! Exact-row duplicate detection.
//!
//! Rows are keyed by their serialized JSON form, so two rows are equal only
//! when every cell is equal, numbers included (`1` and `1.0` differ).

use std::collections::HashSet;

use crate::models::Row;

fn row_key(row: &Row) -> String {
    serde_json::to_string(row).unwrap_or_else(|e| {
        tracing::trace!("Failed to serialize row for duplicate detection: {}", e);
        format!("{:?}", row)
    })
}

/// Number of rows that repeat an earlier row.
pub fn count_duplicate_rows(rows: &[Row]) -> u64 {
    let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
    rows.iter().filter(|row| !seen.insert(row_key(row))).count() as u64
}

/// Keep-first mask: `true` for the first occurrence of each distinct row.
pub fn first_occurrences(rows: &[Row]) -> Vec<bool> {
    let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
    rows.iter().map(|row| seen.insert(row_key(row))).collect()
}
