//! Data quality inspection.
//!
//! A full-table read is checked for:
//! - **Uniqueness**: rows repeating an earlier row exactly (keep-first)
//! - **Completeness**: null cells per column
//! - **Truncation**: text cells ending in an ellipsis
//!
//! # Security Guarantees
//! Reports expose counts only, never cell values.

mod analyzer;
mod completeness;
mod models;
mod truncation;
mod uniqueness;

pub use analyzer::QualityAnalyzer;
pub use models::{ColumnNulls, QualityReport};
pub use truncation::DEFAULT_MARKERS;
pub use uniqueness::{count_duplicate_rows, first_occurrences};

use crate::{Result, models::Recordset, providers::Provider};

/// Analyzes `table` with the default analyzer.
pub async fn analyze(provider: &mut dyn Provider, table: &str) -> Result<QualityReport> {
    QualityAnalyzer::with_defaults().analyze(provider, table).await
}

/// Analyzes an in-memory recordset with the default analyzer.
pub fn analyze_recordset(table: &str, data: &Recordset) -> QualityReport {
    QualityAnalyzer::with_defaults().analyze_recordset(table, data)
}
