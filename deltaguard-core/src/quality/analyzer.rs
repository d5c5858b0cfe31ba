//! Quality analyzer facade.

use crate::{Result, models::Recordset, providers::Provider};

use super::completeness::analyze_completeness;
use super::models::QualityReport;
use super::truncation::{DEFAULT_MARKERS, count_truncated_like};
use super::uniqueness::count_duplicate_rows;

/// Runs the duplicate, null and truncation checks over a recordset.
///
/// # Example
///
/// ```rust
/// use deltaguard_core::{models::Recordset, quality::QualityAnalyzer};
/// use serde_json::json;
///
/// let data = Recordset::from_rows(
///     vec!["id", "note"],
///     vec![
///         vec![json!(1), json!("ok")],
///         vec![json!(1), json!("ok")],
///         vec![json!(2), json!("cut off...")],
///     ],
/// )?;
/// let report = QualityAnalyzer::with_defaults().analyze_recordset("notes", &data);
/// assert_eq!(report.duplicates, 1);
/// assert_eq!(report.truncated_like, 1);
/// # Ok::<(), deltaguard_core::DeltaGuardError>(())
/// ```
#[derive(Debug, Clone)]
pub struct QualityAnalyzer {
    truncation_markers: Vec<String>,
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl QualityAnalyzer {
    /// Creates an analyzer with custom truncation suffixes.
    pub fn new(truncation_markers: Vec<String>) -> Self {
        Self { truncation_markers }
    }

    /// Analyzer flagging text ending in `...` or `…`
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect())
    }

    pub fn truncation_markers(&self) -> &[String] {
        &self.truncation_markers
    }

    /// Builds the report for an in-memory recordset.
    pub fn analyze_recordset(&self, table: &str, data: &Recordset) -> QualityReport {
        let columns: Vec<String> = data.column_names().into_iter().map(str::to_string).collect();
        if data.is_empty() {
            return QualityReport::empty(table, columns);
        }

        QualityReport {
            table: table.to_string(),
            rows: data.len() as u64,
            columns,
            duplicates: count_duplicate_rows(data.rows()),
            nulls_by_column: analyze_completeness(data),
            truncated_like: count_truncated_like(data, &self.truncation_markers),
        }
    }

    /// Reads the whole table through `provider` and analyzes it.
    ///
    /// # Errors
    /// Propagates the provider's read error unchanged
    pub async fn analyze(&self, provider: &mut dyn Provider, table: &str) -> Result<QualityReport> {
        let data = provider.read_table(table, None).await?;
        let report = self.analyze_recordset(table, &data);
        tracing::info!(
            table,
            backend = %provider.backend(),
            rows = report.rows,
            duplicates = report.duplicates,
            truncated_like = report.truncated_like,
            "Quality check complete"
        );
        Ok(report)
    }
}
