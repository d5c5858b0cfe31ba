//! Quality report models.
//!
//! Reports carry counts only, never cell values, so they are safe to print
//! or ship to logs.

use serde::{Deserialize, Serialize};

/// Null count of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNulls {
    pub column: String,
    pub nulls: u64,
    /// Fraction of non-null cells (1.0 for an empty table)
    pub completeness: f64,
}

impl ColumnNulls {
    pub fn new(column: impl Into<String>, nulls: u64, total_rows: u64) -> Self {
        let completeness = if total_rows == 0 {
            1.0
        } else {
            (total_rows - nulls) as f64 / total_rows as f64
        };
        Self {
            column: column.into(),
            nulls,
            completeness,
        }
    }
}

/// Result of inspecting one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub table: String,
    pub rows: u64,
    /// Column names in table order
    pub columns: Vec<String>,
    /// Rows that repeat an earlier row exactly
    pub duplicates: u64,
    /// One entry per column, in column order
    pub nulls_by_column: Vec<ColumnNulls>,
    /// Text cells that look cut off
    pub truncated_like: u64,
}

impl QualityReport {
    /// Report for a table with no rows.
    pub fn empty(table: impl Into<String>, columns: Vec<String>) -> Self {
        let nulls_by_column = columns.iter().map(|c| ColumnNulls::new(c, 0, 0)).collect();
        Self {
            table: table.into(),
            rows: 0,
            columns,
            duplicates: 0,
            nulls_by_column,
            truncated_like: 0,
        }
    }

    /// Total nulls across all columns
    pub fn total_nulls(&self) -> u64 {
        self.nulls_by_column.iter().map(|c| c.nulls).sum()
    }

    /// Null count for `column`, if it exists
    pub fn nulls_for(&self, column: &str) -> Option<u64> {
        self.nulls_by_column
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.nulls)
    }

    /// Whether duplicate removal would change the table
    pub fn needs_correction(&self) -> bool {
        self.duplicates > 0
    }

    pub fn has_issues(&self) -> bool {
        self.duplicates > 0 || self.truncated_like > 0 || self.total_nulls() > 0
    }
}

impl std::fmt::Display for QualityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Table:          {}", self.table)?;
        writeln!(f, "Rows:           {}", self.rows)?;
        writeln!(f, "Columns:        {}", self.columns.join(", "))?;
        writeln!(f, "Duplicates:     {}", self.duplicates)?;
        writeln!(f, "Truncated-like: {}", self.truncated_like)?;
        writeln!(f, "Nulls by column:")?;
        for column in &self.nulls_by_column {
            writeln!(
                f,
                "  {:<24} {:>8}  ({:.1}% complete)",
                column.column,
                column.nulls,
                column.completeness * 100.0
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_lists_columns() {
        let report = QualityReport::empty("orders", vec!["id".to_string(), "note".to_string()]);
        assert_eq!(report.rows, 0);
        assert_eq!(report.nulls_by_column.len(), 2);
        assert_eq!(report.nulls_for("note"), Some(0));
        assert!(!report.has_issues());
    }

    #[test]
    fn test_column_completeness_ratio() {
        let column = ColumnNulls::new("email", 1, 4);
        assert!((column.completeness - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_serializes_in_column_order() {
        let mut report = QualityReport::empty("t", vec!["z".to_string(), "a".to_string()]);
        report.nulls_by_column[0].nulls = 2;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["nulls_by_column"][0]["column"], "z");
        assert_eq!(json["nulls_by_column"][0]["nulls"], 2);
        assert_eq!(json["nulls_by_column"][1]["column"], "a");
    }
}
