//! Heuristic detection of cut-off text.

use serde_json::Value;

use crate::models::Recordset;

/// Suffixes that mark a string as truncated
pub const DEFAULT_MARKERS: &[&str] = &["...", "\u{2026}"];

/// Counts string cells of text columns that end with one of `markers`.
pub fn count_truncated_like(data: &Recordset, markers: &[String]) -> u64 {
    let text_columns: Vec<usize> = data
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, column)| column.kind.is_text())
        .map(|(index, _)| index)
        .collect();

    data.rows()
        .iter()
        .flat_map(|row| text_columns.iter().map(move |&index| &row[index]))
        .filter(|cell| match cell {
            Value::String(s) => markers.iter().any(|marker| s.ends_with(marker.as_str())),
            _ => false,
        })
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, ColumnKind};
    use serde_json::json;

    fn markers() -> Vec<String> {
        DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_counts_both_markers() {
        let data = Recordset::from_rows(
            vec!["note"],
            vec![
                vec![json!("Lorem ipsum...")],
                vec![json!("Lorem ipsum\u{2026}")],
                vec![json!("complete.")],
                vec![json!(null)],
            ],
        )
        .unwrap();
        assert_eq!(count_truncated_like(&data, &markers()), 2);
    }

    #[test]
    fn test_ignores_non_text_columns() {
        let data = Recordset::new(
            vec![Column::new("payload", ColumnKind::Json)],
            vec![vec![json!("abc...")]],
        )
        .unwrap();
        assert_eq!(count_truncated_like(&data, &markers()), 0);
    }
}
