//! Null counting per column.

use crate::models::Recordset;

use super::models::ColumnNulls;

/// Null counts for every column of `data`, in column order.
pub fn analyze_completeness(data: &Recordset) -> Vec<ColumnNulls> {
    let total_rows = data.len() as u64;
    data.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let nulls = data.rows().iter().filter(|row| row[index].is_null()).count() as u64;
            ColumnNulls::new(&column.name, nulls, total_rows)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counts_nulls_not_empty_strings() {
        let data = Recordset::from_rows(
            vec!["id", "email"],
            vec![
                vec![json!(1), json!("a@example.com")],
                vec![json!(2), json!(null)],
                vec![json!(3), json!("")],
            ],
        )
        .unwrap();

        let nulls = analyze_completeness(&data);
        assert_eq!(nulls.len(), 2);
        assert_eq!(nulls[0].nulls, 0);
        assert_eq!(nulls[1].column, "email");
        assert_eq!(nulls[1].nulls, 1);
    }
}
