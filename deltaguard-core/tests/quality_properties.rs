//! Property tests for duplicate detection and correction masks.

#![allow(clippy::unwrap_used)]
use deltaguard_core::{
    Recordset,
    quality::{self, count_duplicate_rows, first_occurrences},
};
use proptest::prelude::*;
use serde_json::{Value, json};

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (0i64..4).prop_map(|n| json!(n)),
        prop::sample::select(vec!["a", "b", "a..."]).prop_map(|s| json!(s)),
    ]
}

fn rows() -> impl Strategy<Value = Vec<Vec<Value>>> {
    prop::collection::vec(prop::collection::vec(cell(), 2), 0..40)
}

proptest! {
    #[test]
    fn duplicate_count_ignores_row_order(rows in rows(), seed in any::<u64>()) {
        let mut shuffled = rows.clone();
        // Deterministic rotation plus reversal stands in for a shuffle
        if !shuffled.is_empty() {
            let shift = (seed as usize) % shuffled.len();
            shuffled.rotate_left(shift);
        }
        shuffled.reverse();
        prop_assert_eq!(count_duplicate_rows(&rows), count_duplicate_rows(&shuffled));
    }

    #[test]
    fn mask_keeps_exactly_the_distinct_rows(rows in rows()) {
        let keep = first_occurrences(&rows);
        prop_assert_eq!(keep.len(), rows.len());

        let kept: Vec<&Vec<Value>> = rows
            .iter()
            .zip(&keep)
            .filter_map(|(row, &keep_row)| keep_row.then_some(row))
            .collect();
        let removed = rows.len() - kept.len();
        prop_assert_eq!(removed as u64, count_duplicate_rows(&rows));

        // Kept rows are pairwise distinct and every row has a kept twin
        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                prop_assert_ne!(a, b);
            }
        }
        for row in &rows {
            prop_assert!(kept.contains(&row));
        }
    }

    #[test]
    fn report_counts_stay_within_bounds(rows in rows()) {
        let data = Recordset::from_rows(vec!["x", "y"], rows).unwrap();
        let report = quality::analyze_recordset("t", &data);
        prop_assert_eq!(report.rows, data.len() as u64);
        prop_assert!(report.duplicates < report.rows.max(1));
        prop_assert!(report.total_nulls() <= report.rows * 2);
        prop_assert!(report.truncated_like <= report.rows * 2);
    }
}
