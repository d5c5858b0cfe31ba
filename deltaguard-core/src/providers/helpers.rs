//! Helper utilities shared by provider implementations.
//!
//! Provides probe reporting (result-to-boolean conversion with logging) and
//! the conversion of recordset cells into typed bind parameters.

use serde_json::Value;

use crate::{
    Result,
    models::{BackendKind, ColumnKind},
};

/// Converts a probe outcome into the boolean reported at the contract
/// boundary, logging the failure instead of propagating it.
pub fn report_probe(backend: BackendKind, probe: &str, outcome: Result<()>) -> bool {
    match outcome {
        Ok(()) => {
            tracing::debug!(%backend, probe, "Probe succeeded");
            true
        }
        Err(e) => {
            tracing::warn!(%backend, probe, error = %e, "Probe failed");
            false
        }
    }
}

/// A cell converted to the bind type of its column.
///
/// Nulls keep their column's type so engines with strict parameter typing
/// (PostgreSQL) accept them.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    Text(Option<String>),
}

impl Cell {
    /// Converts a JSON cell for a column of `kind`.
    ///
    /// Values that do not fit the column kind fall back to their text form,
    /// which every engine in scope can store in a text column.
    pub fn from_value(value: &Value, kind: ColumnKind) -> Cell {
        match (kind, value) {
            (ColumnKind::Integer, Value::Null) => Cell::Int(None),
            (ColumnKind::Float, Value::Null) => Cell::Float(None),
            (ColumnKind::Boolean, Value::Null) => Cell::Bool(None),
            (_, Value::Null) => Cell::Text(None),
            (ColumnKind::Integer, Value::Number(n)) if n.is_i64() => Cell::Int(n.as_i64()),
            (ColumnKind::Integer | ColumnKind::Float, Value::Number(n)) => Cell::Float(n.as_f64()),
            (ColumnKind::Boolean, Value::Bool(b)) => Cell::Bool(Some(*b)),
            (_, other) => Cell::Text(Some(value_to_text(other))),
        }
    }
}

impl Cell {
    /// Converts a JSON cell by its own type, ignoring the column kind.
    pub fn native(value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Text(None),
            Value::Bool(b) => Cell::Bool(Some(*b)),
            Value::Number(n) if n.is_i64() => Cell::Int(n.as_i64()),
            Value::Number(n) => Cell::Float(n.as_f64()),
            other => Cell::Text(Some(value_to_text(other))),
        }
    }
}

/// Whether every non-null cell of a column already has the column's kind.
///
/// Columns that fail this would have distinct cells coerced into equal
/// stored values by a typed column declaration.
pub fn is_uniform<'a>(values: impl IntoIterator<Item = &'a Value>, kind: ColumnKind) -> bool {
    if kind == ColumnKind::Unknown {
        return false;
    }
    values
        .into_iter()
        .all(|value| match (kind, ColumnKind::of_value(value)) {
            (_, None) => true,
            (ColumnKind::Timestamp, Some(ColumnKind::Text)) => true,
            (expected, Some(actual)) => expected == actual,
        })
}

/// Text form of a cell: strings verbatim, everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Converts an `f64` into a JSON number, mapping NaN and infinities to null.
pub fn float_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Binds one [`Cell`] onto a `sqlx` `Separated` builder of any driver.
#[cfg(any(feature = "sqlite", feature = "postgresql", feature = "mysql"))]
macro_rules! push_cell {
    ($separated:expr, $cell:expr) => {
        match $cell {
            $crate::providers::helpers::Cell::Int(v) => {
                $separated.push_bind(v);
            }
            $crate::providers::helpers::Cell::Float(v) => {
                $separated.push_bind(v);
            }
            $crate::providers::helpers::Cell::Bool(v) => {
                $separated.push_bind(v);
            }
            $crate::providers::helpers::Cell::Text(v) => {
                $separated.push_bind(v);
            }
        }
    };
}

#[cfg(any(feature = "sqlite", feature = "postgresql", feature = "mysql"))]
pub(crate) use push_cell;

/// Rows per multi-row `INSERT` given a driver's bind parameter limit.
pub fn rows_per_statement(max_params: usize, width: usize) -> usize {
    (max_params / width.max(1)).clamp(1, 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_keeps_column_type_for_nulls() {
        assert_eq!(Cell::from_value(&json!(null), ColumnKind::Integer), Cell::Int(None));
        assert_eq!(Cell::from_value(&json!(null), ColumnKind::Boolean), Cell::Bool(None));
        assert_eq!(Cell::from_value(&json!(null), ColumnKind::Json), Cell::Text(None));
    }

    #[test]
    fn test_cell_falls_back_to_text() {
        assert_eq!(
            Cell::from_value(&json!("n/a"), ColumnKind::Integer),
            Cell::Text(Some("n/a".to_string()))
        );
        assert_eq!(
            Cell::from_value(&json!({"a": 1}), ColumnKind::Json),
            Cell::Text(Some("{\"a\":1}".to_string()))
        );
    }

    #[test]
    fn test_cell_numeric_widening() {
        assert_eq!(Cell::from_value(&json!(7), ColumnKind::Integer), Cell::Int(Some(7)));
        assert_eq!(Cell::from_value(&json!(7), ColumnKind::Float), Cell::Float(Some(7.0)));
        assert_eq!(Cell::from_value(&json!(2.5), ColumnKind::Integer), Cell::Float(Some(2.5)));
    }

    #[test]
    fn test_native_cells_follow_the_value() {
        assert_eq!(Cell::native(&json!(1)), Cell::Int(Some(1)));
        assert_eq!(Cell::native(&json!("1")), Cell::Text(Some("1".to_string())));
        assert_eq!(Cell::native(&json!(1.5)), Cell::Float(Some(1.5)));
        assert_eq!(Cell::native(&json!(null)), Cell::Text(None));
    }

    #[test]
    fn test_is_uniform() {
        let ints = [json!(1), json!(null), json!(2)];
        assert!(is_uniform(&ints, ColumnKind::Integer));
        assert!(!is_uniform(&ints, ColumnKind::Unknown));

        let mixed = [json!(1), json!("1")];
        assert!(!is_uniform(&mixed, ColumnKind::Text));

        let numeric = [json!(1), json!(1.5)];
        assert!(!is_uniform(&numeric, ColumnKind::Float));

        let stamps = [json!("2024-01-01T00:00:00Z")];
        assert!(is_uniform(&stamps, ColumnKind::Timestamp));
    }

    #[test]
    fn test_rows_per_statement_bounds() {
        assert_eq!(rows_per_statement(65_535, 10), 1000);
        assert_eq!(rows_per_statement(999, 100), 9);
        assert_eq!(rows_per_statement(10, 50), 1);
    }

    #[test]
    fn test_report_probe() {
        assert!(report_probe(BackendKind::Sqlite, "read", Ok(())));
        assert!(!report_probe(
            BackendKind::Sqlite,
            "write",
            Err(crate::error::DeltaGuardError::configuration("denied"))
        ));
    }
}
