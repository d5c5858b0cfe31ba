//! In-memory evaluation of SQL `WHERE` predicates.
//!
//! Object storage has no query engine, so `delete_rows` predicates are parsed
//! with sqlparser and evaluated row by row. Evaluation follows SQL
//! three-valued logic: a comparison with NULL, or between values of
//! different types, is unknown and never matches.
//!
//! # Example
//! ```rust
//! use deltaguard_core::{models::Recordset, predicate::Predicate};
//! use serde_json::json;
//!
//! let data = Recordset::from_rows(
//!     vec!["id", "status"],
//!     vec![vec![json!(1), json!("open")], vec![json!(2), json!("closed")]],
//! )?;
//! let predicate = Predicate::parse("status = 'closed' OR id > 5", data.columns())?;
//! assert!(!predicate.matches(&data.rows()[0]));
//! assert!(predicate.matches(&data.rows()[1]));
//! # Ok::<(), deltaguard_core::DeltaGuardError>(())
//! ```

use std::cmp::Ordering;

use serde_json::Value;
use sqlparser::ast::{self, BinaryOperator, Expr, UnaryOperator};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::{
    Result,
    error::DeltaGuardError,
    models::{Column, Row},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

/// Predicate expression with columns resolved to row positions
#[derive(Debug, Clone)]
enum Node {
    Column(usize),
    Literal(Value),
    Compare(CompareOp, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    IsNull(Box<Node>, bool),
    InList {
        expr: Box<Node>,
        list: Vec<Node>,
        negated: bool,
    },
    Between {
        expr: Box<Node>,
        low: Box<Node>,
        high: Box<Node>,
        negated: bool,
    },
    Like {
        expr: Box<Node>,
        pattern: Box<Node>,
        negated: bool,
        case_insensitive: bool,
    },
    Negate(Box<Node>),
}

/// A parsed predicate bound to a recordset header.
#[derive(Debug, Clone)]
pub struct Predicate {
    root: Node,
}

impl Predicate {
    /// Parses `text` and resolves its column references against `columns`.
    ///
    /// # Errors
    /// Returns `Query` for unparseable text, unknown columns or syntax
    /// outside the supported subset
    pub fn parse(text: &str, columns: &[Column]) -> Result<Self> {
        let query_err = |e: sqlparser::parser::ParserError| {
            DeltaGuardError::query_failed(format!("Invalid predicate: {}", text), e)
        };
        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect).try_with_sql(text).map_err(query_err)?;
        let expr = parser.parse_expr().map_err(query_err)?;
        let trailing = parser.peek_token();
        if trailing.token != Token::EOF {
            return Err(DeltaGuardError::query_failed(
                format!("Invalid predicate: {}", text),
                format!("unexpected trailing input at {}", trailing.token),
            ));
        }
        Ok(Self {
            root: compile(&expr, columns)?,
        })
    }

    /// Whether the predicate is definitely true for `row`.
    pub fn matches(&self, row: &Row) -> bool {
        truth(&self.root, row) == Some(true)
    }
}

fn unsupported(expr: &Expr) -> DeltaGuardError {
    DeltaGuardError::query_failed(
        "Unsupported predicate syntax",
        format!("'{}' cannot be evaluated in memory", expr),
    )
}

fn boxed(expr: &Expr, columns: &[Column]) -> Result<Box<Node>> {
    compile(expr, columns).map(Box::new)
}

fn compile(expr: &Expr, columns: &[Column]) -> Result<Node> {
    let node = match expr {
        Expr::Identifier(ident) => Node::Column(resolve(&ident.value, columns)?),
        Expr::CompoundIdentifier(parts) => {
            let last = parts.last().ok_or_else(|| unsupported(expr))?;
            Node::Column(resolve(&last.value, columns)?)
        }
        Expr::Value(value) => Node::Literal(literal(&value.value).ok_or_else(|| unsupported(expr))?),
        Expr::Nested(inner) => compile(inner, columns)?,
        Expr::UnaryOp { op, expr: inner } => match op {
            UnaryOperator::Not => Node::Not(boxed(inner, columns)?),
            UnaryOperator::Minus => Node::Negate(boxed(inner, columns)?),
            UnaryOperator::Plus => compile(inner, columns)?,
            _ => return Err(unsupported(expr)),
        },
        Expr::BinaryOp { left, op, right } => {
            let (left, right) = (boxed(left, columns)?, boxed(right, columns)?);
            match op {
                BinaryOperator::And => Node::And(left, right),
                BinaryOperator::Or => Node::Or(left, right),
                BinaryOperator::Eq => Node::Compare(CompareOp::Eq, left, right),
                BinaryOperator::NotEq => Node::Compare(CompareOp::NotEq, left, right),
                BinaryOperator::Lt => Node::Compare(CompareOp::Lt, left, right),
                BinaryOperator::LtEq => Node::Compare(CompareOp::LtEq, left, right),
                BinaryOperator::Gt => Node::Compare(CompareOp::Gt, left, right),
                BinaryOperator::GtEq => Node::Compare(CompareOp::GtEq, left, right),
                _ => return Err(unsupported(expr)),
            }
        }
        Expr::IsNull(inner) => Node::IsNull(boxed(inner, columns)?, false),
        Expr::IsNotNull(inner) => Node::IsNull(boxed(inner, columns)?, true),
        Expr::InList {
            expr: inner,
            list,
            negated,
        } => Node::InList {
            expr: boxed(inner, columns)?,
            list: list
                .iter()
                .map(|item| compile(item, columns))
                .collect::<Result<_>>()?,
            negated: *negated,
        },
        Expr::Between {
            expr: inner,
            negated,
            low,
            high,
        } => Node::Between {
            expr: boxed(inner, columns)?,
            low: boxed(low, columns)?,
            high: boxed(high, columns)?,
            negated: *negated,
        },
        Expr::Like {
            negated,
            expr: inner,
            pattern,
            escape_char: None,
            any: false,
        } => Node::Like {
            expr: boxed(inner, columns)?,
            pattern: boxed(pattern, columns)?,
            negated: *negated,
            case_insensitive: false,
        },
        Expr::ILike {
            negated,
            expr: inner,
            pattern,
            escape_char: None,
            any: false,
        } => Node::Like {
            expr: boxed(inner, columns)?,
            pattern: boxed(pattern, columns)?,
            negated: *negated,
            case_insensitive: true,
        },
        _ => return Err(unsupported(expr)),
    };
    Ok(node)
}

fn resolve(name: &str, columns: &[Column]) -> Result<usize> {
    columns
        .iter()
        .position(|c| c.name == name)
        .or_else(|| columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
        .ok_or_else(|| {
            DeltaGuardError::query_failed(
                "Invalid predicate",
                format!("unknown column '{}'", name),
            )
        })
}

fn literal(value: &ast::Value) -> Option<Value> {
    match value {
        ast::Value::Number(text, _) => text
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| text.parse::<f64>().ok().map(crate::providers::helpers::float_value)),
        ast::Value::SingleQuotedString(s) | ast::Value::DoubleQuotedString(s) => {
            Some(Value::String(s.clone()))
        }
        ast::Value::Boolean(b) => Some(Value::Bool(*b)),
        ast::Value::Null => Some(Value::Null),
        _ => None,
    }
}

fn value(node: &Node, row: &Row) -> Value {
    match node {
        Node::Column(i) => row.get(*i).cloned().unwrap_or(Value::Null),
        Node::Literal(v) => v.clone(),
        Node::Negate(inner) => match value(inner, row) {
            Value::Number(n) => n
                .as_i64()
                .and_then(i64::checked_neg)
                .map(Value::from)
                .or_else(|| n.as_f64().map(|f| crate::providers::helpers::float_value(-f)))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        other => truth(other, row).map_or(Value::Null, Value::Bool),
    }
}

/// Ordering of two non-null values of the same type
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matched[j]: text[..i] matches pattern[..j]
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }
    for &c in &text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == c,
            };
        }
        matched = next;
    }
    matched[pattern.len()]
}

fn truth(node: &Node, row: &Row) -> Option<bool> {
    match node {
        Node::Compare(op, left, right) => {
            compare(&value(left, row), &value(right, row)).map(|ordering| op.holds(ordering))
        }
        Node::And(left, right) => match (truth(left, row), truth(right, row)) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Node::Or(left, right) => match (truth(left, row), truth(right, row)) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Node::Not(inner) => truth(inner, row).map(|b| !b),
        Node::IsNull(inner, negated) => Some(value(inner, row).is_null() != *negated),
        Node::InList {
            expr,
            list,
            negated,
        } => {
            let needle = value(expr, row);
            let mut unknown = false;
            for item in list {
                match compare(&needle, &value(item, row)) {
                    Some(Ordering::Equal) => return Some(!negated),
                    Some(_) => {}
                    None => unknown = true,
                }
            }
            if unknown { None } else { Some(*negated) }
        }
        Node::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let subject = value(expr, row);
            let above = compare(&subject, &value(low, row))?;
            let below = compare(&subject, &value(high, row))?;
            let inside = above != Ordering::Less && below != Ordering::Greater;
            Some(inside != *negated)
        }
        Node::Like {
            expr,
            pattern,
            negated,
            case_insensitive,
        } => match (value(expr, row), value(pattern, row)) {
            (Value::String(text), Value::String(pattern)) => {
                let matched = if *case_insensitive {
                    like(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like(&text, &pattern)
                };
                Some(matched != *negated)
            }
            _ => None,
        },
        Node::Column(_) | Node::Literal(_) | Node::Negate(_) => match value(node, row) {
            Value::Bool(b) => Some(b),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recordset;
    use serde_json::json;

    fn orders() -> Recordset {
        Recordset::from_rows(
            vec!["id", "status", "amount", "note"],
            vec![
                vec![json!(1), json!("open"), json!(10.5), json!(null)],
                vec![json!(2), json!("closed"), json!(99), json!("Rush order")],
                vec![json!(3), json!("open"), json!(-4), json!("refund")],
            ],
        )
        .unwrap()
    }

    fn matching(text: &str) -> Vec<i64> {
        let data = orders();
        let predicate = Predicate::parse(text, data.columns()).unwrap();
        data.rows()
            .iter()
            .filter(|row| predicate.matches(row))
            .map(|row| row[0].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(matching("status = 'open'"), vec![1, 3]);
        assert_eq!(matching("status <> 'open' OR id >= 3"), vec![2, 3]);
        assert_eq!(matching("NOT (amount < 50) AND status != 'open'"), vec![2]);
        assert_eq!(matching("amount = -4"), vec![3]);
        assert_eq!(matching("amount > 10"), vec![1, 2]);
    }

    #[test]
    fn test_null_semantics() {
        assert_eq!(matching("note IS NULL"), vec![1]);
        assert_eq!(matching("note IS NOT NULL"), vec![2, 3]);
        // Comparisons with NULL are unknown, so neither side matches row 1
        assert_eq!(matching("note = 'x' OR note <> 'x'"), vec![2, 3]);
        assert_eq!(matching("NOT (note = 'x')"), vec![2, 3]);
    }

    #[test]
    fn test_in_between_like() {
        assert_eq!(matching("id IN (1, 3)"), vec![1, 3]);
        assert_eq!(matching("id NOT IN (1, 3)"), vec![2]);
        assert_eq!(matching("amount BETWEEN 0 AND 20"), vec![1]);
        assert_eq!(matching("amount NOT BETWEEN 0 AND 20"), vec![2, 3]);
        assert_eq!(matching("note LIKE 'R%'"), vec![2]);
        assert_eq!(matching("note ILIKE 'r%'"), vec![2, 3]);
        assert_eq!(matching("status LIKE '_pen'"), vec![1, 3]);
    }

    #[test]
    fn test_mismatched_types_never_match() {
        assert!(matching("status = 1").is_empty());
        assert!(matching("id = '1'").is_empty());
    }

    #[test]
    fn test_rejections_are_query_errors() {
        let columns = orders().columns().to_vec();
        for text in ["missing = 1", "id = ", "id = 1 garbage garbage", "LOWER(status) = 'x'"] {
            assert!(
                matches!(
                    Predicate::parse(text, &columns),
                    Err(DeltaGuardError::Query { .. })
                ),
                "{} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_like_matcher() {
        assert!(like("abc", "a%"));
        assert!(like("abc", "%c"));
        assert!(like("abc", "a_c"));
        assert!(like("", "%"));
        assert!(!like("abc", "a_"));
        assert!(!like("abc", "b%"));
    }
}
