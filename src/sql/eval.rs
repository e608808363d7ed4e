//! # Condition Evaluation
//!
//! Evaluates a parsed condition against a row projection (`RowView`).
//!
//! Equality (`=`/`<>`) uses set-membership semantics: `NULL = NULL` is
//! true and `NULL = 1` is false. The ordered operators and `LIKE` follow
//! SQL three-valued logic instead, yielding `Unknown` whenever NULL is
//! involved; `Unknown` only becomes false at the top of the condition.

use std::cmp::Ordering;

use hashbrown::HashMap;

use super::ast::{CompareOp, CondExpr, Operand, Truth};
use crate::error::{Entity, NotFoundSnafu, Result};
use crate::types::Value;

/// A `column name -> value` projection of one row.
#[derive(Debug, Default)]
pub struct RowView<'a> {
    cells: HashMap<&'a str, &'a Value>,
}

impl<'a> RowView<'a> {
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    /// A projection holding a single cell, used for CHECK constraints.
    pub fn single(name: &'a str, value: &'a Value) -> Self {
        let mut view = Self::new();
        view.insert(name, value);
        view
    }

    pub fn insert(&mut self, name: &'a str, value: &'a Value) {
        self.cells.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.cells.get(name).copied()
    }
}

/// Evaluates `expr` against one row.
pub fn evaluate(expr: &CondExpr, row: &RowView<'_>) -> Result<Truth> {
    match expr {
        CondExpr::And(a, b) => Ok(evaluate(a, row)?.and(evaluate(b, row)?)),
        CondExpr::Or(a, b) => Ok(evaluate(a, row)?.or(evaluate(b, row)?)),
        CondExpr::Not(inner) => Ok(evaluate(inner, row)?.not()),
        CondExpr::IsNull { column, negated } => {
            let value = resolve_column(row, column)?;
            Ok(Truth::from_bool(value.is_null() != *negated))
        }
        CondExpr::Compare { left, op, right } => {
            let l = resolve(row, left)?;
            let r = resolve(row, right)?;
            Ok(compare(l, r, *op))
        }
    }
}

fn resolve_column<'a>(row: &RowView<'a>, name: &str) -> Result<&'a Value> {
    match row.get(name) {
        Some(value) => Ok(value),
        None => NotFoundSnafu {
            entity: Entity::Column,
            name,
        }
        .fail(),
    }
}

fn resolve<'a>(row: &RowView<'a>, operand: &'a Operand) -> Result<&'a Value> {
    match operand {
        Operand::Column(name) => resolve_column(row, name),
        Operand::Literal(value) => Ok(value),
    }
}

fn compare(left: &Value, right: &Value, op: CompareOp) -> Truth {
    match op {
        CompareOp::Eq => equals(left, right),
        CompareOp::Ne => equals(left, right).not(),
        CompareOp::Lt => ordered(left, right, |o| o == Ordering::Less),
        CompareOp::Le => ordered(left, right, |o| o != Ordering::Greater),
        CompareOp::Gt => ordered(left, right, |o| o == Ordering::Greater),
        CompareOp::Ge => ordered(left, right, |o| o != Ordering::Less),
        CompareOp::Like => like(left, right),
    }
}

fn equals(left: &Value, right: &Value) -> Truth {
    if left.is_null() || right.is_null() {
        return Truth::from_bool(left.is_null() && right.is_null());
    }
    Truth::from_bool(left.compare(right) == Some(Ordering::Equal))
}

fn ordered(left: &Value, right: &Value, accept: fn(Ordering) -> bool) -> Truth {
    match left.compare(right) {
        Some(order) => Truth::from_bool(accept(order)),
        None => Truth::Unknown,
    }
}

fn like(left: &Value, right: &Value) -> Truth {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Truth::Unknown,
        (Value::Str(text), Value::Str(pattern)) => {
            let t: Vec<char> = text.chars().collect();
            let p: Vec<char> = pattern.chars().collect();
            Truth::from_bool(like_match(&t, &p))
        }
        _ => Truth::False,
    }
}

fn like_match(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => {
            like_match(text, &pattern[1..])
                || (!text.is_empty() && like_match(&text[1..], pattern))
        }
        Some('_') => !text.is_empty() && like_match(&text[1..], &pattern[1..]),
        Some(c) => text.first() == Some(c) && like_match(&text[1..], &pattern[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parser::parse_condition;

    fn eval(condition: &str, cells: &[(&str, Value)]) -> Truth {
        let expr = parse_condition(condition).unwrap();
        let mut view = RowView::new();
        for (name, value) in cells {
            view.insert(name, value);
        }
        evaluate(&expr, &view).unwrap()
    }

    #[test]
    fn simple_equality() {
        assert_eq!(eval("id = 1", &[("id", Value::Int(1))]), Truth::True);
        assert_eq!(eval("id = 2", &[("id", Value::Int(1))]), Truth::False);
    }

    #[test]
    fn null_equality_is_membership() {
        assert_eq!(eval("x = NULL", &[("x", Value::Null)]), Truth::True);
        assert_eq!(eval("x = NULL", &[("x", Value::Int(1))]), Truth::False);
        assert_eq!(eval("x <> NULL", &[("x", Value::Int(1))]), Truth::True);
    }

    #[test]
    fn ordered_against_null_is_unknown() {
        assert_eq!(eval("x > 1", &[("x", Value::Null)]), Truth::Unknown);
        assert_eq!(eval("x <= 1", &[("x", Value::Null)]), Truth::Unknown);
    }

    #[test]
    fn kleene_through_connectives() {
        let cells = [("x", Value::Null), ("y", Value::Int(5))];
        assert_eq!(eval("x > 1 OR y = 5", &cells), Truth::True);
        assert_eq!(eval("x > 1 AND y = 5", &cells), Truth::Unknown);
        assert_eq!(eval("NOT (x > 1)", &cells), Truth::Unknown);
    }

    #[test]
    fn is_null_checks() {
        assert_eq!(eval("x IS NULL", &[("x", Value::Null)]), Truth::True);
        assert_eq!(eval("x IS NOT NULL", &[("x", Value::Null)]), Truth::False);
        assert_eq!(eval("x IS NOT NULL", &[("x", Value::Int(3))]), Truth::True);
    }

    #[test]
    fn like_wildcards() {
        let name = ("name", Value::Str("Johnson".into()));
        assert_eq!(eval("name LIKE 'John%'", &[name.clone()]), Truth::True);
        assert_eq!(eval("name LIKE 'J_hnson'", &[name.clone()]), Truth::True);
        assert_eq!(eval("name LIKE 'John'", &[name.clone()]), Truth::False);
        assert_eq!(eval("name LIKE '%son'", &[name]), Truth::True);
    }

    #[test]
    fn column_to_column() {
        let cells = [("low", Value::Int(1)), ("high", Value::Int(9))];
        assert_eq!(eval("low < high", &cells), Truth::True);
        assert_eq!(eval("low = high", &cells), Truth::False);
    }

    #[test]
    fn unknown_column_is_an_error() {
        let expr = parse_condition("ghost = 1").unwrap();
        let view = RowView::new();
        assert!(evaluate(&expr, &view).is_err());
    }

    #[test]
    fn int_real_promotion_in_conditions() {
        assert_eq!(eval("score >= 2", &[("score", Value::Real(2.5))]), Truth::True);
    }
}
