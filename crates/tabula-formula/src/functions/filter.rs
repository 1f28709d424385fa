//! Filter functions

use super::arg;
use super::operators::values_equal;
use crate::coercion::{to_boolean, to_int};
use crate::context::EvalContext;
use crate::error::{EvalResult, EvaluationError, RegistrationError};
use crate::helpers::{compare_same_type, ensure, to_matrix, transpose};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::{Matrix, Value};
use std::cmp::Ordering;

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // FILTER
    registry.add(
        "FILTER",
        FunctionDef::new(
            "Returns a filtered version of the source range.",
            &[
                "range (any, range<any>)",
                "condition1 (boolean, range<boolean>)",
                "condition2 (boolean, range<boolean>, optional, repeating)",
            ],
            "RANGE<ANY>",
            fn_filter,
        ),
    )?;

    // SORT
    registry.add(
        "SORT",
        FunctionDef::new(
            "Sorts the rows of a given array or range by the values in one or more columns.",
            &[
                "range (any, range<any>)",
                "sort_column (any, range<number>, optional, repeating)",
                "is_ascending (boolean, optional, repeating)",
            ],
            "RANGE<ANY>",
            fn_sort,
        ),
    )?;

    // UNIQUE
    registry.add(
        "UNIQUE",
        FunctionDef::new(
            "Unique rows in the provided source range.",
            &[
                "range (any, range<any>)",
                "by_column (boolean, optional, default=FALSE)",
                "exactly_once (boolean, optional, default=FALSE)",
            ],
            "RANGE<ANY>",
            fn_unique,
        ),
    )?;

    Ok(())
}

fn height(m: &Matrix) -> usize {
    m.first().map_or(0, Vec::len)
}

/// Rows of a column-major matrix
fn rows_of(m: &Matrix) -> Vec<Vec<Value>> {
    transpose(m)
}

fn fn_filter(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let range = to_matrix(arg(args, 0));
    let conditions: Vec<Matrix> = args[1..].iter().map(to_matrix).collect();

    let Some(first) = conditions.first() else {
        return Err(EvaluationError::new("[[FUNCTION_NAME]] needs at least one condition.").into());
    };
    let by_rows = first.len() == 1;
    ensure(by_rows || height(first) == 1, || {
        "The arguments condition must be a single column or a single row.".to_string()
    })?;
    let expected = if by_rows { height(&range) } else { range.len() };
    for (index, condition) in conditions.iter().enumerate() {
        let (cols, rows) = (condition.len(), height(condition));
        let size = if by_rows { rows } else { cols };
        let width = if by_rows { cols } else { rows };
        ensure(width == 1 && size == expected, || {
            format!(
                "[[FUNCTION_NAME]] has mismatched sizes on argument {}. Expected {}, got {}.",
                index + 2,
                expected,
                size
            )
        })?;
    }

    let mut kept = Vec::new();
    for i in 0..expected {
        let mut keep = true;
        for condition in &conditions {
            let cell = if by_rows { &condition[0][i] } else { &condition[i][0] };
            keep &= to_boolean(cell)?;
        }
        if keep {
            kept.push(i);
        }
    }
    if kept.is_empty() {
        return Err(EvaluationError::not_available("No match found in [[FUNCTION_NAME]] evaluation").into());
    }

    let filtered = if by_rows {
        range
            .iter()
            .map(|col| kept.iter().map(|&r| col[r].clone()).collect())
            .collect()
    } else {
        kept.iter().map(|&c| range[c].clone()).collect()
    };
    Ok(Value::Matrix(filtered))
}

/// Rank of a value type in a sort: numbers, then text, then booleans, then blanks
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::Text(_) => 1,
        Value::Boolean(_) => 2,
        Value::Error(_) => 3,
        Value::Empty | Value::Matrix(_) => 4,
    }
}

/// Ascending order; blanks stay last whatever the direction
fn compare_for_sort(a: &Value, b: &Value, ascending: bool) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra == 4 || rb == 4 {
        return ra.cmp(&rb);
    }
    let ordering = if ra == rb {
        compare_same_type(a, b).unwrap_or(Ordering::Equal)
    } else {
        ra.cmp(&rb)
    };
    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

enum SortKey {
    /// Zero-based column of the range
    Column(usize),
    /// One external value per row
    Values(Vec<Value>),
}

fn fn_sort(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let range = to_matrix(arg(args, 0));
    let row_count = height(&range);

    let mut keys = Vec::new();
    for pair in args[1..].chunks(2) {
        let key = match &pair[0] {
            Value::Matrix(m) if m.len() == 1 && m[0].len() == row_count && row_count > 1 => {
                SortKey::Values(m[0].clone())
            }
            other => {
                let column = to_int(other, ctx.locale)?;
                ensure(column >= 1 && column as usize <= range.len(), || {
                    format!(
                        "Column {} is out of range, it must be between 1 and {}.",
                        column,
                        range.len()
                    )
                })?;
                SortKey::Column(column as usize - 1)
            }
        };
        let ascending = match pair.get(1) {
            Some(v) => to_boolean(v)?,
            None => true,
        };
        keys.push((key, ascending));
    }
    if keys.is_empty() {
        keys.push((SortKey::Column(0), true));
    }

    let mut order: Vec<usize> = (0..row_count).collect();
    // stable, equal rows keep their relative order
    order.sort_by(|&a, &b| {
        for (key, ascending) in &keys {
            let ordering = match key {
                SortKey::Column(c) => compare_for_sort(&range[*c][a], &range[*c][b], *ascending),
                SortKey::Values(values) => compare_for_sort(&values[a], &values[b], *ascending),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    let sorted = range
        .iter()
        .map(|col| order.iter().map(|&r| col[r].clone()).collect())
        .collect();
    Ok(Value::Matrix(sorted))
}

fn same_row(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

fn fn_unique(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let range = to_matrix(arg(args, 0));
    let by_column = to_boolean(arg(args, 1))?;
    let exactly_once = to_boolean(arg(args, 2))?;

    let lines = if by_column { range } else { rows_of(&range) };
    let mut distinct: Vec<(Vec<Value>, usize)> = Vec::new();
    for line in lines {
        match distinct.iter_mut().find(|(seen, _)| same_row(seen, &line)) {
            Some((_, count)) => *count += 1,
            None => distinct.push((line, 1)),
        }
    }
    let result: Matrix = distinct
        .into_iter()
        .filter(|(_, count)| !exactly_once || *count == 1)
        .map(|(line, _)| line)
        .collect();
    ensure(!result.is_empty(), || "No unique values found".to_string())?;

    Ok(Value::Matrix(if by_column { result } else { transpose(&result) }))
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use tabula_core::CellError;

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    fn t(s: &str) -> Value {
        Value::from(s)
    }

    /// A1:B4 = (b, 2) (a, 3) (B, 2) (c, 1); C1:C4 = TRUE FALSE TRUE TRUE
    fn grid() -> Grid {
        Grid::new(&[
            ("A1", t("b")),
            ("B1", n(2.0)),
            ("C1", Value::Boolean(true)),
            ("A2", t("a")),
            ("B2", n(3.0)),
            ("C2", Value::Boolean(false)),
            ("A3", t("B")),
            ("B3", n(2.0)),
            ("C3", Value::Boolean(true)),
            ("A4", t("c")),
            ("B4", n(1.0)),
            ("C4", Value::Boolean(true)),
        ])
    }

    fn matrix(formula: &str) -> Vec<Vec<Value>> {
        match eval_in(formula, &mut grid()) {
            Value::Matrix(m) => m,
            other => panic!("{} evaluated to {:?}", formula, other),
        }
    }

    #[test]
    fn test_filter_rows() {
        assert_eq!(
            matrix("=FILTER(A1:B4, C1:C4)"),
            vec![vec![t("b"), t("B"), t("c")], vec![n(2.0), n(2.0), n(1.0)]]
        );
        assert_eq!(
            matrix("=FILTER(A1:B4, C1:C4, B1:B4)"),
            vec![vec![t("b"), t("B"), t("c")], vec![n(2.0), n(2.0), n(1.0)]]
        );
        assert!(eval_in("=FILTER(A1:B4, C1:C3)", &mut grid()).is_error());
        match eval_in("=FILTER(A1:B4, D1:D4)", &mut grid()) {
            Value::Error(e) => assert_eq!(e.kind, CellError::NotAvailable),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_sort() {
        assert_eq!(
            matrix("=SORT(A1:B4)"),
            vec![vec![t("a"), t("b"), t("B"), t("c")], vec![n(3.0), n(2.0), n(2.0), n(1.0)]]
        );
        assert_eq!(
            matrix("=SORT(A1:B4, 2, FALSE, 1, TRUE)"),
            vec![vec![t("a"), t("b"), t("B"), t("c")], vec![n(3.0), n(2.0), n(2.0), n(1.0)]]
        );
        assert_eq!(matrix("=SORT(B1:B5, 1, FALSE)"), vec![vec![n(3.0), n(2.0), n(2.0), n(1.0), Value::Empty]]);
        assert!(eval_in("=SORT(A1:B4, 3, TRUE)", &mut grid()).is_error());
    }

    #[test]
    fn test_unique() {
        assert_eq!(
            matrix("=UNIQUE(A1:B4)"),
            vec![vec![t("b"), t("a"), t("c")], vec![n(2.0), n(3.0), n(1.0)]]
        );
        assert_eq!(matrix("=UNIQUE(B1:B4, FALSE, TRUE)"), vec![vec![n(3.0), n(1.0)]]);
        assert_eq!(matrix("=UNIQUE(A1:B1, TRUE)"), vec![vec![t("b")], vec![n(2.0)]]);
    }
}
