//! Argument visitors and shared search routines
//!
//! Aggregate functions receive a mix of scalar arguments and 2-D ranges. The visitors here walk
//! both uniformly, in column-major order.
//!
//! Note the asymmetry in [`visit_numbers`]: non-numeric cells inside a range are skipped, while
//! a non-numeric *scalar* argument is a hard error.

use crate::coercion::{strict_to_boolean, strict_to_number};
use crate::error::{EvalResult, EvaluationError};
use crate::value::{Matrix, Value};
use std::cmp::Ordering;
use tabula_core::Locale;

/// Fail with a user-facing evaluation error unless `condition` holds
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> EvalResult<()> {
    if condition {
        Ok(())
    } else {
        Err(EvaluationError::new(message()).into())
    }
}

/// Call `cb` on every element of a matrix, or once on a scalar
pub fn visit_any(arg: &Value, mut cb: impl FnMut(&Value)) {
    match arg {
        Value::Matrix(m) => m.iter().flatten().for_each(cb),
        other => cb(other),
    }
}

/// Call `cb` on every number: numeric range cells, and every scalar argument coerced strictly
pub fn visit_numbers(
    args: &[Value],
    locale: &Locale,
    mut cb: impl FnMut(f64),
) -> EvalResult<()> {
    for arg in args {
        match arg {
            Value::Matrix(m) => m
                .iter()
                .flatten()
                .filter_map(Value::as_number)
                .for_each(&mut cb),
            other => cb(strict_to_number(other, locale)?),
        }
    }
    Ok(())
}

/// Visit range cells with `range_cb` and scalar args with `arg_cb`, stopping as soon as one
/// of them returns `false`
pub fn visit_anys(
    args: &[Value],
    mut range_cb: impl FnMut(&Value) -> EvalResult<bool>,
    mut arg_cb: impl FnMut(&Value) -> EvalResult<bool>,
) -> EvalResult<()> {
    for arg in args {
        match arg {
            Value::Matrix(m) => {
                for cell in m.iter().flatten() {
                    if !range_cb(cell)? {
                        return Ok(());
                    }
                }
            }
            other => {
                if !arg_cb(other)? {
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

/// Visit booleans: range booleans and numbers (by truthiness), scalar args coerced strictly.
/// Empty scalars are skipped. `cb` returning `false` stops the walk.
pub fn visit_booleans(args: &[Value], mut cb: impl FnMut(bool) -> bool) -> EvalResult<()> {
    for arg in args {
        match arg {
            Value::Matrix(m) => {
                for cell in m.iter().flatten() {
                    let keep_going = match cell {
                        Value::Boolean(b) => cb(*b),
                        Value::Number(n) => cb(*n != 0.0),
                        _ => true,
                    };
                    if !keep_going {
                        return Ok(());
                    }
                }
            }
            Value::Empty => {}
            other => {
                if !cb(strict_to_boolean(other)?) {
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

/// Fold over every element of every argument
pub fn reduce_args<T>(args: &[Value], initial: T, mut cb: impl FnMut(T, &Value) -> T) -> T {
    let mut acc = initial;
    for arg in args {
        match arg {
            Value::Matrix(m) => {
                for cell in m.iter().flatten() {
                    acc = cb(acc, cell);
                }
            }
            other => acc = cb(acc, other),
        }
    }
    acc
}

/// Fold over every number, with the same rules as [`visit_numbers`]
pub fn reduce_numbers<T: Copy>(
    args: &[Value],
    locale: &Locale,
    initial: T,
    mut cb: impl FnMut(T, f64) -> T,
) -> EvalResult<T> {
    let mut acc = initial;
    visit_numbers(args, locale, |n| acc = cb(acc, n))?;
    Ok(acc)
}

/// Collect every number, with the same rules as [`visit_numbers`]
pub fn collect_numbers(args: &[Value], locale: &Locale) -> EvalResult<Vec<f64>> {
    let mut out = Vec::new();
    visit_numbers(args, locale, |n| out.push(n))?;
    Ok(out)
}

/// Compare two values of the same type; text comparison ignores case
pub fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.to_lowercase().cmp(&y.to_lowercase())),
        (Value::Boolean(x), Value::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Index of the nearest element `<=` target in an ascending list, or -1.
///
/// Elements of another type than the target never qualify. Unsorted input gives an
/// unspecified index.
pub fn dichotomic_predecessor_search(range: &[Value], target: &Value) -> i64 {
    if range.is_empty() {
        return -1;
    }
    let mut min: i64 = 0;
    let mut max: i64 = range.len() as i64 - 1;
    let mut avg = (min + max + 1) / 2;
    while max - min > 0 {
        let current = &range[avg as usize];
        if matches!(
            compare_same_type(current, target),
            Some(Ordering::Less | Ordering::Equal)
        ) {
            min = avg;
        } else {
            max = avg - 1;
        }
        avg = (min + max + 1) / 2;
    }
    match compare_same_type(target, &range[avg as usize]) {
        Some(Ordering::Less) | None => -1,
        _ => avg,
    }
}

/// Index of the nearest element `>=` target in a descending list, or -1.
///
/// Elements of another type than the target never qualify.
pub fn dichotomic_successor_search(range: &[Value], target: &Value) -> i64 {
    if range.is_empty() {
        return -1;
    }
    let mut min: i64 = 0;
    let mut max: i64 = range.len() as i64 - 1;
    let mut avg = (min + max) / 2;
    while max - min > 0 {
        let current = &range[avg as usize];
        if matches!(
            compare_same_type(target, current),
            Some(Ordering::Greater | Ordering::Equal)
        ) {
            max = avg;
        } else {
            min = avg + 1;
        }
        avg = (min + max) / 2;
    }
    match compare_same_type(target, &range[avg as usize]) {
        Some(Ordering::Greater) | None => avg - 1,
        _ => avg,
    }
}

/// Insert into an ascending vector, keeping it sorted
pub fn sorted_insert(sorted: &mut Vec<f64>, n: f64) {
    let idx = sorted.partition_point(|x| *x <= n);
    sorted.insert(idx, n);
}

/// Wrap a scalar into a 1x1 matrix; matrices pass through
pub fn to_matrix(value: &Value) -> Matrix {
    match value {
        Value::Matrix(m) => m.clone(),
        other => vec![vec![other.clone()]],
    }
}

/// Flatten a matrix, or a scalar, into a single column-major list
pub fn flatten(value: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    visit_any(value, |v| out.push(v.clone()));
    out
}

/// Build a `cols x rows` matrix from a generator taking `(col, row)`
pub fn generate_matrix(
    cols: usize,
    rows: usize,
    mut cb: impl FnMut(usize, usize) -> EvalResult<Value>,
) -> EvalResult<Matrix> {
    (0..cols)
        .map(|c| (0..rows).map(|r| cb(c, r)).collect())
        .collect()
}

/// Transpose a column-major matrix
pub fn transpose(m: &Matrix) -> Matrix {
    let rows = m.first().map_or(0, Vec::len);
    (0..rows)
        .map(|r| m.iter().map(|col| col[r].clone()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use pretty_assertions::assert_eq;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|n| Value::Number(*n)).collect()
    }

    fn column(values: Vec<Value>) -> Value {
        Value::Matrix(vec![values])
    }

    #[test]
    fn test_visit_any_is_column_major() {
        let m = Value::Matrix(vec![nums(&[1.0, 2.0]), nums(&[3.0, 4.0])]);
        let mut seen = Vec::new();
        visit_any(&m, |v| seen.push(v.as_number().unwrap_or_default()));
        assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0]);
    }

    /// Ranges silently skip text, scalar text is a hard error
    #[test]
    fn test_visit_numbers_range_and_scalar_asymmetry() {
        let l = Locale::default();
        let range = column(vec![Value::Number(1.0), Value::from("abc"), Value::Boolean(true)]);
        assert_eq!(collect_numbers(&[range], &l).unwrap(), vec![1.0]);

        let scalar = Value::from("abc");
        assert!(matches!(
            collect_numbers(&[scalar], &l),
            Err(EvalError::Coercion(_))
        ));

        // Scalar booleans and numeric strings are coerced
        assert_eq!(
            collect_numbers(&[Value::Boolean(true), Value::from("2")], &l).unwrap(),
            vec![1.0, 2.0]
        );
        assert!(collect_numbers(&[Value::from("")], &l).is_err());
    }

    #[test]
    fn test_visit_anys_short_circuits() {
        let args = [column(nums(&[1.0, 2.0, 3.0]))];
        let mut count = 0;
        visit_anys(
            &args,
            |v| {
                count += 1;
                Ok(v.as_number() != Some(2.0))
            },
            |_| Ok(true),
        )
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_visit_booleans() {
        let args = [
            column(vec![Value::Number(0.0), Value::from("x"), Value::Boolean(true)]),
            Value::Empty,
            Value::from("true"),
        ];
        let mut seen = Vec::new();
        visit_booleans(&args, |b| {
            seen.push(b);
            true
        })
        .unwrap();
        assert_eq!(seen, vec![false, true, true]);
    }

    #[test]
    fn test_predecessor_search() {
        let range = nums(&[3.0, 6.0, 10.0]);
        assert_eq!(dichotomic_predecessor_search(&range, &Value::Number(3.0)), 0);
        assert_eq!(dichotomic_predecessor_search(&range, &Value::Number(6.0)), 1);
        assert_eq!(dichotomic_predecessor_search(&range, &Value::Number(9.0)), 1);
        assert_eq!(dichotomic_predecessor_search(&range, &Value::Number(42.0)), 2);
        assert_eq!(dichotomic_predecessor_search(&range, &Value::Number(2.0)), -1);
        assert_eq!(dichotomic_predecessor_search(&[], &Value::Number(2.0)), -1);
    }

    #[test]
    fn test_predecessor_search_skips_other_types() {
        let range = vec![Value::Number(1.0), Value::Number(5.0), Value::from("b")];
        assert_eq!(dichotomic_predecessor_search(&range, &Value::Number(7.0)), 1);
        let texts = vec![Value::from("apple"), Value::from("Banana"), Value::from("cherry")];
        assert_eq!(dichotomic_predecessor_search(&texts, &Value::from("BANANA")), 1);
        assert_eq!(dichotomic_predecessor_search(&texts, &Value::Number(1.0)), -1);
    }

    #[test]
    fn test_successor_search() {
        let range = nums(&[10.0, 6.0, 3.0]);
        assert_eq!(dichotomic_successor_search(&range, &Value::Number(3.0)), 2);
        assert_eq!(dichotomic_successor_search(&range, &Value::Number(6.0)), 1);
        assert_eq!(dichotomic_successor_search(&range, &Value::Number(9.0)), 0);
        assert_eq!(dichotomic_successor_search(&range, &Value::Number(42.0)), -1);
        assert_eq!(dichotomic_successor_search(&range, &Value::Number(2.0)), 2);
    }

    #[test]
    fn test_transpose_and_sorted_insert() {
        let m = vec![nums(&[1.0, 2.0]), nums(&[3.0, 4.0])];
        assert_eq!(transpose(&m), vec![nums(&[1.0, 3.0]), nums(&[2.0, 4.0])]);
        let mut sorted = vec![1.0, 5.0];
        sorted_insert(&mut sorted, 3.0);
        assert_eq!(sorted, vec![1.0, 3.0, 5.0]);
    }
}
