//! Array functions
//!
//! Matrices are indexed `[col][row]` throughout.

use super::{arg, has_arg, num};
use crate::coercion::{strict_to_number, to_boolean, to_int};
use crate::context::EvalContext;
use crate::error::{EvalError, EvalResult, RegistrationError};
use crate::helpers::{ensure, generate_matrix, to_matrix, transpose};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::{Matrix, Value};

const STACK_ARGS: &[&str] = &["range1 (any, range<any>)", "range2 (any, range<any>, optional, repeating)"];
const TO_VECTOR_ARGS: &[&str] = &[
    "array (any, range<any>, lazy)",
    "ignore (number, optional, default=0)",
    "scan_by_column (boolean, optional, default=FALSE)",
];
const WRAP_ARGS: &[&str] = &[
    "range (any, range<any>)",
    "wrap_count (number)",
    "pad_with (any, optional)",
];

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // ARRAY.CONSTRAIN
    registry.add(
        "ARRAY_CONSTRAIN",
        FunctionDef::new(
            "Returns a result array constrained to a specific width and height.",
            &["input_range (any, range<any>)", "rows (number)", "columns (number)"],
            "RANGE<ANY>",
            fn_array_constrain,
        ),
    )?;

    // CHOOSECOLS
    registry.add(
        "CHOOSECOLS",
        FunctionDef::new(
            "Creates a new array from the selected columns in the existing range.",
            &[
                "array (any, range<any>)",
                "col_num (number, range<number>)",
                "col_num2 (number, range<number>, optional, repeating)",
            ],
            "RANGE<ANY>",
            fn_choosecols,
        ),
    )?;

    // CHOOSEROWS
    registry.add(
        "CHOOSEROWS",
        FunctionDef::new(
            "Creates a new array from the selected rows in the existing range.",
            &[
                "array (any, range<any>)",
                "row_num (number, range<number>)",
                "row_num2 (number, range<number>, optional, repeating)",
            ],
            "RANGE<ANY>",
            fn_chooserows,
        ),
    )?;

    // FLATTEN
    registry.add(
        "FLATTEN",
        FunctionDef::new(
            "Flattens all the values from one or more ranges into a single column.",
            &["range (any, range<any>)", "range2 (any, range<any>, optional, repeating)"],
            "RANGE<ANY>",
            fn_flatten,
        ),
    )?;

    // HSTACK
    registry.add(
        "HSTACK",
        FunctionDef::new(
            "Appends ranges horizontally and in sequence to return a larger array.",
            STACK_ARGS,
            "RANGE<ANY>",
            fn_hstack,
        ),
    )?;

    // MMULT
    registry.add(
        "MMULT",
        FunctionDef::new(
            "Calculates the matrix product of two matrices.",
            &["matrix1 (number, range<number>)", "matrix2 (number, range<number>)"],
            "RANGE<NUMBER>",
            fn_mmult,
        ),
    )?;

    // TOCOL
    registry.add(
        "TOCOL",
        FunctionDef::new("Transforms a range of cells into a single column.", TO_VECTOR_ARGS, "RANGE<ANY>", fn_tocol),
    )?;

    // TOROW
    registry.add(
        "TOROW",
        FunctionDef::new("Transforms a range of cells into a single row.", TO_VECTOR_ARGS, "RANGE<ANY>", fn_torow),
    )?;

    // TRANSPOSE
    registry.add(
        "TRANSPOSE",
        FunctionDef::new(
            "Transposes the rows and columns of a range.",
            &["range (any, range<any>)"],
            "RANGE<ANY>",
            fn_transpose,
        ),
    )?;

    // VSTACK
    registry.add(
        "VSTACK",
        FunctionDef::new(
            "Appends ranges vertically and in sequence to return a larger array.",
            STACK_ARGS,
            "RANGE<ANY>",
            fn_vstack,
        ),
    )?;

    // WRAPCOLS
    registry.add(
        "WRAPCOLS",
        FunctionDef::new(
            "Wraps the provided row or column of cells by columns after a specified number of elements.",
            WRAP_ARGS,
            "RANGE<ANY>",
            fn_wrapcols,
        ),
    )?;

    // WRAPROWS
    registry.add(
        "WRAPROWS",
        FunctionDef::new(
            "Wraps the provided row or column of cells by rows after a specified number of elements.",
            WRAP_ARGS,
            "RANGE<ANY>",
            fn_wraprows,
        ),
    )?;

    Ok(())
}

fn height(m: &Matrix) -> usize {
    m.first().map_or(0, Vec::len)
}

fn fn_array_constrain(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let array = to_matrix(arg(args, 0));
    let rows = to_int(arg(args, 1), ctx.locale)?;
    let cols = to_int(arg(args, 2), ctx.locale)?;
    ensure(rows > 0, || format!("The rows argument ({}) must be strictly positive.", rows))?;
    ensure(cols > 0, || format!("The columns argument ({}) must be strictly positive.", cols))?;
    let rows = (rows as usize).min(height(&array));
    let cols = (cols as usize).min(array.len());
    let constrained = array.into_iter().take(cols).map(|c| c.into_iter().take(rows).collect()).collect();
    Ok(Value::Matrix(constrained))
}

/// Resolve 1-based, possibly negative, indexes into zero-based positions
fn chosen_indexes(values: &[Value], size: usize, what: &str, ctx: &EvalContext<'_>) -> EvalResult<Vec<usize>> {
    let mut indexes = Vec::new();
    for value in values {
        for index in to_matrix(value).iter().flatten() {
            let index = to_int(index, ctx.locale)?;
            ensure(index != 0 && index.unsigned_abs() as usize <= size, || {
                format!(
                    "The {} number ({}) must be between -{} and {}, excluding 0.",
                    what, index, size, size
                )
            })?;
            let position = if index > 0 { index as usize - 1 } else { size - index.unsigned_abs() as usize };
            indexes.push(position);
        }
    }
    Ok(indexes)
}

fn fn_choosecols(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let array = to_matrix(arg(args, 0));
    let indexes = chosen_indexes(&args[1..], array.len(), "column", ctx)?;
    Ok(Value::Matrix(indexes.into_iter().map(|c| array[c].clone()).collect()))
}

fn fn_chooserows(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let array = to_matrix(arg(args, 0));
    let indexes = chosen_indexes(&args[1..], height(&array), "row", ctx)?;
    let chosen = array
        .iter()
        .map(|col| indexes.iter().map(|&r| col[r].clone()).collect())
        .collect();
    Ok(Value::Matrix(chosen))
}

/// Values of a matrix row by row
fn row_major(m: &Matrix) -> impl Iterator<Item = &Value> + '_ {
    (0..height(m)).flat_map(move |r| m.iter().map(move |col| &col[r]))
}

fn fn_flatten(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut column = Vec::new();
    for value in args {
        let m = to_matrix(value);
        column.extend(row_major(&m).cloned());
    }
    Ok(Value::Matrix(vec![column]))
}

fn fn_hstack(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let matrices: Vec<Matrix> = args.iter().map(to_matrix).collect();
    let rows = matrices.iter().map(height).max().unwrap_or(0);
    let mut stacked = Vec::new();
    for m in matrices {
        for mut col in m {
            col.resize(rows, Value::Empty);
            stacked.push(col);
        }
    }
    Ok(Value::Matrix(stacked))
}

fn fn_vstack(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let matrices: Vec<Matrix> = args.iter().map(to_matrix).collect();
    let cols = matrices.iter().map(Vec::len).max().unwrap_or(0);
    let mut stacked: Matrix = vec![Vec::new(); cols];
    for m in &matrices {
        let rows = height(m);
        for (c, out) in stacked.iter_mut().enumerate() {
            match m.get(c) {
                Some(col) => out.extend(col.iter().cloned()),
                None => out.extend(std::iter::repeat(Value::Empty).take(rows)),
            }
        }
    }
    Ok(Value::Matrix(stacked))
}

fn fn_mmult(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let a = to_matrix(arg(args, 0));
    let b = to_matrix(arg(args, 1));
    ensure(a.len() == height(&b), || {
        format!(
            "In [[FUNCTION_NAME]], the number of columns of the first matrix ({}) must be equal to the number of rows of the second matrix ({}).",
            a.len(),
            height(&b)
        )
    })?;
    let number_at = |m: &Matrix, c: usize, r: usize| -> EvalResult<f64> {
        match &m[c][r] {
            Value::Number(n) => Ok(*n),
            other => strict_to_number(other, ctx.locale),
        }
    };
    let product = generate_matrix(b.len(), height(&a), |c, r| {
        let mut sum = 0.0;
        for k in 0..a.len() {
            sum += number_at(&a, k, r)? * number_at(&b, c, k)?;
        }
        Ok(Value::Number(sum))
    })?;
    Ok(Value::Matrix(product))
}

fn fn_transpose(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Matrix(transpose(&to_matrix(arg(args, 0)))))
}

/// Values kept by TOCOL/TOROW, in scan order
fn vector_values(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Vec<Value>> {
    let array = to_matrix(arg(args, 0));
    let ignore = num(args, 1, ctx)?;
    ensure([0.0, 1.0, 2.0, 3.0].contains(&ignore), || {
        format!("Argument ignore must be between 0 and 3, got {}.", ignore)
    })?;
    let skip_blanks = ignore == 1.0 || ignore == 3.0;
    let skip_errors = ignore == 2.0 || ignore == 3.0;
    let by_column = to_boolean(arg(args, 2))?;

    let scanned: Vec<&Value> = if by_column {
        array.iter().flatten().collect()
    } else {
        row_major(&array).collect()
    };
    let mut kept = Vec::with_capacity(scanned.len());
    for value in scanned {
        match value {
            Value::Empty if skip_blanks => {}
            Value::Error(_) if skip_errors => {}
            Value::Error(e) => {
                return Err(EvalError::Propagated {
                    kind: e.kind.propagated(),
                    message: e.message.clone(),
                })
            }
            other => kept.push(other.clone()),
        }
    }
    ensure(!kept.is_empty(), || "No results for the given arguments of [[FUNCTION_NAME]].".to_string())?;
    Ok(kept)
}

fn fn_tocol(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Matrix(vec![vector_values(args, ctx)?]))
}

fn fn_torow(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Matrix(vector_values(args, ctx)?.into_iter().map(|v| vec![v]).collect()))
}

/// The single row or column to wrap, plus the wrap count and padding
fn wrap_input(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<(Vec<Value>, usize, Value)> {
    let range = to_matrix(arg(args, 0));
    ensure(range.len() == 1 || height(&range) == 1, || {
        "Argument range must be a single row or column.".to_string()
    })?;
    let count = to_int(arg(args, 1), ctx.locale)?;
    ensure(count >= 1, || format!("Argument wrap_count must be greater than or equal to 1, got {}.", count))?;
    let pad = if has_arg(args, 2) { arg(args, 2).clone() } else { Value::Empty };
    let values = range.into_iter().flatten().collect();
    Ok((values, count as usize, pad))
}

fn chunked(values: Vec<Value>, size: usize, pad: &Value) -> Matrix {
    values
        .chunks(size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(size, pad.clone());
            chunk
        })
        .collect()
}

fn fn_wrapcols(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (values, count, pad) = wrap_input(args, ctx)?;
    Ok(Value::Matrix(chunked(values, count, &pad)))
}

fn fn_wraprows(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (values, count, pad) = wrap_input(args, ctx)?;
    Ok(Value::Matrix(transpose(&chunked(values, count, &pad))))
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    /// A1:B3 = 1 2 / 3 4 / 5 6
    fn grid() -> Grid {
        Grid::new(&[
            ("A1", n(1.0)),
            ("B1", n(2.0)),
            ("A2", n(3.0)),
            ("B2", n(4.0)),
            ("A3", n(5.0)),
            ("B3", n(6.0)),
            ("D1", n(7.0)),
            ("D2", n(8.0)),
        ])
    }

    fn matrix(formula: &str) -> Vec<Vec<Value>> {
        match eval_in(formula, &mut grid()) {
            Value::Matrix(m) => m,
            other => panic!("{} evaluated to {:?}", formula, other),
        }
    }

    fn nums(cols: &[&[f64]]) -> Vec<Vec<Value>> {
        cols.iter().map(|c| c.iter().map(|v| n(*v)).collect()).collect()
    }

    #[test]
    fn test_transpose_and_constrain() {
        assert_eq!(matrix("=TRANSPOSE(A1:B3)"), nums(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]));
        assert_eq!(matrix("=ARRAY.CONSTRAIN(A1:B3, 2, 1)"), nums(&[&[1.0, 3.0]]));
        assert_eq!(matrix("=ARRAY.CONSTRAIN(A1:B3, 10, 10)"), nums(&[&[1.0, 3.0, 5.0], &[2.0, 4.0, 6.0]]));
        assert!(eval_in("=ARRAY.CONSTRAIN(A1:B3, 0, 1)", &mut grid()).is_error());
    }

    #[test]
    fn test_mmult() {
        // (3x2) . (2x1)
        assert_eq!(matrix("=MMULT(A1:B3, D1:D2)"), nums(&[&[23.0, 53.0, 83.0]]));
        let message = eval_in("=MMULT(A1:B3, A1:B3)", &mut grid()).as_error().map(|e| e.message.clone());
        assert_eq!(
            message,
            Some("In MMULT, the number of columns of the first matrix (2) must be equal to the number of rows of the second matrix (3).".to_string())
        );
    }

    #[test]
    fn test_choose_columns_and_rows() {
        assert_eq!(matrix("=CHOOSECOLS(A1:B3, -1)"), nums(&[&[2.0, 4.0, 6.0]]));
        assert_eq!(matrix("=CHOOSEROWS(A1:B3, 3, 1)"), nums(&[&[5.0, 1.0], &[6.0, 2.0]]));
        assert!(eval_in("=CHOOSECOLS(A1:B3, 3)", &mut grid()).is_error());
        assert!(eval_in("=CHOOSEROWS(A1:B3, 0)", &mut grid()).is_error());
    }

    #[test]
    fn test_stacking() {
        assert_eq!(matrix("=FLATTEN(A1:B2, D1)"), nums(&[&[1.0, 2.0, 3.0, 4.0, 7.0]]));
        assert_eq!(
            matrix("=HSTACK(A1:A2, D1:D2)"),
            nums(&[&[1.0, 3.0], &[7.0, 8.0]])
        );
        assert_eq!(
            matrix("=VSTACK(A1:B1, D1)"),
            vec![vec![n(1.0), n(7.0)], vec![n(2.0), Value::Empty]]
        );
    }

    #[test]
    fn test_to_vectors() {
        assert_eq!(matrix("=TOCOL(A1:B2)"), nums(&[&[1.0, 2.0, 3.0, 4.0]]));
        assert_eq!(matrix("=TOCOL(A1:B2, 0, TRUE)"), nums(&[&[1.0, 3.0, 2.0, 4.0]]));
        assert_eq!(matrix("=TOROW(C1:D2, 1)"), nums(&[&[7.0], &[8.0]]));
        assert!(eval_in("=TOCOL(C1:C3, 1)", &mut grid()).is_error());
    }

    #[test]
    fn test_wrapping() {
        assert_eq!(
            matrix("=WRAPCOLS(A1:A3, 2, 0)"),
            nums(&[&[1.0, 3.0], &[5.0, 0.0]])
        );
        assert_eq!(
            matrix("=WRAPROWS(A1:A3, 2, 0)"),
            nums(&[&[1.0, 5.0], &[3.0, 0.0]])
        );
        assert!(eval_in("=WRAPROWS(A1:B3, 2)", &mut grid()).is_error());
    }
}
