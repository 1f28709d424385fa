//! Lookup functions
//!
//! Reference arguments declared `meta` receive the reference text (`"B3"`, `"Sheet2!A1:C4"`)
//! instead of the referenced values.

use super::{arg, has_arg, num, text};
use crate::coercion::{number_to_text as fmt, to_boolean, to_text};
use crate::context::EvalContext;
use crate::criteria::{cell_at, Criterion};
use crate::error::{EvalResult, EvaluationError, RegistrationError};
use crate::helpers::{
    compare_same_type, dichotomic_predecessor_search, dichotomic_successor_search, ensure, to_matrix,
};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::{Matrix, Value};
use lazy_regex::regex_is_match;
use std::cmp::Ordering;
use tabula_core::{CellAddress, CellRange};

const OUT_OF_BOUNDS: &str = "[[FUNCTION_NAME]] evaluates to an out of bounds range.";
const SEARCH_ARGS: &[&str] = &[
    "search_key (any)",
    "range (range)",
    "index (number)",
    "is_sorted (boolean, optional, default=TRUE)",
];

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // ADDRESS
    registry.add(
        "ADDRESS",
        FunctionDef::new(
            "Returns a cell reference as a string.",
            &[
                "row (number)",
                "column (number)",
                "absolute_relative_mode (number, optional, default=1)",
                "use_a1_notation (boolean, optional, default=TRUE)",
                "sheet (string, optional)",
            ],
            "STRING",
            fn_address,
        ),
    )?;

    // CHOOSE
    registry.add(
        "CHOOSE",
        FunctionDef::new(
            "An element from a list of choices based on index.",
            &["index (number)", "choice1 (any, lazy)", "choice2 (any, lazy, repeating)"],
            "ANY",
            fn_choose,
        ),
    )?;

    // COLUMN
    registry.add(
        "COLUMN",
        FunctionDef::new(
            "Column number of a specified cell.",
            &["cell_reference (meta, optional)"],
            "NUMBER",
            fn_column,
        ),
    )?;

    // COLUMNS
    registry.add(
        "COLUMNS",
        FunctionDef::new("Number of columns in a specified array or range.", &["range (range)"], "NUMBER", fn_columns),
    )?;

    // HLOOKUP
    registry.add(
        "HLOOKUP",
        FunctionDef::new("Horizontal lookup", SEARCH_ARGS, "ANY", fn_hlookup),
    )?;

    // INDEX
    registry.add(
        "INDEX",
        FunctionDef::new(
            "Returns the content of a cell, specified by row and column offset.",
            &[
                "reference (range)",
                "row (number, optional, default=0)",
                "column (number, optional, default=0)",
            ],
            "ANY",
            fn_index,
        ),
    )?;

    // LOOKUP
    registry.add(
        "LOOKUP",
        FunctionDef::new(
            "Look up a value.",
            &["search_key (any)", "search_array (range)", "result_range (range, optional)"],
            "ANY",
            fn_lookup,
        ),
    )?;

    // MATCH
    registry.add(
        "MATCH",
        FunctionDef::new(
            "Position of item in range that matches value.",
            &["search_key (any)", "range (range)", "search_type (number, optional, default=1)"],
            "NUMBER",
            fn_match,
        ),
    )?;

    // ROW
    registry.add(
        "ROW",
        FunctionDef::new("Row number of a specified cell.", &["cell_reference (meta, optional)"], "NUMBER", fn_row),
    )?;

    // ROWS
    registry.add(
        "ROWS",
        FunctionDef::new("Number of rows in a specified array or range.", &["range (range)"], "NUMBER", fn_rows),
    )?;

    // VLOOKUP
    registry.add(
        "VLOOKUP",
        FunctionDef::new("Vertical lookup.", SEARCH_ARGS, "ANY", fn_vlookup),
    )?;

    // XLOOKUP
    registry.add(
        "XLOOKUP",
        FunctionDef::new(
            "Search a range for a match and return the corresponding item from a second range.",
            &[
                "search_key (any)",
                "lookup_range (range)",
                "return_range (range)",
                "if_not_found (any, lazy, optional)",
                "match_mode (number, optional, default=0)",
                "search_mode (number, optional, default=1)",
            ],
            "ANY",
            fn_xlookup,
        ),
    )?;

    Ok(())
}

fn not_found(key: &Value) -> EvaluationError {
    let shown = to_text(key).unwrap_or_default();
    EvaluationError::not_available(format!("Did not find value '{}' in [[FUNCTION_NAME]] evaluation.", shown))
}

fn column_of(m: &Matrix, col: usize) -> Vec<Value> {
    m.get(col).cloned().unwrap_or_default()
}

fn row_of(m: &Matrix, row: usize) -> Vec<Value> {
    m.iter().map(|c| c.get(row).cloned().unwrap_or_default()).collect()
}

/// First index holding the same value as `key`; text compares without case
fn exact_position(values: &[Value], key: &Value) -> Option<usize> {
    values
        .iter()
        .position(|v| compare_same_type(v, key) == Some(Ordering::Equal))
}

/// The range designated by a reference passed as text, ignoring its sheet
fn reference_range(reference: &str) -> EvalResult<CellRange> {
    let local = reference.rsplit('!').next().unwrap_or(reference);
    CellRange::parse(local)
        .map_err(|_| EvaluationError::new(format!("'{}' is not a valid reference.", reference)).into())
}

fn fn_address(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let row = num(args, 0, ctx)?.trunc();
    let column = num(args, 1, ctx)?.trunc();
    let mode = num(args, 2, ctx)?.trunc();
    let a1 = to_boolean(arg(args, 3))?;

    ensure(row >= 1.0, || format!("The row ({}) must be greater than or equal to 1.", fmt(row)))?;
    ensure(column >= 1.0, || format!("The column ({}) must be greater than or equal to 1.", fmt(column)))?;
    ensure((1.0..=4.0).contains(&mode), || {
        format!("The absolute_relative_mode ({}) must be between 1 and 4 inclusive.", fmt(mode))
    })?;

    let row_absolute = mode == 1.0 || mode == 2.0;
    let col_absolute = mode == 1.0 || mode == 3.0;
    let reference = if a1 {
        format!(
            "{}{}{}{}",
            if col_absolute { "$" } else { "" },
            CellAddress::column_to_letters(column as u16 - 1),
            if row_absolute { "$" } else { "" },
            row
        )
    } else {
        let part = |absolute: bool, n: f64| if absolute { fmt(n) } else { format!("[{}]", fmt(n)) };
        format!("R{}C{}", part(row_absolute, row), part(col_absolute, column))
    };

    if !has_arg(args, 4) {
        return Ok(Value::Text(reference));
    }
    let sheet = text(args, 4)?;
    let sheet = if regex_is_match!(r"^\w+$", &sheet) {
        sheet
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    };
    Ok(Value::Text(format!("{}!{}", sheet, reference)))
}

fn fn_choose(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let index = num(args, 0, ctx)?.trunc();
    let choices = args.len() - 1;
    ensure(index >= 1.0 && index <= choices as f64, || {
        format!("Index for CHOOSE is out of range ({}). It must be between 1 and {}.", fmt(index), choices)
    })?;
    Ok(args[index as usize].clone())
}

/// Position of the cell given as argument, or of the evaluated cell
fn target_position(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<(u32, u16)> {
    if has_arg(args, 0) {
        let range = reference_range(&text(args, 0)?)?;
        return Ok((range.top(), range.left()));
    }
    ctx.origin.map(|p| (p.row, p.col)).ok_or_else(|| {
        EvaluationError::new("In this context, the function [[FUNCTION_NAME]] needs to have a cell or range in parameter.")
            .into()
    })
}

fn fn_column(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (_, col) = target_position(args, ctx)?;
    Ok(Value::Number(col as f64 + 1.0))
}

fn fn_row(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (row, _) = target_position(args, ctx)?;
    Ok(Value::Number(row as f64 + 1.0))
}

fn fn_columns(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(arg(args, 0).dimensions().0 as f64))
}

fn fn_rows(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(arg(args, 0).dimensions().1 as f64))
}

/// Position of `key` in a lookup vector: approximate over sorted data, exact otherwise
fn vector_position(values: &[Value], key: &Value, is_sorted: bool) -> EvalResult<usize> {
    let position = if is_sorted {
        let index = dichotomic_predecessor_search(values, key);
        (index >= 0).then_some(index as usize)
    } else {
        exact_position(values, key)
    };
    position.ok_or_else(|| not_found(key).into())
}

fn fn_vlookup(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let key = arg(args, 0);
    let range = to_matrix(arg(args, 1));
    let index = num(args, 2, ctx)?.trunc();
    let is_sorted = to_boolean(arg(args, 3))?;
    ensure(index >= 1.0 && index <= range.len() as f64, || OUT_OF_BOUNDS.to_string())?;

    let row = vector_position(&column_of(&range, 0), key, is_sorted)?;
    Ok(cell_at(&Value::Matrix(range), index as usize - 1, row))
}

fn fn_hlookup(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let key = arg(args, 0);
    let range = to_matrix(arg(args, 1));
    let index = num(args, 2, ctx)?.trunc();
    let is_sorted = to_boolean(arg(args, 3))?;
    let rows = range.first().map_or(0, Vec::len);
    ensure(index >= 1.0 && index <= rows as f64, || OUT_OF_BOUNDS.to_string())?;

    let col = vector_position(&row_of(&range, 0), key, is_sorted)?;
    Ok(cell_at(&Value::Matrix(range), col, index as usize - 1))
}

fn fn_index(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let range = to_matrix(arg(args, 0));
    let mut row = num(args, 1, ctx)?.trunc();
    let mut column = num(args, 2, ctx)?.trunc();
    let cols = range.len();
    let rows = range.first().map_or(0, Vec::len);

    ensure(row >= 0.0, || "The row index must be positive.".to_string())?;
    ensure(column >= 0.0, || "The column index must be positive.".to_string())?;
    // A single row is indexed by its only meaningful coordinate
    if rows == 1 && column == 0.0 && cols > 1 {
        column = row;
        row = 0.0;
    }
    ensure(row <= rows as f64 && column <= cols as f64, || {
        "Index out of range.".to_string()
    })?;

    let (r, c) = (row as usize, column as usize);
    let result = match (r, c) {
        (0, 0) => Value::Matrix(range),
        (0, c) => Value::Matrix(vec![column_of(&range, c - 1)]),
        (r, 0) => Value::Matrix(range.iter().map(|col| vec![col[r - 1].clone()]).collect()),
        (r, c) => range[c - 1][r - 1].clone(),
    };
    Ok(match result {
        Value::Matrix(m) if m.len() == 1 && m[0].len() == 1 => m[0][0].clone(),
        other => other,
    })
}

fn fn_lookup(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let key = arg(args, 0);
    let search = to_matrix(arg(args, 1));
    let cols = search.len();
    let rows = search.first().map_or(0, Vec::len);
    let horizontal = cols > rows;

    let keys = if horizontal { row_of(&search, 0) } else { column_of(&search, 0) };
    let index = dichotomic_predecessor_search(&keys, key);
    if index < 0 {
        return Err(not_found(key).into());
    }
    let index = index as usize;

    if has_arg(args, 2) {
        let result = arg(args, 2);
        let (result_cols, result_rows) = result.dimensions();
        ensure(result_cols == 1 || result_rows == 1, || {
            "The result_range must be a single row or a single column.".to_string()
        })?;
        let values = crate::helpers::flatten(result);
        return values.get(index).cloned().ok_or_else(|| {
            EvaluationError::new("[[FUNCTION_NAME]] result_range is smaller than the search_array.").into()
        });
    }
    Ok(if horizontal {
        search[index][rows - 1].clone()
    } else {
        search[cols - 1][index].clone()
    })
}

fn fn_match(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let key = arg(args, 0);
    let range = arg(args, 1);
    let search_type = num(args, 2, ctx)?;
    let (cols, rows) = range.dimensions();
    ensure(cols == 1 || rows == 1, || {
        "The range must be a single row or a single column.".to_string()
    })?;
    let values = crate::helpers::flatten(range);

    let index = if search_type > 0.0 {
        dichotomic_predecessor_search(&values, key)
    } else if search_type < 0.0 {
        dichotomic_successor_search(&values, key)
    } else {
        exact_position(&values, key).map_or(-1, |i| i as i64)
    };
    if index < 0 {
        return Err(not_found(key).into());
    }
    Ok(Value::Number(index as f64 + 1.0))
}

/// XLOOKUP's search over a vector, honoring match mode and direction
fn xlookup_position(values: &[Value], key: &Value, match_mode: i32, reverse: bool, ctx: &EvalContext<'_>) -> EvalResult<Option<usize>> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    if reverse {
        order.reverse();
    }
    if match_mode == 2 {
        let criterion = Criterion::new(key, ctx.locale)?;
        return Ok(order.into_iter().find(|i| criterion.matches(&values[*i])));
    }
    if let Some(i) = order.iter().copied().find(|i| compare_same_type(&values[*i], key) == Some(Ordering::Equal)) {
        return Ok(Some(i));
    }
    if match_mode == 0 {
        return Ok(None);
    }
    // Closest smaller (-1) or larger (1) value of the same type
    let wanted = if match_mode < 0 { Ordering::Less } else { Ordering::Greater };
    let mut best: Option<usize> = None;
    for i in order {
        if compare_same_type(&values[i], key) != Some(wanted) {
            continue;
        }
        let better = match best {
            None => true,
            Some(b) => compare_same_type(&values[i], &values[b]) == Some(wanted.reverse()),
        };
        if better {
            best = Some(i);
        }
    }
    Ok(best)
}

fn fn_xlookup(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let key = arg(args, 0);
    let lookup = arg(args, 1);
    let returns = to_matrix(arg(args, 2));
    let match_mode = num(args, 4, ctx)?.trunc();
    let search_mode = num(args, 5, ctx)?.trunc();

    let (cols, rows) = lookup.dimensions();
    ensure(cols == 1 || rows == 1, || {
        "lookup_range should be either a single row or single column.".to_string()
    })?;
    ensure([-1.0, 0.0, 1.0, 2.0].contains(&match_mode), || {
        format!("match_mode should be a value in [-1, 0, 1, 2], got {}.", fmt(match_mode))
    })?;
    ensure([-2.0, -1.0, 1.0, 2.0].contains(&search_mode), || {
        format!("search_mode should be a value in [-1, 1, -2, 2], got {}.", fmt(search_mode))
    })?;

    let vertical = (cols == 1 && rows > 1) || (cols == 1 && rows == 1 && returns.len() == 1);
    let (return_cols, return_rows) = (returns.len(), returns.first().map_or(0, Vec::len));
    if vertical {
        ensure(return_rows == rows, || {
            "return_range should have the same number of rows than lookup_range.".to_string()
        })?;
    } else {
        ensure(return_cols == cols, || {
            "return_range should have the same number of columns than lookup_range.".to_string()
        })?;
    }

    let values = crate::helpers::flatten(lookup);
    let reverse = search_mode == -1.0 || search_mode == -2.0;
    match xlookup_position(&values, key, match_mode as i32, reverse, ctx)? {
        Some(i) if vertical => {
            let row = row_of(&returns, i);
            Ok(if row.len() == 1 {
                row[0].clone()
            } else {
                Value::Matrix(row.into_iter().map(|v| vec![v]).collect())
            })
        }
        Some(i) => {
            let column = column_of(&returns, i);
            Ok(if column.len() == 1 {
                column[0].clone()
            } else {
                Value::Matrix(vec![column])
            })
        }
        None if has_arg(args, 3) => Ok(arg(args, 3).clone()),
        None => Err(not_found(key).into()),
    }
}
