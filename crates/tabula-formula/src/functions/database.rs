//! Database functions
//!
//! A database is a range whose first row holds field names. Criteria are a second range with the
//! same layout: each criteria row is a set of conditions that must all hold, and a record is
//! selected when any criteria row accepts it.

use super::arg;
use super::statistical::{average_of, variance};
use crate::coercion::{to_number, to_text};
use crate::context::EvalContext;
use crate::criteria::Criterion;
use crate::error::{EvalResult, EvaluationError, RegistrationError};
use crate::helpers::{ensure, to_matrix};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::{Matrix, Value};

const DATABASE_ARGS: &[&str] = &["database (range)", "field (any)", "criteria (range)"];

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    let functions: [(&str, &'static str, crate::registry::ComputeFn); 12] = [
        ("DAVERAGE", "Average of a set of values from a table-like range.", fn_daverage),
        ("DCOUNT", "Counts values from a table-like range.", fn_dcount),
        ("DCOUNTA", "Counts values and text from a table-like range.", fn_dcounta),
        ("DGET", "Single value from a table-like range.", fn_dget),
        ("DMAX", "Maximum of values from a table-like range.", fn_dmax),
        ("DMIN", "Minimum of values from a table-like range.", fn_dmin),
        ("DPRODUCT", "Product of values from a table-like range.", fn_dproduct),
        ("DSTDEV", "Standard deviation of population sample from table.", fn_dstdev),
        ("DSTDEVP", "Standard deviation of entire population from table.", fn_dstdevp),
        ("DSUM", "Sum of values from a table-like range.", fn_dsum),
        ("DVAR", "Variance of population sample from table-like range.", fn_dvar),
        ("DVARP", "Variance of a population from a table-like range.", fn_dvarp),
    ];
    for (name, description, compute) in functions {
        let returns = if name == "DGET" { "ANY" } else { "NUMBER" };
        registry.add(name, FunctionDef::new(description, DATABASE_ARGS, returns, compute))?;
    }
    Ok(())
}

fn header(matrix: &Matrix, col: usize) -> String {
    matrix
        .get(col)
        .and_then(|c| c.first())
        .map(|v| to_text(v).unwrap_or_default().to_lowercase())
        .unwrap_or_default()
}

/// Zero-based column of `field`, given as a 1-based index or a header name
fn field_index(database: &Matrix, field: &Value, ctx: &EvalContext<'_>) -> EvalResult<usize> {
    let width = database.len();
    if let Value::Number(_) = field {
        let index = to_number(field, ctx.locale)?.trunc();
        ensure(index >= 1.0 && index <= width as f64, || {
            format!(
                "The field ({}) must be one of {} or must be a number between 1 and {} inclusive.",
                index,
                headers_list(database),
                width
            )
        })?;
        return Ok(index as usize - 1);
    }
    let name = to_text(field)?.to_lowercase();
    (0..width)
        .find(|&col| header(database, col) == name)
        .ok_or_else(|| {
            EvaluationError::new(format!(
                "The field ({}) must be one of {} or must be a number between 1 and {} inclusive.",
                to_text(field).unwrap_or_default(),
                headers_list(database),
                width
            ))
            .into()
        })
}

fn headers_list(database: &Matrix) -> String {
    (0..database.len())
        .map(|col| {
            database[col]
                .first()
                .map(|v| to_text(v).unwrap_or_default())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One criteria row: database column and condition pairs
type CriteriaRow = Vec<(Option<usize>, Criterion)>;

fn criteria_rows(database: &Matrix, criteria: &Matrix, ctx: &EvalContext<'_>) -> EvalResult<Vec<CriteriaRow>> {
    let height = criteria.first().map_or(0, Vec::len);
    let columns: Vec<Option<usize>> = (0..criteria.len())
        .map(|col| {
            let name = header(criteria, col);
            (0..database.len()).find(|&db_col| header(database, db_col) == name)
        })
        .collect();

    let mut rows = Vec::with_capacity(height.saturating_sub(1));
    for row in 1..height {
        let mut conditions = Vec::new();
        for (col, column) in columns.iter().enumerate() {
            let cell = &criteria[col][row];
            if cell.is_empty() {
                continue;
            }
            conditions.push((*column, Criterion::new(cell, ctx.locale)?));
        }
        rows.push(conditions);
    }
    Ok(rows)
}

/// Field values of every record accepted by the criteria
fn selected_values(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Vec<Value>> {
    let database = to_matrix(arg(args, 0));
    let criteria = to_matrix(arg(args, 2));
    let field = field_index(&database, arg(args, 1), ctx)?;
    let rows = criteria_rows(&database, &criteria, ctx)?;

    let records = database.first().map_or(0, Vec::len);
    let mut selected = Vec::new();
    for record in 1..records {
        let accepted = rows.iter().any(|conditions| {
            conditions.iter().all(|(column, criterion)| match column {
                Some(col) => criterion.matches(&database[*col][record]),
                None => false,
            })
        });
        if accepted {
            selected.push(database[field][record].clone());
        }
    }
    log::trace!("database query selected {} of {} records", selected.len(), records.saturating_sub(1));
    Ok(selected)
}

fn selected_numbers(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Vec<f64>> {
    Ok(selected_values(args, ctx)?
        .iter()
        .filter_map(Value::as_number)
        .collect())
}

fn number(n: f64) -> EvalResult<Value> {
    Ok(Value::Number(n))
}

fn fn_daverage(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(average_of(&selected_numbers(args, ctx)?)?)
}

fn fn_dcount(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(selected_numbers(args, ctx)?.len() as f64)
}

fn fn_dcounta(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let count = selected_values(args, ctx)?.iter().filter(|v| !v.is_empty()).count();
    number(count as f64)
}

fn fn_dget(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = selected_values(args, ctx)?;
    ensure(!values.is_empty(), || "No match found in [[FUNCTION_NAME]] evaluation.".to_string())?;
    ensure(values.len() == 1, || {
        "More than one match found in [[FUNCTION_NAME]] evaluation.".to_string()
    })?;
    Ok(values.into_iter().next().unwrap_or_default())
}

fn fn_dmax(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = selected_numbers(args, ctx)?;
    number(values.into_iter().reduce(f64::max).unwrap_or(0.0))
}

fn fn_dmin(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = selected_numbers(args, ctx)?;
    number(values.into_iter().reduce(f64::min).unwrap_or(0.0))
}

fn fn_dproduct(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = selected_numbers(args, ctx)?;
    if values.is_empty() {
        return number(0.0);
    }
    number(values.iter().product())
}

fn fn_dstdev(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&selected_numbers(args, ctx)?, true)?.sqrt())
}

fn fn_dstdevp(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&selected_numbers(args, ctx)?, false)?.sqrt())
}

fn fn_dsum(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(selected_numbers(args, ctx)?.iter().sum())
}

fn fn_dvar(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&selected_numbers(args, ctx)?, true)?)
}

fn fn_dvarp(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&selected_numbers(args, ctx)?, false)?)
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    /// The orchard table from the spreadsheet documentation, at A1:E7, with criteria at A9:F11
    fn orchard() -> Grid {
        let rows: &[[Value; 5]] = &[
            ["Tree".into(), "Height".into(), "Age".into(), "Yield".into(), "Profit".into()],
            ["Apple".into(), 18.0.into(), 20.0.into(), 14.0.into(), 105.0.into()],
            ["Pear".into(), 12.0.into(), 12.0.into(), 10.0.into(), 96.0.into()],
            ["Cherry".into(), 13.0.into(), 14.0.into(), 9.0.into(), 105.0.into()],
            ["Apple".into(), 14.0.into(), 15.0.into(), 10.0.into(), 75.0.into()],
            ["Pear".into(), 9.0.into(), 8.0.into(), 8.0.into(), 76.8.into()],
            ["Apple".into(), 8.0.into(), 9.0.into(), 6.0.into(), 45.0.into()],
        ];
        let mut cells: Vec<(String, Value)> = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let col = (b'A' + c as u8) as char;
                cells.push((format!("{}{}", col, r + 1), value.clone()));
            }
        }
        let criteria: &[(&str, Value)] = &[
            ("A9", "Tree".into()),
            ("B9", "Height".into()),
            ("C9", "Age".into()),
            ("A10", "=Apple".into()),
            ("B10", ">10".into()),
            ("A11", "=Pear".into()),
        ];
        for (address, value) in criteria {
            cells.push((address.to_string(), value.clone()));
        }
        let borrowed: Vec<(&str, Value)> = cells.iter().map(|(a, v)| (a.as_str(), v.clone())).collect();
        Grid::new(&borrowed)
    }

    fn number_in(formula: &str) -> f64 {
        match eval_in(formula, &mut orchard()) {
            Value::Number(n) => n,
            other => panic!("{} evaluated to {:?}", formula, other),
        }
    }

    #[test]
    fn test_aggregates_over_selected_records() {
        // Apples taller than 10, plus every pear
        assert_eq!(number_in("=DCOUNT(A1:E7, \"Age\", A9:C11)"), 4.0);
        assert_eq!(number_in("=DCOUNTA(A1:E7, \"Profit\", A9:C11)"), 4.0);
        assert_eq!(number_in("=DMAX(A1:E7, \"Profit\", A9:C11)"), 105.0);
        assert_eq!(number_in("=DMIN(A1:E7, \"Profit\", A9:C11)"), 75.0);
        assert_close(number_in("=DSUM(A1:E7, 5, A9:C11)"), 352.8, 1e-9);
        assert_close(number_in("=DAVERAGE(A1:E7, \"yield\", A9:C11)"), 10.5, 1e-9);
        assert_eq!(number_in("=DPRODUCT(A1:E7, \"Yield\", A9:C11)"), 11200.0);
    }

    #[test]
    fn test_spread_functions() {
        // Yields of the two selected apple trees
        assert_close(number_in("=DVAR(A1:E7, \"Yield\", A9:B10)"), 8.0, 1e-9);
        assert_close(number_in("=DVARP(A1:E7, \"Yield\", A9:B10)"), 4.0, 1e-9);
        assert_close(number_in("=DSTDEV(A1:E7, \"Yield\", A9:B10)"), 8f64.sqrt(), 1e-9);
        assert_close(number_in("=DSTDEVP(A1:E7, \"Yield\", A9:B10)"), 2.0, 1e-9);
    }

    #[test]
    fn test_dget_needs_exactly_one_match() {
        let mut grid = orchard();
        assert!(eval_in("=DGET(A1:E7, \"Yield\", A9:C11)", &mut grid).is_error());
        assert_eq!(
            eval_in("=DGET(A1:E7, \"Yield\", A9:A10)", &mut grid).as_error().map(|e| e.message.clone()),
            Some("More than one match found in DGET evaluation.".to_string())
        );
    }

    #[test]
    fn test_unknown_field() {
        let mut grid = orchard();
        assert!(eval_in("=DSUM(A1:E7, \"Price\", A9:C11)", &mut grid).is_error());
        assert!(eval_in("=DSUM(A1:E7, 6, A9:C11)", &mut grid).is_error());
    }
}
