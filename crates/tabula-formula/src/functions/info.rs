//! Info functions
//!
//! The IS* functions take their argument lazily: an error value is inspected, not propagated.

use super::arg;
use crate::context::EvalContext;
use crate::error::{EvalResult, EvaluationError, RegistrationError};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::Value;
use tabula_core::CellError;

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // ISBLANK
    registry.add(
        "ISBLANK",
        FunctionDef::new("Whether the referenced cell is empty", &["value (any, lazy)"], "BOOLEAN", fn_isblank),
    )?;

    // ISERR
    registry.add(
        "ISERR",
        FunctionDef::new("Whether a value is an error other than #N/A.", &["value (any, lazy)"], "BOOLEAN", fn_iserr),
    )?;

    // ISERROR
    registry.add(
        "ISERROR",
        FunctionDef::new("Whether a value is an error.", &["value (any, lazy)"], "BOOLEAN", fn_iserror),
    )?;

    // ISLOGICAL
    registry.add(
        "ISLOGICAL",
        FunctionDef::new("Whether a value is `true` or `false`.", &["value (any, lazy)"], "BOOLEAN", fn_islogical),
    )?;

    // ISNA
    registry.add(
        "ISNA",
        FunctionDef::new("Whether a value is the error #N/A.", &["value (any, lazy)"], "BOOLEAN", fn_isna),
    )?;

    // ISNONTEXT
    registry.add(
        "ISNONTEXT",
        FunctionDef::new("Whether a value is non-textual.", &["value (any, lazy)"], "BOOLEAN", fn_isnontext),
    )?;

    // ISNUMBER
    registry.add(
        "ISNUMBER",
        FunctionDef::new("Whether a value is a number.", &["value (any, lazy)"], "BOOLEAN", fn_isnumber),
    )?;

    // ISTEXT
    registry.add(
        "ISTEXT",
        FunctionDef::new("Whether a value is text.", &["value (any, lazy)"], "BOOLEAN", fn_istext),
    )?;

    // NA
    registry.add("NA", FunctionDef::new("Returns the error value #N/A.", &[], "ANY", fn_na))?;

    Ok(())
}

fn test(args: &[Value], predicate: impl Fn(&Value) -> bool) -> EvalResult<Value> {
    Ok(Value::Boolean(predicate(&arg(args, 0).top_left())))
}

fn fn_isblank(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    test(args, Value::is_empty)
}

fn fn_iserr(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    test(args, |v| matches!(v, Value::Error(e) if e.kind != CellError::NotAvailable))
}

fn fn_iserror(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    test(args, Value::is_error)
}

fn fn_islogical(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    test(args, |v| matches!(v, Value::Boolean(_)))
}

fn fn_isna(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    test(args, |v| matches!(v, Value::Error(e) if e.kind == CellError::NotAvailable))
}

fn fn_isnontext(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    test(args, |v| !matches!(v, Value::Text(_)))
}

fn fn_isnumber(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    test(args, |v| matches!(v, Value::Number(_)))
}

fn fn_istext(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    test(args, |v| matches!(v, Value::Text(_)))
}

fn fn_na(_args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Err(EvaluationError::not_available("Value not available.").into())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_predicates() {
        assert_eq!(eval("=ISERROR(1/0)"), Value::Boolean(true));
        assert_eq!(eval("=ISERROR(1)"), Value::Boolean(false));
        assert_eq!(eval("=ISERR(NA())"), Value::Boolean(false));
        assert_eq!(eval("=ISERR(1/0)"), Value::Boolean(true));
        assert_eq!(eval("=ISNA(NA())"), Value::Boolean(true));
        assert!(eval("=NA()").is_error());
    }

    #[test]
    fn test_type_predicates() {
        let mut grid = Grid::new(&[("A1", Value::from("x")), ("A2", Value::Number(1.0))]);
        assert_eq!(eval_in("=ISBLANK(A3)", &mut grid), Value::Boolean(true));
        assert_eq!(eval_in("=ISBLANK(A1)", &mut grid), Value::Boolean(false));
        assert_eq!(eval_in("=ISTEXT(A1)", &mut grid), Value::Boolean(true));
        assert_eq!(eval_in("=ISNONTEXT(A2)", &mut grid), Value::Boolean(true));
        assert_eq!(eval_in("=ISNUMBER(A2)", &mut grid), Value::Boolean(true));
        assert_eq!(eval("=ISLOGICAL(TRUE)"), Value::Boolean(true));
        assert_eq!(eval("=ISNUMBER(\"1\")"), Value::Boolean(false));
    }
}
