//! Logical functions

use super::arg;
use super::operators::values_equal;
use crate::coercion::to_boolean;
use crate::context::EvalContext;
use crate::error::{EvalError, EvalResult, EvaluationError, RegistrationError};
use crate::helpers::visit_booleans;
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::Value;
use tabula_core::CellError;

const LOGICAL_ARGS: &[&str] = &[
    "logical_expression1 (boolean, range<boolean>)",
    "logical_expression2 (boolean, range<boolean>, repeating)",
];

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // AND
    registry.add(
        "AND",
        FunctionDef::new("Logical `and` operator.", LOGICAL_ARGS, "BOOLEAN", fn_and),
    )?;

    // FALSE
    registry.add("FALSE", FunctionDef::new("Logical value `false`.", &[], "BOOLEAN", fn_false))?;

    // IF
    registry.add(
        "IF",
        FunctionDef::new(
            "Returns value depending on logical expression.",
            &[
                "logical_expression (boolean)",
                "value_if_true (any, lazy)",
                "value_if_false (any, lazy, optional, default=FALSE)",
            ],
            "ANY",
            fn_if,
        ),
    )?;

    // IFERROR
    registry.add(
        "IFERROR",
        FunctionDef::new(
            "Value if it is not an error, otherwise 2nd argument.",
            &["value (any, lazy)", "value_if_error (any, lazy, optional, default=\"\")"],
            "ANY",
            fn_iferror,
        ),
    )?;

    // IFNA
    registry.add(
        "IFNA",
        FunctionDef::new(
            "Value if it is not an #N/A error, otherwise 2nd argument.",
            &["value (any, lazy)", "value_if_error (any, lazy, optional, default=\"\")"],
            "ANY",
            fn_ifna,
        ),
    )?;

    // IFS
    registry.add(
        "IFS",
        FunctionDef::new(
            "Returns a value depending on multiple logical expressions.",
            &[
                "condition1 (boolean, lazy)",
                "value1 (any, lazy)",
                "condition2 (boolean, lazy, repeating)",
                "value2 (any, lazy, repeating)",
            ],
            "ANY",
            fn_ifs,
        ),
    )?;

    // NOT
    registry.add(
        "NOT",
        FunctionDef::new(
            "Returns opposite of provided logical value.",
            &["logical_expression (boolean)"],
            "BOOLEAN",
            fn_not,
        ),
    )?;

    // OR
    registry.add(
        "OR",
        FunctionDef::new("Logical `or` operator.", LOGICAL_ARGS, "BOOLEAN", fn_or),
    )?;

    // SWITCH
    registry.add(
        "SWITCH",
        FunctionDef::new(
            "Tests an expression against a list of cases.",
            &[
                "expression (any)",
                "case1 (any)",
                "value1 (any, lazy)",
                "default_or_case2 (any, lazy, optional, repeating)",
            ],
            "ANY",
            fn_switch,
        ),
    )?;

    // TRUE
    registry.add("TRUE", FunctionDef::new("Logical value `true`.", &[], "BOOLEAN", fn_true))?;

    // XOR
    registry.add(
        "XOR",
        FunctionDef::new("Logical `xor` operator.", LOGICAL_ARGS, "BOOLEAN", fn_xor),
    )?;

    Ok(())
}

/// The value of a lazy argument, failing if it holds an error
fn checked(value: &Value) -> EvalResult<&Value> {
    match value {
        Value::Error(e) => Err(EvalError::Propagated {
            kind: e.kind,
            message: e.message.clone(),
        }),
        other => Ok(other),
    }
}

/// Fold booleans, failing when no value was found at all
fn reduce_booleans(args: &[Value], initial: bool, cb: impl Fn(bool, bool) -> bool) -> EvalResult<Value> {
    let mut found = false;
    let mut acc = initial;
    visit_booleans(args, |b| {
        found = true;
        acc = cb(acc, b);
        true
    })?;
    if !found {
        return Err(EvaluationError::new("[[FUNCTION_NAME]] has no expression values.").into());
    }
    Ok(Value::Boolean(acc))
}

fn fn_and(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    reduce_booleans(args, true, |acc, b| acc && b)
}

fn fn_or(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    reduce_booleans(args, false, |acc, b| acc || b)
}

fn fn_xor(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    reduce_booleans(args, false, |acc, b| acc ^ b)
}

fn fn_not(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(!to_boolean(arg(args, 0))?))
}

fn fn_true(_args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(true))
}

fn fn_false(_args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(false))
}

fn fn_if(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let chosen = if to_boolean(arg(args, 0))? { arg(args, 1) } else { arg(args, 2) };
    Ok(checked(chosen)?.clone())
}

fn fn_iferror(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    match arg(args, 0) {
        Value::Error(_) => Ok(checked(arg(args, 1))?.clone()),
        other => Ok(other.clone()),
    }
}

fn fn_ifna(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    match arg(args, 0) {
        Value::Error(e) if e.kind == CellError::NotAvailable => Ok(checked(arg(args, 1))?.clone()),
        other => Ok(checked(other)?.clone()),
    }
}

fn fn_ifs(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    for pair in args.chunks(2) {
        if to_boolean(checked(&pair[0])?)? {
            return Ok(checked(arg(pair, 1))?.clone());
        }
    }
    Err(EvaluationError::not_available("No match.").into())
}

fn fn_switch(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let expression = arg(args, 0);
    let cases = &args[1..];
    for pair in cases.chunks(2) {
        if pair.len() == 1 {
            return Ok(checked(&pair[0])?.clone());
        }
        if values_equal(expression, checked(&pair[0])?) {
            return Ok(checked(&pair[1])?.clone());
        }
    }
    Err(EvaluationError::not_available("No match.").into())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use tabula_core::CellError;

    #[test]
    fn test_boolean_reductions() {
        assert_eq!(eval("=AND(TRUE, 1, \"true\")"), Value::Boolean(true));
        assert_eq!(eval("=AND(TRUE, FALSE)"), Value::Boolean(false));
        assert_eq!(eval("=OR(FALSE, 0, TRUE)"), Value::Boolean(true));
        assert_eq!(eval("=XOR(TRUE, TRUE, TRUE)"), Value::Boolean(true));
        assert_eq!(eval("=NOT(0)"), Value::Boolean(true));
        assert!(eval("=AND(\"abc\")").is_error());

        let mut grid = Grid::new(&[("A1", Value::from("text"))]);
        assert_eq!(eval_in("=OR(A1:A2)", &mut grid).as_error().map(|e| e.message.clone()), Some("OR has no expression values.".to_string()));
    }

    #[test]
    fn test_if_only_evaluates_the_chosen_branch_errors() {
        assert_eq!(eval("=IF(TRUE, 1, 1/0)"), Value::Number(1.0));
        assert_eq!(eval("=IF(FALSE, 1)"), Value::Boolean(false));
        assert!(eval("=IF(FALSE, 1, 1/0)").is_error());
        assert!(eval("=IF(1/0, 1, 2)").is_error());
    }

    #[test]
    fn test_error_handlers() {
        assert_eq!(eval("=IFERROR(1/0, \"oops\")"), Value::from("oops"));
        assert_eq!(eval("=IFERROR(1/0)"), Value::from(""));
        assert_eq!(eval("=IFERROR(42, \"oops\")"), Value::Number(42.0));
        assert_eq!(eval("=IFNA(NA(), 0)"), Value::Number(0.0));
        match eval("=IFNA(1/0, 0)") {
            Value::Error(e) => assert_eq!(e.kind, CellError::Generic),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_ifs_and_switch() {
        assert_eq!(eval("=IFS(FALSE, 1, TRUE, 2)"), Value::Number(2.0));
        assert!(eval("=IFS(FALSE, 1, FALSE, 2)").is_error());
        assert_eq!(eval("=SWITCH(2, 1, \"one\", 2, \"two\")"), Value::from("two"));
        assert_eq!(eval("=SWITCH(\"B\", \"a\", 1, \"b\", 2)"), Value::Number(2.0));
        assert_eq!(eval("=SWITCH(3, 1, \"one\", \"other\")"), Value::from("other"));
        match eval("=SWITCH(3, 1, \"one\")") {
            Value::Error(e) => assert_eq!(e.kind, CellError::NotAvailable),
            other => panic!("{:?}", other),
        }
    }
}
