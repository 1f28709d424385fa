//! Engineering functions

use super::num;
use crate::context::EvalContext;
use crate::error::{EvalResult, RegistrationError};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::Value;

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // DELTA
    registry.add(
        "DELTA",
        FunctionDef::new(
            "Compare two numeric values, returning 1 if they're equal.",
            &["number1 (number)", "number2 (number, optional, default=0)"],
            "NUMBER",
            fn_delta,
        ),
    )?;

    // GESTEP
    registry.add(
        "GESTEP",
        FunctionDef::new(
            "Returns 1 if the rate is strictly greater than or equal to the provided step value or 0 otherwise. If no step value is provided then the default value of 0 will be used.",
            &["value (number)", "step (number, optional, default=0)"],
            "NUMBER",
            fn_gestep,
        ),
    )?;

    Ok(())
}

fn indicator(condition: bool) -> EvalResult<Value> {
    Ok(Value::Number(if condition { 1.0 } else { 0.0 }))
}

fn fn_delta(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    indicator(num(args, 0, ctx)? == num(args, 1, ctx)?)
}

fn fn_gestep(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    indicator(num(args, 0, ctx)? >= num(args, 1, ctx)?)
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;

    #[test]
    fn test_delta_and_gestep() {
        assert_eq!(eval_number("=DELTA(2, 2)"), 1.0);
        assert_eq!(eval_number("=DELTA(2)"), 0.0);
        assert_eq!(eval_number("=DELTA(\"0\")"), 1.0);
        assert_eq!(eval_number("=GESTEP(5, 5)"), 1.0);
        assert_eq!(eval_number("=GESTEP(-1)"), 0.0);
        assert!(eval("=GESTEP(\"abc\")").is_error());
    }
}
