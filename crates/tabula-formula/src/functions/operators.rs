//! Operator functions
//!
//! The compiler maps infix and prefix operators onto these.

use super::{arg, first_arg_format, first_or_second_format};
use crate::coercion::{to_number, to_text};
use crate::context::EvalContext;
use crate::error::{EvalResult, RegistrationError};
use crate::helpers::ensure;
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::Value;
use std::cmp::Ordering;

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // ADD
    registry.add(
        "ADD",
        FunctionDef {
            description: "Sum of two numbers.",
            args: &["value1 (number)", "value2 (number)"],
            returns: "NUMBER",
            compute: fn_add,
            format: Some(first_or_second_format),
        },
    )?;

    // CONCAT
    registry.add(
        "CONCAT",
        FunctionDef {
            description: "Concatenation of two values.",
            args: &["value1 (string)", "value2 (string)"],
            returns: "STRING",
            compute: fn_concat,
            format: None,
        },
    )?;

    // DIVIDE
    registry.add(
        "DIVIDE",
        FunctionDef {
            description: "One number divided by another.",
            args: &["dividend (number)", "divisor (number)"],
            returns: "NUMBER",
            compute: fn_divide,
            format: Some(first_or_second_format),
        },
    )?;

    // EQ
    registry.add(
        "EQ",
        FunctionDef {
            description: "Equal.",
            args: &["value1 (any)", "value2 (any)"],
            returns: "BOOLEAN",
            compute: fn_eq,
            format: None,
        },
    )?;

    // GT
    registry.add(
        "GT",
        FunctionDef {
            description: "Strictly greater than.",
            args: &["value1 (any)", "value2 (any)"],
            returns: "BOOLEAN",
            compute: fn_gt,
            format: None,
        },
    )?;

    // GTE
    registry.add(
        "GTE",
        FunctionDef {
            description: "Greater than or equal to.",
            args: &["value1 (any)", "value2 (any)"],
            returns: "BOOLEAN",
            compute: fn_gte,
            format: None,
        },
    )?;

    // LT
    registry.add(
        "LT",
        FunctionDef {
            description: "Less than.",
            args: &["value1 (any)", "value2 (any)"],
            returns: "BOOLEAN",
            compute: fn_lt,
            format: None,
        },
    )?;

    // LTE
    registry.add(
        "LTE",
        FunctionDef {
            description: "Less than or equal to.",
            args: &["value1 (any)", "value2 (any)"],
            returns: "BOOLEAN",
            compute: fn_lte,
            format: None,
        },
    )?;

    // MINUS
    registry.add(
        "MINUS",
        FunctionDef {
            description: "Difference of two numbers.",
            args: &["value1 (number)", "value2 (number)"],
            returns: "NUMBER",
            compute: fn_minus,
            format: Some(first_or_second_format),
        },
    )?;

    // MULTIPLY
    registry.add(
        "MULTIPLY",
        FunctionDef {
            description: "Product of two numbers",
            args: &["factor1 (number)", "factor2 (number)"],
            returns: "NUMBER",
            compute: fn_multiply,
            format: Some(first_or_second_format),
        },
    )?;

    // NE
    registry.add(
        "NE",
        FunctionDef {
            description: "Not equal.",
            args: &["value1 (any)", "value2 (any)"],
            returns: "BOOLEAN",
            compute: fn_ne,
            format: None,
        },
    )?;

    // POW
    registry.add(
        "POW",
        FunctionDef {
            description: "A number raised to a power.",
            args: &["base (number)", "exponent (number)"],
            returns: "NUMBER",
            compute: super::math::fn_power,
            format: None,
        },
    )?;

    // UMINUS
    registry.add(
        "UMINUS",
        FunctionDef {
            description: "A number with the sign reversed.",
            args: &["value (number)"],
            returns: "NUMBER",
            compute: fn_uminus,
            format: Some(first_arg_format),
        },
    )?;

    // UNARY.PERCENT
    registry.add(
        "UNARY_PERCENT",
        FunctionDef {
            description: "Value interpreted as a percentage.",
            args: &["percentage (number)"],
            returns: "NUMBER",
            compute: fn_unary_percent,
            format: None,
        },
    )?;

    // UPLUS
    registry.add(
        "UPLUS",
        FunctionDef {
            description: "A specified number, unchanged.",
            args: &["value (any)"],
            returns: "ANY",
            compute: fn_uplus,
            format: Some(first_arg_format),
        },
    )?;

    Ok(())
}

fn fn_add(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(
        to_number(arg(args, 0), ctx.locale)? + to_number(arg(args, 1), ctx.locale)?,
    ))
}

fn fn_concat(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Text(to_text(arg(args, 0))? + &to_text(arg(args, 1))?))
}

fn fn_divide(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let divisor = to_number(arg(args, 1), ctx.locale)?;
    ensure(divisor != 0.0, || "The divisor must be different from zero.".to_string())?;
    Ok(Value::Number(to_number(arg(args, 0), ctx.locale)? / divisor))
}

fn fn_minus(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(
        to_number(arg(args, 0), ctx.locale)? - to_number(arg(args, 1), ctx.locale)?,
    ))
}

fn fn_multiply(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(
        to_number(arg(args, 0), ctx.locale)? * to_number(arg(args, 1), ctx.locale)?,
    ))
}

fn fn_uminus(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(-to_number(arg(args, 0), ctx.locale)?))
}

fn fn_unary_percent(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(to_number(arg(args, 0), ctx.locale)? / 100.0))
}

fn fn_uplus(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(match arg(args, 0) {
        Value::Empty => Value::Text(String::new()),
        other => other.clone(),
    })
}

/// Replace an empty operand by the neutral value of the other operand's type
fn neutralize(value1: &Value, value2: &Value) -> (Value, Value) {
    fn neutral(of: &Value) -> Value {
        match of {
            Value::Number(_) => Value::Number(0.0),
            Value::Text(_) => Value::Text(String::new()),
            Value::Boolean(_) => Value::Boolean(false),
            _ => Value::Empty,
        }
    }
    let v1 = if value1.is_empty() { neutral(value2) } else { value1.clone() };
    let v2 = if value2.is_empty() { neutral(&v1) } else { value2.clone() };
    (v1, v2)
}

/// Equality ignoring case; values of different types are never equal
pub(crate) fn values_equal(value1: &Value, value2: &Value) -> bool {
    let (v1, v2) = neutralize(value1, value2);
    match (&v1, &v2) {
        (Value::Text(a), Value::Text(b)) => a.to_uppercase() == b.to_uppercase(),
        _ => v1 == v2,
    }
}

/// Relational ordering: numbers compare numerically, everything else as uppercase text, and
/// text is always greater than a number
pub(crate) fn relational_cmp(value1: &Value, value2: &Value) -> EvalResult<Ordering> {
    enum Side {
        Number(f64),
        Text(String),
    }
    fn side(v: &Value) -> EvalResult<Side> {
        Ok(match v {
            Value::Number(n) => Side::Number(*n),
            other => Side::Text(to_text(other)?.to_uppercase()),
        })
    }
    let (v1, v2) = neutralize(value1, value2);
    Ok(match (side(&v1)?, side(&v2)?) {
        (Side::Text(_), Side::Number(_)) => Ordering::Greater,
        (Side::Number(_), Side::Text(_)) => Ordering::Less,
        (Side::Number(a), Side::Number(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Side::Text(a), Side::Text(b)) => a.cmp(&b),
    })
}

fn fn_eq(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(values_equal(arg(args, 0), arg(args, 1))))
}

fn fn_ne(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(!values_equal(arg(args, 0), arg(args, 1))))
}

fn fn_gt(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(
        relational_cmp(arg(args, 0), arg(args, 1))? == Ordering::Greater,
    ))
}

fn fn_gte(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(
        relational_cmp(arg(args, 0), arg(args, 1))? != Ordering::Less,
    ))
}

fn fn_lt(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let gte = fn_gte(args, ctx)?;
    Ok(Value::Boolean(gte != Value::Boolean(true)))
}

fn fn_lte(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let gt = fn_gt(args, ctx)?;
    Ok(Value::Boolean(gt != Value::Boolean(true)))
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_number("=1+2*3"), 7.0);
        assert_eq!(eval_number("=(1+2)*3"), 9.0);
        assert_eq!(eval_number("=-2^2"), -4.0);
        assert_eq!(eval_number("=2^3^2"), 64.0);
        assert_eq!(eval_number("=50%"), 0.5);
        assert_eq!(eval_number("=\"3\"+TRUE"), 4.0);
        assert_eq!(eval_number("=10-4-3"), 3.0);
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(eval_error("=1/0"), "The divisor must be different from zero.");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("=\"abc\"=\"ABC\""), Value::Boolean(true));
        assert_eq!(eval("=1=\"1\""), Value::Boolean(false));
        assert_eq!(eval("=\"a\">1"), Value::Boolean(true));
        assert_eq!(eval("=1<\"a\""), Value::Boolean(true));
        assert_eq!(eval("=2>=2"), Value::Boolean(true));
        assert_eq!(eval("=2<>3"), Value::Boolean(true));
        assert_eq!(eval("=TRUE>1"), Value::Boolean(true));
    }

    #[test]
    fn test_empty_operands_use_neutral_values() {
        let mut grid = Grid::default();
        assert_eq!(eval_in("=A1=0", &mut grid), Value::Boolean(true));
        assert_eq!(eval_in("=A1=\"\"", &mut grid), Value::Boolean(true));
        assert_eq!(eval_in("=A1=FALSE", &mut grid), Value::Boolean(true));
        assert_eq!(eval_in("=A1<1", &mut grid), Value::Boolean(true));
        assert_eq!(eval_in("=+A1", &mut grid), Value::from(""));
    }

    #[test]
    fn test_concat() {
        assert_eq!(eval("=\"a\"&1&TRUE"), Value::from("a1TRUE"));
    }
}
