//! Math functions

use super::{arg, first_arg_format, num, num_or, text};
use crate::coercion::number_to_text as fmt;
use crate::context::EvalContext;
use crate::criteria::{cell_at, visit_matching_ranges, Criterion};
use crate::error::{EvalResult, RegistrationError};
use crate::helpers::{ensure, reduce_numbers, visit_any, visit_numbers};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::{Matrix, Value};
use rand::Rng;
use rust_decimal::prelude::{Decimal, FromPrimitive, RoundingStrategy, ToPrimitive};
use std::f64::consts::PI;

const DIVIDE_BY_ZERO: &str = "Evaluation of function [[FUNCTION_NAME]] caused a divide by zero error.";

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // ABS
    registry.add("ABS", FunctionDef::new("Absolute value of a number.", &["value (number)"], "NUMBER", fn_abs))?;

    // ACOS
    registry.add("ACOS", FunctionDef::new("Inverse cosine of a value, in radians.", &["value (number)"], "NUMBER", fn_acos))?;

    // ACOSH
    registry.add("ACOSH", FunctionDef::new("Inverse hyperbolic cosine of a number.", &["value (number)"], "NUMBER", fn_acosh))?;

    // ACOT
    registry.add("ACOT", FunctionDef::new("Inverse cotangent of a value.", &["value (number)"], "NUMBER", fn_acot))?;

    // ACOTH
    registry.add("ACOTH", FunctionDef::new("Inverse hyperbolic cotangent of a value.", &["value (number)"], "NUMBER", fn_acoth))?;

    // ASIN
    registry.add("ASIN", FunctionDef::new("Inverse sine of a value, in radians.", &["value (number)"], "NUMBER", fn_asin))?;

    // ASINH
    registry.add("ASINH", FunctionDef::new("Inverse hyperbolic sine of a number.", &["value (number)"], "NUMBER", fn_asinh))?;

    // ATAN
    registry.add("ATAN", FunctionDef::new("Inverse tangent of a value, in radians.", &["value (number)"], "NUMBER", fn_atan))?;

    // ATAN2
    registry.add(
        "ATAN2",
        FunctionDef::new(
            "Angle from the X axis to a point (x,y), in radians.",
            &["x (number)", "y (number)"],
            "NUMBER",
            fn_atan2,
        ),
    )?;

    // ATANH
    registry.add("ATANH", FunctionDef::new("Inverse hyperbolic tangent of a number.", &["value (number)"], "NUMBER", fn_atanh))?;

    // CEILING
    registry.add(
        "CEILING",
        FunctionDef::new(
            "Rounds number up to nearest multiple of factor.",
            &["value (number)", "factor (number, optional, default=1)"],
            "NUMBER",
            fn_ceiling,
        )
        .with_format(first_arg_format),
    )?;

    // CEILING.MATH
    registry.add(
        "CEILING_MATH",
        FunctionDef::new(
            "Rounds number up to nearest multiple of factor.",
            &[
                "number (number)",
                "significance (number, optional, default=1)",
                "mode (number, optional, default=0)",
            ],
            "NUMBER",
            fn_ceiling_math,
        )
        .with_format(first_arg_format),
    )?;

    // CEILING.PRECISE
    registry.add(
        "CEILING_PRECISE",
        FunctionDef::new(
            "Rounds number up to nearest multiple of factor.",
            &["number (number)", "significance (number, optional, default=1)"],
            "NUMBER",
            fn_ceiling_precise,
        )
        .with_format(first_arg_format),
    )?;

    // COS
    registry.add("COS", FunctionDef::new("Cosine of an angle provided in radians.", &["angle (number)"], "NUMBER", fn_cos))?;

    // COSH
    registry.add("COSH", FunctionDef::new("Hyperbolic cosine of any real number.", &["value (number)"], "NUMBER", fn_cosh))?;

    // COT
    registry.add("COT", FunctionDef::new("Cotangent of an angle provided in radians.", &["angle (number)"], "NUMBER", fn_cot))?;

    // COTH
    registry.add("COTH", FunctionDef::new("Hyperbolic cotangent of any real number.", &["value (number)"], "NUMBER", fn_coth))?;

    // COUNTBLANK
    registry.add(
        "COUNTBLANK",
        FunctionDef::new(
            "Number of empty values.",
            &["value1 (any, range)", "value2 (any, range, repeating, optional)"],
            "NUMBER",
            fn_countblank,
        ),
    )?;

    // COUNTIF
    registry.add(
        "COUNTIF",
        FunctionDef::new(
            "A conditional count across a range.",
            &["range (range)", "criterion (string)"],
            "NUMBER",
            fn_countif,
        ),
    )?;

    // COUNTIFS
    registry.add(
        "COUNTIFS",
        FunctionDef::new(
            "Count values depending on multiple criteria.",
            &[
                "criteria_range1 (range)",
                "criterion1 (string)",
                "criteria_range2 (any, range, repeating)",
                "criterion2 (string, repeating)",
            ],
            "NUMBER",
            fn_countifs,
        ),
    )?;

    // COUNTUNIQUE
    registry.add(
        "COUNTUNIQUE",
        FunctionDef::new(
            "Counts number of unique values in a range.",
            &["value1 (any, range)", "value2 (any, range, repeating, optional)"],
            "NUMBER",
            fn_countunique,
        ),
    )?;

    // CSC
    registry.add("CSC", FunctionDef::new("Cosecant of an angle provided in radians.", &["angle (number)"], "NUMBER", fn_csc))?;

    // CSCH
    registry.add("CSCH", FunctionDef::new("Hyperbolic cosecant of any real number.", &["value (number)"], "NUMBER", fn_csch))?;

    // DECIMAL
    registry.add(
        "DECIMAL",
        FunctionDef::new(
            "Converts from another base to decimal.",
            &["value (string)", "base (number)"],
            "NUMBER",
            fn_decimal,
        ),
    )?;

    // DEGREES
    registry.add("DEGREES", FunctionDef::new("Converts an angle value in radians to degrees.", &["angle (number)"], "NUMBER", fn_degrees))?;

    // EVEN
    registry.add(
        "EVEN",
        FunctionDef::new("Rounds a number up to the nearest even integer.", &["value (number)"], "NUMBER", fn_even)
            .with_format(first_arg_format),
    )?;

    // EXP
    registry.add("EXP", FunctionDef::new("Euler's number, e (~2.718) raised to a power.", &["value (number)"], "NUMBER", fn_exp))?;

    // FACT
    registry.add("FACT", FunctionDef::new("Factorial of a number.", &["value (number)"], "NUMBER", fn_fact))?;

    // FLOOR
    registry.add(
        "FLOOR",
        FunctionDef::new(
            "Rounds number down to nearest multiple of factor.",
            &["value (number)", "factor (number, optional, default=1)"],
            "NUMBER",
            fn_floor,
        )
        .with_format(first_arg_format),
    )?;

    // FLOOR.MATH
    registry.add(
        "FLOOR_MATH",
        FunctionDef::new(
            "Rounds number down to nearest multiple of factor.",
            &[
                "number (number)",
                "significance (number, optional, default=1)",
                "mode (number, optional, default=0)",
            ],
            "NUMBER",
            fn_floor_math,
        )
        .with_format(first_arg_format),
    )?;

    // FLOOR.PRECISE
    registry.add(
        "FLOOR_PRECISE",
        FunctionDef::new(
            "Rounds number down to nearest multiple of factor.",
            &["number (number)", "significance (number, optional, default=1)"],
            "NUMBER",
            fn_floor_precise,
        )
        .with_format(first_arg_format),
    )?;

    // COMBIN
    registry.add(
        "COMBIN",
        FunctionDef::new(
            "Number of ways to choose some objects from a set.",
            &["n (number)", "k (number)"],
            "NUMBER",
            fn_combin,
        ),
    )?;

    // GCD
    registry.add(
        "GCD",
        FunctionDef::new(
            "Greatest common divisor of one or more integers.",
            &["value1 (number, range<number>)", "value2 (number, range<number>, repeating, optional)"],
            "NUMBER",
            fn_gcd,
        ),
    )?;

    // INT
    registry.add(
        "INT",
        FunctionDef::new("Rounds a number down to the nearest integer.", &["value (number)"], "NUMBER", fn_int)
            .with_format(first_arg_format),
    )?;

    // ISEVEN
    registry.add("ISEVEN", FunctionDef::new("Whether the provided value is even.", &["value (number)"], "BOOLEAN", fn_iseven))?;

    // ISO.CEILING
    registry.add(
        "ISO_CEILING",
        FunctionDef::new(
            "Rounds number up to nearest multiple of factor.",
            &["number (number)", "significance (number, optional, default=1)"],
            "NUMBER",
            fn_ceiling_precise,
        )
        .with_format(first_arg_format),
    )?;

    // ISODD
    registry.add("ISODD", FunctionDef::new("Whether the provided value is odd.", &["value (number)"], "BOOLEAN", fn_isodd))?;

    // LCM
    registry.add(
        "LCM",
        FunctionDef::new(
            "Least common multiple of one or more integers.",
            &["value1 (number, range<number>)", "value2 (number, range<number>, repeating, optional)"],
            "NUMBER",
            fn_lcm,
        ),
    )?;

    // LN
    registry.add("LN", FunctionDef::new("The logarithm of a number, base e (euler's number).", &["value (number)"], "NUMBER", fn_ln))?;

    // LOG
    registry.add(
        "LOG",
        FunctionDef::new(
            "The logarithm of a number, for a given base.",
            &["value (number)", "base (number, optional, default=10)"],
            "NUMBER",
            fn_log,
        ),
    )?;

    // LOG10
    registry.add("LOG10", FunctionDef::new("The logarithm of a number, base 10.", &["value (number)"], "NUMBER", fn_log10))?;

    // MOD
    registry.add(
        "MOD",
        FunctionDef::new(
            "Modulo (remainder) operator.",
            &["dividend (number)", "divisor (number)"],
            "NUMBER",
            fn_mod,
        )
        .with_format(first_arg_format),
    )?;

    // MUNIT
    registry.add(
        "MUNIT",
        FunctionDef::new("Returns a n x n unit matrix.", &["dimension (number)"], "RANGE<NUMBER>", fn_munit),
    )?;

    // ODD
    registry.add(
        "ODD",
        FunctionDef::new("Rounds a number up to the nearest odd integer.", &["value (number)"], "NUMBER", fn_odd)
            .with_format(first_arg_format),
    )?;

    // PI
    registry.add("PI", FunctionDef::new("The number pi.", &[], "NUMBER", fn_pi))?;

    // POWER
    registry.add(
        "POWER",
        FunctionDef::new(
            "A number raised to a power.",
            &["base (number)", "exponent (number)"],
            "NUMBER",
            fn_power,
        )
        .with_format(first_arg_format),
    )?;

    // PRODUCT
    registry.add(
        "PRODUCT",
        FunctionDef::new(
            "Result of multiplying a series of numbers together.",
            &["factor1 (number, range<number>)", "factor2 (number, range<number>, repeating, optional)"],
            "NUMBER",
            fn_product,
        )
        .with_format(first_arg_format),
    )?;

    // QUOTIENT
    registry.add(
        "QUOTIENT",
        FunctionDef::new(
            "Integer division without the remainder.",
            &["dividend (number)", "divisor (number)"],
            "NUMBER",
            fn_quotient,
        ),
    )?;

    // RADIANS
    registry.add("RADIANS", FunctionDef::new("Converts an angle value in degrees to radians.", &["angle (number)"], "NUMBER", fn_radians))?;

    // RAND
    registry.add("RAND", FunctionDef::new("A random number between 0 inclusive and 1 exclusive.", &[], "NUMBER", fn_rand))?;

    // RANDARRAY
    registry.add(
        "RANDARRAY",
        FunctionDef::new(
            "Returns a grid of random numbers between 0 inclusive and 1 exclusive.",
            &["rows (number, optional, default=1)", "columns (number, optional, default=1)"],
            "RANGE<NUMBER>",
            fn_randarray,
        ),
    )?;

    // RANDBETWEEN
    registry.add(
        "RANDBETWEEN",
        FunctionDef::new(
            "Random integer between two values, inclusive.",
            &["low (number)", "high (number)"],
            "NUMBER",
            fn_randbetween,
        )
        .with_format(first_arg_format),
    )?;

    // ROUND
    registry.add(
        "ROUND",
        FunctionDef::new(
            "Rounds a number according to standard rules.",
            &["value (number)", "places (number, optional, default=0)"],
            "NUMBER",
            fn_round,
        )
        .with_format(first_arg_format),
    )?;

    // ROUNDDOWN
    registry.add(
        "ROUNDDOWN",
        FunctionDef::new(
            "Rounds down a number.",
            &["value (number)", "places (number, optional, default=0)"],
            "NUMBER",
            fn_rounddown,
        )
        .with_format(first_arg_format),
    )?;

    // ROUNDUP
    registry.add(
        "ROUNDUP",
        FunctionDef::new(
            "Rounds up a number.",
            &["value (number)", "places (number, optional, default=0)"],
            "NUMBER",
            fn_roundup,
        )
        .with_format(first_arg_format),
    )?;

    // SEC
    registry.add("SEC", FunctionDef::new("Secant of an angle provided in radians.", &["angle (number)"], "NUMBER", fn_sec))?;

    // SECH
    registry.add("SECH", FunctionDef::new("Hyperbolic secant of any real number.", &["value (number)"], "NUMBER", fn_sech))?;

    // SIGN
    registry.add("SIGN", FunctionDef::new("Sign of a provided number (+/-/0).", &["value (number)"], "NUMBER", fn_sign))?;

    // SIN
    registry.add("SIN", FunctionDef::new("Sine of an angle provided in radians.", &["angle (number)"], "NUMBER", fn_sin))?;

    // SINH
    registry.add("SINH", FunctionDef::new("Hyperbolic sine of any real number.", &["value (number)"], "NUMBER", fn_sinh))?;

    // SQRT
    registry.add(
        "SQRT",
        FunctionDef::new("Positive square root of a positive number.", &["value (number)"], "NUMBER", fn_sqrt)
            .with_format(first_arg_format),
    )?;

    // SUM
    registry.add(
        "SUM",
        FunctionDef::new(
            "Sum of a series of numbers and/or cells.",
            &["value1 (number, range<number>)", "value2 (number, range<number>, repeating, optional)"],
            "NUMBER",
            fn_sum,
        )
        .with_format(first_arg_format),
    )?;

    // SUMIF
    registry.add(
        "SUMIF",
        FunctionDef::new(
            "A conditional sum across a range.",
            &["criteria_range (range)", "criterion (string)", "sum_range (range, optional)"],
            "NUMBER",
            fn_sumif,
        ),
    )?;

    // SUMIFS
    registry.add(
        "SUMIFS",
        FunctionDef::new(
            "Sums a range depending on multiple criteria.",
            &[
                "sum_range (range)",
                "criteria_range1 (range)",
                "criterion1 (string)",
                "criteria_range2 (any, range, repeating)",
                "criterion2 (string, repeating)",
            ],
            "NUMBER",
            fn_sumifs,
        ),
    )?;

    // SUMPRODUCT
    registry.add(
        "SUMPRODUCT",
        FunctionDef::new(
            "Sum of the products of corresponding entries in ranges.",
            &["range1 (range)", "range2 (range, repeating, optional)"],
            "NUMBER",
            fn_sumproduct,
        ),
    )?;

    // SUMSQ
    registry.add(
        "SUMSQ",
        FunctionDef::new(
            "Sum of squares.",
            &["value1 (number, range<number>)", "value2 (number, range<number>, repeating, optional)"],
            "NUMBER",
            fn_sumsq,
        ),
    )?;

    // SUMX2MY2
    registry.add(
        "SUMX2MY2",
        FunctionDef::new(
            "Sum of the differences of squares of two ranges.",
            &["array_x (range)", "array_y (range)"],
            "NUMBER",
            fn_sumx2my2,
        ),
    )?;

    // SUMX2PY2
    registry.add(
        "SUMX2PY2",
        FunctionDef::new(
            "Sum of the sums of squares of two ranges.",
            &["array_x (range)", "array_y (range)"],
            "NUMBER",
            fn_sumx2py2,
        ),
    )?;

    // SUMXMY2
    registry.add(
        "SUMXMY2",
        FunctionDef::new(
            "Sum of the squares of differences of two ranges.",
            &["array_x (range)", "array_y (range)"],
            "NUMBER",
            fn_sumxmy2,
        ),
    )?;

    // TAN
    registry.add("TAN", FunctionDef::new("Tangent of an angle provided in radians.", &["angle (number)"], "NUMBER", fn_tan))?;

    // TANH
    registry.add("TANH", FunctionDef::new("Hyperbolic tangent of any real number.", &["value (number)"], "NUMBER", fn_tanh))?;

    // TRUNC
    registry.add(
        "TRUNC",
        FunctionDef::new(
            "Truncates a number.",
            &["value (number)", "places (number, optional, default=0)"],
            "NUMBER",
            fn_trunc,
        )
        .with_format(first_arg_format),
    )?;

    Ok(())
}

fn number(n: f64) -> EvalResult<Value> {
    Ok(Value::Number(n))
}

fn fn_abs(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.abs())
}

fn fn_acos(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    ensure(value.abs() <= 1.0, || {
        format!("The value ({}) must be between -1 and 1 inclusive.", fmt(value))
    })?;
    number(value.acos())
}

fn fn_acosh(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    ensure(value >= 1.0, || {
        format!("The value ({}) must be greater than or equal to 1.", fmt(value))
    })?;
    number(value.acosh())
}

fn fn_acot(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let sign = if value < 0.0 { -1.0 } else { 1.0 };
    number(sign * PI / 2.0 - value.atan())
}

fn fn_acoth(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    ensure(value.abs() > 1.0, || {
        format!("The value ({}) cannot be between -1 and 1 inclusive.", fmt(value))
    })?;
    number(((value + 1.0) / (value - 1.0)).ln() / 2.0)
}

fn fn_asin(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    ensure(value.abs() <= 1.0, || {
        format!("The value ({}) must be between -1 and 1 inclusive.", fmt(value))
    })?;
    number(value.asin())
}

fn fn_asinh(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.asinh())
}

fn fn_atan(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.atan())
}

fn fn_atan2(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let x = num(args, 0, ctx)?;
    let y = num(args, 1, ctx)?;
    ensure(x != 0.0 || y != 0.0, || {
        "Function [[FUNCTION_NAME]] caused a divide by zero error.".to_string()
    })?;
    number(y.atan2(x))
}

fn fn_atanh(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    ensure(value.abs() < 1.0, || {
        format!("The value ({}) must be between -1 and 1 exclusive.", fmt(value))
    })?;
    number(value.atanh())
}

fn fn_ceiling(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let factor = num_or(args, 1, 1.0, ctx)?;
    ensure(factor >= 0.0 || value <= 0.0, || {
        format!(
            "The factor ({}) must be positive when the value ({}) is positive.",
            fmt(factor),
            fmt(value)
        )
    })?;
    number(if factor == 0.0 { 0.0 } else { (value / factor).ceil() * factor })
}

fn ceiling_math(value: f64, significance: f64, mode: f64) -> f64 {
    if significance == 0.0 {
        return 0.0;
    }
    let significance = significance.abs();
    if value >= 0.0 {
        return (value / significance).ceil() * significance;
    }
    if mode == 0.0 {
        -(value.abs() / significance).floor() * significance
    } else {
        -(value.abs() / significance).ceil() * significance
    }
}

fn floor_math(value: f64, significance: f64, mode: f64) -> f64 {
    if significance == 0.0 {
        return 0.0;
    }
    let significance = significance.abs();
    if value >= 0.0 {
        return (value / significance).floor() * significance;
    }
    if mode == 0.0 {
        -(value.abs() / significance).ceil() * significance
    } else {
        -(value.abs() / significance).floor() * significance
    }
}

fn fn_ceiling_math(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(ceiling_math(
        num(args, 0, ctx)?,
        num_or(args, 1, 1.0, ctx)?,
        num_or(args, 2, 0.0, ctx)?,
    ))
}

fn fn_ceiling_precise(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(ceiling_math(num(args, 0, ctx)?, num_or(args, 1, 1.0, ctx)?, 0.0))
}

fn fn_floor(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let factor = num_or(args, 1, 1.0, ctx)?;
    ensure(factor >= 0.0 || value <= 0.0, || {
        format!(
            "The factor ({}) must be positive when the value ({}) is positive.",
            fmt(factor),
            fmt(value)
        )
    })?;
    number(if factor == 0.0 { 0.0 } else { (value / factor).floor() * factor })
}

fn fn_floor_math(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(floor_math(
        num(args, 0, ctx)?,
        num_or(args, 1, 1.0, ctx)?,
        num_or(args, 2, 0.0, ctx)?,
    ))
}

fn fn_floor_precise(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(floor_math(num(args, 0, ctx)?, num_or(args, 1, 1.0, ctx)?, 0.0))
}

fn fn_cos(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.cos())
}

fn fn_cosh(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.cosh())
}

fn nonzero(value: f64) -> EvalResult<f64> {
    ensure(value != 0.0, || DIVIDE_BY_ZERO.to_string())?;
    Ok(value)
}

fn fn_cot(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let angle = nonzero(num(args, 0, ctx)?)?;
    number(1.0 / angle.tan())
}

fn fn_coth(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = nonzero(num(args, 0, ctx)?)?;
    number(1.0 / value.tanh())
}

fn fn_csc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let angle = nonzero(num(args, 0, ctx)?)?;
    number(1.0 / angle.sin())
}

fn fn_csch(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = nonzero(num(args, 0, ctx)?)?;
    number(1.0 / value.sinh())
}

fn fn_sec(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(1.0 / num(args, 0, ctx)?.cos())
}

fn fn_sech(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(1.0 / num(args, 0, ctx)?.cosh())
}

fn fn_countblank(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut count = 0;
    for a in args {
        visit_any(a, |v| {
            if matches!(v, Value::Empty) || v.as_text() == Some("") {
                count += 1;
            }
        });
    }
    number(count as f64)
}

fn fn_countif(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let criterion = Criterion::new(arg(args, 1), ctx.locale)?;
    let mut count = 0;
    visit_any(arg(args, 0), |v| {
        if criterion.matches(v) {
            count += 1;
        }
    });
    number(count as f64)
}

fn fn_countifs(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut count = 0;
    visit_matching_ranges(args, ctx.locale, |_, _| count += 1)?;
    number(count as f64)
}

fn fn_countunique(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut seen: Vec<Value> = Vec::new();
    for a in args {
        visit_any(a, |v| {
            if !v.is_empty() && v.as_text() != Some("") && !seen.contains(v) {
                seen.push(v.clone());
            }
        });
    }
    number(seen.len() as f64)
}

fn fn_decimal(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = text(args, 0)?;
    let base = num(args, 1, ctx)?.trunc();
    ensure((2.0..=36.0).contains(&base), || {
        format!("The base ({}) must be between 2 and 36 inclusive.", fmt(base))
    })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return number(0.0);
    }
    let parsed = i64::from_str_radix(trimmed, base as u32).ok();
    let Some(n) = parsed else {
        return Err(crate::error::EvaluationError::new(format!(
            "The value ({}) must be a valid base {} representation.",
            trimmed,
            fmt(base)
        ))
        .into());
    };
    number(n as f64)
}

fn fn_degrees(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.to_degrees())
}

fn fn_even(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let mut rounded = value.abs().ceil();
    if rounded % 2.0 != 0.0 {
        rounded += 1.0;
    }
    number(if value < 0.0 { -rounded } else { rounded })
}

fn fn_odd(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let mut rounded = value.abs().ceil();
    if rounded % 2.0 == 0.0 {
        rounded += 1.0;
    }
    number(if value < 0.0 { -rounded } else { rounded })
}

fn fn_exp(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.exp())
}

pub(crate) fn factorial(n: f64) -> f64 {
    (1..=n as u64).fold(1.0, |acc, k| acc * k as f64)
}

fn fn_fact(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?.trunc();
    ensure(value >= 0.0, || {
        format!("The value ({}) must be positive or null.", fmt(value))
    })?;
    number(factorial(value))
}

fn fn_combin(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let n = num(args, 0, ctx)?.trunc();
    let k = num(args, 1, ctx)?.trunc();
    ensure(n >= 0.0, || format!("The n ({}) must be positive or null.", fmt(n)))?;
    ensure(k >= 0.0, || format!("The k ({}) must be positive or null.", fmt(k)))?;
    ensure(n >= k, || {
        format!("The n ({}) must be greater than or equal to k ({}).", fmt(n), fmt(k))
    })?;
    let k = k.min(n - k);
    let result = (0..k as u64).fold(1.0, |acc, i| acc * (n - i as f64) / (i as f64 + 1.0));
    number(result.round())
}

fn integers(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Vec<u64>> {
    let mut values = Vec::new();
    let mut negative = None;
    visit_numbers(args, ctx.locale, |n| {
        if n < 0.0 {
            negative.get_or_insert(n);
        }
        values.push(n.trunc().abs() as u64);
    })?;
    if let Some(n) = negative {
        return Err(crate::error::EvaluationError::new(format!(
            "The values ({}) must be positive or null.",
            fmt(n)
        ))
        .into());
    }
    Ok(values)
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn fn_gcd(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(integers(args, ctx)?.into_iter().fold(0, gcd) as f64)
}

fn fn_lcm(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = integers(args, ctx)?;
    if values.contains(&0) {
        return number(0.0);
    }
    // folded in f64: the product of large arguments does not fit in an integer
    let lcm = values.into_iter().fold(1.0, |acc: f64, v| {
        if !acc.is_finite() {
            return acc;
        }
        let v = v as f64;
        acc / float_gcd(acc, v) * v
    });
    ensure(lcm.is_finite(), || "The least common multiple is too large.".to_string())?;
    number(lcm)
}

fn float_gcd(mut a: f64, mut b: f64) -> f64 {
    while b != 0.0 {
        (a, b) = (b, a % b);
    }
    a
}

fn fn_int(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.floor())
}

fn fn_iseven(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(num(args, 0, ctx)?.trunc() % 2.0 == 0.0))
}

fn fn_isodd(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(num(args, 0, ctx)?.trunc() % 2.0 != 0.0))
}

fn fn_ln(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    ensure(value > 0.0, || format!("The value ({}) must be strictly positive.", fmt(value)))?;
    number(value.ln())
}

fn fn_log(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let base = num_or(args, 1, 10.0, ctx)?;
    ensure(value > 0.0, || format!("The value ({}) must be strictly positive.", fmt(value)))?;
    ensure(base > 0.0, || format!("The base ({}) must be strictly positive.", fmt(base)))?;
    ensure(base != 1.0, || "The base must be different from 1.".to_string())?;
    number(value.ln() / base.ln())
}

fn fn_log10(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    ensure(value > 0.0, || format!("The value ({}) must be strictly positive.", fmt(value)))?;
    number(value.log10())
}

fn fn_mod(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let dividend = num(args, 0, ctx)?;
    let divisor = num(args, 1, ctx)?;
    ensure(divisor != 0.0, || "The divisor must be different from 0.".to_string())?;
    let mut modulus = dividend % divisor;
    if modulus != 0.0 && (modulus < 0.0) != (divisor < 0.0) {
        modulus += divisor;
    }
    number(modulus)
}

fn fn_munit(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let dimension = num(args, 0, ctx)?.trunc();
    ensure(dimension >= 1.0, || "The argument dimension must be positive".to_string())?;
    let n = dimension as usize;
    let matrix: Matrix = (0..n)
        .map(|col| {
            (0..n)
                .map(|row| Value::Number(if col == row { 1.0 } else { 0.0 }))
                .collect()
        })
        .collect();
    Ok(Value::Matrix(matrix))
}

fn fn_pi(_args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(PI)
}

pub(crate) fn fn_power(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let base = num(args, 0, ctx)?;
    let exponent = num(args, 1, ctx)?;
    ensure(base >= 0.0 || exponent.fract() == 0.0, || {
        "The exponent must be an integer when the base is negative.".to_string()
    })?;
    number(base.powf(exponent))
}

fn fn_product(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut count = 0;
    let mut product = 1.0;
    visit_numbers(args, ctx.locale, |n| {
        count += 1;
        product *= n;
    })?;
    number(if count == 0 { 0.0 } else { product })
}

fn fn_quotient(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let dividend = num(args, 0, ctx)?;
    let divisor = num(args, 1, ctx)?;
    ensure(divisor != 0.0, || "The divisor must be different from 0.".to_string())?;
    number((dividend / divisor).trunc())
}

fn fn_radians(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.to_radians())
}

fn fn_rand(_args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(rand::thread_rng().gen::<f64>())
}

fn fn_randarray(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let rows = num_or(args, 0, 1.0, ctx)?.trunc();
    let cols = num_or(args, 1, 1.0, ctx)?.trunc();
    ensure(rows >= 1.0, || format!("The number of rows ({}) must be positive.", fmt(rows)))?;
    ensure(cols >= 1.0, || format!("The number of columns ({}) must be positive.", fmt(cols)))?;
    let mut rng = rand::thread_rng();
    let matrix: Matrix = (0..cols as usize)
        .map(|_| (0..rows as usize).map(|_| Value::Number(rng.gen::<f64>())).collect())
        .collect();
    Ok(Value::Matrix(matrix))
}

fn fn_randbetween(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let low = num(args, 0, ctx)?.ceil();
    let high = num(args, 1, ctx)?.floor();
    ensure(low <= high, || {
        format!(
            "The high ({}) must be greater than or equal to the low ({}).",
            fmt(high),
            fmt(low)
        )
    })?;
    number(rand::thread_rng().gen_range(low as i64..=high as i64) as f64)
}

/// Round half away from zero to `places` decimals (negative places round left of the point)
pub(crate) fn round_to(value: f64, places: f64) -> f64 {
    let places = places.trunc();
    // Decimal rounding sees 2.675 as written instead of as 2.67499999...
    if (0.0..=28.0).contains(&places) {
        let rounded = Decimal::from_f64(value)
            .map(|d| d.round_dp_with_strategy(places as u32, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|d| d.to_f64());
        if let Some(rounded) = rounded {
            return rounded;
        }
    }
    let coef = 10f64.powf(places);
    let rounded = (value.abs() * coef).round() / coef;
    if value >= 0.0 {
        rounded
    } else {
        -rounded
    }
}

fn fn_round(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(round_to(num(args, 0, ctx)?, num_or(args, 1, 0.0, ctx)?))
}

fn fn_rounddown(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let coef = 10f64.powf(num_or(args, 1, 0.0, ctx)?.trunc());
    number((value * coef).trunc() / coef)
}

fn fn_roundup(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let coef = 10f64.powf(num_or(args, 1, 0.0, ctx)?.trunc());
    let rounded = (value.abs() * coef).ceil() / coef;
    number(if value < 0.0 { -rounded } else { rounded })
}

fn fn_trunc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let coef = 10f64.powf(num_or(args, 1, 0.0, ctx)?.trunc());
    number((value * coef).trunc() / coef)
}

fn fn_sign(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    number(if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    })
}

fn fn_sin(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.sin())
}

fn fn_sinh(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.sinh())
}

fn fn_sqrt(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    ensure(value >= 0.0, || format!("The value ({}) must be positive or null.", fmt(value)))?;
    number(value.sqrt())
}

fn fn_tan(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.tan())
}

fn fn_tanh(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(num(args, 0, ctx)?.tanh())
}

pub(crate) fn fn_sum(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(reduce_numbers(args, ctx.locale, 0.0, |acc, n| acc + n)?)
}

fn fn_sumif(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let criteria_range = arg(args, 0);
    let sum_range = if args.len() > 2 { arg(args, 2) } else { criteria_range };
    let mut sum = 0.0;
    visit_matching_ranges(&args[..2.min(args.len())], ctx.locale, |col, row| {
        if let Value::Number(n) = cell_at(sum_range, col, row) {
            sum += n;
        }
    })?;
    number(sum)
}

fn fn_sumifs(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let sum_range = arg(args, 0);
    check_same_dimensions(sum_range, &args[1..])?;
    let mut sum = 0.0;
    visit_matching_ranges(&args[1..], ctx.locale, |col, row| {
        if let Value::Number(n) = cell_at(sum_range, col, row) {
            sum += n;
        }
    })?;
    number(sum)
}

/// The value range of a criteria aggregate must have the shape of its criteria ranges
pub(crate) fn check_same_dimensions(range: &Value, pairs: &[Value]) -> EvalResult<()> {
    if let Some(first) = pairs.first() {
        ensure(range.dimensions() == first.dimensions(), || {
            "Function [[FUNCTION_NAME]] expects criteria_range to have the same dimension".to_string()
        })?;
    }
    Ok(())
}

fn same_shape_pairs(args: &[Value]) -> EvalResult<Vec<(f64, f64)>> {
    let x = arg(args, 0);
    let y = arg(args, 1);
    ensure(x.dimensions() == y.dimensions(), || {
        "[[FUNCTION_NAME]] has mismatched range sizes.".to_string()
    })?;
    let (cols, rows) = x.dimensions();
    let mut pairs = Vec::new();
    for col in 0..cols {
        for row in 0..rows {
            if let (Value::Number(a), Value::Number(b)) = (cell_at(x, col, row), cell_at(y, col, row)) {
                pairs.push((a, b));
            }
        }
    }
    Ok(pairs)
}

fn fn_sumproduct(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let dimensions = arg(args, 0).dimensions();
    for a in args {
        ensure(a.dimensions() == dimensions, || {
            "[[FUNCTION_NAME]] has mismatched range sizes.".to_string()
        })?;
    }
    let (cols, rows) = dimensions;
    let mut sum = 0.0;
    for col in 0..cols {
        for row in 0..rows {
            let mut product = 1.0;
            for a in args {
                product *= cell_at(a, col, row).as_number().unwrap_or(0.0);
            }
            sum += product;
        }
    }
    number(sum)
}

fn fn_sumsq(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(reduce_numbers(args, ctx.locale, 0.0, |acc, n| acc + n * n)?)
}

fn fn_sumx2my2(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(same_shape_pairs(args)?.iter().map(|(x, y)| x * x - y * y).sum())
}

fn fn_sumx2py2(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(same_shape_pairs(args)?.iter().map(|(x, y)| x * x + y * y).sum())
}

fn fn_sumxmy2(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(same_shape_pairs(args)?.iter().map(|(x, y)| (x - y).powi(2)).sum())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sum_and_product() {
        assert_eq!(eval_number("=SUM(1,2,3)"), 6.0);
        assert_eq!(eval_number("=PRODUCT(2,3)"), 6.0);
        let mut grid = Grid::new(&[
            ("A1", Value::Number(1.0)),
            ("A2", Value::from("text")),
            ("A3", Value::Number(2.0)),
        ]);
        assert_eq!(eval_in("=SUM(A1:A3)", &mut grid), Value::Number(3.0));
    }

    #[test]
    fn test_visit_numbers_skips_text_read_through_references_only() {
        let mut grid = Grid::new(&[("A1", Value::Number(1.0)), ("A2", Value::from("text"))]);
        // a single-cell reference to a range parameter is read as a 1x1 range
        assert_eq!(eval_in("=SUM(A2)", &mut grid), Value::Number(0.0));
        assert_eq!(eval_in("=SUM(A1, A2)", &mut grid), Value::Number(1.0));
        // the same text given directly is coerced and fails
        assert!(eval_in("=SUM(\"text\")", &mut grid).is_error());
        assert!(eval_in("=SUM(A1, \"text\")", &mut grid).is_error());
        assert!(eval_in("=SUM(A2&\"\")", &mut grid).is_error());
        // numeric text given directly is coerced
        assert_eq!(eval_in("=SUM(A1, \"2\")", &mut grid), Value::Number(3.0));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(eval_number("=ROUND(2.5)"), 3.0);
        assert_eq!(eval_number("=ROUND(-2.5)"), -3.0);
        assert_eq!(eval_number("=ROUND(1234.5678, -2)"), 1200.0);
        assert_eq!(eval_number("=ROUND(1.005, 1)"), 1.0);
        assert_eq!(eval_number("=ROUND(2.675, 2)"), 2.68);
        assert_eq!(eval_number("=ROUND(1.005, 2)"), 1.01);
        assert_eq!(eval_number("=ROUNDUP(1.21, 1)"), 1.3);
        assert_eq!(eval_number("=ROUNDDOWN(-1.29, 1)"), -1.2);
        assert_eq!(eval_number("=TRUNC(-8.9)"), -8.0);
        assert_eq!(eval_number("=INT(-8.9)"), -9.0);
        assert_eq!(eval_number("=EVEN(3)"), 4.0);
        assert_eq!(eval_number("=ODD(-2)"), -3.0);
    }

    #[test]
    fn test_ceiling_and_floor() {
        assert_eq!(eval_number("=CEILING(4.2, 2)"), 6.0);
        assert_eq!(eval_number("=FLOOR(4.8, 2)"), 4.0);
        assert_eq!(eval_number("=CEILING.MATH(-4.5, 2)"), -4.0);
        assert_eq!(eval_number("=CEILING.MATH(-4.5, 2, 1)"), -6.0);
        assert_eq!(eval_number("=FLOOR.MATH(-4.5, 2)"), -6.0);
        assert!(eval_error("=CEILING(4, -1)").contains("must be positive"));
    }

    #[test]
    fn test_mod_and_quotient() {
        assert_eq!(eval_number("=MOD(-3, 2)"), 1.0);
        assert_eq!(eval_number("=MOD(3, -2)"), -1.0);
        assert_eq!(eval_number("=QUOTIENT(-7, 2)"), -3.0);
        assert_eq!(eval_error("=MOD(1, 0)"), "The divisor must be different from 0.");
    }

    #[test]
    fn test_domain_errors() {
        assert!(eval("=SQRT(-1)").is_error());
        assert!(eval("=LN(0)").is_error());
        assert!(eval("=ACOS(2)").is_error());
        assert!(eval("=POWER(-8, 0.5)").is_error());
        assert_eq!(eval_number("=POWER(-2, 3)"), -8.0);
    }

    #[test]
    fn test_integer_math() {
        assert_eq!(eval_number("=FACT(5)"), 120.0);
        assert_eq!(eval_number("=COMBIN(5, 2)"), 10.0);
        assert_eq!(eval_number("=GCD(12, 18)"), 6.0);
        assert_eq!(eval_number("=LCM(4, 6)"), 12.0);
        assert_eq!(eval_number("=LCM(1E15, 1E15-1)"), 1e15 * (1e15 - 1.0));
        assert_eq!(eval_number("=LCM(1E300, 7)"), 7.0 * 2f64.powi(64));
        assert_eq!(eval_number("=DECIMAL(\"ff\", 16)"), 255.0);
    }

    #[test]
    fn test_conditional_sums() {
        let mut grid = Grid::new(&[
            ("A1", Value::from("apple")),
            ("A2", Value::from("banana")),
            ("A3", Value::from("apricot")),
            ("B1", Value::Number(1.0)),
            ("B2", Value::Number(2.0)),
            ("B3", Value::Number(3.0)),
        ]);
        assert_eq!(eval_in("=SUMIF(A1:A3, \"a*\", B1:B3)", &mut grid), Value::Number(4.0));
        assert_eq!(eval_in("=SUMIF(B1:B3, \">1\")", &mut grid), Value::Number(5.0));
        assert_eq!(
            eval_in("=SUMIFS(B1:B3, A1:A3, \"a*\", B1:B3, \">1\")", &mut grid),
            Value::Number(3.0)
        );
        assert_eq!(eval_in("=COUNTIF(A1:A3, \"*an*\")", &mut grid), Value::Number(1.0));
        assert_eq!(eval_in("=COUNTIFS(A1:A3, \"a*\")", &mut grid), Value::Number(2.0));
        assert_eq!(eval_in("=COUNTBLANK(A1:A4)", &mut grid), Value::Number(1.0));
        assert_eq!(eval_in("=SUMPRODUCT(B1:B3, B1:B3)", &mut grid), Value::Number(14.0));
        assert_eq!(eval_in("=COUNTUNIQUE(A1:A3, \"apple\")", &mut grid), Value::Number(3.0));
    }

    #[test]
    fn test_munit() {
        assert_eq!(
            eval("=MUNIT(2)"),
            Value::Matrix(vec![
                vec![Value::Number(1.0), Value::Number(0.0)],
                vec![Value::Number(0.0), Value::Number(1.0)],
            ])
        );
    }
}
