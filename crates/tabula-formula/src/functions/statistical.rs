//! Statistical functions

use super::math::check_same_dimensions;
use super::{arg, first_arg_format, num, num_or};
use crate::coercion::{is_number, number_to_text as fmt, to_number};
use crate::context::EvalContext;
use crate::criteria::{cell_at, visit_matching_ranges};
use crate::error::{EvalResult, EvaluationError, RegistrationError};
use crate::helpers::{collect_numbers, ensure, flatten, reduce_args, sorted_insert, visit_any};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::Value;
use tabula_core::datetime::parse_date_time;
use tabula_core::Locale;

const DIVIDE_BY_ZERO: &str = "Evaluation of function [[FUNCTION_NAME]] caused a divide by zero error.";
const NO_VALID_INPUT: &str = "[[FUNCTION_NAME]] has no valid input data.";
const RANGE_ERROR: &str = "[[FUNCTION_NAME]] has mismatched range sizes.";

const VALUES: &[&str] = &[
    "value1 (number, range<number>)",
    "value2 (number, range<number>, repeating)",
];
const ANY_VALUES: &[&str] = &["value1 (any, range)", "value2 (any, range, repeating)"];
const DATA_N: &[&str] = &["data (any, range)", "n (number)"];
const DATA_PERCENTILE: &[&str] = &["data (any, range)", "percentile (number)"];
const DATA_QUARTILE: &[&str] = &["data (any, range)", "quartile_number (number)"];
const DATA_YX: &[&str] = &["data_y (any, range)", "data_x (any, range)"];
const CRITERIA_AGGREGATE: &[&str] = &[
    "range (range)",
    "criteria_range1 (range)",
    "criterion1 (string)",
    "criteria_range2 (any, range, repeating)",
    "criterion2 (string, repeating)",
];

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // AVEDEV
    registry.add("AVEDEV", FunctionDef::new("Average magnitude of deviations from mean.", VALUES, "NUMBER", fn_avedev))?;

    // AVERAGE
    registry.add(
        "AVERAGE",
        FunctionDef::new("Numerical average value in a dataset, ignoring text.", VALUES, "NUMBER", fn_average)
            .with_format(first_arg_format),
    )?;

    // AVERAGE.WEIGHTED
    registry.add(
        "AVERAGE_WEIGHTED",
        FunctionDef::new(
            "Weighted average.",
            &[
                "values (number, range<number>)",
                "weights (number, range<number>)",
                "additional_values (number, range<number>, repeating)",
                "additional_weights (number, range<number>, repeating)",
            ],
            "NUMBER",
            fn_average_weighted,
        )
        .with_format(first_arg_format),
    )?;

    // AVERAGEA
    registry.add(
        "AVERAGEA",
        FunctionDef::new("Numerical average value in a dataset.", VALUES, "NUMBER", fn_averagea)
            .with_format(first_arg_format),
    )?;

    // AVERAGEIF
    registry.add(
        "AVERAGEIF",
        FunctionDef::new(
            "Average of values depending on criteria.",
            &["criteria_range (range)", "criterion (string)", "average_range (range, optional)"],
            "NUMBER",
            fn_averageif,
        ),
    )?;

    // AVERAGEIFS
    registry.add(
        "AVERAGEIFS",
        FunctionDef::new(
            "Average of values depending on multiple criteria.",
            &[
                "average_range (range)",
                "criteria_range1 (range)",
                "criterion1 (string)",
                "criteria_range2 (any, range, repeating)",
                "criterion2 (string, repeating)",
            ],
            "NUMBER",
            fn_averageifs,
        ),
    )?;

    // CORREL
    registry.add("CORREL", FunctionDef::new("Pearson correlation coefficient of a dataset.", DATA_YX, "NUMBER", fn_correl))?;

    // COUNT
    registry.add("COUNT", FunctionDef::new("The number of numeric values in dataset.", VALUES, "NUMBER", fn_count))?;

    // COUNTA
    registry.add("COUNTA", FunctionDef::new("The number of values in a dataset.", ANY_VALUES, "NUMBER", fn_counta))?;

    // COVAR
    registry.add("COVAR", FunctionDef::new("The covariance of a dataset.", DATA_YX, "NUMBER", fn_covariance_p))?;

    // COVARIANCE.P
    registry.add("COVARIANCE_P", FunctionDef::new("The covariance of a dataset.", DATA_YX, "NUMBER", fn_covariance_p))?;

    // COVARIANCE.S
    registry.add("COVARIANCE_S", FunctionDef::new("The sample covariance of a dataset.", DATA_YX, "NUMBER", fn_covariance_s))?;

    // INTERCEPT
    registry.add(
        "INTERCEPT",
        FunctionDef::new("Y-intercept of the linear regression line of a dataset.", DATA_YX, "NUMBER", fn_intercept),
    )?;

    // LARGE
    registry.add(
        "LARGE",
        FunctionDef::new("Nth largest element from a data set.", DATA_N, "NUMBER", fn_large).with_format(first_arg_format),
    )?;

    // MAX
    registry.add(
        "MAX",
        FunctionDef::new("Maximum value in a numeric dataset.", VALUES, "NUMBER", fn_max).with_format(first_arg_format),
    )?;

    // MAXA
    registry.add(
        "MAXA",
        FunctionDef::new("Maximum numeric value in a dataset.", ANY_VALUES, "NUMBER", fn_maxa).with_format(first_arg_format),
    )?;

    // MAXIFS
    registry.add(
        "MAXIFS",
        FunctionDef::new(
            "Returns the maximum value in a range of cells, filtered by a set of criteria.",
            CRITERIA_AGGREGATE,
            "NUMBER",
            fn_maxifs,
        ),
    )?;

    // MEDIAN
    registry.add(
        "MEDIAN",
        FunctionDef::new("Median value in a numeric dataset.", ANY_VALUES, "NUMBER", fn_median).with_format(first_arg_format),
    )?;

    // MIN
    registry.add(
        "MIN",
        FunctionDef::new("Minimum value in a numeric dataset.", VALUES, "NUMBER", fn_min).with_format(first_arg_format),
    )?;

    // MINA
    registry.add(
        "MINA",
        FunctionDef::new("Minimum numeric value in a dataset.", VALUES, "NUMBER", fn_mina).with_format(first_arg_format),
    )?;

    // MINIFS
    registry.add(
        "MINIFS",
        FunctionDef::new(
            "Returns the minimum value in a range of cells, filtered by a set of criteria.",
            CRITERIA_AGGREGATE,
            "NUMBER",
            fn_minifs,
        ),
    )?;

    // MODE
    registry.add(
        "MODE",
        FunctionDef::new("Most commonly occurring value in a dataset.", VALUES, "NUMBER", fn_mode).with_format(first_arg_format),
    )?;

    // PEARSON
    registry.add("PEARSON", FunctionDef::new("Pearson correlation coefficient of a dataset.", DATA_YX, "NUMBER", fn_correl))?;

    // PERCENTILE
    registry.add(
        "PERCENTILE",
        FunctionDef::new("Value at a given percentile of a dataset.", DATA_PERCENTILE, "NUMBER", fn_percentile_inc)
            .with_format(first_arg_format),
    )?;

    // PERCENTILE.EXC
    registry.add(
        "PERCENTILE_EXC",
        FunctionDef::new(
            "Value at a given percentile of a dataset exclusive of 0 and 1.",
            DATA_PERCENTILE,
            "NUMBER",
            fn_percentile_exc,
        )
        .with_format(first_arg_format),
    )?;

    // PERCENTILE.INC
    registry.add(
        "PERCENTILE_INC",
        FunctionDef::new("Value at a given percentile of a dataset.", DATA_PERCENTILE, "NUMBER", fn_percentile_inc)
            .with_format(first_arg_format),
    )?;

    // QUARTILE
    registry.add(
        "QUARTILE",
        FunctionDef::new("Value nearest to a specific quartile of a dataset.", DATA_QUARTILE, "NUMBER", fn_quartile_inc)
            .with_format(first_arg_format),
    )?;

    // QUARTILE.EXC
    registry.add(
        "QUARTILE_EXC",
        FunctionDef::new(
            "Value nearest to a specific quartile of a dataset exclusive of 0 and 4.",
            DATA_QUARTILE,
            "NUMBER",
            fn_quartile_exc,
        )
        .with_format(first_arg_format),
    )?;

    // QUARTILE.INC
    registry.add(
        "QUARTILE_INC",
        FunctionDef::new("Value nearest to a specific quartile of a dataset.", DATA_QUARTILE, "NUMBER", fn_quartile_inc)
            .with_format(first_arg_format),
    )?;

    // RANK
    registry.add(
        "RANK",
        FunctionDef::new(
            "Rank of a specified value in a dataset.",
            &["value (number)", "data (range)", "is_ascending (boolean, optional, default=FALSE)"],
            "NUMBER",
            fn_rank,
        ),
    )?;

    // RSQ
    registry.add(
        "RSQ",
        FunctionDef::new("Square of the correlation coefficient of a dataset.", DATA_YX, "NUMBER", fn_rsq),
    )?;

    // SLOPE
    registry.add("SLOPE", FunctionDef::new("Slope of the linear regression line of a dataset.", DATA_YX, "NUMBER", fn_slope))?;

    // SMALL
    registry.add(
        "SMALL",
        FunctionDef::new("Nth smallest element in a data set.", DATA_N, "NUMBER", fn_small).with_format(first_arg_format),
    )?;

    // STDEV
    registry.add("STDEV", FunctionDef::new("Standard deviation.", VALUES, "NUMBER", fn_stdev_s))?;

    // STDEV.P
    registry.add("STDEV_P", FunctionDef::new("Standard deviation of entire population.", VALUES, "NUMBER", fn_stdev_p))?;

    // STDEV.S
    registry.add("STDEV_S", FunctionDef::new("Standard deviation.", VALUES, "NUMBER", fn_stdev_s))?;

    // STDEVA
    registry.add("STDEVA", FunctionDef::new("Standard deviation of sample (text as 0).", VALUES, "NUMBER", fn_stdeva))?;

    // STDEVP
    registry.add("STDEVP", FunctionDef::new("Standard deviation of entire population.", VALUES, "NUMBER", fn_stdev_p))?;

    // STDEVPA
    registry.add(
        "STDEVPA",
        FunctionDef::new("Standard deviation of entire population (text as 0).", VALUES, "NUMBER", fn_stdevpa),
    )?;

    // VAR
    registry.add("VAR", FunctionDef::new("Variance.", VALUES, "NUMBER", fn_var_s))?;

    // VAR.P
    registry.add("VAR_P", FunctionDef::new("Variance of entire population.", VALUES, "NUMBER", fn_var_p))?;

    // VAR.S
    registry.add("VAR_S", FunctionDef::new("Variance.", VALUES, "NUMBER", fn_var_s))?;

    // VARA
    registry.add("VARA", FunctionDef::new("Variance of sample (text as 0).", VALUES, "NUMBER", fn_vara))?;

    // VARP
    registry.add("VARP", FunctionDef::new("Variance of entire population.", VALUES, "NUMBER", fn_var_p))?;

    // VARPA
    registry.add("VARPA", FunctionDef::new("Variance of entire population (text as 0).", VALUES, "NUMBER", fn_varpa))?;

    Ok(())
}

fn number(n: f64) -> EvalResult<Value> {
    Ok(Value::Number(n))
}

/// Numbers with text counted as 0 and booleans as 0/1, in ranges and scalars alike
fn numbers_text_as_zero(args: &[Value], locale: &Locale) -> EvalResult<Vec<f64>> {
    let mut out = Vec::new();
    for a in args {
        let mut failure = None;
        visit_any(a, |v| match v {
            Value::Empty => {}
            Value::Number(n) => out.push(*n),
            Value::Boolean(_) => match to_number(v, locale) {
                Ok(n) => out.push(n),
                Err(e) => failure = Some(e),
            },
            _ => out.push(0.0),
        });
        if let Some(e) = failure {
            return Err(e);
        }
    }
    Ok(out)
}

pub(crate) fn average_of(values: &[f64]) -> EvalResult<f64> {
    ensure(!values.is_empty(), || DIVIDE_BY_ZERO.to_string())?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn variance(values: &[f64], is_sample: bool) -> EvalResult<f64> {
    let count = values.len();
    ensure(count != 0 && (!is_sample || count != 1), || DIVIDE_BY_ZERO.to_string())?;
    let average = values.iter().sum::<f64>() / count as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - average).powi(2)).sum();
    Ok(sum_sq / (count - usize::from(is_sample)) as f64)
}

fn fn_avedev(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = collect_numbers(args, ctx.locale)?;
    let average = average_of(&values)?;
    number(values.iter().map(|v| (average - v).abs()).sum::<f64>() / values.len() as f64)
}

fn fn_average(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(average_of(&collect_numbers(args, ctx.locale)?)?)
}

fn fn_averagea(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(average_of(&numbers_text_as_zero(args, ctx.locale)?)?)
}

fn fn_average_weighted(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    ensure(args.len() % 2 == 0, || {
        "Wrong number of Argument[]. Expected an even number of Argument[].".to_string()
    })?;
    let negative_weight = || "[[FUNCTION_NAME]] expects the weight to be positive or equal to 0.".to_string();
    let mut sum = 0.0;
    let mut count = 0.0;
    for pair in args.chunks(2) {
        let (value, weight) = (&pair[0], &pair[1]);
        if value.is_matrix() {
            ensure(weight.is_matrix() && weight.dimensions() == value.dimensions(), || RANGE_ERROR.to_string())?;
            let (cols, rows) = value.dimensions();
            for col in 0..cols {
                for row in 0..rows {
                    let sub_value = cell_at(value, col, row).as_number();
                    let sub_weight = cell_at(weight, col, row).as_number();
                    ensure(sub_value.is_some() == sub_weight.is_some(), || {
                        "[[FUNCTION_NAME]] expects number values.".to_string()
                    })?;
                    if let (Some(v), Some(w)) = (sub_value, sub_weight) {
                        ensure(w >= 0.0, negative_weight)?;
                        sum += v * w;
                        count += w;
                    }
                }
            }
        } else {
            let w = to_number(weight, ctx.locale)?;
            let v = to_number(value, ctx.locale)?;
            ensure(w >= 0.0, negative_weight)?;
            sum += v * w;
            count += w;
        }
    }
    ensure(count != 0.0, || DIVIDE_BY_ZERO.to_string())?;
    number(sum / count)
}

fn matching_values(range: &Value, pairs: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Vec<f64>> {
    check_same_dimensions(range, pairs)?;
    let mut values = Vec::new();
    visit_matching_ranges(pairs, ctx.locale, |col, row| {
        if let Value::Number(n) = cell_at(range, col, row) {
            values.push(n);
        }
    })?;
    Ok(values)
}

fn fn_averageif(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let criteria_range = arg(args, 0);
    let average_range = if args.len() > 2 { arg(args, 2) } else { criteria_range };
    let values = matching_values(average_range, &args[..2.min(args.len())], ctx)?;
    number(average_of(&values)?)
}

fn fn_averageifs(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = matching_values(arg(args, 0), &args[1..], ctx)?;
    number(average_of(&values)?)
}

fn fn_maxifs(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = matching_values(arg(args, 0), &args[1..], ctx)?;
    number(values.into_iter().reduce(f64::max).unwrap_or(0.0))
}

fn fn_minifs(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = matching_values(arg(args, 0), &args[1..], ctx)?;
    number(values.into_iter().reduce(f64::min).unwrap_or(0.0))
}

fn fn_count(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut count = 0;
    for a in args {
        match a {
            Value::Matrix(m) => {
                count += m.iter().flatten().filter(|v| matches!(v, Value::Number(_))).count();
            }
            Value::Text(s) => {
                if is_number(s, ctx.locale) || parse_date_time(s, ctx.locale).is_some() {
                    count += 1;
                }
            }
            Value::Number(_) | Value::Boolean(_) => count += 1,
            _ => {}
        }
    }
    number(count as f64)
}

fn fn_counta(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let count = reduce_args(args, 0usize, |acc, v| if v.is_empty() { acc } else { acc + 1 });
    number(count as f64)
}

/// Pairs of numbers at the same position in two datasets of the same size
fn paired_numbers(args: &[Value]) -> EvalResult<Vec<(f64, f64)>> {
    let ys = flatten(arg(args, 0));
    let xs = flatten(arg(args, 1));
    ensure(ys.len() == xs.len(), || {
        format!(
            "[[FUNCTION_NAME]] has mismatched argument count {} vs {}.",
            ys.len(),
            xs.len()
        )
    })?;
    Ok(ys
        .iter()
        .zip(xs.iter())
        .filter_map(|(y, x)| Some((y.as_number()?, x.as_number()?)))
        .collect())
}

fn covariance(args: &[Value], is_sample: bool) -> EvalResult<f64> {
    let pairs = paired_numbers(args)?;
    let count = pairs.len();
    ensure(count != 0 && (!is_sample || count != 1), || DIVIDE_BY_ZERO.to_string())?;
    let average_y = pairs.iter().map(|p| p.0).sum::<f64>() / count as f64;
    let average_x = pairs.iter().map(|p| p.1).sum::<f64>() / count as f64;
    let acc: f64 = pairs
        .iter()
        .map(|(y, x)| (y - average_y) * (x - average_x))
        .sum();
    Ok(acc / (count - usize::from(is_sample)) as f64)
}

fn fn_covariance_p(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(covariance(args, false)?)
}

fn fn_covariance_s(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(covariance(args, true)?)
}

/// `(slope, intercept, correlation)` of the least squares line through the pairs
fn regression(args: &[Value]) -> EvalResult<(f64, f64, f64)> {
    let pairs = paired_numbers(args)?;
    ensure(!pairs.is_empty(), || NO_VALID_INPUT.to_string())?;
    let n = pairs.len() as f64;
    let mean_y = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_x = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (y, x) in &pairs {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x).powi(2);
        syy += (y - mean_y).powi(2);
    }
    ensure(sxx != 0.0, || DIVIDE_BY_ZERO.to_string())?;
    let slope = sxy / sxx;
    let correlation = if syy == 0.0 { 0.0 } else { sxy / (sxx * syy).sqrt() };
    Ok((slope, mean_y - slope * mean_x, correlation))
}

fn fn_correl(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let pairs = paired_numbers(args)?;
    let ys: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    ensure(variance(&ys, false)? != 0.0, || DIVIDE_BY_ZERO.to_string())?;
    number(regression(args)?.2)
}

fn fn_rsq(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let r = fn_correl(args, ctx)?.as_number().unwrap_or(0.0);
    number(r * r)
}

fn fn_slope(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(regression(args)?.0)
}

fn fn_intercept(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(regression(args)?.1)
}

/// Numbers of a dataset, sorted ascending by dichotomic insertion
fn sorted_numbers(data: &Value) -> Vec<f64> {
    let mut sorted = Vec::new();
    visit_any(data, |v| {
        if let Value::Number(n) = v {
            sorted_insert(&mut sorted, *n);
        }
    });
    sorted
}

fn nth(data: &Value, n: f64, from_largest: bool) -> EvalResult<f64> {
    let sorted = sorted_numbers(data);
    ensure(!sorted.is_empty(), || NO_VALID_INPUT.to_string())?;
    let n = n.trunc();
    ensure(n >= 1.0 && n as usize <= sorted.len(), || {
        format!("Function [[FUNCTION_NAME]] parameter 2 value ({}) is out of range.", fmt(n))
    })?;
    let index = n as usize - 1;
    Ok(if from_largest {
        sorted[sorted.len() - 1 - index]
    } else {
        sorted[index]
    })
}

fn fn_large(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(nth(arg(args, 0), num(args, 1, ctx)?, true)?)
}

fn fn_small(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(nth(arg(args, 0), num(args, 1, ctx)?, false)?)
}

fn fn_max(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(collect_numbers(args, ctx.locale)?.into_iter().reduce(f64::max).unwrap_or(0.0))
}

fn fn_min(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(collect_numbers(args, ctx.locale)?.into_iter().reduce(f64::min).unwrap_or(0.0))
}

fn fn_maxa(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(numbers_text_as_zero(args, ctx.locale)?.into_iter().reduce(f64::max).unwrap_or(0.0))
}

fn fn_mina(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(numbers_text_as_zero(args, ctx.locale)?.into_iter().reduce(f64::min).unwrap_or(0.0))
}

/// Interpolated percentile of an ascending list
pub(crate) fn percentile(sorted: &[f64], percent: f64, inclusive: bool) -> f64 {
    let len = sorted.len() as f64;
    let mut index = (len + if inclusive { -1.0 } else { 1.0 }) * percent;
    if !inclusive {
        index -= 1.0;
    }
    if index.fract() == 0.0 {
        return sorted[index as usize];
    }
    let sup = index.ceil();
    let low = index.floor();
    sorted[sup as usize] * (index - low) + sorted[low as usize] * (sup - index)
}

fn centile(data: &Value, percent: f64, inclusive: bool) -> EvalResult<f64> {
    let out_of_range = || "Function [[FUNCTION_NAME]] parameter 2 value is out of range.".to_string();
    let in_bounds = if inclusive {
        (0.0..=1.0).contains(&percent)
    } else {
        percent > 0.0 && percent < 1.0
    };
    ensure(in_bounds, out_of_range)?;
    let sorted = sorted_numbers(data);
    ensure(!sorted.is_empty(), || NO_VALID_INPUT.to_string())?;
    if !inclusive {
        let count = sorted.len() as f64;
        ensure(
            1.0 / (count + 1.0) <= percent && percent <= count / (count + 1.0),
            out_of_range,
        )?;
    }
    Ok(percentile(&sorted, percent, inclusive))
}

fn fn_median(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = collect_numbers(args, ctx.locale)?;
    let data = Value::Matrix(vec![values.into_iter().map(Value::Number).collect()]);
    number(centile(&data, 0.5, true)?)
}

fn fn_percentile_inc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(centile(arg(args, 0), num(args, 1, ctx)?, true)?)
}

fn fn_percentile_exc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(centile(arg(args, 0), num(args, 1, ctx)?, false)?)
}

fn fn_quartile_inc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let quartile = num(args, 1, ctx)?.trunc();
    number(centile(arg(args, 0), 0.25 * quartile, true)?)
}

fn fn_quartile_exc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let quartile = num(args, 1, ctx)?.trunc();
    number(centile(arg(args, 0), 0.25 * quartile, false)?)
}

fn fn_mode(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let values = collect_numbers(args, ctx.locale)?;
    let mut best: Option<(f64, usize)> = None;
    for (i, v) in values.iter().enumerate() {
        let occurrences = values[i..].iter().filter(|w| *w == v).count();
        let first_time = !values[..i].contains(v);
        if first_time && occurrences > 1 && best.map_or(true, |(_, c)| occurrences > c) {
            best = Some((*v, occurrences));
        }
    }
    match best {
        Some((v, _)) => number(v),
        None => Err(EvaluationError::not_available("[[FUNCTION_NAME]] found no repeated value.").into()),
    }
}

fn fn_rank(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let value = num(args, 0, ctx)?;
    let ascending = num_or(args, 2, 0.0, ctx)? != 0.0;
    let sorted = sorted_numbers(arg(args, 1));
    ensure(!sorted.is_empty(), || NO_VALID_INPUT.to_string())?;
    let position = if ascending {
        sorted.iter().position(|v| *v == value)
    } else {
        sorted.iter().rev().position(|v| *v == value)
    };
    match position {
        Some(p) => number(p as f64 + 1.0),
        None => Err(EvaluationError::not_available(format!(
            "[[FUNCTION_NAME]] could not find {} in the data.",
            fmt(value)
        ))
        .into()),
    }
}

fn fn_var_s(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&collect_numbers(args, ctx.locale)?, true)?)
}

fn fn_var_p(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&collect_numbers(args, ctx.locale)?, false)?)
}

fn fn_vara(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&numbers_text_as_zero(args, ctx.locale)?, true)?)
}

fn fn_varpa(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&numbers_text_as_zero(args, ctx.locale)?, false)?)
}

fn fn_stdev_s(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&collect_numbers(args, ctx.locale)?, true)?.sqrt())
}

fn fn_stdev_p(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&collect_numbers(args, ctx.locale)?, false)?.sqrt())
}

fn fn_stdeva(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&numbers_text_as_zero(args, ctx.locale)?, true)?.sqrt())
}

fn fn_stdevpa(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(variance(&numbers_text_as_zero(args, ctx.locale)?, false)?.sqrt())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn grid() -> Grid {
        Grid::new(&[
            ("A1", Value::Number(5.0)),
            ("A2", Value::Number(3.0)),
            ("A3", Value::Number(9.0)),
            ("A4", Value::Number(1.0)),
            ("A5", Value::from("skip")),
        ])
    }

    #[test]
    fn test_order_statistics() {
        let mut g = grid();
        assert_eq!(eval_in("=LARGE(A1:A5, 1)", &mut g), Value::Number(9.0));
        assert_eq!(eval_in("=LARGE(A1:A5, 2)", &mut g), Value::Number(5.0));
        assert_eq!(eval_in("=SMALL(A1:A5, 1)", &mut g), Value::Number(1.0));
        assert_eq!(eval_number("=MEDIAN(1, 2, 3, 4)"), 2.5);
        assert_eq!(eval_in("=MEDIAN(A1:A5)", &mut g), Value::Number(4.0));
        assert!(eval_in("=LARGE(A1:A5, 5)", &mut g).is_error());
    }

    #[test]
    fn test_percentiles() {
        let mut g = grid();
        assert_eq!(eval_in("=PERCENTILE(A1:A4, 0.5)", &mut g), Value::Number(4.0));
        assert_eq!(eval_in("=QUARTILE(A1:A4, 1)", &mut g), Value::Number(2.5));
        assert_eq!(eval_in("=PERCENTILE.INC(A1:A4, 1)", &mut g), Value::Number(9.0));
        assert!(eval_in("=PERCENTILE.EXC(A1:A4, 0.1)", &mut g).is_error());
        assert_eq!(eval_in("=PERCENTILE.EXC(A1:A4, 0.4)", &mut g), Value::Number(3.0));
        assert!(eval_in("=PERCENTILE.INC(A1:A4, 1.5)", &mut g).is_error());
    }

    #[test]
    fn test_averages_and_counts() {
        let mut g = grid();
        assert_eq!(eval_in("=AVERAGE(A1:A5)", &mut g), Value::Number(4.5));
        assert_eq!(eval_in("=AVERAGEA(A1:A5)", &mut g), Value::Number(3.6));
        assert_eq!(eval_in("=COUNT(A1:A5, \"12\", \"x\", TRUE)", &mut g), Value::Number(6.0));
        assert_eq!(eval_in("=COUNTA(A1:A6)", &mut g), Value::Number(5.0));
        assert_eq!(eval_in("=MAX(A1:A5)", &mut g), Value::Number(9.0));
        assert_eq!(eval_in("=MIN(A5)", &mut g), Value::Number(0.0));
        assert!(eval_in("=MIN(\"skip\")", &mut g).is_error());
        assert_eq!(eval_in("=MAX(A6:A7)", &mut g), Value::Number(0.0));
        assert_eq!(eval_error("=AVERAGE(A6:A7)"), "Evaluation of function AVERAGE caused a divide by zero error.");
    }

    #[test]
    fn test_variance_family() {
        assert_eq!(eval_number("=VAR(2, 4, 4, 4, 5, 5, 7, 9)"), 32.0 / 7.0);
        assert_eq!(eval_number("=VAR.P(2, 4, 4, 4, 5, 5, 7, 9)"), 4.0);
        assert_eq!(eval_number("=STDEV.P(2, 4, 4, 4, 5, 5, 7, 9)"), 2.0);
        assert!(eval("=VAR.S(1)").is_error());
        assert_eq!(eval_number("=AVEDEV(1, 2, 3)"), 2.0 / 3.0);
    }

    #[test]
    fn test_regression() {
        let mut g = Grid::new(&[
            ("A1", Value::Number(1.0)),
            ("A2", Value::Number(2.0)),
            ("A3", Value::Number(3.0)),
            ("B1", Value::Number(2.0)),
            ("B2", Value::Number(4.0)),
            ("B3", Value::Number(6.0)),
        ]);
        assert_eq!(eval_in("=SLOPE(B1:B3, A1:A3)", &mut g), Value::Number(2.0));
        assert_eq!(eval_in("=INTERCEPT(B1:B3, A1:A3)", &mut g), Value::Number(0.0));
        match eval_in("=CORREL(B1:B3, A1:A3)", &mut g) {
            Value::Number(n) => assert_close(n, 1.0, 1e-12),
            other => panic!("{:?}", other),
        }
        assert_eq!(eval_in("=COVARIANCE.P(B1:B3, A1:A3)", &mut g), Value::Number(4.0 / 3.0));
        assert!(eval_in("=COVAR(B1:B3, A1:A2)", &mut g).is_error());
    }

    #[test]
    fn test_criteria_aggregates() {
        let mut g = Grid::new(&[
            ("A1", Value::from("x")),
            ("A2", Value::from("y")),
            ("A3", Value::from("x")),
            ("B1", Value::Number(10.0)),
            ("B2", Value::Number(20.0)),
            ("B3", Value::Number(30.0)),
        ]);
        assert_eq!(eval_in("=AVERAGEIF(A1:A3, \"x\", B1:B3)", &mut g), Value::Number(20.0));
        assert_eq!(eval_in("=AVERAGEIFS(B1:B3, A1:A3, \"x\")", &mut g), Value::Number(20.0));
        assert_eq!(eval_in("=MAXIFS(B1:B3, A1:A3, \"x\")", &mut g), Value::Number(30.0));
        assert_eq!(eval_in("=MINIFS(B1:B3, A1:A3, \"x\")", &mut g), Value::Number(10.0));
        match eval_in("=AVERAGEIFS(B1:B3, A1:A2, \"x\")", &mut g) {
            Value::Error(e) => assert!(e.message.contains("same dimension")),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_mode_and_rank() {
        assert_eq!(eval_number("=MODE(1, 2, 2, 3, 3, 3)"), 3.0);
        assert!(eval("=MODE(1, 2)").is_error());
        let mut g = grid();
        assert_eq!(eval_in("=RANK(5, A1:A4)", &mut g), Value::Number(2.0));
        assert_eq!(eval_in("=RANK(5, A1:A4, 1)", &mut g), Value::Number(3.0));
    }

    #[test]
    fn test_average_weighted() {
        assert_eq!(eval_number("=AVERAGE.WEIGHTED(10, 1, 20, 3)"), 17.5);
        assert!(eval("=AVERAGE.WEIGHTED(10, -1)").is_error());
    }
}
