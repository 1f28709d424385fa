//! Financial functions
//!
//! Time value of money, depreciation, securities and cash flow analysis. Day count
//! conventions are numbered as in YEARFRAC: 0 US 30/360, 1 actual/actual, 2 actual/360,
//! 3 actual/365, 4 European 30/360.

use super::date::{add_months, day_count_convention, year_frac};
use super::{arg, date_format, money_format, num, percent_format};
use crate::coercion::{number_to_text as fmt, strict_to_number, to_boolean, to_number};
use crate::context::EvalContext;
use crate::error::{EvalError, EvalResult, EvaluationError, RegistrationError};
use crate::helpers::{ensure, flatten, reduce_numbers, to_matrix, transpose, visit_numbers};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::Value;
use chrono::Datelike;
use tabula_core::datetime::{date_to_serial, is_last_day_of_month, serial_to_date};

const DAY_COUNT: &str = "day_count_convention (number, optional, default=0)";
const END_OR_BEGINNING: &str = "end_or_beginning (number, optional, default=0)";
const FUTURE_VALUE: &str = "future_value (number, optional, default=0)";
const NO_RESULT: &str = "Function [[FUNCTION_NAME]] didn't find any result.";

const COUPON_ARGS: &[&str] = &["settlement (date)", "maturity (date)", "frequency (number)", DAY_COUNT];
const DEPRECIATION_ARGS: &[&str] = &["cost (number)", "salvage (number)", "life (number)", "period (number)"];

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // ACCRINTM
    registry.add(
        "ACCRINTM",
        FunctionDef::new(
            "Accrued interest of security paying at maturity.",
            &["issue (date)", "maturity (date)", "rate (number)", "redemption (number)", DAY_COUNT],
            "NUMBER",
            fn_accrintm,
        ),
    )?;

    // AMORLINC
    registry.add(
        "AMORLINC",
        FunctionDef::new(
            "Depreciation for an accounting period.",
            &[
                "cost (number)",
                "purchase_date (date)",
                "first_period_end (date)",
                "salvage (number)",
                "period (number)",
                "rate (number)",
                DAY_COUNT,
            ],
            "NUMBER",
            fn_amorlinc,
        ),
    )?;

    // COUPDAYS
    registry.add(
        "COUPDAYS",
        FunctionDef::new("Days in coupon period containing settlement date.", COUPON_ARGS, "NUMBER", fn_coupdays),
    )?;

    // COUPDAYBS
    registry.add(
        "COUPDAYBS",
        FunctionDef::new("Days from settlement until next coupon.", COUPON_ARGS, "NUMBER", fn_coupdaybs),
    )?;

    // COUPDAYSNC
    registry.add(
        "COUPDAYSNC",
        FunctionDef::new("Days from settlement until next coupon.", COUPON_ARGS, "NUMBER", fn_coupdaysnc),
    )?;

    // COUPNCD
    registry.add(
        "COUPNCD",
        FunctionDef::new("Next coupon date after the settlement date.", COUPON_ARGS, "NUMBER", fn_coupncd)
            .with_format(date_format),
    )?;

    // COUPNUM
    registry.add(
        "COUPNUM",
        FunctionDef::new("Number of coupons between settlement and maturity.", COUPON_ARGS, "NUMBER", fn_coupnum),
    )?;

    // COUPPCD
    registry.add(
        "COUPPCD",
        FunctionDef::new("Last coupon date prior to or on the settlement date.", COUPON_ARGS, "NUMBER", fn_couppcd)
            .with_format(date_format),
    )?;

    // CUMIPMT
    registry.add(
        "CUMIPMT",
        FunctionDef::new(
            "Cumulative interest paid over a set of periods.",
            &[
                "rate (number)",
                "number_of_periods (number)",
                "present_value (number)",
                "first_period (number)",
                "last_period (number)",
                END_OR_BEGINNING,
            ],
            "NUMBER",
            fn_cumipmt,
        ),
    )?;

    // CUMPRINC
    registry.add(
        "CUMPRINC",
        FunctionDef::new(
            "Cumulative principal paid over a set of periods.",
            &[
                "rate (number)",
                "number_of_periods (number)",
                "present_value (number)",
                "first_period (number)",
                "last_period (number)",
                END_OR_BEGINNING,
            ],
            "NUMBER",
            fn_cumprinc,
        ),
    )?;

    // DB
    registry.add(
        "DB",
        FunctionDef::new(
            "Depreciation via declining balance method.",
            &["cost (number)", "salvage (number)", "life (number)", "period (number)", "month (number, optional)"],
            "NUMBER",
            fn_db,
        )
        .with_format(money_format),
    )?;

    // DDB
    registry.add(
        "DDB",
        FunctionDef::new(
            "Depreciation via double-declining balance method.",
            &[
                "cost (number)",
                "salvage (number)",
                "life (number)",
                "period (number)",
                "factor (number, optional, default=2)",
            ],
            "NUMBER",
            fn_ddb,
        )
        .with_format(money_format),
    )?;

    // DISC
    registry.add(
        "DISC",
        FunctionDef::new(
            "Discount rate of a security based on price.",
            &["settlement (date)", "maturity (date)", "price (number)", "redemption (number)", DAY_COUNT],
            "NUMBER",
            fn_disc,
        ),
    )?;

    // DOLLARDE
    registry.add(
        "DOLLARDE",
        FunctionDef::new(
            "Convert a decimal fraction to decimal value.",
            &["fractional_price (number)", "unit (number)"],
            "NUMBER",
            fn_dollarde,
        ),
    )?;

    // DOLLARFR
    registry.add(
        "DOLLARFR",
        FunctionDef::new(
            "Convert a decimal value to decimal fraction.",
            &["decimal_price (number)", "unit (number)"],
            "NUMBER",
            fn_dollarfr,
        ),
    )?;

    // DURATION
    registry.add(
        "DURATION",
        FunctionDef::new(
            "Number of periods for an investment to reach a value.",
            &[
                "settlement (date)",
                "maturity (date)",
                "rate (number)",
                "yield (number)",
                "frequency (number)",
                DAY_COUNT,
            ],
            "NUMBER",
            fn_duration,
        ),
    )?;

    // EFFECT
    registry.add(
        "EFFECT",
        FunctionDef::new(
            "Annual effective interest rate.",
            &["nominal_rate (number)", "periods_per_year (number)"],
            "NUMBER",
            fn_effect,
        ),
    )?;

    // FV
    registry.add(
        "FV",
        FunctionDef::new(
            "Future value of an annuity investment.",
            &[
                "rate (number)",
                "number_of_periods (number)",
                "payment_amount (number)",
                "present_value (number, optional, default=0)",
                END_OR_BEGINNING,
            ],
            "NUMBER",
            fn_fv,
        )
        .with_format(money_format),
    )?;

    // FVSCHEDULE
    registry.add(
        "FVSCHEDULE",
        FunctionDef::new(
            "Future value of principal from series of rates.",
            &["principal (number)", "rate_schedule (number, range<number>)"],
            "NUMBER",
            fn_fvschedule,
        ),
    )?;

    // INTRATE
    registry.add(
        "INTRATE",
        FunctionDef::new(
            "Calculates effective interest rate.",
            &["settlement (date)", "maturity (date)", "investment (number)", "redemption (number)", DAY_COUNT],
            "NUMBER",
            fn_intrate,
        ),
    )?;

    // IPMT
    registry.add(
        "IPMT",
        FunctionDef::new(
            "Payment on the principal of an investment.",
            &[
                "rate (number)",
                "period (number)",
                "number_of_periods (number)",
                "present_value (number)",
                FUTURE_VALUE,
                END_OR_BEGINNING,
            ],
            "NUMBER",
            fn_ipmt,
        )
        .with_format(money_format),
    )?;

    // IRR
    registry.add(
        "IRR",
        FunctionDef::new(
            "Internal rate of return given periodic cashflows.",
            &["cashflow_amounts (number, range<number>)", "rate_guess (number, optional, default=0.1)"],
            "NUMBER",
            fn_irr,
        )
        .with_format(percent_format),
    )?;

    // ISPMT
    registry.add(
        "ISPMT",
        FunctionDef::new(
            "Returns the interest paid at a particular period of an investment.",
            &["rate (number)", "period (number)", "number_of_periods (number)", "present_value (number)"],
            "NUMBER",
            fn_ispmt,
        ),
    )?;

    // MDURATION
    registry.add(
        "MDURATION",
        FunctionDef::new(
            "Modified Macaulay duration.",
            &[
                "settlement (date)",
                "maturity (date)",
                "rate (number)",
                "yield (number)",
                "frequency (number)",
                DAY_COUNT,
            ],
            "NUMBER",
            fn_mduration,
        ),
    )?;

    // MIRR
    registry.add(
        "MIRR",
        FunctionDef::new(
            "Modified internal rate of return.",
            &[
                "cashflow_amounts (range<number>)",
                "financing_rate (number)",
                "reinvestment_return_rate (number)",
            ],
            "NUMBER",
            fn_mirr,
        ),
    )?;

    // NOMINAL
    registry.add(
        "NOMINAL",
        FunctionDef::new(
            "Annual nominal interest rate.",
            &["effective_rate (number)", "periods_per_year (number)"],
            "NUMBER",
            fn_nominal,
        ),
    )?;

    // NPER
    registry.add(
        "NPER",
        FunctionDef::new(
            "Number of payment periods for an investment.",
            &[
                "rate (number)",
                "payment_amount (number)",
                "present_value (number)",
                FUTURE_VALUE,
                END_OR_BEGINNING,
            ],
            "NUMBER",
            fn_nper,
        ),
    )?;

    // NPV
    registry.add(
        "NPV",
        FunctionDef::new(
            "The net present value of an investment based on a series of periodic cash flows and a discount rate.",
            &[
                "discount (number)",
                "cashflow1 (number, range<number>)",
                "cashflow2 (number, range<number>, repeating)",
            ],
            "NUMBER",
            fn_npv,
        )
        .with_format(money_format),
    )?;

    // PDURATION
    registry.add(
        "PDURATION",
        FunctionDef::new(
            "Computes the number of periods needed for an investment to reach a value.",
            &["rate (number)", "present_value (number)", "future_value (number)"],
            "NUMBER",
            fn_pduration,
        ),
    )?;

    // PMT
    registry.add(
        "PMT",
        FunctionDef::new(
            "Periodic payment for an annuity investment.",
            &[
                "rate (number)",
                "number_of_periods (number)",
                "present_value (number)",
                FUTURE_VALUE,
                END_OR_BEGINNING,
            ],
            "NUMBER",
            fn_pmt,
        )
        .with_format(money_format),
    )?;

    // PPMT
    registry.add(
        "PPMT",
        FunctionDef::new(
            "Payment on the principal of an investment.",
            &[
                "rate (number)",
                "period (number)",
                "number_of_periods (number)",
                "present_value (number)",
                FUTURE_VALUE,
                END_OR_BEGINNING,
            ],
            "NUMBER",
            fn_ppmt,
        )
        .with_format(money_format),
    )?;

    // PV
    registry.add(
        "PV",
        FunctionDef::new(
            "Present value of an annuity investment.",
            &[
                "rate (number)",
                "number_of_periods (number)",
                "payment_amount (number)",
                FUTURE_VALUE,
                END_OR_BEGINNING,
            ],
            "NUMBER",
            fn_pv,
        )
        .with_format(money_format),
    )?;

    // PRICE
    registry.add(
        "PRICE",
        FunctionDef::new(
            "Price of a security paying periodic interest.",
            &[
                "settlement (date)",
                "maturity (date)",
                "rate (number)",
                "yield (number)",
                "redemption (number)",
                "frequency (number)",
                DAY_COUNT,
            ],
            "NUMBER",
            fn_price,
        ),
    )?;

    // PRICEDISC
    registry.add(
        "PRICEDISC",
        FunctionDef::new(
            "Price of a discount security.",
            &["settlement (date)", "maturity (date)", "discount (number)", "redemption (number)", DAY_COUNT],
            "NUMBER",
            fn_pricedisc,
        ),
    )?;

    // PRICEMAT
    registry.add(
        "PRICEMAT",
        FunctionDef::new(
            "Calculates the price of a security paying interest at maturity, based on expected yield.",
            &[
                "settlement (date)",
                "maturity (date)",
                "issue (date)",
                "rate (number)",
                "yield (number)",
                DAY_COUNT,
            ],
            "NUMBER",
            fn_pricemat,
        ),
    )?;

    // RATE
    registry.add(
        "RATE",
        FunctionDef::new(
            "Interest rate of an annuity investment.",
            &[
                "number_of_periods (number)",
                "payment_per_period (number)",
                "present_value (number)",
                FUTURE_VALUE,
                END_OR_BEGINNING,
                "rate_guess (number, optional, default=0.1)",
            ],
            "NUMBER",
            fn_rate,
        )
        .with_format(percent_format),
    )?;

    // RECEIVED
    registry.add(
        "RECEIVED",
        FunctionDef::new(
            "Amount received at maturity for a security.",
            &["settlement (date)", "maturity (date)", "investment (number)", "discount (number)", DAY_COUNT],
            "NUMBER",
            fn_received,
        ),
    )?;

    // RRI
    registry.add(
        "RRI",
        FunctionDef::new(
            "Computes the rate needed for an investment to reach a specific value within a specific number of periods.",
            &["number_of_periods (number)", "present_value (number)", "future_value (number)"],
            "NUMBER",
            fn_rri,
        ),
    )?;

    // SLN
    registry.add(
        "SLN",
        FunctionDef::new(
            "Depreciation of an asset using the straight-line method.",
            &["cost (number)", "salvage (number)", "life (number)"],
            "NUMBER",
            fn_sln,
        )
        .with_format(money_format),
    )?;

    // SYD
    registry.add(
        "SYD",
        FunctionDef::new("Depreciation via sum of years digit method.", DEPRECIATION_ARGS, "NUMBER", fn_syd)
            .with_format(money_format),
    )?;

    // TBILLEQ
    registry.add(
        "TBILLEQ",
        FunctionDef::new(
            "Equivalent rate of return for a Treasury bill.",
            &["settlement (date)", "maturity (date)", "discount (number)"],
            "NUMBER",
            fn_tbilleq,
        ),
    )?;

    // TBILLPRICE
    registry.add(
        "TBILLPRICE",
        FunctionDef::new(
            "Price of a US Treasury bill.",
            &["settlement (date)", "maturity (date)", "discount (number)"],
            "NUMBER",
            fn_tbillprice,
        ),
    )?;

    // TBILLYIELD
    registry.add(
        "TBILLYIELD",
        FunctionDef::new(
            "The yield of a US Treasury bill based on price.",
            &["settlement (date)", "maturity (date)", "price (number)"],
            "NUMBER",
            fn_tbillyield,
        ),
    )?;

    // VDB
    registry.add(
        "VDB",
        FunctionDef::new(
            "Variable declining balance. WARNING : does not handle decimal periods.",
            &[
                "cost (number)",
                "salvage (number)",
                "life (number)",
                "start_period (number)",
                "end_period (number)",
                "factor (number, optional, default=2)",
                "no_switch (number, optional, default=FALSE)",
            ],
            "NUMBER",
            fn_vdb,
        ),
    )?;

    // XIRR
    registry.add(
        "XIRR",
        FunctionDef::new(
            "Internal rate of return given non-periodic cash flows.",
            &[
                "cashflow_amounts (range<number>)",
                "cashflow_dates (range<number>)",
                "rate_guess (number, optional, default=0.1)",
            ],
            "NUMBER",
            fn_xirr,
        ),
    )?;

    // XNPV
    registry.add(
        "XNPV",
        FunctionDef::new(
            "Net present value given to non-periodic cash flows..",
            &[
                "discount (number)",
                "cashflow_amounts (number, range<number>)",
                "cashflow_dates (number, range<number>)",
            ],
            "NUMBER",
            fn_xnpv,
        ),
    )?;

    // YIELD
    registry.add(
        "YIELD",
        FunctionDef::new(
            "Annual yield of a security paying periodic interest.",
            &[
                "settlement (date)",
                "maturity (date)",
                "rate (number)",
                "price (number)",
                "redemption (number)",
                "frequency (number)",
                DAY_COUNT,
            ],
            "NUMBER",
            fn_yield,
        ),
    )?;

    // YIELDDISC
    registry.add(
        "YIELDDISC",
        FunctionDef::new(
            "Annual yield of a discount security.",
            &["settlement (date)", "maturity (date)", "price (number)", "redemption (number)", DAY_COUNT],
            "NUMBER",
            fn_yielddisc,
        ),
    )?;

    // YIELDMAT
    registry.add(
        "YIELDMAT",
        FunctionDef::new(
            "Annual yield of a security paying interest at maturity.",
            &[
                "settlement (date)",
                "maturity (date)",
                "issue (date)",
                "rate (number)",
                "price (number)",
                DAY_COUNT,
            ],
            "NUMBER",
            fn_yieldmat,
        ),
    )?;

    Ok(())
}

fn number(n: f64) -> EvalResult<Value> {
    Ok(Value::Number(n))
}

/// Serial date argument, truncated to whole days
fn date_serial(args: &[Value], index: usize, ctx: &EvalContext<'_>) -> EvalResult<f64> {
    Ok(num(args, index, ctx)?.trunc())
}

fn end_or_beginning(args: &[Value], index: usize) -> EvalResult<f64> {
    let value = arg(args, index);
    if value.is_empty() {
        return Ok(0.0);
    }
    Ok(if to_boolean(value)? { 1.0 } else { 0.0 })
}

fn optional_num(args: &[Value], index: usize, default: f64, ctx: &EvalContext<'_>) -> EvalResult<f64> {
    let value = arg(args, index);
    if value.is_empty() {
        return Ok(default);
    }
    to_number(value, ctx.locale)
}

// Argument checks shared by many functions

fn strictly_positive(name: &str, value: f64) -> EvalResult<()> {
    ensure(value > 0.0, || format!("The {} ({}) must be strictly positive.", name, fmt(value)))
}

fn positive_or_zero(name: &str, value: f64) -> EvalResult<()> {
    ensure(value >= 0.0, || format!("The {} ({}) must be positive or null.", name, fmt(value)))
}

fn check_maturity_after_settlement(settlement: f64, maturity: f64) -> EvalResult<()> {
    positive_or_zero("settlement date", settlement)?;
    ensure(maturity > settlement, || {
        format!(
            "The maturity ({}) must be strictly greater than the settlement ({}).",
            fmt(maturity),
            fmt(settlement)
        )
    })
}

fn check_settlement_after_issue(settlement: f64, issue: f64) -> EvalResult<()> {
    ensure(settlement >= issue, || {
        format!(
            "The settlement ({}) must be greater than or equal to the issue ({}).",
            fmt(settlement),
            fmt(issue)
        )
    })
}

fn check_frequency(frequency: f64) -> EvalResult<()> {
    ensure([1.0, 2.0, 4.0].contains(&frequency), || {
        format!("The frequency ({}) must be one of 1, 2 or 4.", fmt(frequency))
    })
}

fn check_within_a_year(settlement: f64, maturity: f64) -> EvalResult<()> {
    let limit = serial_to_date(settlement)
        .and_then(|d| add_months(d, 12, false))
        .map(date_to_serial)
        .ok_or_else(out_of_range)?;
    ensure(maturity <= limit, || {
        format!(
            "The settlement date ({}) must at most one year after the maturity date ({}).",
            fmt(settlement),
            fmt(maturity)
        )
    })
}

fn check_rate_guess(guess: f64) -> EvalResult<()> {
    ensure(guess > -1.0, || format!("The rate_guess ({}) must be strictly greater than -1.", fmt(guess)))
}

fn check_number_of_periods(n: f64) -> EvalResult<()> {
    ensure(n > 0.0, || format!("The number_of_periods ({}) must be greater than 0.", fmt(n)))
}

fn out_of_range() -> EvalError {
    EvaluationError::new("The function [[FUNCTION_NAME]] result is out of the supported date range.").into()
}

/// Newton–Raphson root finding
///
/// `nan_fallback` provides the next guess when `func` is undefined at the current one; it
/// receives the previous fallback value.
fn newton_method(
    func: impl Fn(f64) -> f64,
    deriv: impl Fn(f64) -> f64,
    start: f64,
    max_iterations: u32,
    epsilon: f64,
    nan_fallback: Option<fn(Option<f64>) -> f64>,
) -> EvalResult<f64> {
    let mut x = start;
    let mut count = 0;
    let mut previous_fallback = None;
    loop {
        let y = func(x);
        if y.is_nan() {
            let fallback = match nan_fallback {
                Some(f) if count < max_iterations => f,
                _ => return Err(EvaluationError::new(NO_RESULT).into()),
            };
            count += 1;
            x = fallback(previous_fallback);
            previous_fallback = Some(x);
            continue;
        }
        let next = x - y / deriv(x);
        let delta = (next - x).abs();
        x = next;
        ensure(count < max_iterations, || NO_RESULT.to_string())?;
        count += 1;
        if delta < epsilon || y.abs() < epsilon {
            return Ok(x);
        }
    }
}

// Time value of money

fn fv(rate: f64, n: f64, payment: f64, pv: f64, kind: f64) -> f64 {
    if rate == 0.0 {
        return -(pv + payment * n);
    }
    -pv * (1.0 + rate).powf(n) - payment * (1.0 + rate * kind) * ((1.0 + rate).powf(n) - 1.0) / rate
}

fn pmt(rate: f64, n: f64, pv: f64, fv: f64, kind: f64) -> EvalResult<f64> {
    check_number_of_periods(n)?;
    if rate == 0.0 {
        return Ok(-(fv + pv) / n);
    }
    let payment = -(pv * (1.0 + rate).powf(n) + fv);
    Ok(payment * rate / ((1.0 + rate * kind) * ((1.0 + rate).powf(n) - 1.0)))
}

fn ppmt(rate: f64, period: f64, n: f64, pv: f64, future: f64, kind: f64) -> EvalResult<f64> {
    check_number_of_periods(n)?;
    ensure(period > 0.0 && period <= n, || {
        "The period must be between 1 and number_of_periods".to_string()
    })?;
    let payment = pmt(rate, n, pv, future, kind)?;
    if kind == 1.0 && period == 1.0 {
        return Ok(payment);
    }
    let eq_period = if kind == 0.0 { period - 1.0 } else { period - 2.0 };
    let eq_pv = pv + payment * kind;
    let capital_at_period = -fv(rate, eq_period, payment, eq_pv, 0.0);
    Ok(payment + capital_at_period * rate)
}

fn ipmt(rate: f64, period: f64, n: f64, pv: f64, future: f64, kind: f64) -> EvalResult<f64> {
    Ok(pmt(rate, n, pv, future, kind)? - ppmt(rate, period, n, pv, future, kind)?)
}

fn fn_fv(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let rate = num(args, 0, ctx)?;
    let n = num(args, 1, ctx)?;
    let payment = num(args, 2, ctx)?;
    let pv = optional_num(args, 3, 0.0, ctx)?;
    number(fv(rate, n, payment, pv, end_or_beginning(args, 4)?))
}

fn fn_pv(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let rate = num(args, 0, ctx)?;
    let n = num(args, 1, ctx)?;
    let payment = num(args, 2, ctx)?;
    let future = optional_num(args, 3, 0.0, ctx)?;
    let kind = end_or_beginning(args, 4)?;
    if rate == 0.0 {
        return number(-(future + payment * n));
    }
    let growth = (1.0 + rate).powf(n);
    number(-(payment * (1.0 + rate * kind) * (growth - 1.0) / rate + future) / growth)
}

fn fn_pmt(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let rate = num(args, 0, ctx)?;
    let n = num(args, 1, ctx)?;
    let pv = num(args, 2, ctx)?;
    let future = optional_num(args, 3, 0.0, ctx)?;
    number(pmt(rate, n, pv, future, end_or_beginning(args, 4)?)?)
}

fn fn_ppmt(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let future = optional_num(args, 4, 0.0, ctx)?;
    number(ppmt(
        num(args, 0, ctx)?,
        num(args, 1, ctx)?,
        num(args, 2, ctx)?,
        num(args, 3, ctx)?,
        future,
        end_or_beginning(args, 5)?,
    )?)
}

fn fn_ipmt(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let future = optional_num(args, 4, 0.0, ctx)?;
    number(ipmt(
        num(args, 0, ctx)?,
        num(args, 1, ctx)?,
        num(args, 2, ctx)?,
        num(args, 3, ctx)?,
        future,
        end_or_beginning(args, 5)?,
    )?)
}

fn fn_nper(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let rate = num(args, 0, ctx)?;
    let payment = num(args, 1, ctx)?;
    let pv = num(args, 2, ctx)?;
    let future = optional_num(args, 3, 0.0, ctx)?;
    let kind = end_or_beginning(args, 4)?;
    if rate == 0.0 {
        return number(-(future + pv) / payment);
    }
    let c = payment * (1.0 + rate * kind) / rate;
    number(((c - future) / (pv + c)).ln() / (1.0 + rate).ln())
}

fn cumulative(args: &[Value], ctx: &EvalContext<'_>, interest: bool) -> EvalResult<Value> {
    let rate = num(args, 0, ctx)?;
    let n = num(args, 1, ctx)?;
    let pv = num(args, 2, ctx)?;
    let first = num(args, 3, ctx)?;
    let last = num(args, 4, ctx)?;
    let kind = end_or_beginning(args, 5)?;

    strictly_positive("first_period", first)?;
    strictly_positive("last_period", last)?;
    ensure(first <= last, || {
        format!(
            "The first_period ({}) must be smaller or equal to the last_period ({}).",
            fmt(first),
            fmt(last)
        )
    })?;
    ensure(last <= n, || {
        format!(
            "The last_period ({}) must be smaller or equal to the number_of_periods ({}).",
            fmt(last),
            fmt(n)
        )
    })?;
    strictly_positive("rate", rate)?;
    strictly_positive("present value", pv)?;

    let mut sum = 0.0;
    let mut period = first;
    while period <= last {
        sum += if interest {
            ipmt(rate, period, n, pv, 0.0, kind)?
        } else {
            ppmt(rate, period, n, pv, 0.0, kind)?
        };
        period += 1.0;
    }
    number(sum)
}

fn fn_cumipmt(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    cumulative(args, ctx, true)
}

fn fn_cumprinc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    cumulative(args, ctx, false)
}

fn fn_rate(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let n = num(args, 0, ctx)?;
    let payment = num(args, 1, ctx)?;
    let mut pv = num(args, 2, ctx)?;
    let mut future = optional_num(args, 3, 0.0, ctx)?;
    let kind = end_or_beginning(args, 4)?;
    let mut guess = optional_num(args, 5, 0.1, ctx)?;
    if guess == 0.0 {
        guess = 0.1;
    }

    check_number_of_periods(n)?;
    let values = [payment, pv, future];
    ensure(values.iter().any(|v| *v > 0.0) && values.iter().any(|v| *v < 0.0), || {
        "There must be both positive and negative values in [payment_amount, present_value, future_value]."
            .to_string()
    })?;
    check_rate_guess(guess)?;

    future -= payment * kind;
    pv += payment * kind;

    let func = |rate: f64| {
        let pow_n = (1.0 + rate).powf(n);
        future + pv * pow_n + payment * (pow_n - 1.0) / rate
    };
    let deriv = |rate: f64| {
        let pow_n_minus_1 = (1.0 + rate).powf(n - 1.0);
        let pow_n = (1.0 + rate).powf(n);
        let int_result = (pow_n - 1.0) / rate;
        let int_result_deriv = n * pow_n_minus_1 / rate - int_result / rate;
        pv * n * pow_n_minus_1 + payment * int_result_deriv
    };
    number(newton_method(func, deriv, guess, 40, 1e-5, None)?)
}

fn fn_effect(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let nominal = num(args, 0, ctx)?;
    let periods = num(args, 1, ctx)?.trunc();
    ensure(nominal > 0.0, || {
        format!("The nominal rate ({}) must be strictly greater than 0.", fmt(nominal))
    })?;
    ensure(periods > 0.0, || {
        format!("The number of periods by year ({}) must strictly greater than 0.", fmt(periods))
    })?;
    number((1.0 + nominal / periods).powf(periods) - 1.0)
}

fn fn_nominal(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let effective = num(args, 0, ctx)?;
    let periods = num(args, 1, ctx)?.trunc();
    ensure(effective > 0.0, || {
        format!("The effective rate ({}) must must strictly greater than 0.", fmt(effective))
    })?;
    ensure(periods > 0.0, || {
        format!("The number of periods by year ({}) must strictly greater than 0.", fmt(periods))
    })?;
    number(((effective + 1.0).powf(1.0 / periods) - 1.0) * periods)
}

fn fn_pduration(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let rate = num(args, 0, ctx)?;
    let pv = num(args, 1, ctx)?;
    let future = num(args, 2, ctx)?;
    strictly_positive("rate", rate)?;
    strictly_positive("present_value", pv)?;
    strictly_positive("future_value", future)?;
    number((future.ln() - pv.ln()) / (1.0 + rate).ln())
}

fn fn_rri(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let n = num(args, 0, ctx)?;
    let pv = num(args, 1, ctx)?;
    let future = num(args, 2, ctx)?;
    check_number_of_periods(n)?;
    number((future / pv).powf(1.0 / n) - 1.0)
}

fn fn_ispmt(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let rate = num(args, 0, ctx)?;
    let period = num(args, 1, ctx)?;
    let n = num(args, 2, ctx)?;
    let investment = num(args, 3, ctx)?;
    ensure(n != 0.0, || "The number of periods must be different than 0.".to_string())?;
    let current = investment - investment * (period / n);
    number(-current * rate)
}

fn fn_fvschedule(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let principal = num(args, 0, ctx)?;
    let mut result = principal;
    for rate in flatten(arg(args, 1)) {
        result *= 1.0 + to_number(&rate, ctx.locale)?;
    }
    number(result)
}

// Cash flows

fn fn_npv(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let discount = num(args, 0, ctx)?;
    ensure(discount != -1.0, || {
        format!("The discount ({}) must be different from -1.", fmt(discount))
    })?;
    let mut period = 0;
    let npv = reduce_numbers(&args[1..], ctx.locale, 0.0, |acc, v| {
        period += 1;
        acc + v / (1.0 + discount).powi(period)
    })?;
    number(npv)
}

fn fn_irr(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let guess = optional_num(args, 1, 0.1, ctx)?;
    check_rate_guess(guess)?;

    let mut amounts = Vec::new();
    visit_numbers(&args[..1], ctx.locale, |amount| amounts.push(amount))?;
    ensure(
        amounts.iter().any(|a| *a > 0.0) && amounts.iter().any(|a| *a < 0.0),
        || "The cashflow_amounts must include negative and positive values.".to_string(),
    )?;

    // Newton on the numerator of the NPV, with x = 1 + rate
    let count = amounts.len() as i32 - 1;
    let func = |x: f64| {
        amounts
            .iter()
            .enumerate()
            .map(|(i, v)| v * x.powi(count - i as i32))
            .sum::<f64>()
    };
    let deriv = |x: f64| {
        amounts
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let exponent = count - i as i32;
                v * exponent as f64 * x.powi(exponent - 1)
            })
            .sum::<f64>()
    };
    number(newton_method(func, deriv, guess + 1.0, 20, 1e-5, None)? - 1.0)
}

fn fn_mirr(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let financing_rate = num(args, 1, ctx)?;
    let reinvestment_rate = num(args, 2, ctx)?;
    let mut cash_flow = Vec::new();
    for row in transpose(&to_matrix(arg(args, 0))) {
        for v in row.iter().filter(|v| !v.is_empty()) {
            cash_flow.push(to_number(v, ctx.locale)?);
        }
    }
    let n = cash_flow.len();
    let mut future = 0.0;
    let mut present = 0.0;
    for (i, amount) in cash_flow.iter().enumerate() {
        if *amount >= 0.0 {
            future += amount * (reinvestment_rate + 1.0).powi((n - i - 1) as i32);
        } else {
            present += amount / (financing_rate + 1.0).powi(i as i32);
        }
    }
    ensure(present != 0.0 && future != 0.0, || {
        "There must be both positive and negative values in cashflow_amounts.".to_string()
    })?;
    number((-future / present).powf(1.0 / (n as f64 - 1.0)) - 1.0)
}

/// Sum the amounts of identical dates, keeping first-seen date order
fn aggregate_by_date(dates: &[f64], amounts: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut unique_dates: Vec<f64> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for (date, amount) in dates.iter().zip(amounts) {
        match unique_dates.iter().position(|d| d == date) {
            Some(i) => values[i] += amount,
            None => {
                unique_dates.push(*date);
                values.push(*amount);
            }
        }
    }
    (unique_dates, values)
}

fn check_dates_after_first(dates: &[f64]) -> EvalResult<()> {
    if let Some(first) = dates.first() {
        ensure(dates.iter().all(|d| d >= first), || {
            format!(
                "All the dates should be greater or equal to the first date in cashflow_dates ({}).",
                fmt(*first)
            )
        })?;
    }
    Ok(())
}

fn check_same_dimension(amounts: &Value, dates: &Value) -> EvalResult<()> {
    ensure(amounts.dimensions() == dates.dimensions(), || {
        "The cashflow_amounts and cashflow_dates ranges must have the same dimensions.".to_string()
    })
}

fn fn_xirr(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let guess = optional_num(args, 2, 0.1, ctx)?;
    let amounts_arg = arg(args, 0);
    let dates_arg = arg(args, 1);
    let amounts = flatten(amounts_arg)
        .iter()
        .map(|v| to_number(v, ctx.locale))
        .collect::<EvalResult<Vec<f64>>>()?;
    let dates = flatten(dates_arg)
        .iter()
        .map(|v| to_number(v, ctx.locale))
        .collect::<EvalResult<Vec<f64>>>()?;

    check_same_dimension(amounts_arg, dates_arg)?;
    ensure(
        amounts.iter().any(|a| *a > 0.0) && amounts.iter().any(|a| *a < 0.0),
        || "There must be both positive and negative values in cashflow_amounts.".to_string(),
    )?;
    check_dates_after_first(&dates)?;
    check_rate_guess(guess)?;

    let (dates, values) = aggregate_by_date(&dates, &amounts);
    let func = |rate: f64| {
        let mut value = values[0];
        for i in 1..values.len() {
            let exponent = (dates[0] - dates[i]) / 365.0;
            value += values[i] * (1.0 + rate).powf(exponent);
        }
        value
    };
    let deriv = |rate: f64| {
        let mut derivative = 0.0;
        for i in 1..values.len() {
            let exponent = (dates[0] - dates[i]) / 365.0;
            derivative += exponent * values[i] * (1.0 + rate).powf(exponent - 1.0);
        }
        derivative
    };
    number(newton_method(func, deriv, guess, 40, 1e-5, Some(xirr_fallback))?)
}

/// Guesses tried when the rate makes XIRR undefined: -0.9, -0.99, -0.999, ...
fn xirr_fallback(previous: Option<f64>) -> f64 {
    match previous {
        Some(p) if p != 0.0 => p / 10.0 - 0.9,
        _ => -0.9,
    }
}

fn fn_xnpv(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let rate = num(args, 0, ctx)?;
    let amounts_arg = arg(args, 1);
    let dates_arg = arg(args, 2);
    let strict = |value: &Value| -> EvalResult<Vec<f64>> {
        flatten(value)
            .iter()
            .map(|v| strict_to_number(v, ctx.locale))
            .collect()
    };
    let amounts = strict(amounts_arg)?;
    let dates = strict(dates_arg)?;

    if amounts_arg.is_matrix() && dates_arg.is_matrix() {
        check_same_dimension(amounts_arg, dates_arg)?;
    } else {
        ensure(amounts.len() == dates.len(), || {
            "There must be the same number of values in cashflow_amounts and cashflow_dates.".to_string()
        })?;
    }
    check_dates_after_first(&dates)?;
    strictly_positive("rate", rate)?;

    if amounts.len() == 1 {
        return number(amounts[0]);
    }
    let (dates, values) = aggregate_by_date(&dates, &amounts);
    let mut pv = values[0];
    for i in 1..values.len() {
        pv += values[i] * (1.0 + rate).powf((dates[0] - dates[i]) / 365.0);
    }
    number(pv)
}

// Depreciation

fn fn_sln(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let cost = num(args, 0, ctx)?;
    let salvage = num(args, 1, ctx)?;
    let life = num(args, 2, ctx)?;
    number((cost - salvage) / life)
}

fn check_period_within_life(period: f64, life: f64) -> EvalResult<()> {
    ensure(period <= life, || {
        format!("The period ({}) must be less than or equal life ({}).", fmt(period), fmt(life))
    })
}

fn fn_syd(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let cost = num(args, 0, ctx)?;
    let salvage = num(args, 1, ctx)?;
    let life = num(args, 2, ctx)?;
    let period = num(args, 3, ctx)?;
    strictly_positive("period", period)?;
    strictly_positive("life", life)?;
    check_period_within_life(period, life)?;

    let factor = life * (life + 1.0) / 2.0;
    let remaining = life - period + 1.0;
    number((cost - salvage) * (remaining / factor))
}

fn fn_db(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let cost = num(args, 0, ctx)?;
    let salvage = num(args, 1, ctx)?;
    let life = num(args, 2, ctx)?;
    let period = num(args, 3, ctx)?.trunc();
    let month = optional_num(args, 4, 12.0, ctx)?.trunc();
    let life_limit = life + if month == 12.0 { 0.0 } else { 1.0 };

    positive_or_zero("cost", cost)?;
    positive_or_zero("salvage", salvage)?;
    strictly_positive("period", period)?;
    strictly_positive("life", life)?;
    ensure((1.0..=12.0).contains(&month), || {
        format!("The month ({}) must be between 1 and 12 inclusive.", fmt(month))
    })?;
    ensure(period <= life_limit, || {
        format!(
            "The period ({}) must be less than or equal to {}.",
            fmt(period),
            fmt(life_limit)
        )
    })?;

    let month_part = month / 12.0;
    let rate = ((1.0 - (salvage / cost).powf(1.0 / life)) * 1000.0).round() / 1000.0;

    let mut before = cost;
    let mut after = cost * (1.0 - rate * month_part);
    let mut i = 1.0;
    while i < period {
        before = after;
        after = before * (1.0 - rate);
        if i == life {
            after = before * (1.0 - rate * (1.0 - month_part));
        }
        i += 1.0;
    }
    number(before - after)
}

fn fn_ddb(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let cost = num(args, 0, ctx)?;
    let salvage = num(args, 1, ctx)?;
    let life = num(args, 2, ctx)?;
    let period = num(args, 3, ctx)?;
    let factor = optional_num(args, 4, 2.0, ctx)?;

    positive_or_zero("cost", cost)?;
    positive_or_zero("salvage", salvage)?;
    strictly_positive("period", period)?;
    strictly_positive("life", life)?;
    check_period_within_life(period, life)?;
    strictly_positive("depreciation factor", factor)?;

    if cost == 0.0 || salvage >= cost {
        return number(0.0);
    }
    let rate = factor / life;
    if rate > 1.0 {
        return number(if period == 1.0 { cost - salvage } else { 0.0 });
    }
    if period <= 1.0 {
        return number(cost * rate);
    }
    let previous_cost = cost * (1.0 - rate).powf(period - 1.0);
    let next_cost = cost * (1.0 - rate).powf(period);
    let depreciation = if next_cost < salvage {
        previous_cost - salvage
    } else {
        previous_cost - next_cost
    };
    number(depreciation.max(0.0))
}

fn fn_vdb(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let cost = num(args, 0, ctx)?;
    let salvage = num(args, 1, ctx)?;
    let life = num(args, 2, ctx)?;
    // TODO: fractional start and end periods are truncated
    let start = num(args, 3, ctx)?.trunc();
    let end = num(args, 4, ctx)?.trunc();
    let factor = optional_num(args, 5, 2.0, ctx)?;
    let no_switch = to_boolean(arg(args, 6))?;

    positive_or_zero("cost", cost)?;
    positive_or_zero("salvage", salvage)?;
    ensure(start >= 0.0, || format!("The start_period ({}) must be greater or equal than 0.", fmt(start)))?;
    ensure(end >= 0.0, || format!("The end_period ({}) must be greater or equal than 0.", fmt(end)))?;
    ensure(start <= end, || {
        format!(
            "The start_period ({}) must be smaller or equal to the end_period ({}).",
            fmt(start),
            fmt(end)
        )
    })?;
    ensure(end <= life, || {
        format!("The end_period ({}) must be smaller or equal to the life ({}).", fmt(end), fmt(life))
    })?;
    strictly_positive("depreciation factor", factor)?;

    if cost == 0.0 {
        return number(0.0);
    }
    let rate = factor / life;
    if salvage >= cost || rate >= 1.0 {
        return number(if start < 1.0 { cost - salvage } else { 0.0 });
    }

    let mut previous_cost = cost;
    let mut current = 0.0;
    let mut result = 0.0;
    let mut linear = false;
    let mut i = 0.0;
    while i < end {
        if !linear || no_switch {
            let declining = previous_cost * rate;
            let straight = (previous_cost - salvage) / (life - i);
            if !no_switch && straight > declining {
                linear = true;
                current = straight;
            } else {
                current = declining;
            }
        }
        let next_cost = (previous_cost - current).max(salvage);
        if i >= start {
            result += previous_cost - next_cost;
        }
        previous_cost = next_cost;
        i += 1.0;
    }
    number(result)
}

fn fn_amorlinc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let cost = num(args, 0, ctx)?;
    let purchase = date_serial(args, 1, ctx)?;
    let first_end = date_serial(args, 2, ctx)?;
    let salvage = num(args, 3, ctx)?;
    let period = num(args, 4, ctx)?;
    let rate = num(args, 5, ctx)?;
    let convention = day_count_convention(args, 6, ctx)?;

    strictly_positive("cost", cost)?;
    positive_or_zero("salvage", salvage)?;
    ensure(salvage <= cost, || {
        format!(
            "The salvage ({}) must be smaller or equal than the cost ({}).",
            fmt(salvage),
            fmt(cost)
        )
    })?;
    positive_or_zero("period", period)?;
    strictly_positive("rate", rate)?;
    ensure(purchase <= first_end, || {
        format!(
            "The purchase_date ({}) must be before the first_period_end ({}).",
            fmt(purchase),
            fmt(first_end)
        )
    })?;

    // A purchase on the first period end depreciates a full first period
    let rounded_period = if period > 0.0 && period < 1.0 { 1.0 } else { period.trunc() };
    let depreciation = cost * rate;
    let first = if purchase == first_end {
        depreciation
    } else {
        depreciation * year_frac(purchase, first_end, convention)?
    };
    let value_at_period = cost - first - depreciation * rounded_period;

    if value_at_period >= salvage {
        return number(if rounded_period == 0.0 { first } else { depreciation });
    }
    number(if salvage - value_at_period < depreciation {
        depreciation - (salvage - value_at_period)
    } else {
        0.0
    })
}

// Fractional prices

fn unit(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<f64> {
    let unit = num(args, 1, ctx)?.trunc();
    ensure(unit > 0.0, || format!("The unit ({}) must be strictly positive.", fmt(unit)))?;
    Ok(unit)
}

fn fn_dollarde(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let price = num(args, 0, ctx)?;
    let unit = unit(args, ctx)?;
    let frac = 10f64.powf(unit.log10().ceil()) / unit;
    number(price.trunc() + price.fract() * frac)
}

fn fn_dollarfr(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let price = num(args, 0, ctx)?;
    let unit = unit(args, ctx)?;
    let frac = unit / 10f64.powf(unit.log10().ceil());
    number(price.trunc() + price.fract() * frac)
}

// Coupons

/// A coupon-bearing security between settlement and maturity
struct Coupon {
    settlement: f64,
    maturity: f64,
    frequency: f64,
    convention: u8,
}

impl Coupon {
    fn from_args(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Self> {
        let settlement = date_serial(args, 0, ctx)?;
        let maturity = date_serial(args, 1, ctx)?;
        let frequency = num(args, 2, ctx)?.trunc();
        check_maturity_after_settlement(settlement, maturity)?;
        check_frequency(frequency)?;
        let convention = day_count_convention(args, 3, ctx)?;
        Ok(Self {
            settlement,
            maturity,
            frequency,
            convention,
        })
    }

    fn months_per_period(&self) -> i64 {
        12 / self.frequency as i64
    }

    fn maturity_date(&self) -> EvalResult<chrono::NaiveDate> {
        serial_to_date(self.maturity).ok_or_else(out_of_range)
    }

    fn count(&self) -> EvalResult<f64> {
        let mut count = 0.0;
        let mut current = self.maturity_date()?;
        while date_to_serial(current) > self.settlement {
            current = add_months(current, -self.months_per_period(), false).ok_or_else(out_of_range)?;
            count += 1.0;
        }
        Ok(count)
    }

    fn coupon_date(&self, periods_back: f64) -> EvalResult<f64> {
        let months = -(periods_back as i64) * self.months_per_period();
        add_months(self.maturity_date()?, months, true)
            .map(date_to_serial)
            .ok_or_else(out_of_range)
    }

    fn previous(&self) -> EvalResult<f64> {
        self.coupon_date(self.count()?)
    }

    fn next(&self) -> EvalResult<f64> {
        self.coupon_date(self.count()? - 1.0)
    }

    fn days_in_period(&self) -> EvalResult<f64> {
        if self.convention == 1 {
            return Ok(self.next()? - self.previous()?);
        }
        let days_in_year = if self.convention == 3 { 365.0 } else { 360.0 };
        Ok(days_in_year / self.frequency)
    }

    fn days_since_previous(&self) -> EvalResult<f64> {
        let previous = self.previous()?;
        match self.convention {
            1..=3 => Ok(self.settlement - previous),
            4 => Ok((year_frac(previous, self.settlement, 4)? * 360.0).round()),
            _ => {
                let from = serial_to_date(previous).ok_or_else(out_of_range)?;
                let to = serial_to_date(self.settlement).ok_or_else(out_of_range)?;
                let (y1, m1, mut d1) = (from.year() as f64, from.month() as f64, from.day() as f64);
                let (y2, m2, mut d2) = (to.year() as f64, to.month() as f64, to.day() as f64);
                if m1 == 2.0 && m2 == 2.0 && is_last_day_of_month(from) && is_last_day_of_month(to) {
                    d2 = 30.0;
                }
                if d2 == 31.0 && (d1 == 30.0 || d1 == 31.0) {
                    d2 = 30.0;
                }
                if m1 == 2.0 && is_last_day_of_month(from) {
                    d1 = 30.0;
                }
                if d1 == 31.0 {
                    d1 = 30.0;
                }
                Ok((y2 - y1) * 360.0 + (m2 - m1) * 30.0 + (d2 - d1))
            }
        }
    }

    fn days_until_next(&self) -> EvalResult<f64> {
        match self.convention {
            1..=3 => Ok(self.next()? - self.settlement),
            4 => Ok((year_frac(self.settlement, self.next()?, 4)? * 360.0).round()),
            _ => Ok(self.days_in_period()? - self.days_since_previous()?),
        }
    }
}

fn fn_coupdays(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(Coupon::from_args(args, ctx)?.days_in_period()?)
}

fn fn_coupdaybs(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(Coupon::from_args(args, ctx)?.days_since_previous()?)
}

fn fn_coupdaysnc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(Coupon::from_args(args, ctx)?.days_until_next()?)
}

fn fn_coupncd(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(Coupon::from_args(args, ctx)?.next()?)
}

fn fn_coupnum(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(Coupon::from_args(args, ctx)?.count()?)
}

fn fn_couppcd(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(Coupon::from_args(args, ctx)?.previous()?)
}

// Securities

/// Settlement, maturity and day count convention of a security without coupons
fn security_dates(
    args: &[Value],
    convention_index: usize,
    ctx: &EvalContext<'_>,
) -> EvalResult<(f64, f64, u8)> {
    let settlement = date_serial(args, 0, ctx)?;
    let maturity = date_serial(args, 1, ctx)?;
    check_maturity_after_settlement(settlement, maturity)?;
    let convention = day_count_convention(args, convention_index, ctx)?;
    Ok((settlement, maturity, convention))
}

fn fn_accrintm(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let issue = date_serial(args, 0, ctx)?;
    let maturity = date_serial(args, 1, ctx)?;
    let rate = num(args, 2, ctx)?;
    let redemption = num(args, 3, ctx)?;
    ensure(maturity > issue, || {
        format!(
            "The maturity ({}) must be strictly greater than the issue ({}).",
            fmt(maturity),
            fmt(issue)
        )
    })?;
    let convention = day_count_convention(args, 4, ctx)?;
    strictly_positive("redemption", redemption)?;
    strictly_positive("rate", rate)?;
    number(redemption * rate * year_frac(issue, maturity, convention)?)
}

fn fn_disc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity, convention) = security_dates(args, 4, ctx)?;
    let price = num(args, 2, ctx)?;
    let redemption = num(args, 3, ctx)?;
    strictly_positive("price", price)?;
    strictly_positive("redemption", redemption)?;
    number((redemption - price) / redemption / year_frac(settlement, maturity, convention)?)
}

fn fn_intrate(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity, convention) = security_dates(args, 4, ctx)?;
    let investment = num(args, 2, ctx)?;
    let redemption = num(args, 3, ctx)?;
    strictly_positive("investment", investment)?;
    strictly_positive("redemption", redemption)?;
    number((redemption - investment) / investment / year_frac(settlement, maturity, convention)?)
}

fn fn_pricedisc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity, convention) = security_dates(args, 4, ctx)?;
    let discount = num(args, 2, ctx)?;
    let redemption = num(args, 3, ctx)?;
    strictly_positive("discount", discount)?;
    strictly_positive("redemption", redemption)?;
    number(redemption - discount * redemption * year_frac(settlement, maturity, convention)?)
}

fn fn_received(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity, convention) = security_dates(args, 4, ctx)?;
    let investment = num(args, 2, ctx)?;
    let discount = num(args, 3, ctx)?;
    strictly_positive("investment", investment)?;
    strictly_positive("discount", discount)?;
    number(investment / (1.0 - discount * year_frac(settlement, maturity, convention)?))
}

fn fn_yielddisc(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity, convention) = security_dates(args, 4, ctx)?;
    let price = num(args, 2, ctx)?;
    let redemption = num(args, 3, ctx)?;
    strictly_positive("price", price)?;
    strictly_positive("redemption", redemption)?;
    number((redemption / price - 1.0) / year_frac(settlement, maturity, convention)?)
}

fn fn_pricemat(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let issue = date_serial(args, 2, ctx)?;
    let settlement = date_serial(args, 0, ctx)?;
    check_settlement_after_issue(settlement, issue)?;
    let (settlement, maturity, convention) = security_dates(args, 5, ctx)?;
    let rate = num(args, 3, ctx)?;
    let yield_rate = num(args, 4, ctx)?;
    positive_or_zero("rate", rate)?;
    positive_or_zero("yield", yield_rate)?;

    let settlement_to_maturity = year_frac(settlement, maturity, convention)?;
    let issue_to_settlement = year_frac(settlement, issue, convention)?;
    let issue_to_maturity = year_frac(issue, maturity, convention)?;

    let numerator = 100.0 + issue_to_maturity * rate * 100.0;
    let denominator = 1.0 + settlement_to_maturity * yield_rate;
    number(numerator / denominator - issue_to_settlement * rate * 100.0)
}

fn fn_yieldmat(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity, convention) = security_dates(args, 5, ctx)?;
    let issue = date_serial(args, 2, ctx)?;
    let rate = num(args, 3, ctx)?;
    let price = num(args, 4, ctx)?;
    check_settlement_after_issue(settlement, issue)?;
    positive_or_zero("rate", rate)?;
    strictly_positive("price", price)?;

    let issue_to_maturity = year_frac(issue, maturity, convention)?;
    let issue_to_settlement = year_frac(issue, settlement, convention)?;
    let settlement_to_maturity = year_frac(settlement, maturity, convention)?;

    let numerator = 100.0 * (1.0 + rate * issue_to_maturity) / (price + 100.0 * rate * issue_to_settlement) - 1.0;
    number(numerator / settlement_to_maturity)
}

/// Coupon schedule of a bond: whole coupons left and the fraction of the first one
struct BondSchedule {
    full_coupons: f64,
    time_first_coupon: f64,
    frequency: f64,
}

impl BondSchedule {
    fn new(settlement: f64, maturity: f64, frequency: f64, convention: u8) -> EvalResult<Self> {
        let coupons = year_frac(settlement, maturity, convention)? * frequency;
        let fraction = coupons - coupons.floor();
        Ok(Self {
            full_coupons: coupons.ceil(),
            time_first_coupon: if fraction == 0.0 { 1.0 } else { fraction },
            frequency,
        })
    }
}

/// Settlement, maturity, rate and schedule of a coupon bond, with the shared checks
fn bond_args(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<(f64, BondSchedule)> {
    let settlement = date_serial(args, 0, ctx)?;
    let maturity = date_serial(args, 1, ctx)?;
    let rate = num(args, 2, ctx)?;
    let frequency = num(args, 5, ctx)?.trunc();
    check_maturity_after_settlement(settlement, maturity)?;
    check_frequency(frequency)?;
    let convention = day_count_convention(args, 6, ctx)?;
    positive_or_zero("rate", rate)?;
    Ok((rate, BondSchedule::new(settlement, maturity, frequency, convention)?))
}

fn fn_price(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (rate, schedule) = bond_args(args, ctx)?;
    let yield_rate = num(args, 3, ctx)?;
    let redemption = num(args, 4, ctx)?;
    positive_or_zero("yield", yield_rate)?;
    strictly_positive("redemption", redemption)?;

    let BondSchedule {
        full_coupons,
        time_first_coupon,
        frequency,
    } = schedule;
    let yield_factor = 1.0 + yield_rate / frequency;
    let coupon = 100.0 * rate / frequency;

    if full_coupons == 1.0 {
        return number(
            (coupon + redemption) / (time_first_coupon * yield_rate / frequency + 1.0)
                - coupon * (1.0 - time_first_coupon),
        );
    }

    let mut coupons_value = 0.0;
    let mut i = 1.0;
    while i <= full_coupons {
        coupons_value += coupon / yield_factor.powf(i - 1.0 + time_first_coupon);
        i += 1.0;
    }
    let redemption_value = redemption / yield_factor.powf(full_coupons - 1.0 + time_first_coupon);
    number(redemption_value + coupons_value - coupon * (1.0 - time_first_coupon))
}

fn fn_yield(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (rate, schedule) = bond_args(args, ctx)?;
    let price = num(args, 3, ctx)?;
    let redemption = num(args, 4, ctx)?;
    strictly_positive("price", price)?;
    strictly_positive("redemption", redemption)?;

    let BondSchedule {
        full_coupons,
        time_first_coupon,
        frequency,
    } = schedule;
    let coupon = 100.0 * rate / frequency;

    if full_coupons == 1.0 {
        let sub_part = price + coupon * (1.0 - time_first_coupon);
        return number((redemption + coupon - sub_part) * frequency * (1.0 / time_first_coupon) / sub_part);
    }

    // Newton on the numerator of the price, solving for x = 1 + yield / frequency
    let dirty_price = price + coupon * (1.0 - time_first_coupon);
    let func = |x: f64| {
        let mut result = redemption - dirty_price * x.powf(full_coupons - 1.0 + time_first_coupon);
        let mut i = 1.0;
        while i <= full_coupons {
            result += coupon * x.powf(i - 1.0);
            i += 1.0;
        }
        result
    };
    let deriv = |x: f64| {
        let mut result = -dirty_price
            * (full_coupons - 1.0 + time_first_coupon)
            * x.powf(full_coupons - 2.0 + time_first_coupon);
        let mut i = 1.0;
        while i <= full_coupons {
            result += coupon * (i - 1.0) * x.powf(i - 2.0);
            i += 1.0;
        }
        result
    };
    let start = 1.0 + (rate + 1.0) / frequency;
    let factor = newton_method(func, deriv, start, 100, 1e-5, None)?;
    number((factor - 1.0) * frequency)
}

/// Macaulay duration of a bond
fn duration(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<f64> {
    let settlement = date_serial(args, 0, ctx)?;
    let maturity = date_serial(args, 1, ctx)?;
    let rate = num(args, 2, ctx)?;
    let yield_rate = num(args, 3, ctx)?;
    let frequency = num(args, 4, ctx)?.trunc();
    check_maturity_after_settlement(settlement, maturity)?;
    check_frequency(frequency)?;
    let convention = day_count_convention(args, 5, ctx)?;
    positive_or_zero("rate", rate)?;
    positive_or_zero("yield", yield_rate)?;

    let years = year_frac(settlement, maturity, convention)?;
    let fraction = years - years.trunc();
    let time_first_year = if fraction == 0.0 { 1.0 / frequency } else { fraction };
    let coupons = (years * frequency).ceil();

    let coupon = rate / frequency;
    let yield_per_period = yield_rate / frequency;

    let mut weighted = 0.0;
    let mut total = 0.0;
    let mut i = 1.0;
    while i <= coupons {
        let cash_flow = coupon + if i == coupons { 1.0 } else { 0.0 };
        let present_value = cash_flow / (1.0 + yield_per_period).powf(i);
        weighted += (time_first_year + (i - 1.0) / frequency) * present_value;
        total += present_value;
        i += 1.0;
    }
    Ok(if total == 0.0 { 0.0 } else { weighted / total })
}

fn fn_duration(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(duration(args, ctx)?)
}

fn fn_mduration(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let macaulay = duration(args, ctx)?;
    let yield_rate = num(args, 3, ctx)?;
    let frequency = num(args, 4, ctx)?.trunc();
    number(macaulay / (1.0 + yield_rate / frequency))
}

// Treasury bills

fn treasury_bill_dates(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<(f64, f64)> {
    let settlement = date_serial(args, 0, ctx)?;
    let maturity = date_serial(args, 1, ctx)?;
    check_maturity_after_settlement(settlement, maturity)?;
    check_within_a_year(settlement, maturity)?;
    Ok((settlement, maturity))
}

fn treasury_bill_discount(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<f64> {
    let discount = num(args, 2, ctx)?;
    strictly_positive("discount", discount)?;
    ensure(discount < 1.0, || format!("The discount ({}) must be smaller than 1.", fmt(discount)))?;
    Ok(discount)
}

fn tbill_price(settlement: f64, maturity: f64, discount: f64) -> EvalResult<f64> {
    Ok(100.0 * (1.0 - discount * year_frac(settlement, maturity, 2)?))
}

fn fn_tbillprice(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity) = treasury_bill_dates(args, ctx)?;
    let discount = treasury_bill_discount(args, ctx)?;
    number(tbill_price(settlement, maturity, discount)?)
}

fn fn_tbilleq(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity) = treasury_bill_dates(args, ctx)?;
    let discount = treasury_bill_discount(args, ctx)?;
    let days = maturity - settlement;
    if days <= 182.0 {
        return number(365.0 * discount / (360.0 - discount * days));
    }
    // Past half a year the bill compounds semi-annually
    let price = tbill_price(settlement, maturity, discount)? / 100.0;
    let days_in_year = if days == 366.0 { 366.0 } else { 365.0 };
    let x = days / days_in_year;
    let numerator = -2.0 * x + 2.0 * (x * x - (2.0 * x - 1.0) * (1.0 - 1.0 / price)).sqrt();
    number(numerator / (2.0 * x - 1.0))
}

fn fn_tbillyield(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let (settlement, maturity) = treasury_bill_dates(args, ctx)?;
    let price = num(args, 2, ctx)?;
    strictly_positive("price", price)?;
    number((100.0 - price) / price / year_frac(settlement, maturity, 2)?)
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_annuities() {
        assert_eq!(eval_number("=PMT(0, 10, 1000)"), -100.0);
        assert_close(eval_number("=PMT(0.1, 2, 100)"), -57.6190476, 1e-6);
        assert_close(eval_number("=FV(0.1, 2, -100)"), 210.0, 1e-9);
        assert_eq!(eval_number("=PV(0, 10, -100)"), 1000.0);
        assert_eq!(eval_number("=NPER(0, -100, 1000)"), 10.0);
        assert_close(eval_number("=NPV(0.1, 110)"), 100.0, 1e-9);
        assert_close(eval_number("=RATE(10, PMT(0.05, 10, 1000), 1000)"), 0.05, 1e-6);
        assert_close(
            eval_number("=PPMT(0.1, 1, 2, 100) + IPMT(0.1, 1, 2, 100)"),
            eval_number("=PMT(0.1, 2, 100)"),
            1e-9,
        );
        assert_close(eval_number("=CUMIPMT(0.09/12, 30*12, 125000, 13, 24, 0)"), -11135.23, 0.01);
        assert!(eval("=PMT(0.1, 0, 100)").is_error());
    }

    #[test]
    fn test_rates() {
        assert_close(eval_number("=EFFECT(0.12, 12)"), 0.126825, 1e-6);
        assert_close(eval_number("=NOMINAL(EFFECT(0.12, 12), 12)"), 0.12, 1e-9);
        assert_close(eval_number("=RRI(2, 100, 121)"), 0.1, 1e-9);
        assert!(eval("=EFFECT(0, 12)").is_error());
    }

    #[test]
    fn test_cash_flows() {
        let mut grid = Grid::new(&[
            ("A1", Value::Number(-100.0)),
            ("A2", Value::Number(110.0)),
            ("B1", Value::Number(-10000.0)),
            ("B2", Value::Number(2750.0)),
            ("B3", Value::Number(4250.0)),
            ("B4", Value::Number(3250.0)),
            ("B5", Value::Number(2750.0)),
            ("C1", Value::Number(39448.0)),
            ("C2", Value::Number(39508.0)),
            ("C3", Value::Number(39751.0)),
            ("C4", Value::Number(39859.0)),
            ("C5", Value::Number(39904.0)),
        ]);
        match eval_in("=IRR(A1:A2)", &mut grid) {
            Value::Number(n) => assert_close(n, 0.1, 1e-6),
            other => panic!("{:?}", other),
        }
        match eval_in("=XNPV(0.09, B1:B5, C1:C5)", &mut grid) {
            Value::Number(n) => assert_close(n, 2086.65, 0.01),
            other => panic!("{:?}", other),
        }
        match eval_in("=XIRR(B1:B5, C1:C5)", &mut grid) {
            Value::Number(n) => assert_close(n, 0.373362535, 1e-4),
            other => panic!("{:?}", other),
        }
        assert!(eval_in("=XNPV(0.09, B1:B5, C1:C4)", &mut grid).is_error());
    }

    #[test]
    fn test_depreciation() {
        assert_eq!(eval_number("=SLN(1000, 100, 9)"), 100.0);
        assert_eq!(eval_number("=SYD(1000, 100, 9, 1)"), 180.0);
        assert_eq!(eval_number("=DDB(1000, 100, 5, 1)"), 400.0);
        assert_close(eval_number("=DB(1000000, 100000, 6, 1, 7)"), 186083.33, 0.01);
        assert_close(eval_number("=VDB(2400, 300, 10, 0, 1)"), 480.0, 1e-9);
        assert_close(eval_number("=AMORLINC(2400, DATE(2008, 8, 19), DATE(2008, 12, 31), 300, 1, 0.15, 1)"), 360.0, 1e-9);
        assert!(eval("=SYD(1000, 100, 9, 10)").is_error());
    }

    #[test]
    fn test_fractional_prices() {
        assert_eq!(eval_number("=DOLLARDE(1.02, 16)"), 1.125);
        assert_close(eval_number("=DOLLARFR(1.125, 16)"), 1.02, 1e-12);
        assert!(eval("=DOLLARDE(1.02, 0)").is_error());
    }

    #[test]
    fn test_coupons() {
        let args = "DATE(2024, 1, 25), DATE(2026, 11, 15), 2";
        assert_eq!(eval_number(&format!("=COUPNUM({})", args)), 6.0);
        assert_eq!(eval_number(&format!("=COUPPCD({})", args)), eval_number("=DATE(2023, 11, 15)"));
        assert_eq!(eval_number(&format!("=COUPNCD({})", args)), eval_number("=DATE(2024, 5, 15)"));
        assert_eq!(eval_number(&format!("=COUPDAYS({})", args)), 180.0);
        assert_eq!(eval_number(&format!("=COUPDAYBS({})", args)), 70.0);
        assert_eq!(eval_number(&format!("=COUPDAYSNC({})", args)), 110.0);
        assert!(eval("=COUPNUM(DATE(2024, 1, 25), DATE(2026, 11, 15), 3)").is_error());
    }

    #[test]
    fn test_securities() {
        assert_close(eval_number("=DISC(DATE(2007, 1, 25), DATE(2007, 6, 15), 97.975, 100, 1)"), 0.052420213, 1e-6);
        assert_close(eval_number("=TBILLPRICE(DATE(2008, 3, 31), DATE(2008, 6, 1), 0.09)"), 98.45, 1e-9);
        assert_close(
            eval_number("=PRICE(DATE(2008, 2, 15), DATE(2017, 11, 15), 0.0575, 0.065, 100, 2, 0)"),
            94.63436,
            1e-3,
        );
        assert_close(
            eval_number("=YIELD(DATE(2008, 2, 15), DATE(2016, 11, 15), 0.0575, 95.04287, 100, 2, 0)"),
            0.065,
            1e-4,
        );
        assert!(eval("=TBILLPRICE(DATE(2008, 3, 31), DATE(2009, 6, 1), 0.09)").is_error());
        assert!(eval("=DISC(DATE(2007, 6, 15), DATE(2007, 1, 25), 97.975, 100)").is_error());
    }
}
