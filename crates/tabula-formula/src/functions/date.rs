//! Date and time functions
//!
//! Dates are serial numbers counting days since 1899-12-30; the fractional part is the time
//! of day. Conversions go through `tabula_core::datetime`.

use super::{arg, date_format, has_arg, num, num_or, text};
use crate::coercion::{number_to_text as fmt, to_boolean, to_date, to_number};
use crate::context::EvalContext;
use crate::error::{EvalError, EvalResult, EvaluationError, RegistrationError};
use crate::helpers::{ensure, visit_any};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::{Arg, Format, Value};
use chrono::{Datelike, Duration, NaiveDate, Timelike, Weekday};
use tabula_core::datetime::{
    date_to_serial, datetime_to_serial, is_last_day_of_month, parse_date_time, serial_to_datetime,
};

const DATE_ONLY: &[&str] = &["date (date)"];
const TIME_ONLY: &[&str] = &["time (date)"];

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // DATE
    registry.add(
        "DATE",
        FunctionDef::new(
            "Converts year/month/day into a date.",
            &["year (number)", "month (number)", "day (number)"],
            "DATE",
            fn_date,
        )
        .with_format(date_format),
    )?;

    // DATEDIF
    registry.add(
        "DATEDIF",
        FunctionDef::new(
            "Calculates the number of days, months, or years between two dates.",
            &["start_date (date)", "end_date (date)", "unit (string)"],
            "NUMBER",
            fn_datedif,
        ),
    )?;

    // DATEVALUE
    registry.add(
        "DATEVALUE",
        FunctionDef::new("Converts a date string to a date value.", &["date_string (string)"], "NUMBER", fn_datevalue),
    )?;

    // DAY
    registry.add("DAY", FunctionDef::new("Day of the month that a specific date falls on.", DATE_ONLY, "NUMBER", fn_day))?;

    // DAYS
    registry.add(
        "DAYS",
        FunctionDef::new(
            "Number of days between two dates.",
            &["end_date (date)", "start_date (date)"],
            "NUMBER",
            fn_days,
        ),
    )?;

    // DAYS360
    registry.add(
        "DAYS360",
        FunctionDef::new(
            "Number of days between two dates on a 360-day year (months of 30 days).",
            &["start_date (date)", "end_date (date)", "method (boolean, optional, default=FALSE)"],
            "NUMBER",
            fn_days360,
        ),
    )?;

    // EDATE
    registry.add(
        "EDATE",
        FunctionDef::new(
            "Date a number of months before/after another date.",
            &["start_date (date)", "months (number)"],
            "DATE",
            fn_edate,
        )
        .with_format(date_format),
    )?;

    // EOMONTH
    registry.add(
        "EOMONTH",
        FunctionDef::new(
            "Last day of a month before or after a date.",
            &["start_date (date)", "months (number)"],
            "DATE",
            fn_eomonth,
        )
        .with_format(date_format),
    )?;

    // HOUR
    registry.add("HOUR", FunctionDef::new("Hour component of a specific time.", TIME_ONLY, "NUMBER", fn_hour))?;

    // ISOWEEKNUM
    registry.add(
        "ISOWEEKNUM",
        FunctionDef::new(
            "ISO week number of the year.",
            DATE_ONLY,
            "NUMBER",
            fn_isoweeknum,
        ),
    )?;

    // MINUTE
    registry.add("MINUTE", FunctionDef::new("Minute component of a specific time.", TIME_ONLY, "NUMBER", fn_minute))?;

    // MONTH
    registry.add("MONTH", FunctionDef::new("Month of the year a specific date falls in", DATE_ONLY, "NUMBER", fn_month))?;

    // MONTH.END
    registry.add(
        "MONTH_END",
        FunctionDef::new("Last day of the month following a date.", DATE_ONLY, "DATE", fn_month_end).with_format(date_format),
    )?;

    // MONTH.START
    registry.add(
        "MONTH_START",
        FunctionDef::new("First day of the month preceding a date.", DATE_ONLY, "DATE", fn_month_start)
            .with_format(date_format),
    )?;

    // NETWORKDAYS
    registry.add(
        "NETWORKDAYS",
        FunctionDef::new(
            "Net working days between two provided days.",
            &["start_date (date)", "end_date (date)", "holidays (date, range<date>, optional)"],
            "NUMBER",
            fn_networkdays,
        ),
    )?;

    // NETWORKDAYS.INTL
    registry.add(
        "NETWORKDAYS_INTL",
        FunctionDef::new(
            "Net working days between two dates (specifying weekends).",
            &[
                "start_date (date)",
                "end_date (date)",
                "weekend (any, optional, default=1)",
                "holidays (date, range<date>, optional)",
            ],
            "NUMBER",
            fn_networkdays_intl,
        ),
    )?;

    // NOW
    registry.add(
        "NOW",
        FunctionDef::new("Current date and time as a date value.", &[], "DATE", fn_now).with_format(date_time_format),
    )?;

    // QUARTER
    registry.add("QUARTER", FunctionDef::new("Quarter of the year a specific date falls in", DATE_ONLY, "NUMBER", fn_quarter))?;

    // SECOND
    registry.add("SECOND", FunctionDef::new("Second component of a specific time.", TIME_ONLY, "NUMBER", fn_second))?;

    // TIME
    registry.add(
        "TIME",
        FunctionDef::new(
            "Converts hour/minute/second into a time.",
            &["hour (number)", "minute (number)", "second (number)"],
            "DATE",
            fn_time,
        )
        .with_format(time_format),
    )?;

    // TIMEVALUE
    registry.add(
        "TIMEVALUE",
        FunctionDef::new("Converts a time string into its serial number representation.", &["time_string (string)"], "NUMBER", fn_timevalue),
    )?;

    // TODAY
    registry.add(
        "TODAY",
        FunctionDef::new("Current date as a date value.", &[], "DATE", fn_today).with_format(date_format),
    )?;

    // WEEKDAY
    registry.add(
        "WEEKDAY",
        FunctionDef::new(
            "Day of the week of the date provided (as number).",
            &["date (date)", "type (number, optional, default=1)"],
            "NUMBER",
            fn_weekday,
        ),
    )?;

    // WEEKNUM
    registry.add(
        "WEEKNUM",
        FunctionDef::new(
            "Week number of the year.",
            &["date (date)", "type (number, optional, default=1)"],
            "NUMBER",
            fn_weeknum,
        ),
    )?;

    // WORKDAY
    registry.add(
        "WORKDAY",
        FunctionDef::new(
            "Number of working days from start date.",
            &["start_date (date)", "num_days (number)", "holidays (date, range<date>, optional)"],
            "DATE",
            fn_workday,
        )
        .with_format(date_format),
    )?;

    // WORKDAY.INTL
    registry.add(
        "WORKDAY_INTL",
        FunctionDef::new(
            "Net working days between two dates (specifying weekends).",
            &[
                "start_date (date)",
                "num_days (number)",
                "weekend (any, optional, default=1)",
                "holidays (date, range<date>, optional)",
            ],
            "DATE",
            fn_workday_intl,
        )
        .with_format(date_format),
    )?;

    // YEAR
    registry.add("YEAR", FunctionDef::new("Year specified by a given date.", DATE_ONLY, "NUMBER", fn_year))?;

    // YEAR.START
    registry.add(
        "YEAR_START",
        FunctionDef::new("First day of the year a specific date falls in.", DATE_ONLY, "DATE", fn_year_start)
            .with_format(date_format),
    )?;

    // YEARFRAC
    registry.add(
        "YEARFRAC",
        FunctionDef::new(
            "Exact number of years between two dates.",
            &["start_date (date)", "end_date (date)", "day_count_convention (number, optional, default=0)"],
            "NUMBER",
            fn_yearfrac,
        ),
    )?;

    Ok(())
}

fn date_time_format(_args: &[Arg], ctx: &EvalContext<'_>) -> Option<Format> {
    Some(Format::from(ctx.locale.date_time_format()))
}

fn time_format(_args: &[Arg], ctx: &EvalContext<'_>) -> Option<Format> {
    Some(Format::from(ctx.locale.time_format.clone()))
}

fn number(n: f64) -> EvalResult<Value> {
    Ok(Value::Number(n))
}

fn date_value(date: NaiveDate) -> EvalResult<Value> {
    Ok(Value::Number(date_to_serial(date)))
}

fn date_arg(args: &[Value], index: usize, ctx: &EvalContext<'_>) -> EvalResult<NaiveDate> {
    to_date(arg(args, index), ctx.locale)
}

fn out_of_range() -> EvalError {
    EvaluationError::new("The function [[FUNCTION_NAME]] result is out of the supported date range.").into()
}

pub(crate) fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// First day of the month `months` after the month of (`year`, `month`), any sign
fn month_start(year: i32, month: i64) -> Option<NaiveDate> {
    let total = i64::from(year).checked_mul(12)?.checked_add(month)?.checked_sub(1)?;
    let y = i32::try_from(total.div_euclid(12)).ok()?;
    NaiveDate::from_ymd_opt(y, total.rem_euclid(12) as u32 + 1, 1)
}

/// Shift a date by whole months, clamping the day to the target month length
///
/// With `keep_end_of_month`, a date on the last day of its month lands on the last day of
/// the target month.
pub(crate) fn add_months(date: NaiveDate, months: i64, keep_end_of_month: bool) -> Option<NaiveDate> {
    let first = month_start(date.year(), (date.month() as i64).checked_add(months)?)?;
    let target_len = days_in_month(first.year(), first.month());
    let day = if (keep_end_of_month && is_last_day_of_month(date)) || date.day() > target_len {
        target_len
    } else {
        date.day()
    };
    first.with_day(day)
}

fn validate_day_count_convention(convention: f64) -> EvalResult<u8> {
    ensure((0.0..=4.0).contains(&convention), || {
        format!(
            "The day_count_convention ({}) must be between 0 and 4 inclusive.",
            fmt(convention)
        )
    })?;
    Ok(convention as u8)
}

/// Fraction of a year between two serial dates under a day count convention
///
/// 0 is US (NASD) 30/360, 1 actual/actual, 2 actual/360, 3 actual/365 and 4 European 30/360.
pub(crate) fn year_frac(start: f64, end: f64, convention: u8) -> EvalResult<f64> {
    if start == end {
        return Ok(0.0);
    }
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    let start_date = tabula_core::datetime::serial_to_date(start).ok_or_else(out_of_range)?;
    let end_date = tabula_core::datetime::serial_to_date(end).ok_or_else(out_of_range)?;

    let (y1, m1, mut d1) = (start_date.year(), start_date.month() as i32, start_date.day() as i32);
    let (y2, m2, mut d2) = (end_date.year(), end_date.month() as i32, end_date.day() as i32);
    let thirty_360 = |d1: i32, d2: i32| {
        ((d2 + m2 * 30 + y2 * 360) - (d1 + m1 * 30 + y1 * 360)) as f64 / 360.0
    };

    Ok(match convention {
        0 => {
            if d1 == 31 {
                d1 = 30;
            }
            if d1 == 30 && d2 == 31 {
                d2 = 30;
            }
            if m1 == 2 && is_last_day_of_month(start_date) {
                d1 = 30;
                if m2 == 2 && is_last_day_of_month(end_date) {
                    d2 = 30;
                }
            }
            thirty_360(d1, d2)
        }
        1 => {
            let same_year = y1 == y2;
            let one_year_apart = y1 + 1 == y2;
            let end_later_in_year = m1 < m2 || (m1 == m2 && d1 <= d2);
            let days_in_year = if (!same_year && !one_year_apart) || (!same_year && end_later_in_year) {
                let years = (y1..=y2).count() as f64;
                let days: i32 = (y1..=y2).map(|y| if is_leap_year(y) { 366 } else { 365 }).sum();
                days as f64 / years
            } else if !same_year {
                let spans_leap_day = (is_leap_year(y1) && m1 < 3)
                    || (!is_leap_year(y1) && is_leap_year(y2) && (m2 > 2 || (m2 == 2 && d2 == 29)));
                if spans_leap_day {
                    366.0
                } else {
                    365.0
                }
            } else if is_leap_year(y1) {
                366.0
            } else {
                365.0
            };
            (end - start) / days_in_year
        }
        2 => (end - start) / 360.0,
        3 => (end - start) / 365.0,
        _ => thirty_360(d1.min(30), d2.min(30)),
    })
}

fn fn_date(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut year = num(args, 0, ctx)?.trunc();
    let month = num(args, 1, ctx)?.trunc();
    let day = num(args, 2, ctx)?.trunc();
    ensure((0.0..=9999.0).contains(&year), || {
        format!("The year ({}) must be between 0 and 9999 inclusive.", fmt(year))
    })?;
    if year < 1900.0 {
        year += 1900.0;
    }
    let date = month_start(year as i32, month as i64)
        .and_then(|first| first.checked_add_signed(Duration::try_days((day as i64).checked_sub(1)?)?))
        .ok_or_else(out_of_range)?;
    let serial = date_to_serial(date);
    ensure(serial >= 0.0, || {
        "The function [[FUNCTION_NAME]] result must be greater than or equal 01/01/1900.".to_string()
    })?;
    number(serial)
}

fn fn_datedif(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let unit = text(args, 2)?.to_uppercase();
    ensure(["Y", "M", "D", "MD", "YM", "YD"].contains(&unit.as_str()), || {
        format!("The unit ({}) must be one of Y, M, D, MD, YM, YD", unit)
    })?;
    let start_serial = num(args, 0, ctx)?.trunc();
    let end_serial = num(args, 1, ctx)?.trunc();
    ensure(start_serial <= end_serial, || {
        format!(
            "start_date ({}) should be on or before end_date ({}).",
            fmt(start_serial),
            fmt(end_serial)
        )
    })?;
    let start = date_arg(args, 0, ctx)?;
    let end = date_arg(args, 1, ctx)?;

    let day_before = end.day() < start.day();
    let total_months =
        (end.year() - start.year()) as i64 * 12 + end.month() as i64 - start.month() as i64 - i64::from(day_before);

    let result = match unit.as_str() {
        "D" => end_serial - start_serial,
        "M" => total_months as f64,
        "Y" => total_months.div_euclid(12) as f64,
        "YM" => total_months.rem_euclid(12) as f64,
        "MD" => {
            if !day_before {
                (end.day() - start.day()) as f64
            } else {
                let previous = month_start(end.year(), end.month() as i64 - 1).ok_or_else(out_of_range)?;
                let previous_len = days_in_month(previous.year(), previous.month());
                (previous_len.saturating_sub(start.day()) + end.day()) as f64
            }
        }
        _ => {
            // YD: shift the start into the latest year keeping it on or before the end
            let mut year = end.year();
            let shifted = loop {
                let day = start.day().min(days_in_month(year, start.month()));
                let candidate = NaiveDate::from_ymd_opt(year, start.month(), day).ok_or_else(out_of_range)?;
                if candidate <= end {
                    break candidate;
                }
                year -= 1;
            };
            (end - shifted).num_days() as f64
        }
    };
    number(result)
}

fn fn_datevalue(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let date_string = text(args, 0)?;
    match parse_date_time(&date_string, ctx.locale) {
        Some(parsed) => number(parsed.value.trunc()),
        None => Err(EvaluationError::new(format!(
            "The date_string ({}) cannot be parsed to date/time.",
            date_string
        ))
        .into()),
    }
}

fn fn_day(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(date_arg(args, 0, ctx)?.day() as f64)
}

fn fn_month(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(date_arg(args, 0, ctx)?.month() as f64)
}

fn fn_year(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(date_arg(args, 0, ctx)?.year() as f64)
}

fn fn_quarter(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(((date_arg(args, 0, ctx)?.month() - 1) / 3 + 1) as f64)
}

fn fn_month_start(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let date = date_arg(args, 0, ctx)?;
    date_value(date.with_day(1).ok_or_else(out_of_range)?)
}

fn fn_month_end(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let date = date_arg(args, 0, ctx)?;
    let last = days_in_month(date.year(), date.month());
    date_value(date.with_day(last).ok_or_else(out_of_range)?)
}

fn fn_year_start(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let date = date_arg(args, 0, ctx)?;
    date_value(NaiveDate::from_ymd_opt(date.year(), 1, 1).ok_or_else(out_of_range)?)
}

fn fn_days(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let end = num(args, 0, ctx)?.trunc();
    let start = num(args, 1, ctx)?.trunc();
    number(end - start)
}

fn fn_days360(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let start = date_arg(args, 0, ctx)?;
    let end = date_arg(args, 1, ctx)?;
    let european = to_boolean(arg(args, 2))?;

    let mut d1 = start.day() as i64;
    let mut d2 = end.day() as i64;
    if european {
        d1 = d1.min(30);
        d2 = d2.min(30);
    } else {
        if is_last_day_of_month(start) {
            d1 = 30;
        }
        if d2 == 31 && d1 >= 30 {
            d2 = 30;
        }
    }
    let years = (end.year() - start.year()) as i64;
    let months = end.month() as i64 - start.month() as i64;
    number((years * 360 + months * 30 + d2 - d1) as f64)
}

fn fn_edate(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let start = date_arg(args, 0, ctx)?;
    let months = num(args, 1, ctx)?.trunc() as i64;
    date_value(add_months(start, months, false).ok_or_else(out_of_range)?)
}

fn fn_eomonth(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let start = date_arg(args, 0, ctx)?;
    let months = num(args, 1, ctx)?.trunc() as i64;
    let first = (start.month() as i64)
        .checked_add(months)
        .and_then(|month| month_start(start.year(), month))
        .ok_or_else(out_of_range)?;
    let last = days_in_month(first.year(), first.month());
    date_value(first.with_day(last).ok_or_else(out_of_range)?)
}

fn time_arg(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<chrono::NaiveDateTime> {
    let serial = num(args, 0, ctx)?;
    serial_to_datetime(serial).ok_or_else(out_of_range)
}

fn fn_hour(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(time_arg(args, ctx)?.hour() as f64)
}

fn fn_minute(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(time_arg(args, ctx)?.minute() as f64)
}

fn fn_second(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(time_arg(args, ctx)?.second() as f64)
}

fn fn_isoweeknum(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(date_arg(args, 0, ctx)?.iso_week().week() as f64)
}

fn fn_now(_args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    number(datetime_to_serial(ctx.now))
}

fn fn_today(_args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    date_value(ctx.now.date())
}

fn fn_time(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut hour = num(args, 0, ctx)?.trunc();
    let mut minute = num(args, 1, ctx)?.trunc();
    let mut second = num(args, 2, ctx)?.trunc();

    minute += (second / 60.0).floor();
    second = second.rem_euclid(60.0);
    hour += (minute / 60.0).floor();
    minute = minute.rem_euclid(60.0);
    hour %= 24.0;

    ensure(hour >= 0.0, || "The function [[FUNCTION_NAME]] result cannot be negative".to_string())?;
    number(hour / 24.0 + minute / (24.0 * 60.0) + second / (24.0 * 60.0 * 60.0))
}

fn fn_timevalue(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let time_string = text(args, 0)?;
    match parse_date_time(&time_string, ctx.locale) {
        Some(parsed) => number(parsed.value - parsed.value.trunc()),
        None => Err(EvaluationError::new(format!(
            "The time_string ({}) cannot be parsed to date/time.",
            time_string
        ))
        .into()),
    }
}

/// Days since Sunday, 0 to 6
fn days_from_sunday(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

fn fn_weekday(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let date = date_arg(args, 0, ctx)?;
    let kind = num_or(args, 1, 1.0, ctx)?.trunc();
    let first_day = match kind as i64 {
        1 | 17 => Weekday::Sun,
        2 | 3 | 11 => Weekday::Mon,
        12 => Weekday::Tue,
        13 => Weekday::Wed,
        14 => Weekday::Thu,
        15 => Weekday::Fri,
        16 => Weekday::Sat,
        _ => {
            return Err(EvaluationError::new(format!("The type ({}) is out of range.", fmt(kind))).into());
        }
    };
    let offset = (days_from_sunday(date) + 7 - first_day.num_days_from_sunday()) % 7;
    if kind == 3.0 {
        number(offset as f64)
    } else {
        number(offset as f64 + 1.0)
    }
}

fn fn_weeknum(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let date = date_arg(args, 0, ctx)?;
    let kind = num_or(args, 1, 1.0, ctx)?.trunc();
    let first_day = match kind as i64 {
        21 => return number(date.iso_week().week() as f64),
        1 | 17 => Weekday::Sun,
        2 | 11 => Weekday::Mon,
        12 => Weekday::Tue,
        13 => Weekday::Wed,
        14 => Weekday::Thu,
        15 => Weekday::Fri,
        16 => Weekday::Sat,
        _ => {
            return Err(EvaluationError::new(format!("The type ({}) is out of range.", fmt(kind))).into());
        }
    };
    let jan_first = NaiveDate::from_ymd_opt(date.year(), 1, 1).ok_or_else(out_of_range)?;
    let offset = (days_from_sunday(jan_first) + 7 - first_day.num_days_from_sunday()) % 7;
    number(((date.ordinal0() + offset) / 7 + 1) as f64)
}

/// Non-working days of the week, indexed from Monday
type WeekendMask = [bool; 7];

fn parse_weekend(value: &Value, ctx: &EvalContext<'_>) -> EvalResult<WeekendMask> {
    let mut mask = [false; 7];
    if let Value::Text(code) = value {
        ensure(code.len() == 7 && code.chars().all(|c| c == '0' || c == '1'), || {
            format!(
                "When weekend is a string ({}) it must be composed of \"0\" or \"1\".",
                code
            )
        })?;
        ensure(code != "1111111", || "The weekend must be different from '1111111'.".to_string())?;
        for (day, c) in code.chars().enumerate() {
            mask[day] = c == '1';
        }
        return Ok(mask);
    }
    let n = to_number(value, ctx.locale)?.trunc();
    match n as i64 {
        k @ 1..=7 => {
            mask[((k + 4) % 7) as usize] = true;
            mask[((k + 5) % 7) as usize] = true;
        }
        k @ 11..=17 => mask[((k - 11 + 6) % 7) as usize] = true,
        _ => {
            return Err(EvaluationError::new(format!(
                "The weekend ({}) must be a string or a number in the range 1-7 or 11-17.",
                fmt(n)
            ))
            .into());
        }
    }
    Ok(mask)
}

fn holiday_serials(value: &Value, ctx: &EvalContext<'_>) -> EvalResult<Vec<f64>> {
    let mut holidays = Vec::new();
    if let Value::Matrix(_) = value {
        let mut failure = None;
        visit_any(value, |v| {
            if v.is_empty() {
                return;
            }
            match to_number(v, ctx.locale) {
                Ok(n) => holidays.push(n.trunc()),
                Err(e) => failure = Some(e),
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
    } else if !value.is_empty() {
        holidays.push(to_number(value, ctx.locale)?.trunc());
    }
    Ok(holidays)
}

fn is_working_day(date: NaiveDate, weekend: &WeekendMask, holidays: &[f64]) -> bool {
    !weekend[date.weekday().num_days_from_monday() as usize] && !holidays.contains(&date_to_serial(date))
}

fn network_days(args: &[Value], weekend: WeekendMask, holidays: &Value, ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let start = date_arg(args, 0, ctx)?;
    let end = date_arg(args, 1, ctx)?;
    let holidays = holiday_serials(holidays, ctx)?;
    let (from, to, sign) = if start <= end { (start, end, 1.0) } else { (end, start, -1.0) };
    let mut count = 0;
    let mut day = from;
    while day <= to {
        if is_working_day(day, &weekend, &holidays) {
            count += 1;
        }
        day = day.succ_opt().ok_or_else(out_of_range)?;
    }
    number(sign * count as f64)
}

fn fn_networkdays(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    network_days(args, parse_weekend(&Value::Number(1.0), ctx)?, arg(args, 2), ctx)
}

fn fn_networkdays_intl(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    network_days(args, parse_weekend(arg(args, 2), ctx)?, arg(args, 3), ctx)
}

fn work_day(args: &[Value], weekend: WeekendMask, holidays: &Value, ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut date = date_arg(args, 0, ctx)?;
    let mut remaining = num(args, 1, ctx)?.trunc() as i64;
    let holidays = holiday_serials(holidays, ctx)?;
    let step = if remaining < 0 { -1 } else { 1 };
    while remaining != 0 {
        date = date
            .checked_add_signed(Duration::days(step))
            .ok_or_else(out_of_range)?;
        if is_working_day(date, &weekend, &holidays) {
            remaining -= step;
        }
    }
    date_value(date)
}

fn fn_workday(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    work_day(args, parse_weekend(&Value::Number(1.0), ctx)?, arg(args, 2), ctx)
}

fn fn_workday_intl(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    work_day(args, parse_weekend(arg(args, 2), ctx)?, arg(args, 3), ctx)
}

fn fn_yearfrac(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let start = num(args, 0, ctx)?.trunc();
    let end = num(args, 1, ctx)?.trunc();
    let convention = if has_arg(args, 2) { num(args, 2, ctx)?.trunc() } else { 0.0 };
    ensure(start >= 0.0, || format!("The start_date ({}) must be positive or null.", fmt(start)))?;
    ensure(end >= 0.0, || format!("The end_date ({}) must be positive or null.", fmt(end)))?;
    let convention = validate_day_count_convention(convention)?;
    number(year_frac(start, end, convention)?)
}

/// Shared with the financial functions
pub(crate) fn day_count_convention(args: &[Value], index: usize, ctx: &EvalContext<'_>) -> EvalResult<u8> {
    let value = arg(args, index);
    let convention = if value.is_empty() { 0.0 } else { to_number(value, ctx.locale)?.trunc() };
    validate_day_count_convention(convention)
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_date_construction() {
        assert_eq!(eval_number("=DATE(2024, 3, 15)"), 45366.0);
        assert_eq!(eval_number("=DATE(2024, 13, 1)"), eval_number("=DATE(2025, 1, 1)"));
        assert_eq!(eval_number("=DATE(2024, 3, 0)"), eval_number("=DATE(2024, 2, 29)"));
        assert_eq!(eval_number("=DATE(99, 1, 1)"), eval_number("=DATE(1999, 1, 1)"));
        assert!(eval("=DATE(10000, 1, 1)").is_error());
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(eval_number("=YEAR(\"2024-03-15\")"), 2024.0);
        assert_eq!(eval_number("=MONTH(45366)"), 3.0);
        assert_eq!(eval_number("=DAY(45366)"), 15.0);
        assert_eq!(eval_number("=QUARTER(45366)"), 1.0);
        assert_eq!(eval_number("=HOUR(0.75)"), 18.0);
        assert_eq!(eval_number("=MINUTE(TIME(10, 45, 30))"), 45.0);
        assert_eq!(eval_number("=SECOND(TIME(10, 45, 30))"), 30.0);
        assert_eq!(eval_number("=TIME(25, 0, 0)"), 1.0 / 24.0);
    }

    #[test]
    fn test_month_arithmetic() {
        assert_eq!(eval_number("=EDATE(DATE(2024, 1, 31), 1)"), eval_number("=DATE(2024, 2, 29)"));
        assert_eq!(eval_number("=EOMONTH(DATE(2024, 1, 15), 1)"), eval_number("=DATE(2024, 2, 29)"));
        assert_eq!(eval_number("=EOMONTH(DATE(2024, 1, 15), -2)"), eval_number("=DATE(2023, 11, 30)"));
        assert_eq!(eval_number("=MONTH.END(DATE(2023, 2, 3))"), eval_number("=DATE(2023, 2, 28)"));
        assert_eq!(eval_number("=MONTH.START(DATE(2023, 2, 3))"), eval_number("=DATE(2023, 2, 1)"));
        assert_eq!(eval_number("=YEAR.START(DATE(2023, 8, 3))"), eval_number("=DATE(2023, 1, 1)"));
    }

    #[test]
    fn test_out_of_range_serials_are_errors() {
        for formula in [
            "=EDATE(1E12, 1)",
            "=EOMONTH(-1E12, 1)",
            "=EDATE(1, 1E300)",
            "=EOMONTH(1, -1E300)",
            "=WEEKDAY(1E15)",
            "=DAYS360(1, 1E15)",
            "=DATE(2024, 1, 1E15)",
            "=DATE(2024, 1E300, 1)",
            "=DATE(2024, 1, -1E300)",
        ] {
            assert!(eval(formula).is_error(), "{} should be an error", formula);
        }
    }

    #[test]
    fn test_differences() {
        assert_eq!(eval_number("=DAYS(DATE(2024, 3, 1), DATE(2024, 2, 1))"), 29.0);
        assert_eq!(eval_number("=DATEDIF(DATE(2020, 1, 15), DATE(2024, 3, 10), \"Y\")"), 4.0);
        assert_eq!(eval_number("=DATEDIF(DATE(2020, 1, 15), DATE(2024, 3, 10), \"M\")"), 49.0);
        assert_eq!(eval_number("=DATEDIF(DATE(2020, 1, 15), DATE(2024, 3, 10), \"YM\")"), 1.0);
        assert_eq!(eval_number("=DATEDIF(DATE(2024, 1, 1), DATE(2024, 1, 31), \"D\")"), 30.0);
        assert!(eval("=DATEDIF(DATE(2024, 1, 2), DATE(2024, 1, 1), \"D\")").is_error());
        assert!(eval("=DATEDIF(DATE(2024, 1, 1), DATE(2024, 1, 2), \"W\")").is_error());
        assert_eq!(eval_number("=DAYS360(DATE(2024, 1, 31), DATE(2024, 3, 31))"), 60.0);
    }

    #[test]
    fn test_weeks() {
        // 2024-03-15 is a Friday
        assert_eq!(eval_number("=WEEKDAY(DATE(2024, 3, 15))"), 6.0);
        assert_eq!(eval_number("=WEEKDAY(DATE(2024, 3, 15), 2)"), 5.0);
        assert_eq!(eval_number("=WEEKDAY(DATE(2024, 3, 15), 3)"), 4.0);
        assert!(eval("=WEEKDAY(DATE(2024, 3, 15), 4)").is_error());
        assert_eq!(eval_number("=WEEKNUM(DATE(2024, 1, 1))"), 1.0);
        assert_eq!(eval_number("=WEEKNUM(DATE(2024, 1, 7))"), 2.0);
        assert_eq!(eval_number("=ISOWEEKNUM(DATE(2024, 3, 15))"), 11.0);
    }

    #[test]
    fn test_working_days() {
        assert_eq!(eval_number("=NETWORKDAYS(DATE(2024, 3, 11), DATE(2024, 3, 17))"), 5.0);
        assert_eq!(eval_number("=NETWORKDAYS(DATE(2024, 3, 17), DATE(2024, 3, 11))"), -5.0);
        assert_eq!(eval_number("=NETWORKDAYS.INTL(DATE(2024, 3, 11), DATE(2024, 3, 17), 11)"), 6.0);
        assert_eq!(
            eval_number("=NETWORKDAYS.INTL(DATE(2024, 3, 11), DATE(2024, 3, 17), \"0000011\")"),
            5.0
        );
        assert_eq!(eval_number("=WORKDAY(DATE(2024, 3, 15), 1)"), eval_number("=DATE(2024, 3, 18)"));
        assert_eq!(eval_number("=WORKDAY(DATE(2024, 3, 18), -1)"), eval_number("=DATE(2024, 3, 15)"));
        let mut grid = Grid::new(&[("A1", Value::Number(45369.0))]);
        assert_eq!(
            eval_in("=WORKDAY(DATE(2024, 3, 15), 1, A1:A1)", &mut grid),
            Value::Number(45370.0)
        );
        assert!(eval("=WORKDAY.INTL(DATE(2024, 3, 15), 1, \"1111111\")").is_error());
    }

    #[test]
    fn test_yearfrac() {
        assert_eq!(eval_number("=YEARFRAC(DATE(2024, 1, 1), DATE(2024, 7, 1))"), 0.5);
        assert_eq!(eval_number("=YEARFRAC(DATE(2024, 7, 1), DATE(2024, 1, 1))"), 0.5);
        assert_eq!(eval_number("=YEARFRAC(DATE(2023, 1, 1), DATE(2023, 12, 31), 3)"), 364.0 / 365.0);
        assert_eq!(eval_number("=YEARFRAC(DATE(2024, 1, 1), DATE(2024, 12, 31), 1)"), 365.0 / 366.0);
        assert!(eval("=YEARFRAC(1, 2, 5)").is_error());
    }

    #[test]
    fn test_now_and_today() {
        assert_eq!(eval_number("=TODAY()"), 45366.0);
        assert_eq!(eval_number("=NOW()"), 45366.4375);
        assert_eq!(eval_number("=DATEVALUE(\"2024-03-15\")"), 45366.0);
        assert_eq!(eval_number("=TIMEVALUE(\"18:00\")"), 0.75);
    }
}
