//! Date serial numbers
//!
//! Dates are stored as numbers: the integer part counts days since 1899-12-30 (serial 0) and
//! the fractional part is the time of day.

use crate::Locale;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Day zero of the serial number system
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Convert a calendar date to its serial number
pub fn date_to_serial(date: NaiveDate) -> f64 {
    (date - epoch()).num_days() as f64
}

/// Convert a date and time to its serial number
pub fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    date_to_serial(dt.date()) + dt.time().num_seconds_from_midnight() as f64 / SECONDS_PER_DAY
}

/// Convert a serial number to a date and time, rounded to the second
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    let seconds = ((serial - days) * SECONDS_PER_DAY).round() as i64;
    let date = epoch().checked_add_signed(Duration::try_days(days as i64)?)?;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Convert a serial number to a calendar date (time of day dropped)
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    epoch().checked_add_signed(Duration::try_days(serial.floor() as i64)?)
}

/// A date/time string recognized as a number, with the format it was typed in
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDateTime {
    pub value: f64,
    pub format: String,
}

/// Parse strings like "3/15/2024", "2024-03-15", "14:30", "2:30 PM" or "3/15/2024 10:00:00"
///
/// Day/month order follows the locale date format for three-part dates that do not start
/// with a four-digit year.
pub fn parse_date_time(s: &str, locale: &Locale) -> Option<ParsedDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (date_part, time_part) = split_date_time(s);

    let date = match date_part {
        Some(text) => Some(parse_date(text, locale)?),
        None => None,
    };
    let time = match time_part {
        Some(text) => Some(parse_time(text)?),
        None => None,
    };

    match (date, time) {
        (Some((d, d_fmt)), Some((t, t_fmt))) => Some(ParsedDateTime {
            value: date_to_serial(d) + t,
            format: format!("{} {}", d_fmt, t_fmt),
        }),
        (Some((d, format)), None) => Some(ParsedDateTime {
            value: date_to_serial(d),
            format,
        }),
        (None, Some((value, format))) => Some(ParsedDateTime { value, format }),
        (None, None) => None,
    }
}

fn split_date_time(s: &str) -> (Option<&str>, Option<&str>) {
    let has_date = s
        .split_whitespace()
        .next()
        .map_or(false, |first| first.contains(['/', '-', '.']) && !first.contains(':'));
    if !has_date {
        return (None, Some(s));
    }
    match s.split_once(char::is_whitespace) {
        Some((date, time)) => (Some(date), Some(time.trim())),
        None => (Some(s), None),
    }
}

fn parse_date(s: &str, locale: &Locale) -> Option<(NaiveDate, String)> {
    let sep = s.chars().find(|c| matches!(c, '/' | '-' | '.'))?;
    let parts: Vec<&str> = s.split(sep).collect();
    if parts
        .iter()
        .any(|p| p.is_empty() || p.len() > 4 || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let nums: Vec<i32> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    let day_first = locale.date_format.trim_start().starts_with('d');

    let (year, month, day, format) = match (parts.len(), parts[0].len()) {
        (3, 4) => (nums[0], nums[1], nums[2], format!("yyyy{sep}m{sep}d")),
        (3, _) if parts[2].len() == 3 => return None,
        (3, _) if day_first => (expand_year(nums[2], parts[2]), nums[1], nums[0], format!("d{sep}m{sep}yyyy")),
        (3, _) => (expand_year(nums[2], parts[2]), nums[0], nums[1], format!("m{sep}d{sep}yyyy")),
        (2, 4) => return None,
        (2, _) if day_first => (chrono::Local::now().year(), nums[1], nums[0], format!("d{sep}m")),
        (2, _) => (chrono::Local::now().year(), nums[0], nums[1], format!("m{sep}d")),
        _ => return None,
    };
    if sep == '.' && parts.len() == 2 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)?;
    Some((date, format))
}

fn expand_year(year: i32, text: &str) -> i32 {
    match text.len() {
        1 | 2 if year < 30 => 2000 + year,
        1 | 2 => 1900 + year,
        _ => year,
    }
}

fn parse_time(s: &str) -> Option<(f64, String)> {
    let lower = s.to_ascii_lowercase();
    let (clock, meridian) = if let Some(rest) = lower.strip_suffix("am") {
        (rest.trim_end(), Some(false))
    } else if let Some(rest) = lower.strip_suffix("pm") {
        (rest.trim_end(), Some(true))
    } else {
        (lower.as_str(), None)
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.is_empty()
        || parts.len() > 3
        || (parts.len() == 1 && meridian.is_none())
        || parts
            .iter()
            .any(|p| p.is_empty() || p.len() > 2 || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let nums: Vec<u32> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    let mut hours = nums[0];
    let minutes = nums.get(1).copied().unwrap_or(0);
    let seconds = nums.get(2).copied().unwrap_or(0);

    match meridian {
        Some(pm) => {
            if hours == 0 || hours > 12 {
                return None;
            }
            hours %= 12;
            if pm {
                hours += 12;
            }
        }
        None if hours > 23 => return None,
        None => {}
    }
    let time = NaiveTime::from_hms_opt(hours, minutes, seconds)?;

    let mut format = if parts.len() == 3 { "hh:mm:ss" } else { "hh:mm" }.to_string();
    if meridian.is_some() {
        format.push_str(" a");
    }
    Some((
        time.num_seconds_from_midnight() as f64 / SECONDS_PER_DAY,
        format,
    ))
}

/// Whether a calendar date is the last day of its month
pub fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.month() != date.month())
}
