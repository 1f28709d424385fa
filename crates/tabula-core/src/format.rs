//! Number display formats
//!
//! Format strings follow the usual spreadsheet conventions: `0` and `#` digit placeholders,
//! `,` for thousands grouping (or scaling by 1000 when trailing), `%`, `E+00` exponents,
//! quoted literals, `[$...]` currency literals, up to three `;`-separated sections for
//! positive, negative and zero values, and date/time tokens (`d`, `m`, `y`, `h`, `s`, `a`).

use crate::datetime::serial_to_datetime;
use crate::Locale;
use chrono::{Datelike, Timelike};

/// Maximum number of decimals shown when no format is set
pub const DEFAULT_MAX_DECIMALS: usize = 10;

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];
const DAYS: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

/// Format a number for display; `None` selects the general format
pub fn format_number(value: f64, format: Option<&str>, locale: &Locale) -> String {
    match format {
        None => format_general(value, locale),
        Some(f) if f.trim().is_empty() || f.eq_ignore_ascii_case("general") => {
            format_general(value, locale)
        }
        Some(f) if is_date_format(f) => format_date_time(value, f),
        Some(f) => format_with_pattern(value, f, locale),
    }
}

/// General format: shortest representation with at most 10 decimals
pub fn format_general(value: f64, locale: &Locale) -> String {
    if !value.is_finite() {
        return "#ERROR".to_string();
    }
    if value != 0.0 && (value.abs() >= 1e21 || value.abs() < 1e-10) {
        return format_exponent(value, 4, locale);
    }
    let text = trim_decimals(format!("{:.*}", DEFAULT_MAX_DECIMALS, value));
    let text = if text == "-0" { "0".to_string() } else { text };
    localize_decimal(&text, locale)
}

/// Number of decimals displayed by the general format
pub fn general_decimal_count(value: f64) -> usize {
    let text = trim_decimals(format!("{:.*}", DEFAULT_MAX_DECIMALS, value));
    text.split_once('.').map_or(0, |(_, d)| d.len())
}

fn trim_decimals(text: String) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

fn localize_decimal(text: &str, locale: &Locale) -> String {
    text.replace('.', &locale.decimal_separator.to_string())
}

fn format_exponent(value: f64, decimals: usize, locale: &Locale) -> String {
    let text = format!("{:.*e}", decimals, value);
    let (mantissa, exp) = text.split_once('e').unwrap_or((&text, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let mantissa = trim_decimals(mantissa.to_string());
    format!(
        "{}E{}{:02}",
        localize_decimal(&mantissa, locale),
        if exp < 0 { '-' } else { '+' },
        exp.abs()
    )
}

/// Split a format string on `;` outside of quotes and brackets
fn split_sections(format: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut start = 0;
    for (i, c) in format.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            ';' if !in_quotes && !in_brackets => {
                sections.push(&format[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(&format[start..]);
    sections
}

/// Characters outside of literals, used to classify a format
fn unquoted_chars(format: &str) -> String {
    let mut out = String::new();
    let mut chars = format.chars();
    let mut in_quotes = false;
    let mut in_brackets = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if !in_quotes => {
                chars.next();
            }
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            _ if in_quotes || in_brackets => {}
            _ => out.push(c),
        }
    }
    out
}

/// Whether a format displays dates or times
pub fn is_date_format(format: &str) -> bool {
    let plain = unquoted_chars(split_sections(format)[0]).to_ascii_lowercase();
    !plain.contains('0')
        && !plain.contains('#')
        && plain.chars().any(|c| matches!(c, 'd' | 'm' | 'y' | 'h' | 's'))
}

/// A parsed numeric section
#[derive(Debug, Default, PartialEq)]
struct NumberPattern {
    prefix: String,
    suffix: String,
    min_int_digits: usize,
    min_decimals: usize,
    max_decimals: usize,
    grouping: bool,
    percent: bool,
    scale_thousands: u32,
    exponent: Option<usize>,
}

fn parse_pattern(section: &str) -> NumberPattern {
    let mut pattern = NumberPattern::default();
    let mut chars = section.chars().peekable();
    let mut seen_digits = false;
    let mut in_decimals = false;
    let mut done_digits = false;
    let mut trailing_commas = 0u32;

    let push_literal = |pattern: &mut NumberPattern, seen: bool, text: &str| {
        if seen {
            pattern.suffix.push_str(text);
        } else {
            pattern.prefix.push_str(text);
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '0' | '#' | '?' if !done_digits => {
                seen_digits = true;
                if trailing_commas > 0 {
                    pattern.grouping = true;
                    trailing_commas = 0;
                }
                if in_decimals {
                    pattern.max_decimals += 1;
                    if c == '0' {
                        pattern.min_decimals = pattern.max_decimals;
                    }
                } else if c == '0' {
                    pattern.min_int_digits += 1;
                }
            }
            '.' if !done_digits && !in_decimals => {
                seen_digits = true;
                in_decimals = true;
            }
            ',' if seen_digits && !done_digits => trailing_commas += 1,
            'E' | 'e' if seen_digits && !done_digits => {
                if matches!(chars.peek(), Some('+') | Some('-')) {
                    chars.next();
                }
                let mut digits = 0;
                while matches!(chars.peek(), Some('0') | Some('#')) {
                    chars.next();
                    digits += 1;
                }
                pattern.exponent = Some(digits.max(1));
                done_digits = true;
            }
            '%' => {
                pattern.percent = true;
                push_literal(&mut pattern, seen_digits, "%");
            }
            '"' => {
                let literal: String = chars.by_ref().take_while(|&c| c != '"').collect();
                push_literal(&mut pattern, seen_digits, &literal);
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    push_literal(&mut pattern, seen_digits, &next.to_string());
                }
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                if let Some(symbol) = inner.strip_prefix('$') {
                    let symbol = symbol.split('-').next().unwrap_or("");
                    push_literal(&mut pattern, seen_digits, symbol);
                }
            }
            _ => {
                if seen_digits {
                    done_digits = true;
                }
                push_literal(&mut pattern, seen_digits, &c.to_string());
            }
        }
    }
    pattern.scale_thousands = trailing_commas;
    pattern
}

fn format_with_pattern(value: f64, format: &str, locale: &Locale) -> String {
    let sections = split_sections(format);
    let (section, value, explicit_sign) = match sections.len() {
        1 => (sections[0], value, false),
        2 if value < 0.0 => (sections[1], -value, true),
        2 => (sections[0], value, false),
        _ if value < 0.0 => (sections[1], -value, true),
        _ if value == 0.0 => (sections[2], value, false),
        _ => (sections[0], value, false),
    };
    let pattern = parse_pattern(section);
    let body = render_pattern(&pattern, value.abs(), locale);
    let negative = !explicit_sign && value < 0.0 && body.bytes().any(|b| b.is_ascii_digit() && b != b'0');
    format!(
        "{}{}{}{}",
        if negative { "-" } else { "" },
        pattern.prefix,
        body,
        pattern.suffix
    )
}

fn render_pattern(pattern: &NumberPattern, value: f64, locale: &Locale) -> String {
    let mut value = value;
    if pattern.percent {
        value *= 100.0;
    }
    for _ in 0..pattern.scale_thousands {
        value /= 1000.0;
    }
    if let Some(exp_digits) = pattern.exponent {
        let text = format!("{:.*e}", pattern.max_decimals, value);
        let (mantissa, exp) = text.split_once('e').unwrap_or((&text, "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        return format!(
            "{}E{}{:0width$}",
            localize_decimal(mantissa, locale),
            if exp < 0 { '-' } else { '+' },
            exp.abs(),
            width = exp_digits
        );
    }

    let rounded = format!("{:.*}", pattern.max_decimals, value);
    let (int_part, dec_part) = rounded.split_once('.').unwrap_or((&rounded, ""));

    let mut int_digits = int_part.trim_start_matches('0').to_string();
    while int_digits.len() < pattern.min_int_digits {
        int_digits.insert(0, '0');
    }
    if pattern.grouping {
        if let Some(sep) = locale.thousands_separator {
            int_digits = group_thousands(&int_digits, sep);
        }
    }

    let mut decimals = dec_part.to_string();
    while decimals.len() > pattern.min_decimals && decimals.ends_with('0') {
        decimals.pop();
    }
    if decimals.is_empty() {
        int_digits
    } else {
        format!("{}{}{}", int_digits, locale.decimal_separator, decimals)
    }
}

fn group_thousands(digits: &str, sep: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

#[derive(Debug, PartialEq)]
enum DateToken {
    Literal(String),
    Day(usize),
    Month(usize),
    Minute(usize),
    Year(usize),
    Hour(usize),
    Second(usize),
    Meridian,
}

fn tokenize_date_format(format: &str) -> Vec<DateToken> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = format.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let lower = c.to_ascii_lowercase();
        let run = chars[i..]
            .iter()
            .take_while(|x| x.to_ascii_lowercase() == lower)
            .count();
        match lower {
            'd' => tokens.push(DateToken::Day(run)),
            'm' => tokens.push(DateToken::Month(run)),
            'y' => tokens.push(DateToken::Year(run)),
            'h' => tokens.push(DateToken::Hour(run)),
            's' => tokens.push(DateToken::Second(run)),
            'a' => {
                let rest: String = chars[i..].iter().take(5).collect();
                let len = if rest.eq_ignore_ascii_case("am/pm") { 5 } else { 1 };
                tokens.push(DateToken::Meridian);
                i += len;
                continue;
            }
            '"' => {
                let literal: String = chars[i + 1..].iter().take_while(|&&x| x != '"').collect();
                i += literal.chars().count() + 2;
                tokens.push(DateToken::Literal(literal));
                continue;
            }
            _ => {
                tokens.push(DateToken::Literal(c.to_string()));
                i += 1;
                continue;
            }
        }
        i += run;
    }

    // "m" right after an hour or right before seconds means minutes
    for idx in 0..tokens.len() {
        if let DateToken::Month(n) = tokens[idx] {
            let after_hour = tokens[..idx]
                .iter()
                .rev()
                .find(|t| !matches!(t, DateToken::Literal(_)))
                .map_or(false, |t| matches!(t, DateToken::Hour(_)));
            let before_second = tokens[idx + 1..]
                .iter()
                .find(|t| !matches!(t, DateToken::Literal(_)))
                .map_or(false, |t| matches!(t, DateToken::Second(_)));
            if n <= 2 && (after_hour || before_second) {
                tokens[idx] = DateToken::Minute(n);
            }
        }
    }
    tokens
}

/// Format a serial number with a date/time format
pub fn format_date_time(value: f64, format: &str) -> String {
    let Some(dt) = serial_to_datetime(value) else {
        return "#ERROR".to_string();
    };
    let tokens = tokenize_date_format(split_sections(format)[0]);
    let twelve_hour = tokens.contains(&DateToken::Meridian);
    let mut out = String::new();
    for token in &tokens {
        match token {
            DateToken::Literal(s) => out.push_str(s),
            DateToken::Day(1) => out.push_str(&dt.day().to_string()),
            DateToken::Day(2) => out.push_str(&format!("{:02}", dt.day())),
            DateToken::Day(3) => out.push_str(&DAYS[dt.weekday().num_days_from_sunday() as usize][..3]),
            DateToken::Day(_) => out.push_str(DAYS[dt.weekday().num_days_from_sunday() as usize]),
            DateToken::Month(1) => out.push_str(&dt.month().to_string()),
            DateToken::Month(2) => out.push_str(&format!("{:02}", dt.month())),
            DateToken::Month(3) => out.push_str(&MONTHS[dt.month0() as usize][..3]),
            DateToken::Month(4) => out.push_str(MONTHS[dt.month0() as usize]),
            DateToken::Month(_) => out.push_str(&MONTHS[dt.month0() as usize][..1]),
            DateToken::Year(1) | DateToken::Year(2) => {
                out.push_str(&format!("{:02}", dt.year().rem_euclid(100)))
            }
            DateToken::Year(_) => out.push_str(&format!("{:04}", dt.year())),
            DateToken::Hour(n) => {
                let hour = if twelve_hour {
                    match dt.hour() % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    dt.hour()
                };
                if *n >= 2 {
                    out.push_str(&format!("{:02}", hour));
                } else {
                    out.push_str(&hour.to_string());
                }
            }
            DateToken::Minute(1) => out.push_str(&dt.minute().to_string()),
            DateToken::Minute(_) => out.push_str(&format!("{:02}", dt.minute())),
            DateToken::Second(1) => out.push_str(&dt.second().to_string()),
            DateToken::Second(_) => out.push_str(&format!("{:02}", dt.second())),
            DateToken::Meridian => out.push_str(if dt.hour() < 12 { "AM" } else { "PM" }),
        }
    }
    out
}

/// Add or remove one decimal place from a numeric format
///
/// `None` stands for the general format, in which case the decimals currently displayed for
/// `value` are the starting point. Date formats are returned unchanged.
pub fn change_decimal_places(format: Option<&str>, value: f64, step: i32) -> Option<String> {
    let format = match format {
        Some(f) if is_date_format(f) => return Some(f.to_string()),
        Some(f) if !f.eq_ignore_ascii_case("general") && !f.trim().is_empty() => f.to_string(),
        _ => {
            let decimals = general_decimal_count(value);
            if decimals == 0 {
                "0".to_string()
            } else {
                format!("0.{}", "0".repeat(decimals))
            }
        }
    };
    let sections: Vec<String> = split_sections(&format)
        .into_iter()
        .map(|section| change_section_decimals(section, step))
        .collect();
    Some(sections.join(";"))
}

fn change_section_decimals(section: &str, step: i32) -> String {
    let chars: Vec<char> = section.chars().collect();
    let Some(last_digit) = chars.iter().rposition(|c| matches!(c, '0' | '#')) else {
        return section.to_string();
    };
    let dot = chars[..=last_digit].iter().rposition(|&c| c == '.');
    let mut out: Vec<char> = chars.clone();
    if step > 0 {
        match dot {
            Some(_) => out.insert(last_digit + 1, '0'),
            None => {
                out.insert(last_digit + 1, '.');
                out.insert(last_digit + 2, '0');
            }
        }
    } else if let Some(dot) = dot {
        if last_digit > dot {
            out.remove(last_digit);
            if last_digit == dot + 1 {
                out.remove(dot);
            }
        }
    }
    out.into_iter().collect()
}
