//! Value coercion
//!
//! Pure conversions from runtime values to the types function bodies work with. Strings are
//! parsed with the locale's separators; date and time strings become serial numbers.

use crate::error::{CoercionError, EvalError, EvalResult, EvaluationError};
use crate::value::Value;
use chrono::NaiveDate;
use lazy_regex::regex_is_match;
use tabula_core::datetime::{parse_date_time, serial_to_date};
use tabula_core::Locale;

/// Parse a numeric string: sign, digits, decimal separator, exponent, optional `%` suffix
pub fn parse_number(text: &str, locale: &Locale) -> Option<f64> {
    let trimmed = text.trim();
    let (body, percent) = match trimmed.strip_suffix('%') {
        Some(rest) => (rest.trim_end(), true),
        None => (trimmed, false),
    };
    if body.is_empty() {
        return None;
    }

    let mut normalized = String::with_capacity(body.len());
    let mut grouped = false;
    for c in body.chars() {
        if Some(c) == locale.thousands_separator {
            grouped = true;
        } else if c == locale.decimal_separator {
            normalized.push('.');
        } else if c == '.' || c == ',' {
            // A separator the locale does not use
            return None;
        } else {
            normalized.push(c);
        }
    }
    if grouped && !has_valid_grouping(body, locale) {
        return None;
    }
    if !regex_is_match!(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$", &normalized) {
        return None;
    }
    let n: f64 = normalized.parse().ok()?;
    Some(if percent { n / 100.0 } else { n })
}

fn has_valid_grouping(body: &str, locale: &Locale) -> bool {
    let Some(sep) = locale.thousands_separator else {
        return false;
    };
    let unsigned = body.trim_start_matches(['+', '-']);
    let int_part = unsigned
        .split(locale.decimal_separator)
        .next()
        .unwrap_or(unsigned);
    let groups: Vec<&str> = int_part.split(sep).collect();
    groups[0].len() >= 1
        && groups[0].len() <= 3
        && groups[1..].iter().all(|g| g.len() == 3)
        && groups.iter().all(|g| g.bytes().all(|b| b.is_ascii_digit()))
}

/// Whether a string would be read as a number (dates excluded)
pub fn is_number(text: &str, locale: &Locale) -> bool {
    parse_number(text, locale).is_some()
}

fn single(value: &Value) -> EvalResult<&Value> {
    match value {
        Value::Matrix(m) => match m.as_slice() {
            [col] if col.len() == 1 => Ok(&col[0]),
            _ => Err(EvaluationError::new(
                "The function [[FUNCTION_NAME]] expects a single value, not a range.",
            )
            .into()),
        },
        Value::Error(e) => Err(EvalError::Propagated {
            kind: e.kind,
            message: e.message.clone(),
        }),
        other => Ok(other),
    }
}

/// Convert to a number; empty values and empty strings are 0
pub fn to_number(value: &Value, locale: &Locale) -> EvalResult<f64> {
    match single(value)? {
        Value::Empty => Ok(0.0),
        Value::Number(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) if s.is_empty() => Ok(0.0),
        Value::Text(s) => parse_number(s, locale)
            .or_else(|| parse_date_time(s, locale).map(|d| d.value))
            .ok_or_else(|| CoercionError::NotANumber(s.clone()).into()),
        _ => Err(CoercionError::NotANumber(value.to_string()).into()),
    }
}

/// Like [`to_number`] but an explicit empty string is rejected
pub fn strict_to_number(value: &Value, locale: &Locale) -> EvalResult<f64> {
    if let Value::Text(s) = single(value)? {
        if s.is_empty() {
            return Err(CoercionError::NotANumber(String::new()).into());
        }
    }
    to_number(value, locale)
}

/// Convert to a boolean; empty values and empty strings are false
pub fn to_boolean(value: &Value) -> EvalResult<bool> {
    match single(value)? {
        Value::Empty => Ok(false),
        Value::Boolean(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Text(s) if s.is_empty() => Ok(false),
        Value::Text(s) => match s.to_uppercase().as_str() {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            _ => Err(CoercionError::NotABoolean(s.clone()).into()),
        },
        other => Err(CoercionError::NotABoolean(other.to_string()).into()),
    }
}

/// Like [`to_boolean`] but an explicit empty string is rejected
pub fn strict_to_boolean(value: &Value) -> EvalResult<bool> {
    if let Value::Text(s) = single(value)? {
        if s.is_empty() {
            return Err(CoercionError::NotABoolean(String::new()).into());
        }
    }
    to_boolean(value)
}

/// Convert to text; numbers use their shortest decimal representation
pub fn to_text(value: &Value) -> EvalResult<String> {
    Ok(match single(value)? {
        Value::Empty => String::new(),
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Shortest decimal representation of a number, switching to exponent form for very large
/// or very small magnitudes
pub fn number_to_text(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if !n.is_finite() {
        return if n.is_nan() { "NaN" } else if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let text = format!("{:e}", n);
        match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => text,
        }
    } else {
        format!("{}", n)
    }
}

/// Convert to a calendar date through its serial number
pub fn to_date(value: &Value, locale: &Locale) -> EvalResult<NaiveDate> {
    let serial = to_number(value, locale)?;
    serial_to_date(serial.trunc()).ok_or_else(|| {
        EvaluationError::new(format!(
            "The function [[FUNCTION_NAME]] expects a valid date, but {} is out of range.",
            number_to_text(serial)
        ))
        .into()
    })
}

/// Convert to an integer by truncation
pub fn to_int(value: &Value, locale: &Locale) -> EvalResult<i64> {
    Ok(to_number(value, locale)?.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn locale() -> Locale {
        Locale::default()
    }

    #[test]
    fn test_to_number_strings() {
        let l = locale();
        assert_eq!(to_number(&Value::from("42"), &l).unwrap(), 42.0);
        assert_eq!(to_number(&Value::from("50%"), &l).unwrap(), 0.5);
        assert_eq!(to_number(&Value::from(" -1.5e2 "), &l).unwrap(), -150.0);
        assert_eq!(to_number(&Value::from(".5"), &l).unwrap(), 0.5);
        assert_eq!(to_number(&Value::from("1,234.5"), &l).unwrap(), 1234.5);
        assert_eq!(to_number(&Value::from(""), &l).unwrap(), 0.0);
        assert_eq!(to_number(&Value::from("1/1/2020"), &l).unwrap(), 43831.0);
        assert!(matches!(
            to_number(&Value::from("abc"), &l),
            Err(EvalError::Coercion(CoercionError::NotANumber(_)))
        ));
        assert!(to_number(&Value::from("1,23"), &l).is_err());
    }

    #[test]
    fn test_to_number_locale() {
        let l = Locale {
            decimal_separator: ',',
            thousands_separator: Some('.'),
            formula_arg_separator: ';',
            ..Locale::default()
        };
        assert_eq!(to_number(&Value::from("1,5"), &l).unwrap(), 1.5);
        assert_eq!(to_number(&Value::from("1.000,5"), &l).unwrap(), 1000.5);
    }

    #[test]
    fn test_strict_variants_reject_empty_string() {
        let l = locale();
        assert!(strict_to_number(&Value::from(""), &l).is_err());
        assert_eq!(strict_to_number(&Value::Empty, &l).unwrap(), 0.0);
        assert!(strict_to_boolean(&Value::from("")).is_err());
        assert!(!to_boolean(&Value::from("")).unwrap());
    }

    #[test]
    fn test_to_boolean() {
        assert!(to_boolean(&Value::from("true")).unwrap());
        assert!(!to_boolean(&Value::from("FALSE")).unwrap());
        assert!(to_boolean(&Value::Number(-2.0)).unwrap());
        assert!(matches!(
            to_boolean(&Value::from("yes")),
            Err(EvalError::Coercion(CoercionError::NotABoolean(_)))
        ));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(&Value::Number(1.0)).unwrap(), "1");
        assert_eq!(to_text(&Value::Number(0.1 + 0.2)).unwrap(), "0.30000000000000004");
        assert_eq!(to_text(&Value::Boolean(false)).unwrap(), "FALSE");
        assert_eq!(to_text(&Value::Empty).unwrap(), "");
        assert_eq!(number_to_text(1e21), "1e+21");
        assert_eq!(number_to_text(1.5e-7), "1.5e-7");
        assert_eq!(number_to_text(-0.0), "0");
    }

    #[test]
    fn test_error_values_propagate() {
        let err = Value::error(tabula_core::CellError::Cycle, "cycle");
        assert_eq!(to_number(&err, &locale()).unwrap_err().kind(), tabula_core::CellError::Cycle);
    }

    proptest! {
        #[test]
        fn prop_numbers_and_booleans_always_coerce(n in proptest::num::f64::ANY, b in any::<bool>()) {
            let l = locale();
            prop_assert!(to_number(&Value::Number(n), &l).is_ok());
            prop_assert!(to_number(&Value::Boolean(b), &l).is_ok());
            prop_assert!(to_boolean(&Value::Number(n)).is_ok());
            prop_assert!(to_boolean(&Value::Boolean(b)).is_ok());
        }

        #[test]
        fn prop_number_text_round_trips(n in -1e15f64..1e15f64) {
            let text = number_to_text(n);
            prop_assert_eq!(to_number(&Value::Text(text), &locale()).unwrap(), n);
        }
    }
}
