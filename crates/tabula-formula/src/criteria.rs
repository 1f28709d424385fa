//! Criteria matching for the *IF / *IFS and database functions
//!
//! A criterion is a value or a string with an optional comparison operator:
//! - `"apple"`, `"a*"`, `"?pple"`: case-insensitive match, `*` and `?` are wildcards, `~`
//!   escapes the next character
//! - `">5"`, `">=10"`, `"<100"`, `"<=50"`, `"<>0"`, `"=5"`: comparisons
//! - `TRUE` / `FALSE`: boolean equality
//!
//! Empty cells never match.

use crate::coercion::{parse_number, to_text};
use crate::error::{EvalResult, EvaluationError};
use crate::value::Value;
use regex::Regex;
use std::cmp::Ordering;
use tabula_core::datetime::parse_date_time;
use tabula_core::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone)]
enum Operand {
    Number(f64),
    Boolean(bool),
    Text { text: String, pattern: Option<Regex> },
}

/// A parsed criterion, ready to be tested against many values
#[derive(Debug, Clone)]
pub struct Criterion {
    operator: Operator,
    operand: Operand,
}

impl Criterion {
    /// Parse a criterion value
    pub fn new(criterion: &Value, locale: &Locale) -> EvalResult<Self> {
        let (operator, operand) = match criterion {
            Value::Number(n) => (Operator::Equal, Operand::Number(*n)),
            Value::Boolean(b) => (Operator::Equal, Operand::Boolean(*b)),
            other => {
                let text = to_text(other)?;
                let (operator, rest) = split_operator(&text);
                (operator, parse_operand(rest, locale))
            }
        };
        let operand = match operand {
            Operand::Text { text, .. } if matches!(operator, Operator::Equal | Operator::NotEqual) => {
                let pattern = wildcard_regex(&text);
                Operand::Text { text, pattern }
            }
            other => other,
        };
        Ok(Self { operator, operand })
    }

    /// Test a value against the criterion
    pub fn matches(&self, value: &Value) -> bool {
        if value.is_empty() {
            return false;
        }
        let ordering = match (&self.operand, value) {
            (Operand::Number(expected), Value::Number(n)) => n.partial_cmp(expected),
            (Operand::Boolean(expected), Value::Boolean(b)) => Some(b.cmp(expected)),
            (Operand::Text { text, pattern }, Value::Text(s)) => match pattern {
                Some(re) => Some(if re.is_match(s) {
                    Ordering::Equal
                } else {
                    Ordering::Less
                }),
                None => Some(s.to_lowercase().cmp(&text.to_lowercase())),
            },
            (Operand::Text { pattern: Some(re), .. }, other) => {
                let text = other.to_string();
                Some(if re.is_match(&text) {
                    Ordering::Equal
                } else {
                    Ordering::Less
                })
            }
            _ => None,
        };
        match (self.operator, ordering) {
            (Operator::NotEqual, ord) => ord != Some(Ordering::Equal),
            (_, None) => false,
            (Operator::Equal, Some(ord)) => ord == Ordering::Equal,
            (Operator::Less, Some(ord)) => ord == Ordering::Less,
            (Operator::LessEqual, Some(ord)) => ord != Ordering::Greater,
            (Operator::Greater, Some(ord)) => ord == Ordering::Greater,
            (Operator::GreaterEqual, Some(ord)) => ord != Ordering::Less,
        }
    }
}

fn split_operator(text: &str) -> (Operator, &str) {
    for (prefix, op) in [
        ("<=", Operator::LessEqual),
        (">=", Operator::GreaterEqual),
        ("<>", Operator::NotEqual),
        ("<", Operator::Less),
        (">", Operator::Greater),
        ("=", Operator::Equal),
    ] {
        if let Some(rest) = text.strip_prefix(prefix) {
            return (op, rest);
        }
    }
    (Operator::Equal, text)
}

fn parse_operand(text: &str, locale: &Locale) -> Operand {
    if let Some(n) = parse_number(text, locale) {
        return Operand::Number(n);
    }
    if let Some(date) = parse_date_time(text, locale) {
        return Operand::Number(date.value);
    }
    match text.to_uppercase().as_str() {
        "TRUE" => Operand::Boolean(true),
        "FALSE" => Operand::Boolean(false),
        _ => Operand::Text {
            text: text.to_string(),
            pattern: None,
        },
    }
}

/// Anchored, case-insensitive regex for a wildcard pattern
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("(?is)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '~' => match chars.next() {
                Some(escaped) => re.push_str(&regex::escape(&escaped.to_string())),
                None => re.push('~'),
            },
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// Visit every `(col, row)` position for which all `(range, criterion)` pairs match.
///
/// All criteria ranges must share the same dimensions.
pub fn visit_matching_ranges(
    args: &[Value],
    locale: &Locale,
    mut cb: impl FnMut(usize, usize),
) -> EvalResult<()> {
    if args.len() % 2 != 0 {
        return Err(EvaluationError::new(
            "Function [[FUNCTION_NAME]] expects criteria_range and criterion to be in pairs.",
        )
        .into());
    }
    let Some(first) = args.first() else {
        return Ok(());
    };
    let dimensions = first.dimensions();

    let mut pairs = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        if pair[0].dimensions() != dimensions {
            return Err(EvaluationError::new(
                "Function [[FUNCTION_NAME]] expects criteria_range to have the same dimension",
            )
            .into());
        }
        pairs.push((&pair[0], Criterion::new(&pair[1], locale)?));
    }

    let (cols, rows) = dimensions;
    for col in 0..cols {
        for row in 0..rows {
            let all_match = pairs
                .iter()
                .all(|(range, criterion)| criterion.matches(&cell_at(range, col, row)));
            if all_match {
                cb(col, row);
            }
        }
    }
    Ok(())
}

/// Value at `(col, row)` in a matrix; a scalar acts as a 1x1 matrix
pub fn cell_at(value: &Value, col: usize, row: usize) -> Value {
    match value {
        Value::Matrix(m) => m
            .get(col)
            .and_then(|c| c.get(row))
            .cloned()
            .unwrap_or(Value::Empty),
        other if col == 0 && row == 0 => other.clone(),
        _ => Value::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn crit(s: &str) -> Criterion {
        Criterion::new(&Value::from(s), &Locale::default()).unwrap()
    }

    #[test]
    fn test_comparisons() {
        assert!(crit(">5").matches(&Value::Number(6.0)));
        assert!(!crit(">5").matches(&Value::Number(5.0)));
        assert!(crit(">=5").matches(&Value::Number(5.0)));
        assert!(crit("<>5").matches(&Value::from("hello")));
        assert!(!crit("<>5").matches(&Value::Number(5.0)));
        assert!(crit("5").matches(&Value::Number(5.0)));
        assert!(!crit("5").matches(&Value::from("5")));
        assert!(crit("<b").matches(&Value::from("A")));
    }

    #[test]
    fn test_wildcards() {
        assert!(crit("a*").matches(&Value::from("Apple")));
        assert!(crit("?pple").matches(&Value::from("apple")));
        assert!(!crit("?pple").matches(&Value::from("pple")));
        assert!(crit("what~?").matches(&Value::from("what?")));
        assert!(!crit("what~?").matches(&Value::from("whats")));
        assert!(crit("a.b").matches(&Value::from("A.B")));
    }

    #[test]
    fn test_booleans_and_empty() {
        assert!(crit("TRUE").matches(&Value::Boolean(true)));
        assert!(!crit("TRUE").matches(&Value::Number(1.0)));
        assert!(!crit("*").matches(&Value::Empty));
    }

    #[test]
    fn test_visit_matching_ranges() {
        let range = Value::Matrix(vec![vec![Value::Number(1.0), Value::Number(5.0), Value::Number(9.0)]]);
        let mut hits = Vec::new();
        visit_matching_ranges(&[range, Value::from(">2")], &Locale::default(), |c, r| {
            hits.push((c, r))
        })
        .unwrap();
        assert_eq!(hits, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_visit_matching_ranges_rejects_mismatched_pairs() {
        let a = Value::Matrix(vec![vec![Value::Number(1.0); 3]]);
        let b = Value::Matrix(vec![vec![Value::Number(1.0); 2]]);
        let err = visit_matching_ranges(&[a.clone(), Value::from("1"), b, Value::from("1")], &Locale::default(), |_, _| {})
            .unwrap_err();
        assert!(err.to_string().contains("same dimension"));
        let err = visit_matching_ranges(&[a], &Locale::default(), |_, _| {}).unwrap_err();
        assert!(err.to_string().contains("in pairs"));
    }
}
