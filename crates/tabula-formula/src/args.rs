//! Argument declarations
//!
//! Functions declare their arguments with short strings such as
//! `"value2 (number, range<number>, repeating)"`: a name followed by a list of accepted types
//! and flags (`optional`, `repeating`, `lazy`, `default=<value>`).

use crate::error::RegistrationError;
use crate::value::Value;
use lazy_regex::{regex, regex_captures};

/// A type accepted by an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Any,
    Boolean,
    Number,
    String,
    Date,
    Range,
    RangeBoolean,
    RangeNumber,
    RangeString,
    RangeDate,
    RangeAny,
    /// The reference itself rather than its value
    Meta,
}

impl ArgType {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "any" => ArgType::Any,
            "boolean" => ArgType::Boolean,
            "number" => ArgType::Number,
            "string" => ArgType::String,
            "date" => ArgType::Date,
            "range" => ArgType::Range,
            "range<boolean>" => ArgType::RangeBoolean,
            "range<number>" => ArgType::RangeNumber,
            "range<string>" => ArgType::RangeString,
            "range<date>" => ArgType::RangeDate,
            "range<any>" => ArgType::RangeAny,
            "meta" => ArgType::Meta,
            _ => return None,
        })
    }

    pub fn is_range(self) -> bool {
        matches!(
            self,
            ArgType::Range
                | ArgType::RangeBoolean
                | ArgType::RangeNumber
                | ArgType::RangeString
                | ArgType::RangeDate
                | ArgType::RangeAny
        )
    }
}

/// One parsed argument declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub types: Vec<ArgType>,
    pub optional: bool,
    pub repeating: bool,
    pub lazy: bool,
    pub default: Option<Value>,
}

impl ArgSpec {
    /// Parse a declaration string, `None` if it is malformed
    pub fn parse(spec: &str) -> Option<Self> {
        let (_, name, body) = regex_captures!(r"^\s*(\w+)\s*\(([^)]*)\)\s*$", spec)?;
        let mut parsed = ArgSpec {
            name: name.to_string(),
            types: Vec::new(),
            optional: false,
            repeating: false,
            lazy: false,
            default: None,
        };
        // a quoted default may itself contain commas
        let parts = regex!(r#"\s*(?:(?i:default)\s*=\s*"[^"]*"|[^,]+)"#).find_iter(body);
        for part in parts.map(|m| m.as_str().trim()).filter(|p| !p.is_empty()) {
            let lower = part.to_lowercase();
            match lower.as_str() {
                "optional" => parsed.optional = true,
                "repeating" => parsed.repeating = true,
                "lazy" => parsed.lazy = true,
                _ if lower.starts_with("default=") => {
                    parsed.default = Some(parse_default(&part["default=".len()..])?);
                }
                ty => parsed.types.push(ArgType::parse(ty)?),
            }
        }
        if parsed.types.is_empty() {
            return None;
        }
        Some(parsed)
    }

    /// Whether only references are accepted
    pub fn accepts_only_ranges(&self) -> bool {
        self.types.iter().all(|t| t.is_range())
    }

    /// Whether the reference itself is passed rather than its value
    pub fn is_meta(&self) -> bool {
        self.types.contains(&ArgType::Meta)
    }
}

fn parse_default(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return Some(Value::Text(inner.to_string()));
    }
    match text.to_uppercase().as_str() {
        "TRUE" => Some(Value::Boolean(true)),
        "FALSE" => Some(Value::Boolean(false)),
        _ => text.parse().ok().map(Value::Number),
    }
}

/// The parsed argument list of a function, with the counts used by the compiler
#[derive(Debug, Clone, PartialEq)]
pub struct ArgList {
    pub specs: Vec<ArgSpec>,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub repeating_count: usize,
}

impl ArgList {
    /// Parse and validate a function's declarations
    pub fn parse(function: &str, specs: &[&str]) -> Result<Self, RegistrationError> {
        let specs = specs
            .iter()
            .map(|s| {
                ArgSpec::parse(s).ok_or_else(|| RegistrationError::InvalidArgSpec {
                    function: function.to_string(),
                    spec: s.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        validate(function, &specs)?;

        let repeating_count = specs.iter().filter(|s| s.repeating).count();
        let min_args = specs.iter().filter(|s| !s.optional && !s.repeating).count();
        let max_args = if repeating_count > 0 {
            None
        } else {
            Some(specs.len())
        };
        Ok(Self {
            specs,
            min_args,
            max_args,
            repeating_count,
        })
    }

    /// The declaration that applies to the argument at `index`
    pub fn spec_for(&self, index: usize) -> Option<&ArgSpec> {
        if index < self.specs.len() {
            return self.specs.get(index);
        }
        if self.repeating_count == 0 {
            return None;
        }
        let first_repeating = self.specs.len() - self.repeating_count;
        let offset = (index - self.specs.len()) % self.repeating_count;
        self.specs.get(first_repeating + offset)
    }

    /// Check a call's argument count; the message is the compile error detail
    pub fn check_count(&self, count: usize) -> Result<(), String> {
        if count < self.min_args {
            return Err(format!(
                "Expected {} minimum, but got {} instead.",
                self.min_args, count
            ));
        }
        if let Some(max) = self.max_args {
            if count > max {
                return Err(format!("Expected {} maximum, but got {} instead.", max, count));
            }
        }
        let fixed = self.specs.len() - self.repeating_count;
        if self.repeating_count > 1 && count > fixed {
            let extra = count - fixed;
            if extra % self.repeating_count != 0 {
                return Err(format!(
                    "Expected all arguments after position {} to be supplied by groups of {} arguments",
                    fixed,
                    self.repeating_count
                ));
            }
        }
        Ok(())
    }
}

fn validate(function: &str, specs: &[ArgSpec]) -> Result<(), RegistrationError> {
    let invalid = |reason: &str| RegistrationError::InvalidArgs {
        function: function.to_string(),
        reason: reason.to_string(),
    };
    let mut seen_optional = false;
    let mut seen_repeating = false;
    for spec in specs {
        if spec.default.is_some() && !spec.optional {
            return Err(invalid("an argument with a default value must be optional"));
        }
        if seen_repeating && !spec.repeating {
            return Err(invalid("repeating arguments must be declared last"));
        }
        if seen_optional && !spec.optional && !spec.repeating {
            return Err(invalid("a required argument cannot follow an optional one"));
        }
        seen_optional |= spec.optional;
        seen_repeating |= spec.repeating;
    }
    Ok(())
}
