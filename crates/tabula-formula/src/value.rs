//! Runtime values
//!
//! Matrices are column-major: `matrix[col][row]`, matching the order in which ranges are
//! visited by aggregate functions.

use std::fmt;
use tabula_core::CellError;

/// A 2-D block of values, indexed `[col][row]`
pub type Matrix = Vec<Vec<Value>>;

/// An error value with the message explaining it
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub kind: CellError,
    pub message: String,
}

impl ErrorValue {
    pub fn new(kind: CellError, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A value produced or consumed by formula evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorValue),
    Matrix(Matrix),
}

impl Value {
    /// Build an error value
    pub fn error(kind: CellError, message: impl Into<String>) -> Self {
        Value::Error(ErrorValue::new(kind, message))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Value::Matrix(_))
    }

    /// Get the number if this is one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the text if this is one
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the error if this is one
    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// First error found in this value, looking inside matrices
    pub fn first_error(&self) -> Option<&ErrorValue> {
        match self {
            Value::Error(e) => Some(e),
            Value::Matrix(m) => m.iter().flatten().find_map(|v| v.as_error()),
            _ => None,
        }
    }

    /// `(cols, rows)` of a matrix, `(1, 1)` for scalars
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Value::Matrix(m) => (m.len(), m.first().map_or(0, |c| c.len())),
            _ => (1, 1),
        }
    }

    /// The top-left value of a matrix, or the value itself
    pub fn top_left(&self) -> Value {
        match self {
            Value::Matrix(m) => m
                .first()
                .and_then(|c| c.first())
                .cloned()
                .unwrap_or(Value::Empty),
            other => other.clone(),
        }
    }

    /// Short type name used in messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Error(_) => "error",
            Value::Matrix(_) => "range",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Matrix> for Value {
    fn from(m: Matrix) -> Self {
        Value::Matrix(m)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(n) => f.write_str(&crate::coercion::number_to_text(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(true) => f.write_str("TRUE"),
            Value::Boolean(false) => f.write_str("FALSE"),
            Value::Error(e) => f.write_str(e.kind.as_str()),
            Value::Matrix(_) => f.write_str("[matrix]"),
        }
    }
}

/// Display format attached to a value
#[derive(Debug, Clone, PartialEq)]
pub enum Format {
    /// One format for a scalar, or broadcast over a whole matrix
    Single(String),
    /// One optional format per matrix element, indexed `[col][row]`
    Matrix(Vec<Vec<Option<String>>>),
}

impl Format {
    /// The scalar format, if this is one
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Format::Single(s) => Some(s),
            Format::Matrix(_) => None,
        }
    }

    /// The format of the top-left element
    pub fn top_left(&self) -> Option<&str> {
        match self {
            Format::Single(s) => Some(s),
            Format::Matrix(m) => m.first().and_then(|c| c.first()).and_then(|f| f.as_deref()),
        }
    }
}

impl From<&str> for Format {
    fn from(s: &str) -> Self {
        Format::Single(s.to_string())
    }
}

impl From<String> for Format {
    fn from(s: String) -> Self {
        Format::Single(s)
    }
}

/// A function argument: its value plus the display format it carries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arg {
    pub value: Value,
    pub format: Option<Format>,
}

impl Arg {
    pub fn new(value: Value, format: Option<Format>) -> Self {
        Self { value, format }
    }

    /// The scalar format, if any
    pub fn single_format(&self) -> Option<&str> {
        self.format.as_ref().and_then(Format::as_single)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self {
            value,
            format: None,
        }
    }
}
