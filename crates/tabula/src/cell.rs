//! Stored cells and their evaluated form

use tabula_core::datetime::parse_date_time;
use tabula_core::format::format_number;
use tabula_core::{CellError, CellId, Locale, StyleId};
use tabula_formula::coercion::{number_to_text, parse_number};
use tabula_formula::{compile, Arg, CompileError, CompiledFormula, Value, FUNCTION_REGISTRY};

/// What a cell holds, derived from its raw content
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// No content; the cell only carries a style or format
    Empty,
    /// A typed constant, with the format it was typed in (`50%`, `3/15/2024`)
    Literal { value: Value, format: Option<String> },
    Formula(CompiledFormula),
    /// Formula text that does not compile
    Invalid(CompileError),
}

impl CellContent {
    /// Interpret raw content as typed by the user
    pub fn parse(content: &str, locale: &Locale) -> Self {
        if content.is_empty() {
            return CellContent::Empty;
        }
        if content.starts_with('=') {
            return match compile(content, &FUNCTION_REGISTRY) {
                Ok(formula) => CellContent::Formula(formula),
                Err(e) => {
                    log::debug!("formula {:?} does not compile: {}", content, e);
                    CellContent::Invalid(e)
                }
            };
        }
        let (value, format) = parse_literal(content, locale);
        CellContent::Literal { value, format }
    }
}

fn parse_literal(content: &str, locale: &Locale) -> (Value, Option<String>) {
    if let Some(n) = parse_number(content, locale) {
        let format = content.trim_end().ends_with('%').then(|| percent_format(content, locale.decimal_separator));
        return (Value::Number(n), format);
    }
    if let Some(parsed) = parse_date_time(content, locale) {
        return (Value::Number(parsed.value), Some(parsed.format));
    }
    match content.to_uppercase().as_str() {
        "TRUE" => (Value::Boolean(true), None),
        "FALSE" => (Value::Boolean(false), None),
        _ => (Value::Text(content.to_string()), None),
    }
}

/// `0%` or `0.00%`, keeping the decimals that were typed
fn percent_format(content: &str, decimal_separator: char) -> String {
    let decimals = content
        .trim()
        .trim_end_matches('%')
        .split_once(decimal_separator)
        .map_or(0, |(_, d)| d.trim().len());
    if decimals == 0 {
        "0%".to_string()
    } else {
        format!("0.{}%", "0".repeat(decimals))
    }
}

/// A stored cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: CellId,
    /// Raw content; formulas are kept in normalized form once stored
    pub content: String,
    pub kind: CellContent,
    /// Explicit display format, overriding any inferred one
    pub format: Option<String>,
    pub style: Option<StyleId>,
}

impl Cell {
    pub fn new(id: CellId, content: &str, locale: &Locale) -> Self {
        Self {
            id,
            content: content.to_string(),
            kind: CellContent::parse(content, locale),
            format: None,
            style: None,
        }
    }

    pub fn formula(&self) -> Option<&CompiledFormula> {
        match &self.kind {
            CellContent::Formula(f) => Some(f),
            _ => None,
        }
    }

    /// Whether the content starts with `=`, compiled or not
    pub fn is_formula(&self) -> bool {
        matches!(self.kind, CellContent::Formula(_) | CellContent::Invalid(_))
    }

    /// Nothing left worth storing
    pub fn is_blank(&self) -> bool {
        self.content.is_empty() && self.format.is_none() && self.style.is_none()
    }

    /// Replace a compiled formula, keeping the raw content in sync
    pub fn set_formula(&mut self, formula: CompiledFormula) {
        self.content = formula.to_formula_string();
        self.kind = CellContent::Formula(formula);
    }

    /// Value of a non-formula cell; formulas are evaluated by the engine
    pub fn static_value(&self) -> Arg {
        match &self.kind {
            CellContent::Empty | CellContent::Formula(_) => Arg::new(Value::Empty, self.format.clone().map(Into::into)),
            CellContent::Literal { value, format } => Arg::new(
                value.clone(),
                self.format.clone().or_else(|| format.clone()).map(Into::into),
            ),
            CellContent::Invalid(e) => Arg::from(Value::error(CellError::BadExpression, e.to_string())),
        }
    }
}

/// Type tag of an evaluated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CellValueType {
    Empty,
    Number,
    Text,
    Boolean,
    Error,
}

/// The outcome of evaluating a cell
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedCell {
    pub value: Value,
    pub value_type: CellValueType,
    pub format: Option<String>,
    /// The value rendered with its format
    pub formatted_value: String,
}

impl EvaluatedCell {
    /// Build from an evaluation result; matrices keep their top-left element
    pub fn from_arg(arg: Arg, locale: &Locale) -> Self {
        let format = arg.format.as_ref().and_then(|f| f.top_left()).map(str::to_string);
        let value = if arg.value.is_matrix() {
            arg.value.top_left()
        } else {
            arg.value
        };
        let value_type = match &value {
            Value::Empty | Value::Matrix(_) => CellValueType::Empty,
            Value::Number(_) => CellValueType::Number,
            Value::Text(_) => CellValueType::Text,
            Value::Boolean(_) => CellValueType::Boolean,
            Value::Error(_) => CellValueType::Error,
        };
        let formatted_value = match &value {
            Value::Number(n) => format_number(*n, format.as_deref(), locale),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Error(e) => e.kind.as_str().to_string(),
            Value::Empty | Value::Matrix(_) => String::new(),
        };
        Self {
            value,
            value_type,
            format,
            formatted_value,
        }
    }

    pub fn empty() -> Self {
        Self {
            value: Value::Empty,
            value_type: CellValueType::Empty,
            format: None,
            formatted_value: String::new(),
        }
    }

    /// Plain text of the value, without format
    pub fn raw_text(&self) -> String {
        match &self.value {
            Value::Number(n) => number_to_text(*n),
            _ => self.formatted_value.clone(),
        }
    }
}
