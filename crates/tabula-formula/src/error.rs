//! Formula error types
//!
//! Compile-time and registration-time failures are plain Rust errors. Everything that can go
//! wrong while a formula runs is an [`EvalError`], which the recalculation engine stores as
//! the cell's error value instead of aborting the pass.

use tabula_core::CellError;
use thiserror::Error;

/// Placeholder replaced by the invoked function name in evaluation messages
pub const FUNCTION_NAME_PLACEHOLDER: &str = "[[FUNCTION_NAME]]";

/// Result type for formula evaluation
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Result type for formula compilation
pub type FormulaResult<T> = std::result::Result<T, CompileError>;

/// A value could not be converted to the type a function argument requires
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoercionError {
    #[error("The function [[FUNCTION_NAME]] expects a number value, but '{0}' is a string, and cannot be coerced to a number.")]
    NotANumber(String),

    #[error("The function [[FUNCTION_NAME]] expects a boolean value, but '{0}' is a text, and cannot be coerced to a boolean.")]
    NotABoolean(String),
}

/// A domain violation raised from inside a function body
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
    pub kind: CellError,
}

impl EvaluationError {
    /// A generic `#ERROR` failure
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: CellError::Generic,
        }
    }

    /// A `#N/A` failure (lookups that find nothing, NA())
    pub fn not_available(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: CellError::NotAvailable,
        }
    }
}

/// Malformed formula text
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    /// Nothing after the `=` marker
    #[error("Invalid formula: empty expression")]
    Empty,

    /// Token or grammar error
    #[error("Invalid formula: {0}")]
    Syntax(String),

    /// Function name not present in the registry
    #[error("Unknown function: \"{0}\"")]
    UnknownFunction(String),

    /// Wrong number of arguments for a function
    #[error("Invalid number of arguments for the {function} function. {detail}")]
    ArgumentCount { function: String, detail: String },

    /// A scalar expression where a reference is required
    #[error("Function {function} expects the parameter {position} to be reference to a cell or range, not a {found}.")]
    ExpectedReference {
        function: String,
        position: usize,
        found: String,
    },
}

/// A defect in a function declaration, detected at registration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistrationError {
    #[error("Invalid function name {0}. Function names can exclusively contain alphanumerical values separated by dots (.) or underscore (_)")]
    InvalidFunctionName(String),

    #[error("Function {0} is already registered")]
    Duplicate(String),

    #[error("Invalid argument specification '{spec}' for function {function}")]
    InvalidArgSpec { function: String, spec: String },

    #[error("Invalid argument list for function {function}: {reason}")]
    InvalidArgs { function: String, reason: String },
}

/// Any failure while evaluating a formula
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The cell takes part in a dependency cycle
    #[error("Circular reference")]
    Cycle,

    /// The formula did not compile
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// An error value read from an argument or another cell
    #[error("{message}")]
    Propagated { kind: CellError, message: String },

    /// Broken engine invariant (never a user error)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EvalError {
    /// The marker displayed by a cell failing with this error
    pub fn kind(&self) -> CellError {
        match self {
            EvalError::Coercion(_) | EvalError::Internal(_) => CellError::Generic,
            EvalError::Evaluation(e) => e.kind,
            EvalError::Cycle => CellError::Cycle,
            EvalError::Compile(_) => CellError::BadExpression,
            EvalError::Propagated { kind, .. } => *kind,
        }
    }

    /// Replace the function name placeholder in the message
    pub fn with_function_name(self, name: &str) -> Self {
        if !self.to_string().contains(FUNCTION_NAME_PLACEHOLDER) {
            return self;
        }
        let message = self.to_string().replace(FUNCTION_NAME_PLACEHOLDER, name);
        match self {
            EvalError::Evaluation(e) => EvalError::Evaluation(EvaluationError { message, ..e }),
            other => EvalError::Propagated {
                kind: other.kind(),
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_name_substitution() {
        let err: EvalError = CoercionError::NotANumber("abc".into()).into();
        let err = err.with_function_name("SUM");
        assert_eq!(
            err.to_string(),
            "The function SUM expects a number value, but 'abc' is a string, and cannot be coerced to a number."
        );
        assert_eq!(err.kind(), CellError::Generic);

        let err: EvalError = EvaluationError::not_available("[[FUNCTION_NAME]] found nothing").into();
        let err = err.with_function_name("VLOOKUP");
        assert_eq!(err.to_string(), "VLOOKUP found nothing");
        assert_eq!(err.kind(), CellError::NotAvailable);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(EvalError::Cycle.kind(), CellError::Cycle);
        assert_eq!(EvalError::from(CompileError::Empty).kind(), CellError::BadExpression);
    }
}
