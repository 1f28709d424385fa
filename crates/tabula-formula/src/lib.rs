//! # tabula-formula
//!
//! Formula compiler and function library for tabula.
//!
//! This crate provides:
//! - Formula compilation (text → [`CompiledFormula`]) with offset translation
//! - Evaluation against any [`ReferenceResolver`]
//! - The built-in function library, registered in [`FUNCTION_REGISTRY`]
//! - Dependency tracking for recalculation
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use tabula_core::Locale;
//! use tabula_formula::{compile, EvalContext, NoReferences, Value, FUNCTION_REGISTRY};
//!
//! let formula = compile("=ROUND(PI() * 2, 2)", &FUNCTION_REGISTRY).unwrap();
//! let locale = Locale::default();
//! let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let mut resolver = NoReferences;
//! let mut ctx = EvalContext::new(&locale, &FUNCTION_REGISTRY, &mut resolver, now);
//! assert_eq!(formula.evaluate(&mut ctx).unwrap().value, Value::Number(6.28));
//! ```

pub mod args;
pub mod coercion;
pub mod compiler;
pub mod context;
pub mod criteria;
pub mod dependency;
pub mod error;
pub mod functions;
pub mod helpers;
pub mod registry;
pub mod value;

pub use compiler::{compile, quote_sheet_name, CompiledFormula, Reference};
pub use context::{EvalContext, NoReferences, ReferenceResolver};
pub use dependency::{DependencyGraph, Precedent};
pub use error::{
    CoercionError, CompileError, EvalError, EvalResult, EvaluationError, FormulaResult, RegistrationError,
};
pub use registry::{FunctionDef, FunctionDescriptor, FunctionRegistry, FUNCTION_REGISTRY};
pub use value::{Arg, ErrorValue, Format, Matrix, Value};
