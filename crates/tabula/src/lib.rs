//! # tabula
//!
//! A spreadsheet formula engine: typed cell values, a formula compiler, a library of
//! spreadsheet functions and an incremental recalculation engine.
//!
//! ## Features
//!
//! - Formulas with cell, range and cross-sheet references
//! - Several hundred built-in functions (math, statistics, text, dates, lookup, finance...)
//! - Incremental recalculation of the cells affected by an edit, with cycle detection
//! - Validated commands for cell edits, formatting, sorting and sheet management
//! - Locale-aware number parsing and display
//!
//! ## Example
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let mut model = Model::default();
//! let sheet = model.get_sheet_ids()[0];
//!
//! model.update_cell_at(sheet, "A1", "10");
//! model.update_cell_at(sheet, "A2", "32");
//! model.update_cell_at(sheet, "A3", "=SUM(A1:A2)");
//!
//! let a3 = model.evaluated_at(sheet, "A3").unwrap();
//! assert_eq!(a3.value, Value::Number(42.0));
//! assert_eq!(a3.formatted_value, "42");
//! ```

pub mod calculation;
pub mod cell;
pub mod command;
pub mod config;
pub mod model;
pub mod prelude;
mod sort;

pub use calculation::CalculationStats;
pub use cell::{Cell, CellContent, CellValueType, EvaluatedCell};
pub use command::{CancelledReason, Command, CommandResult, SortDirection, SortOptions};
pub use config::{CalculationOptions, ModelConfig};
pub use model::Model;

// Re-export core types
pub use tabula_core::{
    CellAddress, CellError, CellId, CellPosition, CellRange, Color, HorizontalAlignment, Locale, SheetId, Style,
};

// Re-export formula types
pub use tabula_formula::{
    compile, Arg, CompileError, CompiledFormula, ErrorValue, Format, FunctionRegistry, Value, FUNCTION_REGISTRY,
};
