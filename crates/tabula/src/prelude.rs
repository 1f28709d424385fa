//! Prelude module - common imports for tabula users
//!
//! ```rust
//! use tabula::prelude::*;
//! ```

pub use crate::{
    // Cell types
    CellAddress,
    CellError,
    CellPosition,
    CellRange,
    CellValueType,
    EvaluatedCell,
    SheetId,
    Value,

    // Commands
    CancelledReason,
    Command,
    CommandResult,
    SortDirection,
    SortOptions,

    // Configuration
    CalculationOptions,
    Locale,
    ModelConfig,

    // Main types
    CalculationStats,
    Model,
    Style,
};
