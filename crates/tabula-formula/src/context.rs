//! Evaluation context
//!
//! One [`EvalContext`] is built per recalculation pass and handed to every function body.

use crate::error::EvalResult;
use crate::registry::FunctionRegistry;
use crate::value::Arg;
use chrono::NaiveDateTime;
use tabula_core::{CellPosition, CellRange, Locale};

/// Resolves references to values while a formula runs
pub trait ReferenceResolver {
    /// Value and format of a single cell; `sheet` is `None` for the formula's own sheet
    fn resolve_cell(&mut self, sheet: Option<&str>, row: u32, col: u16) -> EvalResult<Arg>;

    /// Matrix of values (and formats) covered by a range
    fn resolve_range(&mut self, sheet: Option<&str>, range: &CellRange) -> EvalResult<Arg>;
}

/// Everything a formula can see while it runs
pub struct EvalContext<'a> {
    pub locale: &'a Locale,
    pub registry: &'a FunctionRegistry,
    pub resolver: &'a mut dyn ReferenceResolver,
    /// Cell whose formula is being evaluated
    pub origin: Option<CellPosition>,
    /// Frozen clock used by NOW and TODAY
    pub now: NaiveDateTime,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        locale: &'a Locale,
        registry: &'a FunctionRegistry,
        resolver: &'a mut dyn ReferenceResolver,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            locale,
            registry,
            resolver,
            origin: None,
            now,
        }
    }

    /// Set the cell being evaluated
    pub fn with_origin(mut self, origin: CellPosition) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Resolver for formulas that reference nothing, e.g. constant expressions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn resolve_cell(&mut self, _sheet: Option<&str>, _row: u32, _col: u16) -> EvalResult<Arg> {
        Ok(Arg::default())
    }

    fn resolve_range(&mut self, _sheet: Option<&str>, range: &CellRange) -> EvalResult<Arg> {
        let cols = range.col_count() as usize;
        let rows = range.row_count() as usize;
        Ok(Arg::from(crate::value::Value::Matrix(vec![
            vec![crate::value::Value::Empty; rows];
            cols
        ])))
    }
}
