//! Recalculation engine
//!
//! A pass evaluates a set of pending formula cells depth-first. Every cell read by a formula
//! goes through [`Evaluator::value_of`], which evaluates pending cells on demand, so a cell is
//! evaluated at most once per pass whatever the order of the pending set.
//!
//! Cells being evaluated sit on an explicit stack. Reading a cell that is already on the stack
//! closes a cycle: every cell on the stack at that moment ends the pass as `#CYCLE`, including
//! cells that merely depend on the cycle.

use crate::cell::Cell;
use crate::config::CalculationOptions;
use ahash::{AHashMap, AHashSet};
use chrono::NaiveDateTime;
use std::time::{Duration, Instant};
use tabula_core::{CellError, CellPosition, CellRange, Locale, SheetId, Workbook};
use tabula_formula::{
    Arg, EvalContext, EvalError, EvalResult, EvaluationError, Format, ReferenceResolver, Value,
    FUNCTION_REGISTRY,
};

/// Statistics from a recalculation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationStats {
    /// Formula cells scheduled for the pass
    pub formula_count: usize,
    /// Formula cells actually evaluated
    pub cells_evaluated: usize,
    /// Cells that ended as `#CYCLE`
    pub cycles: usize,
    /// Cells that ended with any error value
    pub errors: usize,
    pub elapsed: Duration,
}

/// Evaluate every pending cell, storing results in `cache`
pub(crate) fn recalculate(
    workbook: &Workbook<Cell>,
    locale: &Locale,
    now: NaiveDateTime,
    cache: &mut AHashMap<CellPosition, Arg>,
    pending: AHashSet<CellPosition>,
    options: &CalculationOptions,
) -> CalculationStats {
    let span = tracing::debug_span!("recalculation", pending = pending.len());
    let _guard = span.enter();
    let started = options.collect_stats.then(Instant::now);

    let mut targets: Vec<CellPosition> = pending.iter().copied().collect();
    targets.sort();

    let mut evaluator = Evaluator {
        workbook,
        locale,
        now,
        cache,
        pending,
        stack: Vec::new(),
        in_progress: AHashSet::new(),
        cyclic: AHashSet::new(),
        stats: CalculationStats {
            formula_count: targets.len(),
            ..CalculationStats::default()
        },
    };
    for position in targets {
        evaluator.value_of(position);
    }

    let mut stats = evaluator.stats;
    if let Some(started) = started {
        stats.elapsed = started.elapsed();
    }
    tracing::debug!(
        evaluated = stats.cells_evaluated,
        cycles = stats.cycles,
        errors = stats.errors,
        elapsed_us = stats.elapsed.as_micros() as u64,
        "recalculation finished"
    );
    stats
}

fn cycle_error() -> Value {
    Value::error(CellError::Cycle, "Circular reference")
}

/// The value a reader sees: matrices keep their top-left element, an empty result reads as 0
fn collapse(arg: Arg) -> Arg {
    let format = arg.format.as_ref().and_then(Format::top_left).map(Format::from);
    let value = if arg.value.is_matrix() {
        arg.value.top_left()
    } else {
        arg.value
    };
    let value = if value.is_empty() { Value::Number(0.0) } else { value };
    Arg::new(value, format)
}

/// Errors read from another cell surface under their propagated marker
fn as_read(mut arg: Arg) -> Arg {
    if let Value::Error(e) = &mut arg.value {
        e.kind = e.kind.propagated();
    }
    arg
}

struct Evaluator<'m> {
    workbook: &'m Workbook<Cell>,
    locale: &'m Locale,
    now: NaiveDateTime,
    cache: &'m mut AHashMap<CellPosition, Arg>,
    /// Formula cells not yet evaluated in this pass
    pending: AHashSet<CellPosition>,
    stack: Vec<CellPosition>,
    in_progress: AHashSet<CellPosition>,
    /// Cells that were on the stack when a cycle closed
    cyclic: AHashSet<CellPosition>,
    stats: CalculationStats,
}

impl<'m> Evaluator<'m> {
    fn cell(&self, position: CellPosition) -> Option<&'m Cell> {
        let workbook = self.workbook;
        workbook
            .sheet(position.sheet)
            .and_then(|s| s.cells.get(position.row, position.col))
    }

    fn value_of(&mut self, position: CellPosition) -> Arg {
        if self.in_progress.contains(&position) {
            log::debug!("cycle closed at {}", position);
            self.cyclic.extend(self.stack.iter().copied());
            return Arg::from(cycle_error());
        }
        if self.pending.contains(&position) {
            return self.evaluate(position);
        }
        if let Some(arg) = self.cache.get(&position) {
            return arg.clone();
        }
        self.cell(position).map_or_else(Arg::default, Cell::static_value)
    }

    fn evaluate(&mut self, position: CellPosition) -> Arg {
        self.pending.remove(&position);
        let Some(cell) = self.cell(position) else {
            return Arg::default();
        };
        let Some(formula) = cell.formula() else {
            return cell.static_value();
        };

        self.in_progress.insert(position);
        self.stack.push(position);
        let locale = self.locale;
        let now = self.now;
        let result = {
            let mut ctx = EvalContext::new(locale, &FUNCTION_REGISTRY, self, now).with_origin(position);
            formula.evaluate(&mut ctx)
        };
        self.stack.pop();
        self.in_progress.remove(&position);

        let mut arg = match result {
            Ok(arg) => collapse(arg),
            Err(e) => Arg::from(Value::error(e.kind(), e.to_string())),
        };
        if self.cyclic.contains(&position) {
            arg = Arg::from(cycle_error());
            self.stats.cycles += 1;
        }
        if let Some(format) = &cell.format {
            arg.format = Some(Format::from(format.as_str()));
        }
        if arg.value.is_error() {
            self.stats.errors += 1;
        }
        self.stats.cells_evaluated += 1;
        self.cache.insert(position, arg.clone());
        arg
    }

    fn sheet_id(&self, name: Option<&str>) -> EvalResult<SheetId> {
        match name {
            Some(name) => self.workbook.sheet_id_by_name(name).ok_or_else(|| {
                EvalError::from(EvaluationError::new(format!("Invalid sheet name: {}", name)))
            }),
            None => self
                .stack
                .last()
                .map(|p| p.sheet)
                .ok_or_else(|| EvalError::Internal("reference read outside of a formula".to_string())),
        }
    }

    /// Rows and columns of the sheet that can hold cells
    fn grid_size(&self, sheet: SheetId) -> (u32, u16) {
        self.workbook
            .sheet(sheet)
            .map_or((0, 0), |worksheet| (worksheet.num_rows, worksheet.num_cols))
    }
}

impl ReferenceResolver for Evaluator<'_> {
    fn resolve_cell(&mut self, sheet: Option<&str>, row: u32, col: u16) -> EvalResult<Arg> {
        let sheet = self.sheet_id(sheet)?;
        Ok(as_read(self.value_of(CellPosition::new(sheet, col, row))))
    }

    fn resolve_range(&mut self, sheet: Option<&str>, range: &CellRange) -> EvalResult<Arg> {
        let sheet = self.sheet_id(sheet)?;
        let (num_rows, num_cols) = self.grid_size(sheet);
        let height = range.row_count() as usize;

        let mut values = Vec::with_capacity(range.col_count() as usize);
        let mut formats = Vec::with_capacity(range.col_count() as usize);
        let mut has_format = false;
        for col in range.left()..=range.right() {
            // nothing is stored past the grid
            if col >= num_cols || range.top() >= num_rows {
                values.push(vec![Value::Empty; height]);
                formats.push(vec![None; height]);
                continue;
            }
            let mut column = Vec::with_capacity(height);
            let mut column_formats = Vec::with_capacity(height);
            for row in range.top()..=range.bottom() {
                if row >= num_rows {
                    column.push(Value::Empty);
                    column_formats.push(None);
                    continue;
                }
                let arg = self.value_of(CellPosition::new(sheet, col, row));
                let format = arg.format.as_ref().and_then(Format::top_left).map(str::to_string);
                has_format |= format.is_some();
                column.push(arg.value);
                column_formats.push(format);
            }
            values.push(column);
            formats.push(column_formats);
        }
        Ok(Arg::new(
            Value::Matrix(values),
            has_format.then_some(Format::Matrix(formats)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapse() {
        let matrix = Value::Matrix(vec![vec![Value::Number(4.0), Value::Number(5.0)]]);
        let format = Format::Matrix(vec![vec![Some("0.0".to_string()), None]]);
        assert_eq!(
            collapse(Arg::new(matrix, Some(format))),
            Arg::new(Value::Number(4.0), Some(Format::from("0.0")))
        );
        assert_eq!(collapse(Arg::default()).value, Value::Number(0.0));
        assert_eq!(collapse(Arg::from(Value::from(""))).value, Value::from(""));
    }

    #[test]
    fn test_errors_read_under_propagated_marker() {
        let bad = Arg::from(Value::error(CellError::BadExpression, "Invalid formula"));
        assert_eq!(as_read(bad).value.as_error().map(|e| e.kind), Some(CellError::Generic));
        let cycle = Arg::from(cycle_error());
        assert_eq!(as_read(cycle).value.as_error().map(|e| e.kind), Some(CellError::Cycle));
    }
}
