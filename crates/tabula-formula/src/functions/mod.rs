//! Built-in functions
//!
//! Each module exposes a `register` function adding its functions to a
//! [`FunctionRegistry`]. Compute bodies receive plain values in declaration order; omitted
//! optional arguments are simply absent from the slice unless they declare a default.

pub mod array;
pub mod database;
pub mod date;
pub mod engineering;
pub mod filter;
pub mod financial;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod misc;
pub mod operators;
pub mod statistical;
pub mod text;
pub mod web;

use crate::coercion::{to_number, to_text};
use crate::context::EvalContext;
use crate::error::{EvalResult, RegistrationError};
use crate::registry::FunctionRegistry;
use crate::value::{Arg, Format, Value};

type RegisterFn = fn(&mut FunctionRegistry) -> Result<(), RegistrationError>;

const MODULES: &[(&str, RegisterFn)] = &[
    ("Array", array::register),
    ("Database", database::register),
    ("Date", date::register),
    ("Filter", filter::register),
    ("Financial", financial::register),
    ("Info", info::register),
    ("Lookup", lookup::register),
    ("Logical", logical::register),
    ("Math", math::register),
    ("Misc", misc::register),
    ("Operator", operators::register),
    ("Statistical", statistical::register),
    ("Text", text::register),
    ("Engineering", engineering::register),
    ("Web", web::register),
];

/// Register every built-in module
pub fn register_all(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    for (category, register) in MODULES {
        let before = registry.len();
        register(registry)?;
        registry.set_category_from(before, category);
    }
    log::debug!("registered {} built-in functions", registry.len());
    Ok(())
}

static EMPTY: Value = Value::Empty;

/// Argument at `index`, or an empty value when it was omitted
pub(crate) fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&EMPTY)
}

/// Whether the argument at `index` was supplied
pub(crate) fn has_arg(args: &[Value], index: usize) -> bool {
    args.get(index).map_or(false, |v| !v.is_empty())
}

/// Numeric argument
pub(crate) fn num(args: &[Value], index: usize, ctx: &EvalContext<'_>) -> EvalResult<f64> {
    to_number(arg(args, index), ctx.locale)
}

/// Numeric argument, `default` when omitted
pub(crate) fn num_or(
    args: &[Value],
    index: usize,
    default: f64,
    ctx: &EvalContext<'_>,
) -> EvalResult<f64> {
    if index >= args.len() {
        return Ok(default);
    }
    num(args, index, ctx)
}

/// Text argument
pub(crate) fn text(args: &[Value], index: usize) -> EvalResult<String> {
    to_text(arg(args, index))
}

/// Format of the first argument (its top-left cell for ranges)
pub(crate) fn first_arg_format(args: &[Arg], _ctx: &EvalContext<'_>) -> Option<Format> {
    args.first()
        .and_then(|a| a.format.as_ref())
        .and_then(Format::top_left)
        .map(Format::from)
}

/// Format of the first argument, else of the second
pub(crate) fn first_or_second_format(args: &[Arg], ctx: &EvalContext<'_>) -> Option<Format> {
    first_arg_format(args, ctx).or_else(|| {
        args.get(1)
            .and_then(|a| a.format.as_ref())
            .and_then(Format::top_left)
            .map(Format::from)
    })
}

/// Money amounts
pub(crate) fn money_format(_args: &[Arg], _ctx: &EvalContext<'_>) -> Option<Format> {
    Some(Format::from("#,##0.00"))
}

/// Rates
pub(crate) fn percent_format(_args: &[Arg], _ctx: &EvalContext<'_>) -> Option<Format> {
    Some(Format::from("0%"))
}

/// The locale's date format
pub(crate) fn date_format(_args: &[Arg], ctx: &EvalContext<'_>) -> Option<Format> {
    Some(Format::from(ctx.locale.date_format.clone()))
}

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::compiler::compile;
    use crate::context::{EvalContext, ReferenceResolver};
    use crate::error::EvalResult;
    use crate::registry::FUNCTION_REGISTRY;
    use crate::value::{Arg, Value};
    use ahash::AHashMap;
    use chrono::NaiveDate;
    use tabula_core::{CellAddress, CellRange, Locale};

    /// A single-sheet grid keyed by A1 address
    #[derive(Default)]
    pub struct Grid {
        cells: AHashMap<(u32, u16), Value>,
    }

    impl Grid {
        pub fn new(cells: &[(&str, Value)]) -> Self {
            let mut grid = Self::default();
            for (address, value) in cells {
                let addr = CellAddress::parse(address).unwrap();
                grid.cells.insert((addr.row, addr.col), value.clone());
            }
            grid
        }
    }

    impl ReferenceResolver for Grid {
        fn resolve_cell(&mut self, _sheet: Option<&str>, row: u32, col: u16) -> EvalResult<Arg> {
            Ok(Arg::from(self.cells.get(&(row, col)).cloned().unwrap_or_default()))
        }

        fn resolve_range(&mut self, _sheet: Option<&str>, range: &CellRange) -> EvalResult<Arg> {
            let matrix = (range.left()..=range.right())
                .map(|col| {
                    (range.top()..=range.bottom())
                        .map(|row| self.cells.get(&(row, col)).cloned().unwrap_or_default())
                        .collect()
                })
                .collect();
            Ok(Arg::from(Value::Matrix(matrix)))
        }
    }

    /// Evaluate a formula against a grid
    pub fn eval_in(formula: &str, grid: &mut Grid) -> Value {
        let locale = Locale::default();
        let now = NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .unwrap();
        let compiled = match compile(formula, &FUNCTION_REGISTRY) {
            Ok(c) => c,
            Err(e) => panic!("{} does not compile: {}", formula, e),
        };
        let mut ctx = EvalContext::new(&locale, &FUNCTION_REGISTRY, grid, now);
        match compiled.evaluate(&mut ctx) {
            Ok(arg) => arg.value,
            Err(e) => Value::error(e.kind(), e.to_string()),
        }
    }

    /// Evaluate a formula referencing nothing
    pub fn eval(formula: &str) -> Value {
        eval_in(formula, &mut Grid::default())
    }

    /// Evaluate and expect a number
    pub fn eval_number(formula: &str) -> f64 {
        match eval(formula) {
            Value::Number(n) => n,
            other => panic!("{} evaluated to {:?}", formula, other),
        }
    }

    /// Evaluate and expect an error, returning its message
    pub fn eval_error(formula: &str) -> String {
        match eval(formula) {
            Value::Error(e) => e.message,
            other => panic!("{} should fail, got {:?}", formula, other),
        }
    }

    pub fn assert_close(actual: f64, expected: f64, epsilon: f64) {
        assert!(
            (actual - expected).abs() < epsilon,
            "expected {} to be within {} of {}",
            actual,
            epsilon,
            expected
        );
    }
}
