//! Miscellaneous functions

use super::{first_arg_format, has_arg, num, text};
use crate::coercion::to_text;
use crate::context::EvalContext;
use crate::error::{EvalResult, RegistrationError};
use crate::helpers::ensure;
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::{Arg, Format, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // FORMAT.LARGE.NUMBER
    registry.add(
        "FORMAT_LARGE_NUMBER",
        FunctionDef::new(
            "Apply a large number format",
            &["value (number)", "unit (string, optional)"],
            "NUMBER",
            fn_format_large_number,
        )
        .with_format(large_number_format),
    )?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Magnitude {
    Thousands,
    Millions,
    Billions,
}

impl Magnitude {
    fn parse(unit: &str) -> Option<Self> {
        match unit.to_lowercase().as_str() {
            "k" => Some(Magnitude::Thousands),
            "m" => Some(Magnitude::Millions),
            "b" => Some(Magnitude::Billions),
            _ => None,
        }
    }

    fn of(value: f64) -> Option<Self> {
        let value = value.abs();
        if value >= 1e9 {
            Some(Magnitude::Billions)
        } else if value >= 1e6 {
            Some(Magnitude::Millions)
        } else if value >= 1e3 {
            Some(Magnitude::Thousands)
        } else {
            None
        }
    }

    /// Display format scaling the value down, one trailing comma per thousand
    fn format(self) -> &'static str {
        match self {
            Magnitude::Thousands => "#,##0.00,",
            Magnitude::Millions => "#,##0.00,,",
            Magnitude::Billions => "#,##0.00,,,",
        }
    }
}

fn fn_format_large_number(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    if has_arg(args, 1) {
        let unit = text(args, 1)?;
        ensure(Magnitude::parse(&unit).is_some(), || {
            "The formatting unit should be 'k', 'm' or 'b'.".to_string()
        })?;
    }
    Ok(Value::Number(num(args, 0, ctx)?))
}

fn large_number_format(args: &[Arg], ctx: &EvalContext<'_>) -> Option<Format> {
    let unit = args.get(1).map(|a| to_text(&a.value).unwrap_or_default()).unwrap_or_default();
    let magnitude = if unit.is_empty() {
        let values: Vec<Value> = args.iter().map(|a| a.value.clone()).collect();
        Magnitude::of(num(&values, 0, ctx).ok()?)
    } else {
        Magnitude::parse(&unit)
    };
    match magnitude {
        Some(m) => Some(Format::from(m.format())),
        None => first_arg_format(args, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use crate::compiler::compile;
    use crate::context::NoReferences;
    use crate::registry::FUNCTION_REGISTRY;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;
    use tabula_core::Locale;

    fn format_of(formula: &str) -> Option<Format> {
        let locale = Locale::default();
        let mut resolver = NoReferences;
        let mut ctx = EvalContext::new(&locale, &FUNCTION_REGISTRY, &mut resolver, NaiveDateTime::default());
        compile(formula, &FUNCTION_REGISTRY).unwrap().evaluate(&mut ctx).unwrap().format
    }

    #[test]
    fn test_value_is_unchanged() {
        assert_eq!(eval_number("=FORMAT.LARGE.NUMBER(1234567)"), 1234567.0);
        assert!(eval("=FORMAT.LARGE.NUMBER(1234567, \"x\")").is_error());
    }

    #[test]
    fn test_format_follows_magnitude() {
        assert_eq!(format_of("=FORMAT.LARGE.NUMBER(1234567)"), Some(Format::from("#,##0.00,,")));
        assert_eq!(format_of("=FORMAT.LARGE.NUMBER(-4200)"), Some(Format::from("#,##0.00,")));
        assert_eq!(format_of("=FORMAT.LARGE.NUMBER(12, \"b\")"), Some(Format::from("#,##0.00,,,")));
        assert_eq!(format_of("=FORMAT.LARGE.NUMBER(12)"), None);
    }
}
