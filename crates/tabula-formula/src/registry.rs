//! Function registry
//!
//! Maps uppercase function names to their declarations and compute bodies. Built once, then
//! only read.

use crate::args::{ArgList, ArgSpec};
use crate::context::EvalContext;
use crate::error::{EvalError, EvalResult, RegistrationError};
use crate::value::{Arg, Format, Value};
use ahash::AHashMap;
use lazy_regex::regex_is_match;
use once_cell::sync::Lazy;

/// Compute body: plain argument values in, value out
pub type ComputeFn = fn(&[Value], &EvalContext<'_>) -> EvalResult<Value>;

/// Format inference body: sees the arguments with their formats
pub type FormatFn = fn(&[Arg], &EvalContext<'_>) -> Option<Format>;

/// A function as declared by a module
#[derive(Clone, Copy)]
pub struct FunctionDef {
    pub description: &'static str,
    /// Argument declarations, see [`crate::args`]
    pub args: &'static [&'static str],
    /// Return type hint
    pub returns: &'static str,
    pub compute: ComputeFn,
    pub format: Option<FormatFn>,
}

impl FunctionDef {
    /// A function without format inference
    pub fn new(
        description: &'static str,
        args: &'static [&'static str],
        returns: &'static str,
        compute: ComputeFn,
    ) -> Self {
        Self {
            description,
            args,
            returns,
            compute,
            format: None,
        }
    }

    /// Attach a format inference body
    pub fn with_format(mut self, format: FormatFn) -> Self {
        self.format = Some(format);
        self
    }
}

/// A registered function
pub struct FunctionDescriptor {
    pub name: String,
    pub category: &'static str,
    pub description: &'static str,
    pub returns: &'static str,
    pub args: ArgList,
    compute: ComputeFn,
    format: Option<FormatFn>,
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("args", &self.args)
            .finish()
    }
}

impl FunctionDescriptor {
    /// Run the function.
    ///
    /// Errors in non-lazy arguments (scalars or inside ranges) are propagated without calling
    /// the body. Omitted arguments with a declared default receive it; an omitted optional
    /// argument before one of those is passed as empty.
    pub fn call(&self, args: &[Arg], ctx: &EvalContext<'_>) -> EvalResult<Arg> {
        let mut args = args.to_vec();
        for (index, arg) in args.iter().enumerate() {
            let lazy = self.args.spec_for(index).map_or(false, |s| s.lazy);
            if lazy {
                continue;
            }
            if let Some(err) = arg.value.first_error() {
                return Err(EvalError::Propagated {
                    kind: err.kind.propagated(),
                    message: err.message.clone(),
                });
            }
        }
        // omitted arguments up to the last declared default are filled, empty when undeclared
        let omitted: Vec<&ArgSpec> = self
            .args
            .specs
            .iter()
            .skip(args.len())
            .take_while(|s| !s.repeating)
            .collect();
        let fill = omitted.iter().rposition(|s| s.default.is_some()).map_or(0, |i| i + 1);
        for spec in &omitted[..fill] {
            args.push(Arg::from(spec.default.clone().unwrap_or_default()));
        }

        let values: Vec<Value> = args.iter().map(|a| a.value.clone()).collect();
        let value = (self.compute)(&values, ctx).map_err(|e| e.with_function_name(&self.name))?;
        let format = self.format.and_then(|f| f(&args, ctx));

        if let Some(Format::Matrix(formats)) = &format {
            let shape = (formats.len(), formats.first().map_or(0, Vec::len));
            if !value.is_matrix() || value.dimensions() != shape {
                return Err(EvalError::Internal(
                    "A format matrix should never be associated with a scalar value".to_string(),
                ));
            }
        }
        Ok(Arg::new(value, format))
    }
}

/// The table of known functions
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDescriptor>,
    order: Vec<String>,
}

impl FunctionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in function
    pub fn with_builtins() -> Result<Self, RegistrationError> {
        let mut registry = Self::new();
        crate::functions::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Register a function.
    ///
    /// The name is uppercased and `_` becomes `.` (`COVARIANCE_P` is `COVARIANCE.P`).
    pub fn add(&mut self, name: &str, def: FunctionDef) -> Result<&mut Self, RegistrationError> {
        let name = name.to_uppercase().replace('_', ".");
        if !regex_is_match!(r"^[A-Z0-9_.]+$", &name) {
            return Err(RegistrationError::InvalidFunctionName(name));
        }
        if self.functions.contains_key(&name) {
            return Err(RegistrationError::Duplicate(name));
        }
        let args = ArgList::parse(&name, def.args)?;
        log::debug!("registered function {}", name);
        self.order.push(name.clone());
        self.functions.insert(
            name.clone(),
            FunctionDescriptor {
                name,
                category: "",
                description: def.description,
                returns: def.returns,
                args,
                compute: def.compute,
                format: def.format,
            },
        );
        Ok(self)
    }

    /// Assign `category` to every function registered from position `from` on
    pub(crate) fn set_category_from(&mut self, from: usize, category: &'static str) {
        for name in &self.order[from..] {
            if let Some(descriptor) = self.functions.get_mut(name) {
                descriptor.category = category;
            }
        }
    }

    /// Look up a function, ignoring case
    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(&name.to_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered functions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.order.iter().filter_map(|n| self.functions.get(n))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// The process-wide registry of built-in functions
pub static FUNCTION_REGISTRY: Lazy<FunctionRegistry> = Lazy::new(|| {
    FunctionRegistry::with_builtins()
        .unwrap_or_else(|e| panic!("invalid built-in function declaration: {}", e))
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoReferences;
    use pretty_assertions::assert_eq;
    use tabula_core::{CellError, Locale};

    fn first(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
        Ok(args.first().cloned().unwrap_or_default())
    }

    fn matrix_format(_args: &[Arg], _ctx: &EvalContext<'_>) -> Option<Format> {
        Some(Format::Matrix(vec![vec![None]]))
    }

    fn def(args: &'static [&'static str]) -> FunctionDef {
        FunctionDef {
            description: "test",
            args,
            returns: "ANY",
            compute: first,
            format: None,
        }
    }

    fn call(registry: &FunctionRegistry, name: &str, args: &[Arg]) -> EvalResult<Arg> {
        let locale = Locale::default();
        let mut resolver = NoReferences;
        let ctx = EvalContext::new(&locale, registry, &mut resolver, chrono::NaiveDateTime::default());
        registry.get(name).ok_or(EvalError::Internal("missing".into()))?.call(args, &ctx)
    }

    #[test]
    fn test_name_validation() {
        let mut registry = FunctionRegistry::new();
        registry.add("COVARIANCE_P", def(&["x (any)"])).unwrap();
        assert!(registry.contains("covariance.p"));
        assert_eq!(
            registry.add("COVARIANCE.P", def(&["x (any)"])).unwrap_err(),
            RegistrationError::Duplicate("COVARIANCE.P".into())
        );
        assert!(matches!(
            registry.add("MY FUNC", def(&["x (any)"])),
            Err(RegistrationError::InvalidFunctionName(_))
        ));
        assert!(matches!(
            registry.add("BAD", def(&["x (any, optional)", "y (any)"])),
            Err(RegistrationError::InvalidArgs { .. })
        ));
    }

    #[test]
    fn test_error_propagation_and_lazy_args() {
        let mut registry = FunctionRegistry::new();
        registry.add("STRICT", def(&["x (any)"])).unwrap();
        registry.add("LAZY", def(&["x (any, lazy)"])).unwrap();
        let err_arg = Arg::from(Value::error(CellError::NotAvailable, "nothing"));

        let err = call(&registry, "STRICT", &[err_arg.clone()]).unwrap_err();
        assert_eq!(err.kind(), CellError::NotAvailable);

        let nested = Arg::from(Value::Matrix(vec![vec![
            Value::Number(1.0),
            Value::error(CellError::BadExpression, "bad"),
        ]]));
        let err = call(&registry, "STRICT", &[nested]).unwrap_err();
        assert_eq!(err.kind(), CellError::Generic);

        let ok = call(&registry, "LAZY", &[err_arg]).unwrap();
        assert!(ok.value.is_error());
    }

    #[test]
    fn test_defaults_are_filled() {
        let mut registry = FunctionRegistry::new();
        registry
            .add("DEF", def(&["x (number, optional, default=42)"]))
            .unwrap();
        assert_eq!(call(&registry, "DEF", &[]).unwrap().value, Value::Number(42.0));
    }

    fn count(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
        Ok(Value::Number(args.len() as f64))
    }

    fn last(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
        Ok(args.last().cloned().unwrap_or_default())
    }

    #[test]
    fn test_defaults_after_omitted_optional() {
        let args: &'static [&'static str] = &[
            "key (any)",
            "fallback (any, optional)",
            "mode (number, optional, default=7)",
            "extra (any, optional)",
        ];
        let mut registry = FunctionRegistry::new();
        registry.add("ARGCOUNT", FunctionDef { compute: count, ..def(args) }).unwrap();
        registry.add("LASTARG", FunctionDef { compute: last, ..def(args) }).unwrap();

        let key = [Arg::from(Value::Number(1.0))];
        // filled up to the last default, trailing optionals stay omitted
        assert_eq!(call(&registry, "ARGCOUNT", &key).unwrap().value, Value::Number(3.0));
        assert_eq!(call(&registry, "LASTARG", &key).unwrap().value, Value::Number(7.0));

        let two = [Arg::from(Value::Number(1.0)), Arg::from(Value::from("x"))];
        assert_eq!(call(&registry, "LASTARG", &two).unwrap().value, Value::Number(7.0));
    }

    #[test]
    fn test_scalar_value_with_matrix_format_is_internal_error() {
        let mut registry = FunctionRegistry::new();
        registry
            .add(
                "BROKEN",
                FunctionDef {
                    format: Some(matrix_format),
                    ..def(&["x (any)"])
                },
            )
            .unwrap();
        let err = call(&registry, "BROKEN", &[Arg::from(Value::Number(1.0))]).unwrap_err();
        assert_eq!(
            err,
            EvalError::Internal("A format matrix should never be associated with a scalar value".into())
        );
    }

    #[test]
    fn test_builtins_register() {
        assert!(FUNCTION_REGISTRY.contains("SUM"));
        assert!(FUNCTION_REGISTRY.contains("VAR.S"));
        assert!(FUNCTION_REGISTRY.get("sum").is_some());
        assert!(FUNCTION_REGISTRY.iter().all(|f| !f.category.is_empty()));
    }

    #[test]
    fn test_every_builtin_declaration_parses() {
        let registry = match FunctionRegistry::with_builtins() {
            Ok(registry) => registry,
            Err(e) => panic!("{}", e),
        };
        assert!(registry.len() > 290);
        for name in ["NETWORKDAYS", "NETWORKDAYS.INTL", "WORKDAY", "WORKDAY.INTL", "XLOOKUP", "TEXTJOIN"] {
            assert!(registry.contains(name), "{} is missing", name);
        }
        assert_eq!(FUNCTION_REGISTRY.len(), registry.len());
    }
}
