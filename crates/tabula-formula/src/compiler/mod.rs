//! Formula compiler
//!
//! Turns formula text into a [`CompiledFormula`]: the token list (kept for regenerating text),
//! the references the formula reads and an expression tree pointing into that reference list.
//! Translating or renaming only touches the reference list, never the tree, so copy/paste and
//! structural edits do not re-parse.

mod ast;
mod parser;
mod reference;
mod tokenizer;

pub use ast::Expr;
pub use reference::{quote_sheet_name, Reference};
pub use tokenizer::{tokenize, Token, TokenKind};

use crate::args::ArgSpec;
use crate::context::EvalContext;
use crate::error::{CompileError, EvalError, EvalResult, FormulaResult};
use crate::registry::FunctionRegistry;
use crate::value::{Arg, Value};
use tabula_core::CellError;

/// Text a reference turns into once it no longer points anywhere
pub const INVALID_REFERENCE: &str = "#REF";

/// Compile formula text, with or without its leading `=`
///
/// # Examples
/// ```
/// use tabula_formula::{compile, FUNCTION_REGISTRY};
///
/// let formula = compile("=sum(a1:b2,  C3)", &FUNCTION_REGISTRY).unwrap();
/// assert_eq!(formula.to_formula_string(), "=SUM(A1:B2,  C3)");
/// assert_eq!(formula.dependencies().count(), 2);
/// ```
pub fn compile(formula: &str, registry: &FunctionRegistry) -> FormulaResult<CompiledFormula> {
    let body = formula.strip_prefix('=').unwrap_or(formula);
    if body.trim().is_empty() {
        return Err(CompileError::Empty);
    }
    let tokens = tokenize(body)?;
    let (expr, references) = parser::parse(&tokens, registry)?;
    log::debug!("compiled formula {:?} with {} references", formula, references.len());
    Ok(CompiledFormula::new(tokens, references.into_iter().map(Some).collect(), expr))
}

/// A parsed formula
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    text: String,
    tokens: Vec<Token>,
    /// One entry per reference token; `None` once the reference became invalid
    dependencies: Vec<Option<Reference>>,
    expr: Expr,
}

impl CompiledFormula {
    fn new(tokens: Vec<Token>, dependencies: Vec<Option<Reference>>, expr: Expr) -> Self {
        let text = render(&tokens, &dependencies);
        Self {
            text,
            tokens,
            dependencies,
            expr,
        }
    }

    /// The `=#REF` formula left behind when a formula's sheet reference disappears
    pub fn invalid() -> Self {
        Self::new(
            vec![Token {
                kind: TokenKind::Error,
                text: INVALID_REFERENCE.to_string(),
            }],
            Vec::new(),
            Expr::Error(CellError::Ref),
        )
    }

    /// Normalized formula text, starting with `=`
    pub fn to_formula_string(&self) -> String {
        self.text.clone()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Valid references read by the formula, in textual order
    pub fn dependencies(&self) -> impl Iterator<Item = &Reference> + '_ {
        self.dependencies.iter().flatten()
    }

    /// Whether some reference turned into `#REF`
    pub fn has_invalid_references(&self) -> bool {
        self.dependencies.iter().any(Option::is_none)
    }

    /// Shift every relative reference by `(dcol, drow)`
    ///
    /// References pushed off the grid become `#REF`. Absolute coordinates never move.
    pub fn translate(&self, dcol: i64, drow: i64) -> Self {
        if dcol == 0 && drow == 0 {
            return self.clone();
        }
        let dependencies = self
            .dependencies
            .iter()
            .map(|d| d.as_ref().and_then(|r| r.translated(dcol, drow)))
            .collect();
        Self::new(self.tokens.clone(), dependencies, self.expr.clone())
    }

    /// Point references to sheet `old` at sheet `new`; `None` when nothing refers to `old`
    pub fn rename_sheet(&self, old: &str, new: &str) -> Option<Self> {
        if !self.dependencies().any(|r| r.is_on_sheet(old)) {
            return None;
        }
        let dependencies = self
            .dependencies
            .iter()
            .map(|d| {
                d.as_ref().map(|r| match r.is_on_sheet(old) {
                    true => Reference {
                        sheet: Some(new.to_string()),
                        ..r.clone()
                    },
                    false => r.clone(),
                })
            })
            .collect();
        Some(Self::new(self.tokens.clone(), dependencies, self.expr.clone()))
    }

    /// The whole formula becomes `=#REF` when it reads from sheet `name`
    pub fn invalidate_sheet(&self, name: &str) -> Option<Self> {
        self.dependencies()
            .any(|r| r.is_on_sheet(name))
            .then(Self::invalid)
    }

    /// Run the formula
    ///
    /// The result may be a matrix; callers storing it in a single cell keep the top-left value.
    pub fn evaluate(&self, ctx: &mut EvalContext<'_>) -> EvalResult<Arg> {
        self.eval_expr(&self.expr, None, ctx)
    }

    fn eval_expr(&self, expr: &Expr, spec: Option<&ArgSpec>, ctx: &mut EvalContext<'_>) -> EvalResult<Arg> {
        match expr {
            Expr::Number(n) => Ok(Arg::from(Value::Number(*n))),
            Expr::Text(s) => Ok(Arg::from(Value::Text(s.clone()))),
            Expr::Boolean(b) => Ok(Arg::from(Value::Boolean(*b))),
            Expr::Empty => Ok(spec
                .and_then(|s| s.default.clone())
                .map(Arg::from)
                .unwrap_or_default()),
            Expr::Error(kind) => Err(EvalError::Propagated {
                kind: *kind,
                message: literal_error_message(*kind),
            }),
            Expr::Reference(index) => self.eval_reference(*index, spec, ctx),
            Expr::Call { name, args } => {
                let registry = ctx.registry;
                let descriptor = registry
                    .get(name)
                    .ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;
                let mut values = Vec::with_capacity(args.len());
                for (index, arg) in args.iter().enumerate() {
                    let spec = descriptor.args.spec_for(index);
                    values.push(capture(self.eval_expr(arg, spec, ctx)));
                }
                descriptor.call(&values, ctx)
            }
        }
    }

    fn eval_reference(&self, index: usize, spec: Option<&ArgSpec>, ctx: &mut EvalContext<'_>) -> EvalResult<Arg> {
        let reference = self
            .dependencies
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(invalid_reference)?;

        if spec.map_or(false, ArgSpec::is_meta) {
            return Ok(Arg::from(Value::Text(reference.to_string())));
        }
        let wants_range = spec.map_or(false, |s| s.types.iter().any(|t| t.is_range()));
        let sheet = reference.sheet.as_deref();
        if reference.single && !wants_range {
            ctx.resolver.resolve_cell(sheet, reference.start.row, reference.start.col)
        } else {
            ctx.resolver.resolve_range(sheet, &reference.range())
        }
    }
}

/// Turn a failed sub-expression into an error value the callee can inspect
fn capture(result: EvalResult<Arg>) -> Arg {
    result.unwrap_or_else(|e| Arg::from(Value::error(e.kind(), e.to_string())))
}

fn invalid_reference() -> EvalError {
    EvalError::Propagated {
        kind: CellError::Ref,
        message: "Invalid reference".to_string(),
    }
}

fn literal_error_message(kind: CellError) -> String {
    match kind {
        CellError::Ref => "Invalid reference".to_string(),
        other => other.as_str().to_string(),
    }
}

/// Formula text from tokens, with reference tokens replaced by their current target
fn render(tokens: &[Token], dependencies: &[Option<Reference>]) -> String {
    let mut text = String::from("=");
    let mut references = dependencies.iter();
    for token in tokens {
        if token.kind == TokenKind::Reference {
            match references.next() {
                Some(Some(reference)) => text.push_str(&reference.to_string()),
                _ => text.push_str(INVALID_REFERENCE),
            }
        } else {
            text.push_str(&token.text);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_utils::{eval, eval_in, eval_number, Grid};
    use crate::registry::FUNCTION_REGISTRY;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn compiled(formula: &str) -> CompiledFormula {
        compile(formula, &FUNCTION_REGISTRY).unwrap()
    }

    #[test]
    fn test_normalized_text() {
        assert_eq!(compiled("=if(a1>=2, \"x\", false)").as_str(), "=IF(A1>=2, \"x\", FALSE)");
        assert_eq!(compiled("1+1").to_formula_string(), "=1+1");
        assert_eq!(compile("=", &FUNCTION_REGISTRY), Err(CompileError::Empty));
        assert_eq!(compile("=   ", &FUNCTION_REGISTRY), Err(CompileError::Empty));
    }

    #[test]
    fn test_operator_precedence_values() {
        assert_eq!(eval_number("=-2^2"), -4.0);
        assert_eq!(eval_number("=2^3^2"), 64.0);
        assert_eq!(eval_number("=1+2*3-4/2"), 5.0);
        assert_eq!(eval_number("=50%"), 0.5);
        assert_eq!(eval("=1&2"), Value::from("12"));
        assert_eq!(eval("=1+1=2"), Value::Boolean(true));
    }

    #[test]
    fn test_references_resolve() {
        let mut grid = Grid::new(&[("A1", Value::Number(2.0)), ("A2", Value::Number(5.0))]);
        assert_eq!(eval_in("=A1*A2", &mut grid), Value::Number(10.0));
        assert_eq!(eval_in("=SUM(A1:A3)", &mut grid), Value::Number(7.0));
        assert_eq!(eval_in("=SUM(A2)", &mut grid), Value::Number(5.0));
        assert_eq!(eval_in("=ROW(A2)", &mut grid), Value::Number(2.0));
    }

    #[test]
    fn test_errors_propagate_but_lazy_args_see_them() {
        assert_eq!(eval("=#REF").as_error().map(|e| e.kind), Some(CellError::Ref));
        assert_eq!(eval("=1/0+1").as_error().map(|e| e.kind), Some(CellError::Generic));
        assert_eq!(eval("=IFERROR(1/0, 7)"), Value::Number(7.0));
        assert_eq!(eval("=ISERROR(#N/A)"), Value::Boolean(true));
    }

    #[test]
    fn test_empty_argument_uses_default() {
        let mut grid = Grid::new(&[
            ("A1", Value::from("a")),
            ("A2", Value::from("b")),
            ("B1", Value::Number(1.0)),
            ("B2", Value::Number(2.0)),
        ]);
        assert_eq!(eval_in("=XLOOKUP(\"b\", A1:A2, B1:B2, , 0)", &mut grid), Value::Number(2.0));
    }

    #[test]
    fn test_translate() {
        let f = compiled("=SUM($A1:B$2) + Sheet2!C3");
        assert_eq!(f.translate(1, 2).as_str(), "=SUM($A3:C$2) + Sheet2!D5");
        assert_eq!(f.translate(0, 0), f);

        let moved = compiled("=A1+B2").translate(-1, 0);
        assert_eq!(moved.as_str(), "=#REF+A2");
        assert!(moved.has_invalid_references());
        assert_eq!(moved.dependencies().count(), 1);
        let locale = tabula_core::Locale::default();
        let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let mut grid = Grid::default();
        let mut ctx = EvalContext::new(&locale, &FUNCTION_REGISTRY, &mut grid, now);
        assert_eq!(moved.evaluate(&mut ctx), Err(invalid_reference()));
    }

    #[test]
    fn test_rename_and_invalidate_sheet() {
        let f = compiled("=Sheet2!A1 + sheet2!B1 + A1");
        let renamed = f.rename_sheet("Sheet2", "Q1 data").unwrap();
        assert_eq!(renamed.as_str(), "='Q1 data'!A1 + 'Q1 data'!B1 + A1");
        assert_eq!(f.rename_sheet("Other", "X"), None);

        let invalid = f.invalidate_sheet("SHEET2").unwrap();
        assert_eq!(invalid.as_str(), "=#REF");
        assert_eq!(invalid.dependencies().count(), 0);
        assert_eq!(compiled("=A1").invalidate_sheet("Sheet2"), None);
    }

    #[test]
    fn test_translation_past_the_edge_is_not_undone() {
        let f = compiled("=A1+$A1+B2");
        let there_and_back = f.translate(-1, 0).translate(1, 0);
        assert_eq!(there_and_back.as_str(), "=#REF+$A1+B2");
        assert_eq!(f.translate(0, 0).as_str(), "=A1+$A1+B2");

        let up_and_down = compiled("=SUM(A1:B2)").translate(0, -1).translate(0, 1);
        assert_eq!(up_and_down.as_str(), "=SUM(#REF)");
        assert!(up_and_down.has_invalid_references());
    }

    proptest! {
        // offsets stay inside the grid, a reference pushed past its edge stays #REF
        #[test]
        fn translation_composes(a in -20i64..20, b in -20i64..20, c in -20i64..20, d in -20i64..20) {
            let f = compiled("=SUM(Z50:$AB60) + AC$70 * 'My sheet'!$AD80");
            let twice = f.translate(a, b).translate(c, d);
            let once = f.translate(a + c, b + d);
            prop_assert_eq!(twice.as_str(), once.as_str());
        }
    }
}
