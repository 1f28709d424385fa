//! Formula parser
//!
//! Precedence climbing over the token list. Function calls are checked against the registry
//! while parsing: unknown names, argument counts and literals passed where a reference is
//! required are all compile errors.

use super::ast::{binary_operator, prefix_operator, Expr, PERCENT_POWER, UNARY_POWER};
use super::reference::Reference;
use super::tokenizer::{Token, TokenKind};
use crate::error::{CompileError, FormulaResult};
use crate::registry::FunctionRegistry;
use tabula_core::CellError;

/// Parse tokens into an expression and the references it reads, in token order
pub fn parse(tokens: &[Token], registry: &FunctionRegistry) -> FormulaResult<(Expr, Vec<Reference>)> {
    let tokens: Vec<&Token> = tokens.iter().filter(|t| t.kind != TokenKind::Space).collect();
    if tokens.is_empty() {
        return Err(CompileError::Empty);
    }
    let mut parser = FormulaParser {
        tokens,
        pos: 0,
        registry,
        references: Vec::new(),
    };
    let expr = parser.parse_expression(0)?;
    if let Some(token) = parser.current() {
        return Err(CompileError::Syntax(format!("unexpected '{}'", token.text)));
    }
    Ok((expr, parser.references))
}

struct FormulaParser<'a> {
    tokens: Vec<&'a Token>,
    pos: usize,
    registry: &'a FunctionRegistry,
    references: Vec<Reference>,
}

impl<'a> FormulaParser<'a> {
    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).copied()
    }

    fn current_kind(&self) -> Option<TokenKind> {
        self.current().map(|t| t.kind)
    }

    fn consume(&mut self) -> Option<&'a Token> {
        let token = self.current();
        self.pos += 1;
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> FormulaResult<()> {
        if self.current_kind() == Some(kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CompileError::Syntax(format!("missing {}", what)))
        }
    }

    fn parse_expression(&mut self, min_power: u8) -> FormulaResult<Expr> {
        let mut left = self.parse_prefix()?;

        while let Some(token) = self.current() {
            if token.kind != TokenKind::Operator {
                break;
            }
            if token.text == "%" {
                if PERCENT_POWER <= min_power {
                    break;
                }
                self.pos += 1;
                left = self.call("UNARY.PERCENT", vec![left])?;
                continue;
            }
            let Some((power, name)) = binary_operator(&token.text) else {
                return Err(CompileError::Syntax(format!("unexpected operator '{}'", token.text)));
            };
            if power <= min_power {
                break;
            }
            self.pos += 1;
            let right = self.parse_expression(power)?;
            left = self.call(name, vec![left, right])?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> FormulaResult<Expr> {
        let token = self
            .consume()
            .ok_or_else(|| CompileError::Syntax("unexpected end of formula".into()))?;

        match token.kind {
            TokenKind::Number => token
                .text
                .parse()
                .map(Expr::Number)
                .map_err(|_| CompileError::Syntax(format!("invalid number '{}'", token.text))),
            TokenKind::String => {
                let inner = &token.text[1..token.text.len() - 1];
                Ok(Expr::Text(inner.replace("\"\"", "\"")))
            }
            TokenKind::Boolean => Ok(Expr::Boolean(token.text == "TRUE")),
            TokenKind::Error => Ok(Expr::Error(
                CellError::from_str(&token.text).unwrap_or(CellError::Generic),
            )),
            TokenKind::Reference => {
                let reference = Reference::parse(&token.text)
                    .ok_or_else(|| CompileError::Syntax(format!("invalid reference '{}'", token.text)))?;
                self.references.push(reference);
                Ok(Expr::Reference(self.references.len() - 1))
            }
            TokenKind::LeftParen => {
                let expr = self.parse_expression(0)?;
                self.expect(TokenKind::RightParen, "closing parenthesis")?;
                Ok(expr)
            }
            TokenKind::Operator => match prefix_operator(&token.text) {
                Some(name) => {
                    let operand = self.parse_expression(UNARY_POWER)?;
                    self.call(name, vec![operand])
                }
                None => Err(CompileError::Syntax(format!("unexpected operator '{}'", token.text))),
            },
            TokenKind::Function => self.parse_function_call(&token.text),
            TokenKind::RightParen | TokenKind::Comma | TokenKind::Space => {
                Err(CompileError::Syntax(format!("unexpected '{}'", token.text)))
            }
        }
    }

    fn parse_function_call(&mut self, name: &str) -> FormulaResult<Expr> {
        self.expect(TokenKind::LeftParen, "opening parenthesis")?;
        let mut args = Vec::new();

        if self.current_kind() == Some(TokenKind::RightParen) {
            self.pos += 1;
            return self.call(name, args);
        }
        loop {
            match self.current_kind() {
                Some(TokenKind::Comma) | Some(TokenKind::RightParen) => args.push(Expr::Empty),
                _ => args.push(self.parse_expression(0)?),
            }
            match self.current_kind() {
                Some(TokenKind::Comma) => self.pos += 1,
                Some(TokenKind::RightParen) => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(CompileError::Syntax("missing closing parenthesis".into())),
            }
        }
        self.call(name, args)
    }

    /// Build a call after checking it against the function's declaration
    fn call(&self, name: &str, args: Vec<Expr>) -> FormulaResult<Expr> {
        let descriptor = self
            .registry
            .get(name)
            .ok_or_else(|| CompileError::UnknownFunction(name.to_string()))?;
        descriptor
            .args
            .check_count(args.len())
            .map_err(|detail| CompileError::ArgumentCount {
                function: descriptor.name.clone(),
                detail,
            })?;

        for (index, arg) in args.iter().enumerate() {
            let Some(spec) = descriptor.args.spec_for(index) else {
                continue;
            };
            if !(spec.accepts_only_ranges() || spec.is_meta()) {
                continue;
            }
            if let Some(found) = arg.literal_type() {
                return Err(CompileError::ExpectedReference {
                    function: descriptor.name.clone(),
                    position: index + 1,
                    found: found.to_string(),
                });
            }
        }

        Ok(Expr::Call {
            name: descriptor.name.clone(),
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tokenizer::tokenize;
    use super::*;
    use crate::registry::FUNCTION_REGISTRY;
    use pretty_assertions::assert_eq;

    fn parse_formula(formula: &str) -> FormulaResult<Expr> {
        parse(&tokenize(formula)?, &FUNCTION_REGISTRY).map(|(expr, _)| expr)
    }

    fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.to_string(),
            args,
        }
    }

    fn n(v: f64) -> Expr {
        Expr::Number(v)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_formula("1+2*3").unwrap(),
            call("ADD", vec![n(1.0), call("MULTIPLY", vec![n(2.0), n(3.0)])])
        );
        assert_eq!(
            parse_formula("(1+2)*3").unwrap(),
            call("MULTIPLY", vec![call("ADD", vec![n(1.0), n(2.0)]), n(3.0)])
        );
        assert_eq!(
            parse_formula("1&2=\"12\"").unwrap(),
            call("EQ", vec![call("CONCAT", vec![n(1.0), n(2.0)]), Expr::Text("12".into())])
        );
    }

    #[test]
    fn test_unary_binds_looser_than_power() {
        assert_eq!(
            parse_formula("-2^2").unwrap(),
            call("UMINUS", vec![call("POW", vec![n(2.0), n(2.0)])])
        );
        assert_eq!(
            parse_formula("2^3^2").unwrap(),
            call("POW", vec![call("POW", vec![n(2.0), n(3.0)]), n(2.0)])
        );
        assert_eq!(
            parse_formula("50%*2").unwrap(),
            call("MULTIPLY", vec![call("UNARY.PERCENT", vec![n(50.0)]), n(2.0)])
        );
    }

    #[test]
    fn test_references_are_indexed_in_order() {
        let (expr, references) = parse(&tokenize("SUM(A1:A3, Sheet2!B2) + A1").unwrap(), &FUNCTION_REGISTRY).unwrap();
        assert_eq!(
            expr,
            call(
                "ADD",
                vec![call("SUM", vec![Expr::Reference(0), Expr::Reference(1)]), Expr::Reference(2)]
            )
        );
        assert_eq!(references.len(), 3);
        assert_eq!(references[1].sheet.as_deref(), Some("Sheet2"));
    }

    #[test]
    fn test_empty_arguments() {
        assert_eq!(
            parse_formula("IF(TRUE, , 2)").unwrap(),
            call("IF", vec![Expr::Boolean(true), Expr::Empty, n(2.0)])
        );
        assert_eq!(parse_formula("PI()").unwrap(), call("PI", vec![]));
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(parse_formula(""), Err(CompileError::Empty));
        assert_eq!(
            parse_formula("NOPE(1)"),
            Err(CompileError::UnknownFunction("NOPE".into()))
        );
        assert_eq!(
            parse_formula("(1+2").unwrap_err(),
            CompileError::Syntax("missing closing parenthesis".into())
        );
        assert!(matches!(parse_formula("1+2)"), Err(CompileError::Syntax(_))));
        assert!(matches!(parse_formula("1+"), Err(CompileError::Syntax(_))));
        assert_eq!(
            parse_formula("ABS(1, 2)").unwrap_err().to_string(),
            "Invalid number of arguments for the ABS function. Expected 1 maximum, but got 2 instead."
        );
        assert_eq!(
            parse_formula("COUNTIF(1, 2)").unwrap_err().to_string(),
            "Function COUNTIF expects the parameter 1 to be reference to a cell or range, not a number."
        );
    }
}
