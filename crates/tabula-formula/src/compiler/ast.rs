//! Compiled expression tree

use tabula_core::CellError;

/// Formula expression
///
/// Operators are plain calls to the operator functions (`ADD`, `UMINUS`, ...), so evaluation
/// has a single dispatch path.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Error literal, e.g. `#REF` left behind by a deleted sheet
    Error(CellError),
    /// Index into the formula's dependency list
    Reference(usize),
    /// An omitted argument, as in `F(1, , 3)`
    Empty,
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Type name of a literal, `None` for anything evaluated at run time
    pub fn literal_type(&self) -> Option<&'static str> {
        match self {
            Expr::Number(_) => Some("number"),
            Expr::Text(_) => Some("string"),
            Expr::Boolean(_) => Some("boolean"),
            _ => None,
        }
    }
}

/// Binary operators with their binding power and function name
pub(crate) fn binary_operator(symbol: &str) -> Option<(u8, &'static str)> {
    Some(match symbol {
        "=" => (10, "EQ"),
        "<>" => (10, "NE"),
        "<" => (10, "LT"),
        "<=" => (10, "LTE"),
        ">" => (10, "GT"),
        ">=" => (10, "GTE"),
        "&" => (13, "CONCAT"),
        "+" => (15, "ADD"),
        "-" => (15, "MINUS"),
        "*" => (20, "MULTIPLY"),
        "/" => (20, "DIVIDE"),
        "^" => (30, "POW"),
        _ => return None,
    })
}

/// Binding power of prefix `-` and `+`
pub(crate) const UNARY_POWER: u8 = 20;

/// Binding power of postfix `%`
pub(crate) const PERCENT_POWER: u8 = 30;

pub(crate) fn prefix_operator(symbol: &str) -> Option<&'static str> {
    match symbol {
        "-" => Some("UMINUS"),
        "+" => Some("UPLUS"),
        _ => None,
    }
}
