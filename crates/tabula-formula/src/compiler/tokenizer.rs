//! Formula tokenizer
//!
//! Splits formula text (without the leading `=`) into tokens whose texts concatenate back to
//! the normalized formula. Whitespace is kept as tokens so that regenerated text matches what
//! was typed.

use super::reference::Reference;
use crate::error::{CompileError, FormulaResult};
use tabula_core::CellError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Boolean,
    /// Cell or range reference, possibly sheet-qualified
    Reference,
    /// Function name, always followed by `(`
    Function,
    Operator,
    LeftParen,
    RightParen,
    Comma,
    /// An error literal such as `#REF` or `#N/A`
    Error,
    Space,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Tokenize formula text
pub fn tokenize(formula: &str) -> FormulaResult<Vec<Token>> {
    let mut scanner = Scanner { input: formula, pos: 0 };
    let mut tokens = Vec::new();
    while let Some(token) = scanner.scan_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn scan_token(&mut self) -> FormulaResult<Option<Token>> {
        let Some(c) = self.peek_char() else {
            return Ok(None);
        };

        let token = match c {
            c if c.is_whitespace() => {
                let start = self.pos;
                while self.peek_char().map_or(false, char::is_whitespace) {
                    self.advance();
                }
                Token::new(TokenKind::Space, &self.input[start..self.pos])
            }
            '+' | '-' | '*' | '/' | '^' | '%' | '&' | '=' => {
                self.advance();
                Token::new(TokenKind::Operator, c.to_string())
            }
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::new(TokenKind::Operator, "<=")
                    }
                    Some('>') => {
                        self.advance();
                        Token::new(TokenKind::Operator, "<>")
                    }
                    _ => Token::new(TokenKind::Operator, "<"),
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::Operator, ">=")
                } else {
                    Token::new(TokenKind::Operator, ">")
                }
            }
            '(' => {
                self.advance();
                Token::new(TokenKind::LeftParen, "(")
            }
            ')' => {
                self.advance();
                Token::new(TokenKind::RightParen, ")")
            }
            ',' => {
                self.advance();
                Token::new(TokenKind::Comma, ",")
            }
            '"' => self.scan_string()?,
            '\'' => self.scan_quoted_reference()?,
            '#' => self.scan_error()?,
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => self.scan_identifier_or_ref()?,
            other => {
                return Err(CompileError::Syntax(format!("unexpected character '{}'", other)));
            }
        };
        Ok(Some(token))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::new(TokenKind::String, &self.input[start..self.pos]));
                }
                Some(_) => self.advance(),
                None => return Err(CompileError::Syntax("unterminated string".into())),
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        self.skip_digits();
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let digits_at = match self.peek_char_at(1) {
                Some('+') | Some('-') => 2,
                _ => 1,
            };
            if self.peek_char_at(digits_at).map_or(false, |c| c.is_ascii_digit()) {
                for _ in 0..digits_at {
                    self.advance();
                }
                self.skip_digits();
            }
        }
        Token::new(TokenKind::Number, &self.input[start..self.pos])
    }

    fn scan_error(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance();
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '!' | '?'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        match CellError::from_str(text) {
            Some(_) => Ok(Token::new(TokenKind::Error, text.to_uppercase())),
            None => Err(CompileError::Syntax(format!("unknown error literal '{}'", text))),
        }
    }

    /// `'Sheet name'!A1`
    fn scan_quoted_reference(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(_) => self.advance(),
                None => return Err(CompileError::Syntax("unterminated sheet name".into())),
            }
        }
        if self.peek_char() != Some('!') {
            return Err(CompileError::Syntax(format!(
                "expected '!' after sheet name {}",
                &self.input[start..self.pos]
            )));
        }
        self.advance();
        self.scan_local_reference(start)
    }

    fn scan_identifier_or_ref(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.skip_word();
        let word = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return self.scan_local_reference(start);
        }
        if self.peek_char() == Some('(') {
            return Ok(Token::new(TokenKind::Function, word.to_uppercase()));
        }
        match word.to_uppercase().as_str() {
            "TRUE" | "FALSE" => return Ok(Token::new(TokenKind::Boolean, word.to_uppercase())),
            _ => {}
        }
        self.finish_reference(start)
    }

    /// The cell part of a reference whose sheet prefix started at `start`
    fn scan_local_reference(&mut self, start: usize) -> FormulaResult<Token> {
        self.skip_word();
        self.finish_reference(start)
    }

    /// Consume an optional `:A2` range end and build the reference token
    fn finish_reference(&mut self, start: usize) -> FormulaResult<Token> {
        if self.peek_char() == Some(':') {
            let before_colon = self.pos;
            self.advance();
            let end_start = self.pos;
            self.skip_word();
            if Reference::parse(&self.input[end_start..self.pos]).map_or(true, |r| r.sheet.is_some()) {
                self.pos = before_colon;
            }
        }
        let text = &self.input[start..self.pos];
        match Reference::parse(text) {
            Some(reference) => Ok(Token::new(TokenKind::Reference, reference.to_string())),
            None => Err(CompileError::Syntax(format!("invalid reference or name '{}'", text))),
        }
    }

    fn skip_word(&mut self) {
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.advance();
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(formula: &str) -> Vec<(TokenKind, String)> {
        tokenize(formula)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_operators_and_literals() {
        use TokenKind::*;
        assert_eq!(
            kinds("1.5e3 <= \"a\"\"b\""),
            vec![
                (Number, "1.5e3".into()),
                (Space, " ".into()),
                (Operator, "<=".into()),
                (Space, " ".into()),
                (String, "\"a\"\"b\"".into()),
            ]
        );
        assert_eq!(
            kinds("true<>#n/a"),
            vec![(Boolean, "TRUE".into()), (Operator, "<>".into()), (Error, "#N/A".into())]
        );
    }

    #[test]
    fn test_references_and_functions() {
        use TokenKind::*;
        assert_eq!(
            kinds("sum(a1:$B$2,'My sheet'!c3)"),
            vec![
                (Function, "SUM".into()),
                (LeftParen, "(".into()),
                (Reference, "A1:$B$2".into()),
                (Comma, ",".into()),
                (Reference, "'My sheet'!C3".into()),
                (RightParen, ")".into()),
            ]
        );
        assert_eq!(kinds("Sheet2!A1")[0], (Reference, "Sheet2!A1".into()));
        assert_eq!(kinds("FORMAT.LARGE.NUMBER(1)")[0], (Function, "FORMAT.LARGE.NUMBER".into()));
    }

    #[test]
    fn test_rejects_unknown_names() {
        assert!(matches!(tokenize("foo + 1"), Err(CompileError::Syntax(_))));
        assert!(matches!(tokenize("\"open"), Err(CompileError::Syntax(_))));
        assert!(matches!(tokenize("1 ; 2"), Err(CompileError::Syntax(_))));
        assert!(matches!(tokenize("#WHAT"), Err(CompileError::Syntax(_))));
    }
}
