use std::collections::HashMap;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    ast::{Definition, Expr, Location, Op, Program},
    lex::{Token, TokenKind, locate},
};

/// How many expressions may enclose one another before parsing gives up.
pub const MAX_DEPTH: usize = 256;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(parse::unexpected_token), help("use {expected} here instead"))]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("unexpected end of input, expected {expected}")]
    #[diagnostic(
        code(parse::unexpected_eof),
        help("the file ended unexpectedly, possibly due to a missing closing bracket")
    )]
    UnexpectedEof {
        expected: String,
        line: usize,
        column: usize,
        #[label("input ends here")]
        span: SourceSpan,
    },

    #[error("trailing input after the main expression: {found}")]
    #[diagnostic(
        code(parse::trailing_input),
        help("a file holds definitions followed by exactly one expression")
    )]
    TrailingInput {
        found: String,
        line: usize,
        column: usize,
        #[label("unexpected {found}")]
        span: SourceSpan,
    },

    #[error("duplicate key `{key}` in record")]
    #[diagnostic(code(parse::duplicate_key))]
    DuplicateKey {
        key: String,
        line: usize,
        column: usize,
        #[label("defined again here")]
        span: SourceSpan,
        #[label("first defined here")]
        first: SourceSpan,
    },

    #[error("constant `{name}` is already defined")]
    #[diagnostic(
        code(parse::redefinition),
        help("redefinition is rejected in strict mode; rename one of the constants")
    )]
    Redefinition {
        name: String,
        line: usize,
        column: usize,
        #[label("defined again here")]
        span: SourceSpan,
        #[label("first defined here")]
        first: SourceSpan,
    },

    #[error("expression is nested more than {limit} levels deep")]
    #[diagnostic(
        code(parse::too_deep),
        help("split the nested part into constants defined with `def`")
    )]
    TooDeep {
        limit: usize,
        line: usize,
        column: usize,
        #[label("nesting limit reached here")]
        span: SourceSpan,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            Self::UnexpectedToken { line, .. }
            | Self::UnexpectedEof { line, .. }
            | Self::TrailingInput { line, .. }
            | Self::DuplicateKey { line, .. }
            | Self::Redefinition { line, .. }
            | Self::TooDeep { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            Self::UnexpectedToken { column, .. }
            | Self::UnexpectedEof { column, .. }
            | Self::TrailingInput { column, .. }
            | Self::DuplicateKey { column, .. }
            | Self::Redefinition { column, .. }
            | Self::TooDeep { column, .. } => *column,
        }
    }

    fn unexpected(expected: impl ToString, token: &Token<'_>) -> Self {
        if token.kind == TokenKind::Eof {
            return ParseError::UnexpectedEof {
                expected: expected.to_string(),
                line: token.line,
                column: token.column,
                span: token.span(),
            };
        }
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: describe(token),
            line: token.line,
            column: token.column,
            span: token.span(),
        }
    }
}

fn describe(token: &Token<'_>) -> String {
    match token.kind {
        TokenKind::String | TokenKind::Integer(_) | TokenKind::Real(_) => {
            format!("{} {}", token.kind, token.lexeme)
        }
        TokenKind::Name | TokenKind::Key => format!("{} `{}`", token.kind, token.lexeme),
        kind => kind.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// When false, a second `def` of the same name is an error instead of
    /// replacing the earlier binding.
    pub allow_redefinition: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            allow_redefinition: true,
        }
    }
}

pub struct Parser<'de> {
    tokens: Vec<Token<'de>>,
    pos: usize,
    depth: usize,
    options: ParseOptions,
}

impl<'de> Parser<'de> {
    pub fn new(mut tokens: Vec<Token<'de>>) -> Self {
        if tokens.last().is_none_or(|token| token.kind != TokenKind::Eof) {
            let eof = match tokens.last() {
                Some(last) => {
                    let (line, column) = locate(last.line, last.column, last.lexeme);
                    Token {
                        kind: TokenKind::Eof,
                        lexeme: "",
                        line,
                        column,
                        offset: last.offset + last.lexeme.len(),
                    }
                }
                None => Token {
                    kind: TokenKind::Eof,
                    lexeme: "",
                    line: 1,
                    column: 1,
                    offset: 0,
                },
            };
            tokens.push(eof);
        }
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn parse(mut self) -> Result<Program<'de>, ParseError> {
        let mut definitions = Vec::new();
        let mut defined: HashMap<&'de str, SourceSpan> = HashMap::new();

        // the only place that needs a second token: `(def` versus `([`
        while self.peek().kind == TokenKind::LeftParen && self.peek_nth(1).kind == TokenKind::Def {
            let definition = self.parse_definition()?;
            if let Some(&first) = defined.get(definition.name) {
                if !self.options.allow_redefinition {
                    return Err(ParseError::Redefinition {
                        name: definition.name.to_string(),
                        line: definition.location.line,
                        column: definition.location.column,
                        span: definition.location.span,
                        first,
                    });
                }
            } else {
                defined.insert(definition.name, definition.location.span);
            }
            definitions.push(definition);
        }

        let main = self.parse_expr()?;

        let token = self.peek();
        if token.kind != TokenKind::Eof {
            return Err(ParseError::TrailingInput {
                found: describe(token),
                line: token.line,
                column: token.column,
                span: token.span(),
            });
        }

        Ok(Program { definitions, main })
    }

    fn parse_definition(&mut self) -> Result<Definition<'de>, ParseError> {
        self.expect(TokenKind::LeftParen)?;
        self.expect(TokenKind::Def)?;
        let name = self.expect(TokenKind::Name)?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::Semicolon)?;

        Ok(Definition {
            name: name.lexeme,
            location: Location::from(&name),
            value,
        })
    }

    pub fn parse_expr(&mut self) -> Result<Expr<'de>, ParseError> {
        if self.depth == MAX_DEPTH {
            let token = self.peek();
            return Err(ParseError::TooDeep {
                limit: MAX_DEPTH,
                line: token.line,
                column: token.column,
                span: token.span(),
            });
        }

        self.depth += 1;
        let expr = self.parse_nested();
        self.depth -= 1;
        expr
    }

    fn parse_nested(&mut self) -> Result<Expr<'de>, ParseError> {
        let token = self.advance("expression")?;

        Ok(match token.kind {
            TokenKind::Integer(n) => Expr::Number(n),
            TokenKind::Real(n) => Expr::Real(n),
            TokenKind::String => Expr::String(token.unescape()),
            TokenKind::Name => Expr::Name(token.lexeme, Location::from(&token)),
            TokenKind::Array => {
                self.expect(TokenKind::LeftParen)?;
                let elements = self.parse_separated(TokenKind::RightParen, Self::parse_expr)?;
                Expr::Sequence(elements)
            }
            TokenKind::LeftParen => {
                self.expect(TokenKind::LeftBracket)?;
                let pairs = self.parse_record()?;
                self.expect(TokenKind::RightParen)?;
                Expr::Record(pairs)
            }
            TokenKind::LeftBrace => {
                let op_token = self.advance("operator")?;
                let op = Op::from_kind(op_token.kind)
                    .ok_or_else(|| ParseError::unexpected("operator", &op_token))?;

                let mut args = Vec::new();
                while !matches!(self.peek().kind, TokenKind::RightBrace | TokenKind::Eof) {
                    args.push(self.parse_expr()?);
                }
                self.expect(TokenKind::RightBrace)?;

                Expr::Operator {
                    op,
                    location: Location::from(&op_token),
                    args,
                }
            }
            _ => return Err(ParseError::unexpected("expression", &token)),
        })
    }

    /// Parses the body of a record after its opening `([`, up to and
    /// including the closing `]`.
    fn parse_record(&mut self) -> Result<Vec<(&'de str, Expr<'de>)>, ParseError> {
        let mut seen: HashMap<&'de str, SourceSpan> = HashMap::new();

        self.parse_separated(TokenKind::RightBracket, |parser| {
            let key = parser.expect(TokenKind::Key)?;
            if let Some(&first) = seen.get(key.lexeme) {
                return Err(ParseError::DuplicateKey {
                    key: key.lexeme.to_string(),
                    line: key.line,
                    column: key.column,
                    span: key.span(),
                    first,
                });
            }
            seen.insert(key.lexeme, key.span());

            parser.expect(TokenKind::Colon)?;
            let value = parser.parse_expr()?;
            Ok((key.lexeme, value))
        })
    }

    /// Parses `item (',' item)*` or nothing, followed by `close`.
    fn parse_separated<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        if self.peek().kind == close {
            self.pos += 1;
            return Ok(items);
        }

        loop {
            items.push(item(self)?);

            let expected = format!("{} or {close}", TokenKind::Comma);
            let token = self.advance(&expected)?;
            match token.kind {
                TokenKind::Comma => continue,
                kind if kind == close => return Ok(items),
                _ => return Err(ParseError::unexpected(expected, &token)),
            }
        }
    }

    pub fn expect(&mut self, expected: TokenKind) -> Result<Token<'de>, ParseError> {
        self.expect_where(|token| token.kind == expected, expected)
    }

    pub fn expect_where(
        &mut self,
        check: impl FnOnce(&Token<'de>) -> bool,
        expected: TokenKind,
    ) -> Result<Token<'de>, ParseError> {
        let token = self.advance(&expected)?;
        if check(&token) {
            Ok(token)
        } else {
            Err(ParseError::unexpected(expected, &token))
        }
    }

    /// Consumes the current token; running into the end of input is an error.
    fn advance(&mut self, expected: impl ToString) -> Result<Token<'de>, ParseError> {
        let token = *self.peek();
        if token.kind == TokenKind::Eof {
            return Err(ParseError::unexpected(expected.to_string(), &token));
        }
        self.pos += 1;
        Ok(token)
    }

    fn peek(&self) -> &Token<'de> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token<'de> {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }
}

pub fn parse(tokens: Vec<Token<'_>>) -> Result<Program<'_>, ParseError> {
    Parser::new(tokens).parse()
}

pub fn parse_with(tokens: Vec<Token<'_>>, options: ParseOptions) -> Result<Program<'_>, ParseError> {
    Parser::new(tokens).with_options(options).parse()
}
