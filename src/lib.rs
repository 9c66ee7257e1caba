use std::fmt::Display;

use miette::Diagnostic;
use thiserror::Error;

pub mod ast;
pub mod builtins;
pub mod eval;
pub mod json;
pub mod lex;
pub mod parse;

pub use ast::Program;
pub use eval::{EvalError, EvaluationError, NameError, Value, evaluate};
pub use lex::{LexError, Lexer, Token, TokenKind, tokenize};
pub use parse::{ParseError, ParseOptions, Parser, parse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LexError,
    ParseError,
    NameError,
    EvaluationError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::LexError => "LexError",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::NameError => "NameError",
            ErrorKind::EvaluationError => "EvaluationError",
        })
    }
}

/// The first error hit by any stage of a translation.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl From<EvalError> for Error {
    fn from(error: EvalError) -> Self {
        match error {
            EvalError::Name(e) => Error::Name(e),
            EvalError::Evaluation(e) => Error::Evaluation(e),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lex(_) => ErrorKind::LexError,
            Error::Parse(_) => ErrorKind::ParseError,
            Error::Name(_) => ErrorKind::NameError,
            Error::Evaluation(_) => ErrorKind::EvaluationError,
        }
    }

    pub fn line(&self) -> Option<usize> {
        Some(match self {
            Error::Lex(e) => e.line(),
            Error::Parse(e) => e.line(),
            Error::Name(e) => e.line,
            Error::Evaluation(e) => e.line(),
        })
    }

    pub fn column(&self) -> Option<usize> {
        Some(match self {
            Error::Lex(e) => e.column(),
            Error::Parse(e) => e.column(),
            Error::Name(e) => e.column,
            Error::Evaluation(e) => e.column(),
        })
    }
}

/// Runs the whole pipeline on one source text: tokens, program, value.
pub fn translate(source: &str) -> Result<Value<'_>, Error> {
    translate_with(source, ParseOptions::default())
}

pub fn translate_with(source: &str, options: ParseOptions) -> Result<Value<'_>, Error> {
    let tokens = tokenize(source)?;
    let program = parse::parse_with(tokens, options)?;
    Ok(evaluate(&program)?)
}

