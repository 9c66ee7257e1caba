use std::{
    borrow::Cow,
    fmt::{self, Display},
};

use miette::SourceSpan;

use crate::lex::{Token, TokenKind};

/// Where a node came from in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub span: SourceSpan,
}

impl From<&Token<'_>> for Location {
    fn from(token: &Token<'_>) -> Self {
        Location {
            line: token.line,
            column: token.column,
            span: token.span(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program<'de> {
    pub definitions: Vec<Definition<'de>>,
    pub main: Expr<'de>,
}

/// A `(def NAME expr);` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition<'de> {
    pub name: &'de str,
    pub location: Location,
    pub value: Expr<'de>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'de> {
    Number(i64),
    Real(f64),
    String(Cow<'de, str>),
    Name(&'de str, Location),
    /// `array(a, b, ...)`
    Sequence(Vec<Expr<'de>>),
    /// `([key: value, ...])`, keys unique and in declaration order.
    Record(Vec<(&'de str, Expr<'de>)>),
    /// `{op arg ...}`, arity is checked when evaluated.
    Operator {
        op: Op,
        location: Location,
        args: Vec<Expr<'de>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Plus,
    Minus,
    Star,
    Slash,
    Chr,
    Len,
}

impl Op {
    pub fn from_kind(kind: TokenKind) -> Option<Op> {
        Some(match kind {
            TokenKind::Plus => Op::Plus,
            TokenKind::Minus => Op::Minus,
            TokenKind::Star => Op::Star,
            TokenKind::Slash => Op::Slash,
            TokenKind::Chr => Op::Chr,
            TokenKind::Len => Op::Len,
            _ => return None,
        })
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Plus => "+",
            Op::Minus => "-",
            Op::Star => "*",
            Op::Slash => "/",
            Op::Chr => "chr",
            Op::Len => "len",
        })
    }
}

// The Display impls below print source text that parses back to the same tree.

impl Display for Program<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for definition in &self.definitions {
            writeln!(f, "(def {} {});", definition.name, definition.value)?;
        }
        write!(f, "{}", self.main)
    }
}

impl Display for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Real(n) => {
                if *n == n.trunc() {
                    write!(f, "{n}.0")
                } else {
                    write!(f, "{n}")
                }
            }
            Expr::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Expr::Name(name, _) => f.write_str(name),
            Expr::Sequence(elements) => {
                f.write_str("array(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str(")")
            }
            Expr::Record(pairs) => {
                f.write_str("([")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("])")
            }
            Expr::Operator { op, args, .. } => {
                write!(f, "{{{op}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_str("}")
            }
        }
    }
}
