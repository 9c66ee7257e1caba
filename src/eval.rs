use std::{borrow::Cow, fmt::Display};

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    ast::{Expr, Op, Program},
    builtins,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Value<'de> {
    Integer(i64),
    Real(f64),
    Text(Cow<'de, str>),
    Sequence(Vec<Value<'de>>),
    /// Keys are unique and kept in declaration order.
    Record(Vec<(&'de str, Value<'de>)>),
}

impl Value<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Sequence(_) => "sequence",
            Value::Record(_) => "record",
        }
    }
}

/// Compact JSON.
impl Display for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = crate::json::to_string(self, false).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("undefined constant {name}")]
#[diagnostic(
    code(eval::undefined_constant),
    help("constants must be defined with `(def {name} ...);` before they are used")
)]
pub struct NameError {
    pub name: String,
    pub line: usize,
    pub column: usize,
    #[label("not defined at this point")]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (how, n) = match *self {
            Arity::Exactly(n) => ("exactly", n),
            Arity::AtLeast(n) => ("at least", n),
        };
        let plural = if n == 1 { "argument" } else { "arguments" };
        write!(f, "{how} {n} {plural}")
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("operator `{op}` expects {expected}, got {found}")]
    #[diagnostic(code(eval::arity))]
    Arity {
        op: Op,
        expected: Arity,
        found: usize,
        line: usize,
        column: usize,
        #[label("this operator")]
        span: SourceSpan,
    },

    #[error("operator `{op}`: {reason}")]
    #[diagnostic(code(eval::type_mismatch))]
    TypeMismatch {
        op: Op,
        reason: String,
        line: usize,
        column: usize,
        #[label("this operator")]
        span: SourceSpan,
    },

    #[error("division by zero")]
    #[diagnostic(code(eval::division_by_zero))]
    DivisionByZero {
        line: usize,
        column: usize,
        #[label("the divisor is zero")]
        span: SourceSpan,
    },

    #[error("{value} is not a valid Unicode code point")]
    #[diagnostic(
        code(eval::invalid_code_point),
        help("code points range over 0..=0x10FFFF, excluding the surrogates 0xD800..=0xDFFF")
    )]
    InvalidCodePoint {
        value: i64,
        line: usize,
        column: usize,
        #[label("this conversion")]
        span: SourceSpan,
    },

    #[error("arithmetic overflow in operator `{op}`")]
    #[diagnostic(code(eval::overflow))]
    Overflow {
        op: Op,
        line: usize,
        column: usize,
        #[label("this operator")]
        span: SourceSpan,
    },
}

impl EvaluationError {
    pub fn line(&self) -> usize {
        match self {
            Self::Arity { line, .. }
            | Self::TypeMismatch { line, .. }
            | Self::DivisionByZero { line, .. }
            | Self::InvalidCodePoint { line, .. }
            | Self::Overflow { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            Self::Arity { column, .. }
            | Self::TypeMismatch { column, .. }
            | Self::DivisionByZero { column, .. }
            | Self::InvalidCodePoint { column, .. }
            | Self::Overflow { column, .. } => *column,
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Constants visible to an expression, in definition order.
///
/// Defining a name that is already bound replaces the earlier binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment<'de> {
    bindings: Vec<(&'de str, Value<'de>)>,
}

impl<'de> Environment<'de> {
    pub fn get(&self, name: &str) -> Option<&Value<'de>> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == name)
            .map(|(_, value)| value)
    }

    pub fn define(mut self, name: &'de str, value: Value<'de>) -> Self {
        self.bindings.retain(|(bound, _)| *bound != name);
        self.bindings.push((name, value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'de str, &Value<'de>)> {
        self.bindings.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Folds the definitions into an environment, one at a time, and evaluates the
/// main expression against the result.
pub fn evaluate<'de>(program: &Program<'de>) -> Result<Value<'de>, EvalError> {
    let environment = define_all(program)?;
    eval_expr(&program.main, &environment)
}

/// Each definition sees only the constants defined before it.
pub fn define_all<'de>(program: &Program<'de>) -> Result<Environment<'de>, EvalError> {
    program
        .definitions
        .iter()
        .try_fold(Environment::default(), |environment, definition| {
            let value = eval_expr(&definition.value, &environment)?;
            Ok(environment.define(definition.name, value))
        })
}

pub fn eval_expr<'de>(
    expr: &Expr<'de>,
    environment: &Environment<'de>,
) -> Result<Value<'de>, EvalError> {
    Ok(match expr {
        Expr::Number(n) => Value::Integer(*n),
        Expr::Real(n) => Value::Real(*n),
        Expr::String(s) => Value::Text(s.clone()),
        Expr::Name(name, location) => {
            let Some(value) = environment.get(name) else {
                return Err(NameError {
                    name: name.to_string(),
                    line: location.line,
                    column: location.column,
                    span: location.span,
                }
                .into());
            };
            value.clone()
        }
        Expr::Sequence(elements) => Value::Sequence(
            elements
                .iter()
                .map(|element| eval_expr(element, environment))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Record(pairs) => Value::Record(
            pairs
                .iter()
                .map(|(key, value)| Ok((*key, eval_expr(value, environment)?)))
                .collect::<Result<_, EvalError>>()?,
        ),
        Expr::Operator { op, location, args } => {
            let values = args
                .iter()
                .map(|arg| eval_expr(arg, environment))
                .collect::<Result<Vec<_>, _>>()?;
            builtins::apply(*op, *location, values)?
        }
    })
}
