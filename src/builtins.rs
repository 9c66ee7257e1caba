//! Built-in operators. Any real operand makes the arithmetic real.

use std::borrow::Cow;

use crate::{
    ast::{Location, Op},
    eval::{Arity, EvaluationError, Value},
};

pub fn apply<'de>(
    op: Op,
    location: Location,
    args: Vec<Value<'de>>,
) -> Result<Value<'de>, EvaluationError> {
    let call = Call { op, location };
    match op {
        Op::Plus => add(&call, args),
        Op::Minus => sub(&call, args),
        Op::Star => mul(&call, args),
        Op::Slash => div(&call, args),
        Op::Chr => chr(&call, args),
        Op::Len => len(&call, args),
    }
}

/// The operator being applied and where it appears, for error reporting.
struct Call {
    op: Op,
    location: Location,
}

impl Call {
    fn arity(&self, expected: Arity, found: usize) -> Result<(), EvaluationError> {
        if expected.accepts(found) {
            return Ok(());
        }
        Err(EvaluationError::Arity {
            op: self.op,
            expected,
            found,
            line: self.location.line,
            column: self.location.column,
            span: self.location.span,
        })
    }

    fn mismatch(&self, reason: impl Into<String>) -> EvaluationError {
        EvaluationError::TypeMismatch {
            op: self.op,
            reason: reason.into(),
            line: self.location.line,
            column: self.location.column,
            span: self.location.span,
        }
    }

    fn overflow(&self) -> EvaluationError {
        EvaluationError::Overflow {
            op: self.op,
            line: self.location.line,
            column: self.location.column,
            span: self.location.span,
        }
    }

    fn division_by_zero(&self) -> EvaluationError {
        EvaluationError::DivisionByZero {
            line: self.location.line,
            column: self.location.column,
            span: self.location.span,
        }
    }

    fn real(&self, n: f64) -> Result<Value<'static>, EvaluationError> {
        if n.is_finite() {
            Ok(Value::Real(n))
        } else {
            Err(self.overflow())
        }
    }
}

enum Numbers {
    Integers(Vec<i64>),
    Reals(Vec<f64>),
}

/// Distinct operand types in order of first appearance, e.g. `integer, text`.
fn operand_types(args: &[Value<'_>]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for arg in args {
        if !names.contains(&arg.type_name()) {
            names.push(arg.type_name());
        }
    }
    names.join(", ")
}

fn numbers(call: &Call, args: &[Value<'_>]) -> Result<Numbers, EvaluationError> {
    let mut integers = Vec::with_capacity(args.len());
    let mut reals = Vec::with_capacity(args.len());
    let mut any_real = false;

    for arg in args {
        match arg {
            Value::Integer(n) => {
                integers.push(*n);
                reals.push(*n as f64);
            }
            Value::Real(n) => {
                any_real = true;
                reals.push(*n);
            }
            _ => {
                return Err(call.mismatch(format!(
                    "expected numeric operands, got {}",
                    operand_types(args)
                )));
            }
        }
    }

    Ok(if any_real {
        Numbers::Reals(reals)
    } else {
        Numbers::Integers(integers)
    })
}

fn pair<T: Copy>(values: &[T]) -> (T, T) {
    (values[0], values[1])
}

fn add<'de>(call: &Call, args: Vec<Value<'de>>) -> Result<Value<'de>, EvaluationError> {
    call.arity(Arity::AtLeast(1), args.len())?;

    if args.iter().all(|arg| matches!(arg, Value::Text(_))) {
        let mut texts = args.into_iter().filter_map(|arg| match arg {
            Value::Text(s) => Some(s),
            _ => None,
        });
        let first = texts.next().unwrap_or_default();
        let text = texts.fold(first, |mut acc, s| {
            acc.to_mut().push_str(&s);
            acc
        });
        return Ok(Value::Text(text));
    }

    if args.iter().any(|arg| matches!(arg, Value::Text(_))) {
        return Err(call.mismatch(format!(
            "cannot mix operand types ({})",
            operand_types(&args)
        )));
    }

    match numbers(call, &args)? {
        Numbers::Integers(ns) => ns
            .iter()
            .try_fold(0i64, |acc, &n| acc.checked_add(n))
            .map(Value::Integer)
            .ok_or_else(|| call.overflow()),
        Numbers::Reals(ns) => call.real(ns.iter().sum()),
    }
}

fn sub<'de>(call: &Call, args: Vec<Value<'de>>) -> Result<Value<'de>, EvaluationError> {
    call.arity(Arity::Exactly(2), args.len())?;

    match numbers(call, &args)? {
        Numbers::Integers(ns) => {
            let (a, b) = pair(&ns);
            a.checked_sub(b)
                .map(Value::Integer)
                .ok_or_else(|| call.overflow())
        }
        Numbers::Reals(ns) => {
            let (a, b) = pair(&ns);
            call.real(a - b)
        }
    }
}

fn mul<'de>(call: &Call, args: Vec<Value<'de>>) -> Result<Value<'de>, EvaluationError> {
    call.arity(Arity::AtLeast(1), args.len())?;

    match numbers(call, &args)? {
        Numbers::Integers(ns) => ns
            .iter()
            .try_fold(1i64, |acc, &n| acc.checked_mul(n))
            .map(Value::Integer)
            .ok_or_else(|| call.overflow()),
        Numbers::Reals(ns) => call.real(ns.iter().product()),
    }
}

/// Integer division truncates toward zero.
fn div<'de>(call: &Call, args: Vec<Value<'de>>) -> Result<Value<'de>, EvaluationError> {
    call.arity(Arity::Exactly(2), args.len())?;

    match numbers(call, &args)? {
        Numbers::Integers(ns) => {
            let (a, b) = pair(&ns);
            if b == 0 {
                return Err(call.division_by_zero());
            }
            a.checked_div(b)
                .map(Value::Integer)
                .ok_or_else(|| call.overflow())
        }
        Numbers::Reals(ns) => {
            let (a, b) = pair(&ns);
            if b == 0.0 {
                return Err(call.division_by_zero());
            }
            call.real(a / b)
        }
    }
}

fn chr<'de>(call: &Call, args: Vec<Value<'de>>) -> Result<Value<'de>, EvaluationError> {
    call.arity(Arity::Exactly(1), args.len())?;

    match args[0] {
        Value::Integer(n) => u32::try_from(n)
            .ok()
            .and_then(char::from_u32)
            .map(|c| Value::Text(Cow::Owned(c.to_string())))
            .ok_or(EvaluationError::InvalidCodePoint {
                value: n,
                line: call.location.line,
                column: call.location.column,
                span: call.location.span,
            }),
        ref other => Err(call.mismatch(format!(
            "expected an integer code point, got {}",
            other.type_name()
        ))),
    }
}

/// Characters of a text, elements of a sequence.
fn len<'de>(call: &Call, args: Vec<Value<'de>>) -> Result<Value<'de>, EvaluationError> {
    call.arity(Arity::Exactly(1), args.len())?;

    let count = match &args[0] {
        Value::Text(s) => s.chars().count(),
        Value::Sequence(items) => items.len(),
        other => {
            return Err(call.mismatch(format!(
                "expected text or sequence, got {}",
                other.type_name()
            )));
        }
    };
    i64::try_from(count)
        .map(Value::Integer)
        .map_err(|_| call.overflow())
}
