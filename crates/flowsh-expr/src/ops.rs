//! Operator semantics and value coercions.
//!
//! Numbers stay integers while both operands are integers and the result
//! fits; anything else falls back to floats, and integral float results are
//! folded back to integers.

use flowsh_types::{EvalError, Value};

use crate::ast::{BinaryOp, UnaryOp};

/// Largest integer a float represents exactly.
const MAX_SAFE: f64 = 9_007_199_254_740_991.0;

/// Normalize a float result.
pub(crate) fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

/// String conversion used by `+`, templates and `String()`.
///
/// Arrays join their elements with commas; `null` elements become empty.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => stringify(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}

/// Numeric conversion, `None` when there is no sensible number.
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Array(_) | Value::Object(_) | Value::Function(_) => None,
    }
}

fn operand(value: &Value, op: &str) -> Result<f64, EvalError> {
    coerce_number(value).ok_or_else(|| {
        EvalError::Type(format!(
            "cannot apply '{op}' to {} {}",
            value.type_name(),
            describe(value)
        ))
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        other => stringify(other),
    }
}

pub(crate) fn unary(op: UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => match value {
            Value::Int(i) => Ok(i
                .checked_neg()
                .map_or_else(|| Value::Float(-(*i as f64)), Value::Int)),
            other => Ok(number(-operand(other, "-")?)),
        },
        UnaryOp::Plus => match value {
            Value::Int(_) => Ok(value.clone()),
            other => Ok(number(operand(other, "+")?)),
        },
    }
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    match op {
        Add => add(left, right),
        Sub => arithmetic(left, right, "-", i64::checked_sub, |a, b| a - b),
        Mul => arithmetic(left, right, "*", i64::checked_mul, |a, b| a * b),
        Div => divide(left, right),
        Rem => remainder(left, right),
        Pow => power(left, right),
        Lt => Ok(Value::Bool(compare(left, right).is_some_and(|o| o.is_lt()))),
        LtEq => Ok(Value::Bool(compare(left, right).is_some_and(|o| o.is_le()))),
        Gt => Ok(Value::Bool(compare(left, right).is_some_and(|o| o.is_gt()))),
        GtEq => Ok(Value::Bool(compare(left, right).is_some_and(|o| o.is_ge()))),
        Eq => Ok(Value::Bool(loose_eq(left, right))),
        NotEq => Ok(Value::Bool(!loose_eq(left, right))),
        StrictEq => Ok(Value::Bool(strict_eq(left, right))),
        StrictNotEq => Ok(Value::Bool(!strict_eq(left, right))),
    }
}

fn is_textual(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
    )
}

fn add(left: &Value, right: &Value) -> Result<Value, EvalError> {
    if is_textual(left) || is_textual(right) {
        return Ok(Value::String(format!("{}{}", stringify(left), stringify(right))));
    }
    arithmetic(left, right, "+", i64::checked_add, |a, b| a + b)
}

fn arithmetic(
    left: &Value,
    right: &Value,
    op: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        if let Some(n) = int_op(*a, *b) {
            return Ok(Value::Int(n));
        }
    }
    Ok(number(float_op(operand(left, op)?, operand(right, op)?)))
}

fn divide(left: &Value, right: &Value) -> Result<Value, EvalError> {
    let a = operand(left, "/")?;
    let b = operand(right, "/")?;
    if b == 0.0 {
        return Err(EvalError::Arithmetic("division by zero".into()));
    }
    Ok(number(a / b))
}

fn remainder(left: &Value, right: &Value) -> Result<Value, EvalError> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        if *b == 0 {
            return Err(EvalError::Arithmetic("modulo by zero".into()));
        }
        return Ok(a.checked_rem(*b).map_or(Value::Int(0), Value::Int));
    }
    let a = operand(left, "%")?;
    let b = operand(right, "%")?;
    if b == 0.0 {
        return Err(EvalError::Arithmetic("modulo by zero".into()));
    }
    Ok(number(a % b))
}

fn power(left: &Value, right: &Value) -> Result<Value, EvalError> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        if let Ok(exp) = u32::try_from(*b) {
            if let Some(n) = a.checked_pow(exp) {
                return Ok(Value::Int(n));
            }
        }
    }
    Ok(number(operand(left, "**")?.powf(operand(right, "**")?)))
}

/// Ordering for relational operators; `None` means incomparable.
pub(crate) fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => coerce_number(left)?.partial_cmp(&coerce_number(right)?),
    }
}

/// `===`: same type and same contents. Integers and floats are one type.
pub(crate) fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            left.as_f64() == right.as_f64()
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| strict_eq(v, w)))
        }
        _ => left == right,
    }
}

/// `==`: like `===` but numbers, numeric strings and booleans compare by value.
pub(crate) fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => left.is_null() && right.is_null(),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => {
            matches!((coerce_number(left), coerce_number(right)), (Some(a), Some(b)) if a == b)
        }
        (Value::String(s), n @ (Value::Int(_) | Value::Float(_)))
        | (n @ (Value::Int(_) | Value::Float(_)), Value::String(s)) => {
            coerce_number(&Value::String(s.clone())) == n.as_f64()
        }
        _ => strict_eq(left, right),
    }
}

/// Integer view of a number for indices and counts.
pub(crate) fn to_integer(value: &Value) -> Option<i64> {
    let n = coerce_number(value)?;
    if n.is_nan() {
        None
    } else {
        Some(n.trunc() as i64)
    }
}
