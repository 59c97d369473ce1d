//! Globals every expression can see: `Math`, `JSON`, `Object`, `Array`,
//! the conversion functions and a few numeric constants.
//!
//! Scope bindings shadow these; the table is built once per process.

use std::collections::HashMap;
use std::f64::consts;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use flowsh_types::{json_to_value, value_to_json, Callable, EvalError, Value};

use crate::ops::{coerce_number, number, stringify};

type NativeFn = fn(&[Value]) -> Result<Value, EvalError>;

/// A builtin function implemented in Rust.
pub(crate) struct Native {
    name: &'static str,
    func: NativeFn,
}

#[async_trait]
impl Callable for Native {
    fn name(&self) -> &str {
        self.name
    }

    async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        (self.func)(&args)
    }
}

fn native(name: &'static str, func: NativeFn) -> Value {
    Value::Function(Arc::new(Native { name, func }))
}

static GLOBALS: OnceLock<HashMap<&'static str, Value>> = OnceLock::new();

/// Look up a builtin global by name.
pub(crate) fn global(name: &str) -> Option<Value> {
    GLOBALS.get_or_init(install).get(name).cloned()
}

fn install() -> HashMap<&'static str, Value> {
    let mut globals = HashMap::new();
    globals.insert("Math", math());
    globals.insert(
        "JSON",
        Value::object([
            ("parse", native("JSON.parse", json_parse)),
            ("stringify", native("JSON.stringify", json_stringify)),
        ]),
    );
    globals.insert(
        "Object",
        Value::object([
            ("keys", native("Object.keys", object_keys)),
            ("values", native("Object.values", object_values)),
            ("entries", native("Object.entries", object_entries)),
            ("fromEntries", native("Object.fromEntries", object_from_entries)),
        ]),
    );
    globals.insert(
        "Array",
        Value::object([(
            "isArray",
            native("Array.isArray", |args| {
                Ok(Value::Bool(matches!(args.first(), Some(Value::Array(_)))))
            }),
        )]),
    );
    globals.insert(
        "Number",
        native("Number", |args| {
            Ok(match args.first() {
                None => Value::Int(0),
                Some(v) => coerce_number(v).map_or(Value::Float(f64::NAN), number),
            })
        }),
    );
    globals.insert(
        "String",
        native("String", |args| {
            Ok(Value::String(args.first().map(stringify).unwrap_or_default()))
        }),
    );
    globals.insert(
        "Boolean",
        native("Boolean", |args| {
            Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
        }),
    );
    globals.insert("parseInt", native("parseInt", parse_int));
    globals.insert("parseFloat", native("parseFloat", parse_float));
    globals.insert(
        "isNaN",
        native("isNaN", |args| {
            let n = args.first().and_then(coerce_number);
            Ok(Value::Bool(n.map_or(true, f64::is_nan)))
        }),
    );
    globals.insert("NaN", Value::Float(f64::NAN));
    globals.insert("Infinity", Value::Float(f64::INFINITY));
    globals
}

/// Numeric argument `i`, NaN when missing or not numeric.
fn num(args: &[Value], i: usize) -> f64 {
    args.get(i).and_then(coerce_number).unwrap_or(f64::NAN)
}

fn math() -> Value {
    Value::object([
        ("PI", Value::Float(consts::PI)),
        ("E", Value::Float(consts::E)),
        ("abs", native("Math.abs", |a| Ok(number(num(a, 0).abs())))),
        ("ceil", native("Math.ceil", |a| Ok(number(num(a, 0).ceil())))),
        ("floor", native("Math.floor", |a| Ok(number(num(a, 0).floor())))),
        // rounds half up, so -2.5 becomes -2
        ("round", native("Math.round", |a| Ok(number((num(a, 0) + 0.5).floor())))),
        ("trunc", native("Math.trunc", |a| Ok(number(num(a, 0).trunc())))),
        (
            "sign",
            native("Math.sign", |a| {
                let n = num(a, 0);
                Ok(if n == 0.0 || n.is_nan() { number(n) } else { number(n.signum()) })
            }),
        ),
        ("sqrt", native("Math.sqrt", |a| Ok(number(num(a, 0).sqrt())))),
        ("cbrt", native("Math.cbrt", |a| Ok(number(num(a, 0).cbrt())))),
        ("exp", native("Math.exp", |a| Ok(number(num(a, 0).exp())))),
        ("log", native("Math.log", |a| Ok(number(num(a, 0).ln())))),
        ("log2", native("Math.log2", |a| Ok(number(num(a, 0).log2())))),
        ("log10", native("Math.log10", |a| Ok(number(num(a, 0).log10())))),
        ("pow", native("Math.pow", |a| Ok(number(num(a, 0).powf(num(a, 1)))))),
        ("max", native("Math.max", |a| Ok(extreme(a, f64::NEG_INFINITY, f64::max)))),
        ("min", native("Math.min", |a| Ok(extreme(a, f64::INFINITY, f64::min)))),
    ])
}

fn extreme(args: &[Value], seed: f64, pick: fn(f64, f64) -> f64) -> Value {
    let mut acc = seed;
    for i in 0..args.len() {
        let n = num(args, i);
        if n.is_nan() {
            return Value::Float(f64::NAN);
        }
        acc = pick(acc, n);
    }
    number(acc)
}

fn json_parse(args: &[Value]) -> Result<Value, EvalError> {
    let text = args.first().map(stringify).unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(json_to_value)
        .map_err(|e| EvalError::Failed(format!("JSON.parse: {e}")))
}

fn json_stringify(args: &[Value]) -> Result<Value, EvalError> {
    let Some(value) = args.first() else {
        return Ok(Value::Null);
    };
    let json = value_to_json(value);
    let pretty = args.get(2).is_some_and(Value::is_truthy);
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map(Value::String)
        .map_err(|e| EvalError::Failed(format!("JSON.stringify: {e}")))
}

fn entries(args: &[Value]) -> Vec<(String, Value)> {
    match args.first() {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

fn object_keys(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Array(
        entries(args).into_iter().map(|(k, _)| Value::String(k)).collect(),
    ))
}

fn object_values(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Array(entries(args).into_iter().map(|(_, v)| v).collect()))
}

fn object_entries(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Array(
        entries(args)
            .into_iter()
            .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
            .collect(),
    ))
}

fn object_from_entries(args: &[Value]) -> Result<Value, EvalError> {
    let Some(Value::Array(pairs)) = args.first() else {
        return Err(EvalError::Type("Object.fromEntries expects an array".into()));
    };
    let mut map = flowsh_types::Object::new();
    for pair in pairs {
        match pair.as_array() {
            Some([key, rest @ ..]) => {
                map.insert(stringify(key), rest.first().cloned().unwrap_or(Value::Null));
            }
            _ => {
                return Err(EvalError::Type(format!(
                    "Object.fromEntries expects [key, value] pairs, got {}",
                    pair.type_name()
                )))
            }
        }
    }
    Ok(Value::Object(map))
}

fn parse_int(args: &[Value]) -> Result<Value, EvalError> {
    let text = args.first().map(stringify).unwrap_or_default();
    let mut digits = text.trim();
    let negative = digits.starts_with('-');
    digits = digits.trim_start_matches(['+', '-']);

    let mut radix = match args.get(1).and_then(coerce_number) {
        Some(r) if (2.0..=36.0).contains(&r) => r as u32,
        _ => 10,
    };
    if radix == 16 || args.get(1).is_none() {
        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            digits = hex;
            radix = 16;
        }
    }

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map_or(digits.len(), |(i, _)| i);
    if end == 0 {
        return Ok(Value::Float(f64::NAN));
    }
    let magnitude = i64::from_str_radix(&digits[..end], radix)
        .map(|n| n as f64)
        .unwrap_or(f64::INFINITY);
    Ok(number(if negative { -magnitude } else { magnitude }))
}

fn parse_float(args: &[Value]) -> Result<Value, EvalError> {
    let text = args.first().map(stringify).unwrap_or_default();
    let text = text.trim_start();
    let unsigned = text.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") {
        let sign = if text.starts_with('-') { -1.0 } else { 1.0 };
        return Ok(Value::Float(sign * f64::INFINITY));
    }
    if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Ok(Value::Float(f64::NAN));
    }
    let parsed = (1..=text.len())
        .rev()
        .filter(|&end| text.is_char_boundary(end))
        .find_map(|end| text[..end].parse::<f64>().ok());
    Ok(parsed.map_or(Value::Float(f64::NAN), number))
}
