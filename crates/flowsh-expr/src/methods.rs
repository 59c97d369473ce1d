//! Methods on strings, arrays and numbers (`x.split(',')`, `xs.map(f)`).
//!
//! Indices count characters, not bytes. Negative indices count from the end
//! where the method allows it.

use flowsh_types::{call_value, EvalError, Value};

use crate::ops::{coerce_number, stringify, strict_eq, to_integer};

static NULL: Value = Value::Null;

/// Longest string `repeat` and the pad methods will build.
const MAX_STRING_LEN: usize = 1 << 28;

fn invalid_length() -> EvalError {
    EvalError::Type("invalid string length".into())
}

/// Length of `unit` repeated `count` times, if it stays under the cap.
fn checked_len(unit: usize, count: usize) -> Result<usize, EvalError> {
    unit.checked_mul(count)
        .filter(|len| *len <= MAX_STRING_LEN)
        .ok_or_else(invalid_length)
}

fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&NULL)
}

fn text_arg(args: &[Value], i: usize) -> String {
    match arg(args, i) {
        Value::Null => "undefined".to_string(),
        other => stringify(other),
    }
}

fn int_arg(args: &[Value], i: usize, default: i64) -> i64 {
    match arg(args, i) {
        Value::Null => default,
        other => to_integer(other).unwrap_or(0),
    }
}

/// Clamp a possibly negative index into `0..=len`.
fn resolve(index: i64, len: usize) -> usize {
    if index < 0 {
        (len as i64 + index).max(0) as usize
    } else {
        (index as usize).min(len)
    }
}

fn missing(receiver: &Value, name: &str) -> EvalError {
    EvalError::Type(format!("{}.{name} is not a function", receiver.type_name()))
}

/// Invoke method `name` on `receiver`.
///
/// Object members that hold functions are called directly, which is how
/// `Math.floor(x)` and imported module functions work.
pub(crate) async fn call_method(
    receiver: Value,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    match &receiver {
        Value::Object(map) => match map.get(name) {
            Some(member @ Value::Function(_)) => call_value(member, args).await,
            Some(_) => Err(missing(&receiver, name)),
            None if name == "toString" => Ok(Value::String(stringify(&receiver))),
            None => Err(missing(&receiver, name)),
        },
        Value::String(s) => string_method(s, name, &args),
        Value::Array(items) => array_method(items, name, args).await,
        Value::Int(_) | Value::Float(_) => number_method(&receiver, name, &args),
        Value::Null => Err(EvalError::Type(format!(
            "cannot read property '{name}' of null"
        ))),
        other if name == "toString" => Ok(Value::String(stringify(other))),
        other => Err(missing(other, name)),
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let string = |text: String| Ok(Value::String(text));
    let boolean = |b: bool| Ok(Value::Bool(b));
    match name {
        "split" => {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Null => vec![Value::String(s.to_string())],
                sep => {
                    let sep = stringify(sep);
                    if sep.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
                    }
                }
            };
            let limit = int_arg(args, 1, i64::MAX).max(0) as usize;
            Ok(Value::Array(parts.into_iter().take(limit).collect()))
        }
        "toUpperCase" => string(s.to_uppercase()),
        "toLowerCase" => string(s.to_lowercase()),
        "trim" => string(s.trim().to_string()),
        "trimStart" => string(s.trim_start().to_string()),
        "trimEnd" => string(s.trim_end().to_string()),
        "includes" => boolean(s.contains(text_arg(args, 0).as_str())),
        "startsWith" => boolean(s.starts_with(text_arg(args, 0).as_str())),
        "endsWith" => boolean(s.ends_with(text_arg(args, 0).as_str())),
        "indexOf" => Ok(char_position(s, s.find(text_arg(args, 0).as_str()))),
        "lastIndexOf" => Ok(char_position(s, s.rfind(text_arg(args, 0).as_str()))),
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let start = resolve(int_arg(args, 0, 0), chars.len());
            let end = resolve(int_arg(args, 1, chars.len() as i64), chars.len());
            string(chars.get(start..end.max(start)).unwrap_or_default().iter().collect())
        }
        "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let clamp = |i: i64| i.clamp(0, chars.len() as i64) as usize;
            let a = clamp(int_arg(args, 0, 0));
            let b = clamp(int_arg(args, 1, chars.len() as i64));
            string(chars[a.min(b)..a.max(b)].iter().collect())
        }
        "replace" => string(s.replacen(text_arg(args, 0).as_str(), &text_arg(args, 1), 1)),
        "replaceAll" => string(s.replace(text_arg(args, 0).as_str(), &text_arg(args, 1))),
        "repeat" => {
            let count = int_arg(args, 0, 0);
            let count = usize::try_from(count)
                .map_err(|_| EvalError::Type(format!("invalid repeat count {count}")))?;
            checked_len(s.len(), count)?;
            string(s.repeat(count))
        }
        "padStart" | "padEnd" => {
            let width = int_arg(args, 0, 0).max(0) as usize;
            let fill = match arg(args, 1) {
                Value::Null => " ".to_string(),
                other => stringify(other),
            };
            let len = s.chars().count();
            if width <= len || fill.is_empty() {
                return string(s.to_string());
            }
            checked_len(1, width - len)?;
            let pad: String = fill.chars().cycle().take(width - len).collect();
            string(if name == "padStart" {
                format!("{pad}{s}")
            } else {
                format!("{s}{pad}")
            })
        }
        "charAt" => {
            let index = int_arg(args, 0, 0);
            let c = usize::try_from(index).ok().and_then(|i| s.chars().nth(i));
            string(c.map(String::from).unwrap_or_default())
        }
        "at" => {
            let len = s.chars().count();
            let index = int_arg(args, 0, 0);
            let index = if index < 0 { len as i64 + index } else { index };
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map_or(Value::Null, |c| Value::String(c.to_string())))
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                out.push_str(&stringify(value));
            }
            string(out)
        }
        "toString" | "valueOf" => string(s.to_string()),
        _ => Err(missing(&Value::String(s.to_string()), name)),
    }
}

fn char_position(s: &str, byte: Option<usize>) -> Value {
    match byte {
        Some(b) => Value::Int(s[..b].chars().count() as i64),
        None => Value::Int(-1),
    }
}

fn number_method(n: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "toFixed" => {
            let digits = int_arg(args, 0, 0).clamp(0, 100) as usize;
            let f = coerce_number(n).unwrap_or(f64::NAN);
            Ok(Value::String(format!("{f:.digits$}")))
        }
        "valueOf" => Ok(n.clone()),
        "toString" => Ok(Value::String(n.to_string())),
        _ => Err(missing(n, name)),
    }
}

/// Call `callback(item, index)` for the array callbacks.
async fn visit(callback: &Value, item: &Value, index: usize) -> Result<Value, EvalError> {
    call_value(callback, vec![item.clone(), Value::Int(index as i64)]).await
}

fn flatten(items: &[Value], depth: i64, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => flatten(inner, depth - 1, out),
            other => out.push(other.clone()),
        }
    }
}

async fn array_method(items: &[Value], name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    let callback = arg(&args, 0);
    match name {
        "join" => {
            let sep = match callback {
                Value::Null => ",".to_string(),
                other => stringify(other),
            };
            Ok(Value::String(join(items, &sep)))
        }
        "toString" => Ok(Value::String(join(items, ","))),
        "map" => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(visit(callback, item, i).await?);
            }
            Ok(Value::Array(out))
        }
        "flatMap" => {
            let mut mapped = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                mapped.push(visit(callback, item, i).await?);
            }
            let mut out = Vec::new();
            flatten(&mapped, 1, &mut out);
            Ok(Value::Array(out))
        }
        "filter" => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if visit(callback, item, i).await?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Ok(Value::Array(out))
        }
        "forEach" => {
            for (i, item) in items.iter().enumerate() {
                visit(callback, item, i).await?;
            }
            Ok(Value::Null)
        }
        "some" | "every" => {
            let want = name == "some";
            for (i, item) in items.iter().enumerate() {
                if visit(callback, item, i).await?.is_truthy() == want {
                    return Ok(Value::Bool(want));
                }
            }
            Ok(Value::Bool(!want))
        }
        "find" | "findIndex" => {
            for (i, item) in items.iter().enumerate() {
                if visit(callback, item, i).await?.is_truthy() {
                    return Ok(if name == "find" {
                        item.clone()
                    } else {
                        Value::Int(i as i64)
                    });
                }
            }
            Ok(if name == "find" { Value::Null } else { Value::Int(-1) })
        }
        "reduce" => {
            let mut rest = items.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match rest.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(EvalError::Type(
                            "reduce of empty array with no initial value".into(),
                        ))
                    }
                },
            };
            for (i, item) in rest {
                acc = call_value(callback, vec![acc, item.clone(), Value::Int(i as i64)]).await?;
            }
            Ok(acc)
        }
        "includes" => Ok(Value::Bool(items.iter().any(|v| strict_eq(v, callback)))),
        "indexOf" => Ok(Value::Int(
            items
                .iter()
                .position(|v| strict_eq(v, callback))
                .map_or(-1, |i| i as i64),
        )),
        "slice" => {
            let start = resolve(int_arg(&args, 0, 0), items.len());
            let end = resolve(int_arg(&args, 1, items.len() as i64), items.len());
            Ok(Value::Array(
                items.get(start..end.max(start)).unwrap_or_default().to_vec(),
            ))
        }
        "concat" => {
            let mut out = items.to_vec();
            for value in &args {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::Array(out))
        }
        "reverse" => Ok(Value::Array(items.iter().rev().cloned().collect())),
        "flat" => {
            let depth = int_arg(&args, 0, 1);
            let mut out = Vec::new();
            flatten(items, depth, &mut out);
            Ok(Value::Array(out))
        }
        "sort" => sort(items, callback).await.map(Value::Array),
        _ => Err(missing(&Value::Array(Vec::new()), name)),
    }
}

fn join(items: &[Value], sep: &str) -> String {
    items
        .iter()
        .map(|v| match v {
            Value::Null => String::new(),
            other => stringify(other),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

/// Stable sort. Without a comparator elements compare as strings.
async fn sort(items: &[Value], comparator: &Value) -> Result<Vec<Value>, EvalError> {
    if comparator.is_null() {
        let mut sorted = items.to_vec();
        sorted.sort_by_cached_key(stringify);
        return Ok(sorted);
    }
    // insertion sort; the comparator is async so slice::sort_by is out
    let mut sorted: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        let mut at = sorted.len();
        while at > 0 {
            let order = call_value(comparator, vec![sorted[at - 1].clone(), item.clone()]).await?;
            if coerce_number(&order).unwrap_or(0.0) > 0.0 {
                at -= 1;
            } else {
                break;
            }
        }
        sorted.insert(at, item.clone());
    }
    Ok(sorted)
}

/// Number of elements, used by the `length` property.
pub(crate) fn length(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => Some(Value::Int(s.chars().count() as i64)),
        Value::Array(items) => Some(Value::Int(items.len() as i64)),
        _ => None,
    }
}
