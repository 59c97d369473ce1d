//! Conversion between runtime values and `serde_json` values.

use crate::value::{format_number, Value};

/// Convert JSON into a runtime value.
///
/// Integral numbers that fit in `i64` become `Int`, everything else numeric
/// becomes `Float`.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, json_to_value(v))).collect())
        }
    }
}

/// Convert a runtime value into JSON.
///
/// Non-finite floats become `null`. Integral floats are written as integers
/// so `2.0` prints as `2`. Functions have no JSON form and are written as
/// their display string.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => float_to_json(*f),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect(),
        ),
        Value::Function(_) => serde_json::Value::String(value.to_string()),
    }
}

fn float_to_json(f: f64) -> serde_json::Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        return serde_json::Value::Number((f as i64).into());
    }
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Render a value as compact JSON text.
pub fn to_json_string(value: &Value) -> String {
    match value {
        Value::Float(f) if !f.is_finite() => format_number(*f),
        other => value_to_json(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_json_becomes_nested_values() {
        let json = serde_json::json!({"a": [1, 2.5, "x"], "b": {"c": null}});
        let value = json_to_value(json);

        let obj = value.as_object().expect("object");
        assert_eq!(
            obj["a"],
            Value::Array(vec![Value::Int(1), Value::Float(2.5), Value::from("x")])
        );
        assert_eq!(obj["b"], Value::object([("c", Value::Null)]));
    }

    #[test]
    fn test_integral_float_serializes_as_integer() {
        assert_eq!(value_to_json(&Value::Float(4.0)), serde_json::json!(4));
        assert_eq!(value_to_json(&Value::Float(f64::NAN)), serde_json::Value::Null);
    }

    #[test]
    fn test_to_json_string_quotes_strings() {
        assert_eq!(to_json_string(&Value::from("hi")), r#""hi""#);
        assert_eq!(to_json_string(&Value::Float(f64::INFINITY)), "Infinity");
    }
}
