//! JavaScript value semantics for host-reported data.
//!
//! Hosts report raw property reads as JSON. `undefined` does not survive JSON
//! encoding, so it is modelled as a missing value. Truthiness and string
//! conversion follow the JavaScript rules the display strings depend on
//! (`a || "marker"`, `"label: " + value`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A JavaScript value as read from the host: `undefined` or any JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsValue(Option<Value>);

impl JsValue {
    pub fn undefined() -> Self {
        Self(None)
    }

    pub fn null() -> Self {
        Self(Some(Value::Null))
    }

    pub fn is_undefined(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_value(&self) -> Option<&Value> {
        self.0.as_ref()
    }

    /// JavaScript `Boolean(value)`.
    pub fn truthy(&self) -> bool {
        match &self.0 {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }

    /// JavaScript `String(value)`.
    pub fn to_js_string(&self) -> String {
        match &self.0 {
            None => "undefined".to_string(),
            Some(value) => value_to_js_string(value),
        }
    }

    /// `value || marker`, stringified.
    pub fn or_marker(&self, marker: &str) -> String {
        if self.truthy() {
            self.to_js_string()
        } else {
            marker.to_string()
        }
    }

    /// `parseInt(value, 10)`; `NaN` when no leading digits exist.
    pub fn parse_int(&self) -> f64 {
        let text = self.to_js_string();
        let trimmed = text.trim_start();
        let (sign, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return f64::NAN;
        }

        digits.parse::<f64>().map(|v| sign * v).unwrap_or(f64::NAN)
    }
}

/// Element rendering used by `Array.prototype.join`: nullish becomes empty.
pub fn join_js(values: &[JsValue], separator: &str) -> String {
    values
        .iter()
        .map(|v| match v.as_value() {
            None | Some(Value::Null) => String::new(),
            Some(_) => v.to_js_string(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// JavaScript `Number.prototype.toString()` for a double.
pub fn number_to_js(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }

    format!("{}", n)
}

fn value_to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map(number_to_js).unwrap_or_else(|| n.to_string()),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => value_to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

impl From<Value> for JsValue {
    fn from(value: Value) -> Self {
        Self(Some(value))
    }
}

impl From<&str> for JsValue {
    fn from(value: &str) -> Self {
        Self(Some(Value::String(value.to_string())))
    }
}

impl From<String> for JsValue {
    fn from(value: String) -> Self {
        Self(Some(Value::String(value)))
    }
}

impl From<f64> for JsValue {
    fn from(value: f64) -> Self {
        Self(Some(
            serde_json::Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        ))
    }
}

impl From<u32> for JsValue {
    fn from(value: u32) -> Self {
        Self(Some(Value::from(value)))
    }
}

impl From<i64> for JsValue {
    fn from(value: i64) -> Self {
        Self(Some(Value::from(value)))
    }
}

impl From<bool> for JsValue {
    fn from(value: bool) -> Self {
        Self(Some(Value::Bool(value)))
    }
}

impl Serialize for JsValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // A present key is never undefined, even when it holds null.
        Value::deserialize(deserializer).map(|v| Self(Some(v)))
    }
}
