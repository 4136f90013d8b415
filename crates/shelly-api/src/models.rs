// Scalar values as they appear on the wire
//
// Devices report and accept loosely typed scalars: Gen1 query strings are
// text, CoAP reports mix numbers and strings, Gen2 JSON carries booleans
// and numbers. `WireValue` is the common shape both directions use.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single device-native scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl WireValue {
    /// Convert a JSON scalar. Arrays, objects and null have no wire form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// JSON form used in RPC params.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Numeric view; text is parsed, booleans are 1/0.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Case-insensitive textual comparison used by enum lookups.
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.to_string().eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn untagged_deserialize_picks_narrowest_shape() {
        let values: Vec<WireValue> = serde_json::from_value(json!([true, 3, 2.5, "on"])).unwrap();
        assert_eq!(
            values,
            vec![
                WireValue::Bool(true),
                WireValue::Int(3),
                WireValue::Float(2.5),
                WireValue::Text("on".into()),
            ]
        );
    }

    #[test]
    fn from_json_rejects_compound_values() {
        assert!(WireValue::from_json(&json!(null)).is_none());
        assert!(WireValue::from_json(&json!([1])).is_none());
        assert_eq!(WireValue::from_json(&json!(-1)), Some(WireValue::Int(-1)));
    }

    #[test]
    fn display_renders_query_string_form() {
        assert_eq!(WireValue::Bool(false).to_string(), "false");
        assert_eq!(WireValue::Float(21.5).to_string(), "21.5");
        assert_eq!(WireValue::from("toggle").to_string(), "toggle");
    }

    #[test]
    fn numeric_view_parses_text() {
        assert_eq!(WireValue::from(" 42 ").as_f64(), Some(42.0));
        assert_eq!(WireValue::Bool(true).as_f64(), Some(1.0));
        assert!(WireValue::from("on").as_f64().is_none());
    }
}
