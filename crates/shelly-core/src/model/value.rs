// ── Normalized values ──

use std::fmt;

use serde::{Deserialize, Serialize};
use shelly_api::WireValue;

/// A device reading after normalization. "No value" is `Option::None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NormalizedValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    /// Canonical literal from an enum format table.
    Enum(String),
    /// Free text for `String` / `Unknown` properties.
    Text(String),
}

impl NormalizedValue {
    /// Scalar view used when matching against format tables or parsing numbers.
    pub fn to_wire(&self) -> WireValue {
        match self {
            Self::Float(v) => WireValue::Float(*v),
            Self::Int(v) => WireValue::Int(*v),
            Self::Bool(v) => WireValue::Bool(*v),
            Self::Enum(s) | Self::Text(s) => WireValue::Text(s.clone()),
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Enum(s) | Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for NormalizedValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for NormalizedValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for NormalizedValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}
