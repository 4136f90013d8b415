// ── Value transformer ──
//
// Converts between device wire scalars and normalized values under a
// (data type, format) pair. Unmappable values come back as `None`; they are
// not errors at this level.

use shelly_api::WireValue;

use crate::model::{DataType, Format, NormalizedValue};

/// Normalize a value the device reported.
pub fn from_device(
    data_type: DataType,
    format: &Format,
    raw: &WireValue,
) -> Option<NormalizedValue> {
    match data_type {
        DataType::Boolean => Some(NormalizedValue::Bool(truthy(raw))),
        DataType::Char
        | DataType::UChar
        | DataType::Short
        | DataType::UShort
        | DataType::Int
        | DataType::UInt => checked_integer(data_type, format, raw).map(NormalizedValue::Int),
        DataType::Float => checked_float(format, raw).map(NormalizedValue::Float),
        DataType::Enum | DataType::Switch | DataType::Cover => format
            .row_from_device(raw)
            .map(|row| NormalizedValue::Enum(row.canonical.clone())),
        DataType::String | DataType::Unknown => Some(NormalizedValue::Text(raw.to_string())),
    }
}

/// Produce the wire value to send for a normalized value.
pub fn to_device(
    data_type: DataType,
    format: &Format,
    value: &NormalizedValue,
) -> Option<WireValue> {
    let wire = value.to_wire();
    match data_type {
        DataType::Boolean => Some(WireValue::Bool(truthy(&wire))),
        DataType::Char
        | DataType::UChar
        | DataType::Short
        | DataType::UShort
        | DataType::Int
        | DataType::UInt => checked_integer(data_type, format, &wire).map(WireValue::Int),
        DataType::Float => checked_float(format, &wire).map(WireValue::Float),
        DataType::Enum | DataType::Switch | DataType::Cover => {
            format.row_to_device(value)?.outbound.clone()
        }
        DataType::String | DataType::Unknown => Some(wire),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Empty text, `0` and `false` are false; everything else non-zero is true.
fn truthy(value: &WireValue) -> bool {
    match value {
        WireValue::Bool(b) => *b,
        WireValue::Int(i) => *i != 0,
        WireValue::Float(f) => f.abs() > 0.0,
        WireValue::Text(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
    }
}

fn checked_integer(data_type: DataType, format: &Format, value: &WireValue) -> Option<i64> {
    let parsed = match value {
        WireValue::Int(i) => *i,
        WireValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => i,
            Err(_) => truncated(value.as_f64()?)?,
        },
        WireValue::Bool(_) | WireValue::Float(_) => truncated(value.as_f64()?)?,
    };

    if data_type
        .integer_bounds()
        .is_some_and(|(lo, hi)| parsed < lo || parsed > hi)
    {
        return None;
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let admitted = format.admits(parsed as f64);
    admitted.then_some(parsed)
}

fn checked_float(format: &Format, value: &WireValue) -> Option<f64> {
    let parsed = value.as_f64().filter(|v| v.is_finite())?;
    format.admits(parsed).then_some(parsed)
}

/// Drop the fractional part: `23.45` reads as `23`, `-3.7` as `-3`.
fn truncated(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let value = value.trunc();
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    let whole = value as i64;
    in_range.then_some(whole)
}
