// ── Sensor range inference ──
//
// Gen1 devices describe each sensor with a range token (`"0/1"`, `"U16"`,
// `"-40/300"`, `"open/close/stop"`) or a `[normal, invalid]` pair. This
// turns that self-description into a data type, a format and an optional
// invalid-value sentinel.

use shelly_api::WireValue;
use shelly_api::gen1::RawRange;

use crate::model::{DataType, Format};

/// Result of inferring one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Inferred {
    pub data_type: DataType,
    pub format: Format,
    pub invalid: Option<WireValue>,
}

impl Inferred {
    fn unknown() -> Self {
        Self {
            data_type: DataType::Unknown,
            format: Format::None,
            invalid: None,
        }
    }
}

/// Infer type, format and sentinel for `sensor` within `block`.
///
/// Block and sensor are the `D` descriptions, e.g. `relay_0` / `output`.
pub fn infer(block: &str, sensor: &str, raw: Option<&RawRange>) -> Inferred {
    let mut inferred = match raw {
        Some(RawRange::Token(token)) => classify(token),
        Some(RawRange::Pair(normal, invalid)) => Inferred {
            invalid: Some(parse_sentinel(invalid)),
            ..classify(normal)
        },
        Some(RawRange::Other(_)) | None => Inferred::unknown(),
    };

    let block = block.to_ascii_lowercase();
    if (block.starts_with("relay") || block.starts_with("light"))
        && sensor.eq_ignore_ascii_case("output")
    {
        inferred.data_type = DataType::Switch;
        inferred.format = Format::switch();
    } else if block.starts_with("roller") && sensor.eq_ignore_ascii_case("roller") {
        inferred.data_type = DataType::Cover;
        inferred.format = Format::gen1_cover();
    }

    inferred
}

fn classify(token: &str) -> Inferred {
    let token = token.trim();
    let typed = |data_type| Inferred {
        data_type,
        format: Format::None,
        invalid: None,
    };

    match token {
        "0/1" | "1/0" => return typed(DataType::Boolean),
        "U8" => return typed(DataType::UChar),
        "U16" => return typed(DataType::UShort),
        "U32" => return typed(DataType::UInt),
        "I8" => return typed(DataType::Char),
        "I16" => return typed(DataType::Short),
        "I32" => return typed(DataType::Int),
        _ => {}
    }

    if !token.contains('/') {
        return Inferred::unknown();
    }

    let parts: Vec<&str> = token.split('/').map(str::trim).collect();
    if let [min, max] = parts.as_slice() {
        if let (Ok(min), Ok(max)) = (min.parse::<i64>(), max.parse::<i64>()) {
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            let format = Format::range(min as f64, max as f64);
            return Inferred {
                data_type: DataType::Int,
                format,
                invalid: None,
            };
        }
        if let (Ok(min), Ok(max)) = (min.parse::<f64>(), max.parse::<f64>()) {
            return Inferred {
                data_type: DataType::Float,
                format: Format::range(min, max),
                invalid: None,
            };
        }
    }

    Inferred {
        data_type: DataType::Enum,
        format: Format::literals(parts.into_iter().filter(|p| !p.is_empty())),
        invalid: None,
    }
}

/// Integer, then float, then the raw text.
fn parse_sentinel(raw: &str) -> WireValue {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        WireValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        WireValue::Float(f)
    } else {
        WireValue::Text(raw.to_owned())
    }
}
