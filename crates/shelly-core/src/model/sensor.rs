// ── Property descriptors and readings ──
//
// Descriptors are produced once per description / config fetch and owned by
// the caller. Readings reference them by key.

use serde::{Deserialize, Serialize};
use shelly_api::WireValue;

use super::{DataType, Format, NormalizedValue};

/// One Gen1 sensor as linked to one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub block_id: i64,
    /// Block description, e.g. `relay_0`.
    pub block: String,
    pub sensor_id: i64,
    /// CoAP type code (`S`, `T`, `P`, `E`, ...).
    pub sensor_type: String,
    pub description: String,
    pub unit: Option<String>,
    pub data_type: DataType,
    pub format: Format,
    /// Reported value meaning "no reading".
    pub invalid: Option<WireValue>,
    pub queryable: bool,
    pub settable: bool,
}

impl SensorDescriptor {
    /// `<block>_<description>`, unique per device.
    pub fn key(&self) -> String {
        format!("{}_{}", self.block, self.description)
    }

    /// Whether a raw reading equals the invalid sentinel.
    pub fn is_invalid(&self, raw: &WireValue) -> bool {
        let Some(sentinel) = &self.invalid else {
            return false;
        };
        match (sentinel, raw) {
            (WireValue::Text(s), _) => raw.eq_ignore_case(s),
            (_, WireValue::Text(_)) | (WireValue::Bool(_), _) => {
                raw.eq_ignore_case(&sentinel.to_string())
            }
            _ => match (sentinel.as_f64(), raw.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                _ => false,
            },
        }
    }
}

/// One normalized Gen1 value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub block_id: i64,
    pub sensor_id: i64,
    pub key: String,
    pub value: Option<NormalizedValue>,
}

/// One Gen2 component attribute, keyed `{component}_{id}_{attribute}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub key: String,
    pub component: String,
    pub id: u32,
    pub attribute: String,
    pub name: Option<String>,
    pub data_type: DataType,
    pub format: Format,
    pub unit: Option<String>,
    pub settable: bool,
}

impl PropertyDescriptor {
    pub fn new(component: &str, id: u32, attribute: &str, data_type: DataType) -> Self {
        Self {
            key: format!("{component}_{id}_{attribute}"),
            component: component.to_owned(),
            id,
            attribute: attribute.to_owned(),
            name: None,
            data_type,
            format: Format::None,
            unit: None,
            settable: false,
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_owned());
        self
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = name.map(str::to_owned);
        self
    }

    pub fn settable(mut self) -> Self {
        self.settable = true;
        self
    }
}

/// One normalized Gen2 value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyReading {
    pub key: String,
    pub value: Option<NormalizedValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(invalid: Option<WireValue>) -> SensorDescriptor {
        SensorDescriptor {
            block_id: 0,
            block: "device".into(),
            sensor_id: 3104,
            sensor_type: "T".into(),
            description: "deviceTemp".into(),
            unit: Some("C".into()),
            data_type: DataType::Float,
            format: Format::range(-40.0, 300.0),
            invalid,
            queryable: true,
            settable: false,
        }
    }

    #[test]
    fn numeric_sentinel_matches_int_or_float() {
        let d = descriptor(Some(WireValue::Int(999)));
        assert!(d.is_invalid(&WireValue::Float(999.0)));
        assert!(d.is_invalid(&WireValue::Text("999".into())));
        assert!(!d.is_invalid(&WireValue::Float(21.5)));
    }

    #[test]
    fn text_sentinel_ignores_case() {
        let d = descriptor(Some(WireValue::Text("unknown".into())));
        assert!(d.is_invalid(&WireValue::Text("Unknown".into())));
        assert!(!descriptor(None).is_invalid(&WireValue::Int(0)));
    }

    #[test]
    fn property_keys() {
        let p = PropertyDescriptor::new("cover", 1, "position", DataType::UChar);
        assert_eq!(p.key, "cover_1_position");
        assert_eq!(descriptor(None).key(), "device_deviceTemp");
    }
}
