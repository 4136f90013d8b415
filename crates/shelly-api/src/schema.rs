// Schema validation seam
//
// Every device payload that becomes a typed entity passes two steps:
// the injected `SchemaValidator` checks it against the named schema, then
// serde decodes it into the concrete model. Both failures surface as
// `Error::SchemaValidation`, distinct from transport failures.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;

/// Names of the fixed JSON-Schema documents payloads are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    Gen1DeviceInfo,
    Gen1Description,
    Gen1Status,
    Gen1CoapStatus,
    Gen2DeviceInfo,
    Gen2DeviceConfig,
    Gen2DeviceStatus,
    Gen2Notification,
}

impl Schema {
    /// File name of the schema document.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Gen1DeviceInfo => "gen1_http_shelly.json",
            Self::Gen1Description => "gen1_description.json",
            Self::Gen1Status => "gen1_http_status.json",
            Self::Gen1CoapStatus => "gen1_coap_status.json",
            Self::Gen2DeviceInfo => "gen2_http_shelly.json",
            Self::Gen2DeviceConfig => "gen2_http_config.json",
            Self::Gen2DeviceStatus => "gen2_http_status.json",
            Self::Gen2Notification => "gen2_ws_notification.json",
        }
    }

    /// Top-level keys every conforming document carries.
    fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::Gen1DeviceInfo => &["type", "mac"],
            Self::Gen1Description => &["blk", "sen"],
            Self::Gen1CoapStatus => &["G"],
            Self::Gen2DeviceInfo => &["id", "mac", "model", "gen"],
            Self::Gen1Status
            | Self::Gen2DeviceConfig
            | Self::Gen2DeviceStatus
            | Self::Gen2Notification => &[],
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Validates a raw JSON payload against a named schema.
///
/// The host may inject a full JSON-Schema engine; [`StructuralValidator`]
/// is the built-in default.
pub trait SchemaValidator: Send + Sync + fmt::Debug {
    fn validate(&self, payload: &str, schema: Schema) -> Result<(), Error>;
}

/// Default validator: the payload must be a JSON object carrying the
/// schema's required top-level keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl SchemaValidator for StructuralValidator {
    fn validate(&self, payload: &str, schema: Schema) -> Result<(), Error> {
        let document: Value = serde_json::from_str(payload)
            .map_err(|e| Error::schema(schema.file_name(), format!("malformed JSON: {e}")))?;

        let Some(object) = document.as_object() else {
            return Err(Error::schema(
                schema.file_name(),
                "expected a JSON object at the top level",
            ));
        };

        if let Some(missing) = schema
            .required_keys()
            .iter()
            .find(|key| !object.contains_key(**key))
        {
            return Err(Error::schema(
                schema.file_name(),
                format!("missing required key '{missing}'"),
            ));
        }

        Ok(())
    }
}

/// Validate `payload` and decode it into `T` in one step.
pub fn decode<T: DeserializeOwned>(
    validator: &dyn SchemaValidator,
    payload: &str,
    schema: Schema,
) -> Result<T, Error> {
    validator.validate(payload, schema)?;
    serde_json::from_str(payload).map_err(|e| {
        let preview = &payload[..floor_char_boundary(payload, 200)];
        Error::schema(
            schema.file_name(),
            format!("{e} (payload preview: {preview:?})"),
        )
    })
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Probe {
        #[serde(rename = "type")]
        kind: String,
    }

    #[test]
    fn rejects_malformed_json() {
        let err = StructuralValidator
            .validate("{not json", Schema::Gen1DeviceInfo)
            .unwrap_err();
        assert!(matches!(err, Error::SchemaValidation { .. }));
    }

    #[test]
    fn rejects_missing_required_key() {
        let err = StructuralValidator
            .validate(r#"{"type":"SHSW-1"}"#, Schema::Gen1DeviceInfo)
            .unwrap_err();
        assert!(err.to_string().contains("'mac'"), "got: {err}");
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(StructuralValidator.validate("[1,2]", Schema::Gen2DeviceStatus).is_err());
    }

    #[test]
    fn decode_validates_then_deserializes() {
        let probe: Probe = decode(
            &StructuralValidator,
            r#"{"type":"SHSW-1","mac":"AABBCC"}"#,
            Schema::Gen1DeviceInfo,
        )
        .unwrap();
        assert_eq!(probe.kind, "SHSW-1");
    }

    #[test]
    fn decode_reports_type_mismatch_as_schema_error() {
        let result: Result<Probe, _> = decode(
            &StructuralValidator,
            r#"{"type":5,"mac":"AABBCC"}"#,
            Schema::Gen1DeviceInfo,
        );
        assert!(matches!(result, Err(Error::SchemaValidation { .. })));
    }
}
