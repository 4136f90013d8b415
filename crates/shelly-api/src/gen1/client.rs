// Gen1 HTTP endpoints
//
// Reads go to fixed JSON endpoints; writes are GET requests on the
// channel path with the action in the query string, e.g.
// `/relay/0?turn=on` or `/roller/0?go=to_pos&roller_pos=40`.

use tracing::debug;
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::gen1::models::{Gen1Description, Gen1DeviceInfo, Gen1Status};
use crate::http::HttpProtocolClient;
use crate::models::WireValue;
use crate::schema::Schema;
use crate::transport::TransportConfig;

/// Async client for one Gen1 device.
#[derive(Debug, Clone)]
pub struct Gen1Client {
    http: HttpProtocolClient,
}

impl Gen1Client {
    pub fn new(
        base_url: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: HttpProtocolClient::new(base_url, credentials, transport)?,
        })
    }

    /// Build on an already configured protocol client.
    pub fn from_protocol(http: HttpProtocolClient) -> Self {
        Self { http }
    }

    pub fn protocol(&self) -> &HttpProtocolClient {
        &self.http
    }

    /// `GET /shelly`
    pub async fn get_device_information(&self) -> Result<Gen1DeviceInfo, Error> {
        let url = self.http.url("shelly")?;
        self.http.get_json(url, Schema::Gen1DeviceInfo).await
    }

    /// `GET /cit/d`
    pub async fn get_device_description(&self) -> Result<Gen1Description, Error> {
        let url = self.http.url("cit/d")?;
        self.http.get_json(url, Schema::Gen1Description).await
    }

    /// `GET /status`
    pub async fn get_device_state(&self) -> Result<Gen1Status, Error> {
        let url = self.http.url("status")?;
        self.http.get_json(url, Schema::Gen1Status).await
    }

    /// Write `value` to the sensor `sensor` of block `block` (e.g. `relay_0`,
    /// `output`). The value must already be in wire form.
    pub async fn set_device_state(
        &self,
        block: &str,
        sensor: &str,
        value: &WireValue,
    ) -> Result<(), Error> {
        let action = WriteAction::resolve(block, sensor, value)?;
        let mut url = self.http.url(&action.path)?;
        url.query_pairs_mut()
            .extend_pairs(action.query.iter().map(|(k, v)| (*k, v.as_str())));

        debug!(block, sensor, url = %url, "Gen1 write");
        self.http.get_text(url).await?;
        Ok(())
    }
}

// ── Write actions ────────────────────────────────────────────────────

/// Path and query pairs for one Gen1 write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAction {
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl WriteAction {
    /// Map a block/sensor pair onto the device's action endpoint.
    pub fn resolve(block: &str, sensor: &str, value: &WireValue) -> Result<Self, Error> {
        let key = format!("{block}.{sensor}");

        let Some((kind, index)) = block.rsplit_once('_') else {
            return Err(Error::mapping(key, "block has no channel index"));
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::mapping(key, "block has no channel index"));
        }

        let value = value.to_string();
        let query = match sensor {
            "output" => vec![("turn", value)],
            "roller" => vec![("go", value)],
            "rollerPos" => vec![("go", "to_pos".to_owned()), ("roller_pos", value)],
            "brightness" => vec![("brightness", value)],
            "red" => vec![("red", value)],
            "green" => vec![("green", value)],
            "blue" => vec![("blue", value)],
            "white" => vec![("white", value)],
            "gain" => vec![("gain", value)],
            "colorTemp" => vec![("temp", value)],
            _ => return Err(Error::mapping(key, "sensor is not writable")),
        };

        Ok(Self {
            path: format!("{kind}/{index}"),
            query,
        })
    }
}

/// Sensor descriptions that accept writes.
pub const WRITABLE_SENSORS: &[&str] = &[
    "output",
    "roller",
    "rollerPos",
    "brightness",
    "red",
    "green",
    "blue",
    "white",
    "gain",
    "colorTemp",
];

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn relay_output_maps_to_turn() {
        let action = WriteAction::resolve("relay_0", "output", &WireValue::from("on")).unwrap();
        assert_eq!(
            action,
            WriteAction {
                path: "relay/0".into(),
                query: vec![("turn", "on".into())],
            }
        );
    }

    #[test]
    fn roller_position_adds_go_to_pos() {
        let action = WriteAction::resolve("roller_1", "rollerPos", &WireValue::Int(40)).unwrap();
        assert_eq!(action.path, "roller/1");
        assert_eq!(
            action.query,
            vec![("go", "to_pos".into()), ("roller_pos", "40".into())]
        );
    }

    #[test]
    fn color_temperature_uses_temp_parameter() {
        let action = WriteAction::resolve("light_0", "colorTemp", &WireValue::Int(4000)).unwrap();
        assert_eq!(action.query, vec![("temp", "4000".into())]);
    }

    #[test]
    fn unknown_sensor_is_a_mapping_error() {
        let err = WriteAction::resolve("relay_0", "power", &WireValue::Int(1)).unwrap_err();
        assert!(matches!(err, Error::Mapping { .. }));
    }

    #[test]
    fn block_without_index_is_a_mapping_error() {
        assert!(WriteAction::resolve("device", "output", &WireValue::Bool(true)).is_err());
        assert!(WriteAction::resolve("relay_x", "output", &WireValue::Bool(true)).is_err());
    }

    #[test]
    fn writable_list_matches_resolver() {
        for sensor in WRITABLE_SENSORS {
            assert!(WriteAction::resolve("light_0", sensor, &WireValue::Int(1)).is_ok());
        }
    }
}
