// Gen1 payload models
//
// Serde types for `/shelly`, `/cit/d` (HTTP or CoAP code 69), `/status`,
// and the CoAP code 30 status report. Field names follow the device
// firmware; single-letter CoIoT keys are renamed to readable names.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `GET /shelly`
#[derive(Debug, Clone, Deserialize)]
pub struct Gen1DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: String,
    pub mac: String,
    #[serde(default)]
    pub auth: bool,
    #[serde(default)]
    pub fw: Option<String>,
    #[serde(default)]
    pub longid: Option<u8>,
    #[serde(default)]
    pub num_outputs: Option<u32>,
    #[serde(default)]
    pub num_meters: Option<u32>,
    #[serde(default)]
    pub num_rollers: Option<u32>,
}

// ── Description (/cit/d) ─────────────────────────────────────────────

/// Self-described schema: blocks and the sensors attached to them.
#[derive(Debug, Clone, Deserialize)]
pub struct Gen1Description {
    pub blk: Vec<Gen1Block>,
    pub sen: Vec<Gen1Sensor>,
}

impl Gen1Description {
    /// Sensors linked to `block_id`.
    pub fn sensors_of(&self, block_id: i64) -> impl Iterator<Item = &Gen1Sensor> {
        self.sen
            .iter()
            .filter(move |sensor| sensor.links.contains(&block_id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Gen1Block {
    #[serde(rename = "I")]
    pub id: i64,
    /// Block name, e.g. `relay_0`, `roller_0`, `device`.
    #[serde(rename = "D")]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Gen1Sensor {
    #[serde(rename = "I")]
    pub id: i64,
    /// Type code: `S` status, `T` temperature, `P` power, `E` energy, ...
    #[serde(rename = "T")]
    pub sensor_type: String,
    /// Sensor name within its block, e.g. `output`, `roller`, `rollerPos`.
    #[serde(rename = "D")]
    pub description: String,
    #[serde(rename = "R", default)]
    pub range: Option<RawRange>,
    #[serde(rename = "U", default)]
    pub unit: Option<String>,
    /// Owning block id(s); the firmware sends a bare int or an array.
    #[serde(rename = "L", deserialize_with = "one_or_many")]
    pub links: Vec<i64>,
}

/// The `R` field of a sensor: one range token, or a `[normal, invalid]` pair.
///
/// Anything else is kept as raw JSON so the description still decodes;
/// inference treats it as unknown.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawRange {
    Token(String),
    Pair(String, String),
    Other(Value),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(i64),
        Many(Vec<i64>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(id) => vec![id],
        OneOrMany::Many(ids) => ids,
    })
}

// ── CoAP status report (code 30) ─────────────────────────────────────

/// Periodic CoAP status push: `{"G": [[channel, sensor_id, value], ...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Gen1StatusReport {
    #[serde(rename = "G")]
    pub entries: Vec<Gen1ReportEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(i64, i64, Value)")]
pub struct Gen1ReportEntry {
    pub channel: i64,
    pub sensor_id: i64,
    pub value: Value,
}

impl From<(i64, i64, Value)> for Gen1ReportEntry {
    fn from((channel, sensor_id, value): (i64, i64, Value)) -> Self {
        Self {
            channel,
            sensor_id,
            value,
        }
    }
}

// ── HTTP status (/status) ────────────────────────────────────────────

/// `GET /status`. Every list is empty when the device has no such channel.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gen1Status {
    pub relays: Vec<Gen1RelayStatus>,
    pub rollers: Vec<Gen1RollerStatus>,
    pub lights: Vec<Gen1LightStatus>,
    pub meters: Vec<Gen1MeterStatus>,
    pub emeters: Vec<Gen1EmeterStatus>,
    pub inputs: Vec<Gen1InputStatus>,
    pub temperature: Option<f64>,
    pub overtemperature: Option<bool>,
    pub wifi_sta: Option<Gen1WifiStatus>,
    pub uptime: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gen1RelayStatus {
    pub ison: bool,
    pub has_timer: bool,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gen1RollerStatus {
    /// `open`, `close` or `stop`.
    pub state: Option<String>,
    pub current_pos: Option<i64>,
    pub power: Option<f64>,
    pub calibrating: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gen1LightStatus {
    pub ison: bool,
    pub mode: Option<String>,
    pub brightness: Option<i64>,
    pub red: Option<i64>,
    pub green: Option<i64>,
    pub blue: Option<i64>,
    pub white: Option<i64>,
    pub gain: Option<i64>,
    pub temp: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gen1MeterStatus {
    pub power: Option<f64>,
    pub is_valid: bool,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gen1EmeterStatus {
    pub power: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gen1InputStatus {
    pub input: i64,
    pub event: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gen1WifiStatus {
    pub connected: bool,
    pub ssid: Option<String>,
    pub ip: Option<String>,
    pub rssi: Option<i64>,
}
