// Gen2 payload models
//
// Gen2 documents key components by `"<type>:<id>"` (e.g. `"switch:0"`).
// `DeviceConfig` and `DeviceStatus` visit those keys directly and sort each
// component into its typed list, skipping component types we do not model.
// Status structs keep every field optional because `NotifyStatus` carries
// partial objects.

use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// `Shelly.GetDeviceInfo`
#[derive(Debug, Clone, Deserialize)]
pub struct Gen2DeviceInfo {
    pub id: String,
    pub mac: String,
    pub model: String,
    #[serde(rename = "gen")]
    pub generation: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fw_id: Option<String>,
    #[serde(default)]
    pub ver: Option<String>,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub auth_en: bool,
    #[serde(default)]
    pub auth_domain: Option<String>,
}

/// Split `"switch:0"` into `("switch", 0)`.
pub fn split_component_key(key: &str) -> Option<(&str, u32)> {
    let (component, id) = key.split_once(':')?;
    Some((component, id.parse().ok()?))
}

// ── Configuration ────────────────────────────────────────────────────

/// `Shelly.GetConfig`, reduced to the components the property model covers.
#[derive(Debug, Clone, Default)]
pub struct Gen2DeviceConfig {
    pub switches: Vec<SwitchConfig>,
    pub covers: Vec<CoverConfig>,
    pub lights: Vec<LightConfig>,
    pub inputs: Vec<InputConfig>,
    pub temperatures: Vec<SensorConfig>,
    pub humidities: Vec<SensorConfig>,
    pub device_power: Vec<SensorConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub id: u32,
    pub name: Option<String>,
    pub initial_state: Option<String>,
    pub auto_on: bool,
    pub auto_off: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    pub id: u32,
    pub name: Option<String>,
    pub initial_state: Option<String>,
    pub invert_directions: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub id: u32,
    pub name: Option<String>,
    pub initial_state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub id: u32,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    pub invert: bool,
}

/// Config of read-only sensor components (temperature, humidity, devicepower).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub id: u32,
    pub name: Option<String>,
}

impl<'de> Deserialize<'de> for Gen2DeviceConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ConfigVisitor;

        impl<'de> Visitor<'de> for ConfigVisitor {
            type Value = Gen2DeviceConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a component-keyed configuration object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut config = Gen2DeviceConfig::default();
                while let Some(key) = map.next_key::<String>()? {
                    let Some((component, id)) = split_component_key(&key) else {
                        map.next_value::<IgnoredAny>()?;
                        continue;
                    };
                    match component {
                        "switch" => config.switches.push(SwitchConfig {
                            id,
                            ..map.next_value()?
                        }),
                        "cover" => config.covers.push(CoverConfig {
                            id,
                            ..map.next_value()?
                        }),
                        "light" => config.lights.push(LightConfig {
                            id,
                            ..map.next_value()?
                        }),
                        "input" => config.inputs.push(InputConfig {
                            id,
                            ..map.next_value()?
                        }),
                        "temperature" => config.temperatures.push(SensorConfig {
                            id,
                            ..map.next_value()?
                        }),
                        "humidity" => config.humidities.push(SensorConfig {
                            id,
                            ..map.next_value()?
                        }),
                        "devicepower" => config.device_power.push(SensorConfig {
                            id,
                            ..map.next_value()?
                        }),
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(config)
            }
        }

        deserializer.deserialize_map(ConfigVisitor)
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// `Shelly.GetStatus`, and the params of `NotifyStatus`/`NotifyFullStatus`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gen2DeviceStatus {
    /// Unix timestamp carried by notifications.
    pub ts: Option<f64>,
    pub switches: Vec<SwitchStatus>,
    pub covers: Vec<CoverStatus>,
    pub lights: Vec<LightStatus>,
    pub inputs: Vec<InputStatus>,
    pub temperatures: Vec<TemperatureStatus>,
    pub humidities: Vec<HumidityStatus>,
    pub device_power: Vec<DevicePowerStatus>,
}

impl Gen2DeviceStatus {
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
            && self.covers.is_empty()
            && self.lights.is_empty()
            && self.inputs.is_empty()
            && self.temperatures.is_empty()
            && self.humidities.is_empty()
            && self.device_power.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SwitchStatus {
    pub id: u32,
    pub output: Option<bool>,
    pub apower: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub aenergy: Option<EnergyCounter>,
    pub temperature: Option<ComponentTemperature>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoverStatus {
    pub id: u32,
    /// `open`, `closed`, `opening`, `closing`, `stopped`, `calibrating`.
    pub state: Option<String>,
    pub current_pos: Option<i64>,
    pub apower: Option<f64>,
    pub aenergy: Option<EnergyCounter>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightStatus {
    pub id: u32,
    pub output: Option<bool>,
    pub brightness: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputStatus {
    pub id: u32,
    pub state: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemperatureStatus {
    pub id: u32,
    #[serde(rename = "tC")]
    pub t_c: Option<f64>,
    #[serde(rename = "tF")]
    pub t_f: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HumidityStatus {
    pub id: u32,
    pub rh: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DevicePowerStatus {
    pub id: u32,
    pub battery: Option<BatteryStatus>,
    pub external: Option<ExternalPower>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatteryStatus {
    #[serde(rename = "V")]
    pub voltage: Option<f64>,
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExternalPower {
    pub present: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnergyCounter {
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComponentTemperature {
    #[serde(rename = "tC")]
    pub t_c: Option<f64>,
}

impl<'de> Deserialize<'de> for Gen2DeviceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl<'de> Visitor<'de> for StatusVisitor {
            type Value = Gen2DeviceStatus;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a component-keyed status object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut status = Gen2DeviceStatus::default();
                while let Some(key) = map.next_key::<String>()? {
                    if key == "ts" {
                        status.ts = map.next_value()?;
                        continue;
                    }
                    let Some((component, id)) = split_component_key(&key) else {
                        map.next_value::<IgnoredAny>()?;
                        continue;
                    };
                    match component {
                        "switch" => status.switches.push(SwitchStatus {
                            id,
                            ..map.next_value()?
                        }),
                        "cover" => status.covers.push(CoverStatus {
                            id,
                            ..map.next_value()?
                        }),
                        "light" => status.lights.push(LightStatus {
                            id,
                            ..map.next_value()?
                        }),
                        "input" => status.inputs.push(InputStatus {
                            id,
                            ..map.next_value()?
                        }),
                        "temperature" => status.temperatures.push(TemperatureStatus {
                            id,
                            ..map.next_value()?
                        }),
                        "humidity" => status.humidities.push(HumidityStatus {
                            id,
                            ..map.next_value()?
                        }),
                        "devicepower" => status.device_power.push(DevicePowerStatus {
                            id,
                            ..map.next_value()?
                        }),
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(status)
            }
        }

        deserializer.deserialize_map(StatusVisitor)
    }
}

// ── Notifications ────────────────────────────────────────────────────

/// One entry of a `NotifyEvent` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Gen2Event {
    pub component: String,
    #[serde(default)]
    pub id: Option<u32>,
    pub event: String,
    #[serde(default)]
    pub ts: Option<f64>,
}

/// Params of a `NotifyEvent` frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Gen2EventBatch {
    pub ts: Option<f64>,
    pub events: Vec<Gen2Event>,
}

/// An unsolicited frame pushed by the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// `NotifyStatus`: only the fields that changed.
    Status { src: String, status: Gen2DeviceStatus },
    /// `NotifyFullStatus`: the complete status document.
    FullStatus { src: String, status: Gen2DeviceStatus },
    /// `NotifyEvent`
    Event { src: String, events: Vec<Gen2Event> },
}

impl Notification {
    /// Method names that carry notifications.
    pub const METHODS: [&'static str; 3] = ["NotifyStatus", "NotifyFullStatus", "NotifyEvent"];

    /// Device id that sent the frame.
    pub fn src(&self) -> &str {
        match self {
            Self::Status { src, .. } | Self::FullStatus { src, .. } | Self::Event { src, .. } => src,
        }
    }

    /// Decode the params of a notification frame by method name.
    pub fn from_params(
        method: &str,
        src: String,
        params: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        match method {
            "NotifyStatus" => Ok(Self::Status {
                src,
                status: serde_json::from_value(params)?,
            }),
            "NotifyFullStatus" => Ok(Self::FullStatus {
                src,
                status: serde_json::from_value(params)?,
            }),
            "NotifyEvent" => {
                let batch: Gen2EventBatch = serde_json::from_value(params)?;
                Ok(Self::Event {
                    src,
                    events: batch.events,
                })
            }
            other => Err(de::Error::custom(format!("'{other}' is not a notification"))),
        }
    }
}
