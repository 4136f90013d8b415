// Component key → RPC method mapping
//
// A property key such as `switch_0_output` or `cover_1_position` names a
// component type, instance id and attribute. Writes to it become one RPC
// call. Shared by the HTTP client and the WebSocket client.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::error::Error;
use crate::models::WireValue;

static COMPONENT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<component>[a-z]+)[_:](?P<id>\d+)(?:_(?P<attribute>[A-Za-z_]+))?$")
        .expect("static regex")
});

/// A decoded write against one Gen2 component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentCommand {
    SwitchSet { id: u32, output: bool },
    SwitchToggle { id: u32 },
    CoverGoToPosition { id: u32, pos: u8 },
    CoverOpen { id: u32 },
    CoverClose { id: u32 },
    CoverStop { id: u32 },
}

impl ComponentCommand {
    /// Map a component key and wire value onto an RPC command.
    ///
    /// A key without an attribute (`switch:0`) addresses the component's
    /// primary attribute: `output` for switches, `state` for covers.
    pub fn parse(key: &str, value: &WireValue) -> Result<Self, Error> {
        let Some(caps) = COMPONENT_KEY.captures(key) else {
            return Err(Error::mapping(key, "not a component key"));
        };

        let component = caps.name("component").map_or("", |m| m.as_str());
        let id: u32 = caps
            .name("id")
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(|| Error::mapping(key, "component id out of range"))?;
        let attribute = caps.name("attribute").map(|m| m.as_str());

        match (component, attribute) {
            ("switch", None | Some("output")) => {
                if value.eq_ignore_case("toggle") {
                    return Ok(Self::SwitchToggle { id });
                }
                let output = as_bool(value)
                    .ok_or_else(|| Error::mapping(key, format!("'{value}' is not a switch state")))?;
                Ok(Self::SwitchSet { id, output })
            }
            ("cover", Some("position")) => {
                let pos = value
                    .as_f64()
                    .map(f64::round)
                    .filter(|p| (0.0..=100.0).contains(p))
                    .ok_or_else(|| {
                        Error::mapping(key, format!("'{value}' is not a position between 0 and 100"))
                    })?;
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::as_conversions
                )]
                let pos = pos as u8;
                Ok(Self::CoverGoToPosition { id, pos })
            }
            ("cover", None | Some("state")) => match value.to_string().to_ascii_lowercase().as_str() {
                "open" => Ok(Self::CoverOpen { id }),
                "close" => Ok(Self::CoverClose { id }),
                "stop" => Ok(Self::CoverStop { id }),
                _ => Err(Error::mapping(key, format!("'{value}' is not a cover action"))),
            },
            // The light key pattern never resolves to a method on these
            // firmwares; writes are refused rather than guessed.
            ("light", _) => Err(Error::mapping(key, "light components do not accept writes")),
            _ => Err(Error::mapping(key, "no RPC method for this component attribute")),
        }
    }

    /// RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::SwitchSet { .. } => "Switch.Set",
            Self::SwitchToggle { .. } => "Switch.Toggle",
            Self::CoverGoToPosition { .. } => "Cover.GoToPosition",
            Self::CoverOpen { .. } => "Cover.Open",
            Self::CoverClose { .. } => "Cover.Close",
            Self::CoverStop { .. } => "Cover.Stop",
        }
    }

    /// RPC params object.
    pub fn params(&self) -> Value {
        match self {
            Self::SwitchSet { id, output } => json!({ "id": id, "output": output }),
            Self::CoverGoToPosition { id, pos } => json!({ "id": id, "pos": pos }),
            Self::SwitchToggle { id }
            | Self::CoverOpen { id }
            | Self::CoverClose { id }
            | Self::CoverStop { id } => json!({ "id": id }),
        }
    }
}

/// Methods whose response carries no entity worth decoding.
pub fn is_write_method(method: &str) -> bool {
    method.ends_with(".Set")
        || method.ends_with(".SetConfig")
        || matches!(
            method,
            "Switch.Toggle"
                | "Cover.Open"
                | "Cover.Close"
                | "Cover.Stop"
                | "Cover.GoToPosition"
                | "Shelly.Reboot"
        )
}

fn as_bool(value: &WireValue) -> Option<bool> {
    match value {
        WireValue::Bool(b) => Some(*b),
        WireValue::Int(1) => Some(true),
        WireValue::Int(0) => Some(false),
        WireValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Some(true),
            "off" | "false" | "0" => Some(false),
            _ => None,
        },
        WireValue::Int(_) | WireValue::Float(_) => None,
    }
}
