// ── Device-to-domain conversions ──
//
// Turns raw shelly-api payloads into descriptors and normalized readings,
// and normalized writes back into wire values. Gen1 types are described by
// the device itself and go through inference; Gen2 components have fixed,
// known attributes.

use shelly_api::WireValue;
use shelly_api::gen1::{Gen1Description, Gen1Status, Gen1StatusReport, WRITABLE_SENSORS};
use shelly_api::gen2::{Gen2DeviceConfig, Gen2DeviceStatus};
use tracing::trace;

use crate::error::CoreError;
use crate::inference::infer;
use crate::model::{
    DataType, Format, NormalizedValue, PropertyDescriptor, PropertyReading, SensorDescriptor,
    SensorReading,
};
use crate::transform::{from_device, to_device};

// ── Gen1 descriptors ─────────────────────────────────────────────────

/// One descriptor per (sensor, linked block) pair.
pub fn describe_gen1(description: &Gen1Description) -> Vec<SensorDescriptor> {
    description
        .sen
        .iter()
        .flat_map(|sensor| {
            sensor.links.iter().filter_map(move |block_id| {
                let Some(block) = description.blk.iter().find(|b| b.id == *block_id) else {
                    trace!(sensor_id = sensor.id, block_id, "sensor links to unknown block");
                    return None;
                };
                let inferred = infer(&block.description, &sensor.description, sensor.range.as_ref());
                Some(SensorDescriptor {
                    block_id: block.id,
                    block: block.description.clone(),
                    sensor_id: sensor.id,
                    sensor_type: sensor.sensor_type.clone(),
                    description: sensor.description.clone(),
                    unit: sensor.unit.clone(),
                    data_type: inferred.data_type,
                    format: inferred.format,
                    invalid: inferred.invalid,
                    queryable: true,
                    settable: sensor.sensor_type.eq_ignore_ascii_case("S")
                        && WRITABLE_SENSORS.contains(&sensor.description.as_str()),
                })
            })
        })
        .collect()
}

// ── Gen1 readings ────────────────────────────────────────────────────

/// Normalize a CoAP status report (code 30 payload).
pub fn normalize_gen1_report(
    report: &Gen1StatusReport,
    descriptors: &[SensorDescriptor],
) -> Vec<SensorReading> {
    report
        .entries
        .iter()
        .filter_map(|entry| {
            let Some(descriptor) = descriptors.iter().find(|d| d.sensor_id == entry.sensor_id)
            else {
                trace!(sensor_id = entry.sensor_id, "report entry for undescribed sensor");
                return None;
            };
            let raw = WireValue::from_json(&entry.value);
            Some(reading(descriptor, raw.as_ref()))
        })
        .collect()
}

/// Normalize an HTTP `/status` document against the device's descriptors.
///
/// Only sensors with a counterpart in the status document produce a reading.
pub fn normalize_gen1_status(
    status: &Gen1Status,
    descriptors: &[SensorDescriptor],
) -> Vec<SensorReading> {
    descriptors
        .iter()
        .filter_map(|descriptor| {
            let raw = gen1_status_value(status, &descriptor.block, &descriptor.description)?;
            Some(reading(descriptor, Some(&raw)))
        })
        .collect()
}

fn reading(descriptor: &SensorDescriptor, raw: Option<&WireValue>) -> SensorReading {
    let value = raw
        .filter(|raw| !descriptor.is_invalid(raw))
        .and_then(|raw| from_device(descriptor.data_type, &descriptor.format, raw));
    SensorReading {
        block_id: descriptor.block_id,
        sensor_id: descriptor.sensor_id,
        key: descriptor.key(),
        value,
    }
}

/// Locate `block` / `sensor` inside the `/status` document.
fn gen1_status_value(status: &Gen1Status, block: &str, sensor: &str) -> Option<WireValue> {
    if block == "device" {
        return match sensor {
            "deviceTemp" => status.temperature.map(WireValue::from),
            "overtemp" => status.overtemperature.map(WireValue::from),
            _ => None,
        };
    }

    let (kind, index) = block.rsplit_once('_')?;
    let index: usize = index.parse().ok()?;
    match kind {
        "relay" => match sensor {
            "output" => status.relays.get(index).map(|r| r.ison.into()),
            "power" => status.meters.get(index)?.power.map(WireValue::from),
            "energy" => status.meters.get(index)?.total.map(WireValue::from),
            _ => None,
        },
        "roller" => {
            let roller = status.rollers.get(index)?;
            match sensor {
                "roller" => roller.state.as_deref().map(WireValue::from),
                "rollerPos" => roller.current_pos.map(WireValue::from),
                "rollerPower" | "power" => roller.power.map(WireValue::from),
                _ => None,
            }
        }
        "light" => {
            let light = status.lights.get(index)?;
            let value = match sensor {
                "output" => return Some(light.ison.into()),
                "mode" => return light.mode.as_deref().map(WireValue::from),
                "brightness" => light.brightness,
                "red" => light.red,
                "green" => light.green,
                "blue" => light.blue,
                "white" => light.white,
                "gain" => light.gain,
                "colorTemp" => light.temp,
                _ => None,
            };
            value.map(WireValue::from)
        }
        "emeter" => {
            let emeter = status.emeters.get(index)?;
            let value = match sensor {
                "power" => emeter.power,
                "voltage" => emeter.voltage,
                "current" => emeter.current,
                "energy" => emeter.total,
                _ => None,
            };
            value.map(WireValue::from)
        }
        "input" => {
            let input = status.inputs.get(index)?;
            match sensor {
                "input" => Some(input.input.into()),
                "inputEvent" => input.event.as_deref().map(WireValue::from),
                _ => None,
            }
        }
        _ => None,
    }
}

// ── Gen2 descriptors ─────────────────────────────────────────────────

/// Fixed attribute set per configured component.
pub fn describe_gen2(config: &Gen2DeviceConfig) -> Vec<PropertyDescriptor> {
    let mut out = Vec::new();

    for switch in &config.switches {
        let named = |attribute, data_type| {
            PropertyDescriptor::new("switch", switch.id, attribute, data_type)
                .with_name(switch.name.as_deref())
        };
        out.push(named("output", DataType::Switch).with_format(Format::switch()).settable());
        out.push(named("power", DataType::Float).with_unit("W"));
        out.push(named("voltage", DataType::Float).with_unit("V"));
        out.push(named("current", DataType::Float).with_unit("A"));
        out.push(named("energy", DataType::Float).with_unit("Wh"));
        out.push(named("temperature", DataType::Float).with_unit("°C"));
    }

    for cover in &config.covers {
        let named = |attribute, data_type| {
            PropertyDescriptor::new("cover", cover.id, attribute, data_type)
                .with_name(cover.name.as_deref())
        };
        out.push(named("state", DataType::Cover).with_format(Format::gen2_cover()).settable());
        out.push(named("position", DataType::UChar).with_unit("%").settable());
        out.push(named("power", DataType::Float).with_unit("W"));
        out.push(named("energy", DataType::Float).with_unit("Wh"));
    }

    for light in &config.lights {
        let named = |attribute, data_type| {
            PropertyDescriptor::new("light", light.id, attribute, data_type)
                .with_name(light.name.as_deref())
        };
        out.push(named("output", DataType::Switch).with_format(Format::switch()).settable());
        out.push(named("brightness", DataType::UChar).with_unit("%").settable());
    }

    for input in &config.inputs {
        out.push(
            PropertyDescriptor::new("input", input.id, "state", DataType::Boolean)
                .with_name(input.name.as_deref()),
        );
    }

    for sensor in &config.temperatures {
        out.push(
            PropertyDescriptor::new("temperature", sensor.id, "temperature", DataType::Float)
                .with_name(sensor.name.as_deref())
                .with_unit("°C"),
        );
    }

    for sensor in &config.humidities {
        out.push(
            PropertyDescriptor::new("humidity", sensor.id, "humidity", DataType::Float)
                .with_name(sensor.name.as_deref())
                .with_unit("%"),
        );
    }

    for power in &config.device_power {
        let named = |attribute, data_type| {
            PropertyDescriptor::new("devicepower", power.id, attribute, data_type)
                .with_name(power.name.as_deref())
        };
        out.push(named("battery", DataType::Float).with_unit("%"));
        out.push(named("battery_voltage", DataType::Float).with_unit("V"));
        out.push(named("external", DataType::Boolean));
    }

    out
}

// ── Gen2 readings ────────────────────────────────────────────────────

#[derive(Default)]
struct RawAttributes(Vec<(String, WireValue)>);

impl RawAttributes {
    fn add<V: Into<WireValue>>(&mut self, component: &str, id: u32, attribute: &str, value: Option<V>) {
        if let Some(value) = value {
            self.0.push((format!("{component}_{id}_{attribute}"), value.into()));
        }
    }
}

/// Normalize a full or partial Gen2 status.
///
/// Notifications carry partial objects; absent attributes yield no reading.
pub fn normalize_gen2_status(
    status: &Gen2DeviceStatus,
    descriptors: &[PropertyDescriptor],
) -> Vec<PropertyReading> {
    let mut raw = RawAttributes::default();

    for s in &status.switches {
        raw.add("switch", s.id, "output", s.output);
        raw.add("switch", s.id, "power", s.apower);
        raw.add("switch", s.id, "voltage", s.voltage);
        raw.add("switch", s.id, "current", s.current);
        raw.add("switch", s.id, "energy", s.aenergy.as_ref().and_then(|e| e.total));
        raw.add("switch", s.id, "temperature", s.temperature.as_ref().and_then(|t| t.t_c));
    }
    for c in &status.covers {
        raw.add("cover", c.id, "state", c.state.as_deref());
        raw.add("cover", c.id, "position", c.current_pos);
        raw.add("cover", c.id, "power", c.apower);
        raw.add("cover", c.id, "energy", c.aenergy.as_ref().and_then(|e| e.total));
    }
    for l in &status.lights {
        raw.add("light", l.id, "output", l.output);
        raw.add("light", l.id, "brightness", l.brightness);
    }
    for i in &status.inputs {
        raw.add("input", i.id, "state", i.state);
    }
    for t in &status.temperatures {
        raw.add("temperature", t.id, "temperature", t.t_c);
    }
    for h in &status.humidities {
        raw.add("humidity", h.id, "humidity", h.rh);
    }
    for p in &status.device_power {
        let battery = p.battery.as_ref();
        raw.add("devicepower", p.id, "battery", battery.and_then(|b| b.percent));
        raw.add("devicepower", p.id, "battery_voltage", battery.and_then(|b| b.voltage));
        raw.add("devicepower", p.id, "external", p.external.as_ref().and_then(|e| e.present));
    }

    raw.0
        .into_iter()
        .filter_map(|(key, value)| {
            let Some(descriptor) = descriptors.iter().find(|d| d.key == key) else {
                trace!(%key, "status attribute without descriptor");
                return None;
            };
            Some(PropertyReading {
                value: from_device(descriptor.data_type, &descriptor.format, &value),
                key,
            })
        })
        .collect()
}

// ── Writes ───────────────────────────────────────────────────────────

/// Wire value for a Gen1 `set_device_state` call.
pub fn gen1_write_value(
    descriptor: &SensorDescriptor,
    value: &NormalizedValue,
) -> Result<WireValue, CoreError> {
    write_value(
        &descriptor.key(),
        descriptor.settable,
        descriptor.data_type,
        &descriptor.format,
        value,
    )
}

/// Wire value for a Gen2 HTTP or WebSocket write.
pub fn gen2_write_value(
    descriptor: &PropertyDescriptor,
    value: &NormalizedValue,
) -> Result<WireValue, CoreError> {
    write_value(
        &descriptor.key,
        descriptor.settable,
        descriptor.data_type,
        &descriptor.format,
        value,
    )
}

fn write_value(
    key: &str,
    settable: bool,
    data_type: DataType,
    format: &Format,
    value: &NormalizedValue,
) -> Result<WireValue, CoreError> {
    if !settable {
        return Err(CoreError::Unsupported {
            operation: format!("write '{key}'"),
            required: "a settable property".into(),
        });
    }
    to_device(data_type, format, value).ok_or_else(|| CoreError::InvalidValue {
        key: key.to_owned(),
        reason: format!("'{value}' has no {data_type} representation"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::SWITCH_ON;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plug_description() -> Gen1Description {
        serde_json::from_value(json!({
            "blk": [{"I": 1, "D": "relay_0"}, {"I": 2, "D": "device"}],
            "sen": [
                {"I": 1101, "T": "S", "D": "output", "R": "0/1", "L": 1},
                {"I": 4101, "T": "P", "D": "power", "U": "W", "R": ["0/3500", "-1"], "L": 1},
                {"I": 3104, "T": "T", "D": "deviceTemp", "U": "C", "R": ["-40/300", "999"], "L": 2},
                {"I": 9999, "T": "S", "D": "orphan", "R": "0/1", "L": 7}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn gen1_descriptors_follow_links() {
        let descriptors = describe_gen1(&plug_description());
        assert_eq!(descriptors.len(), 3);

        let output = &descriptors[0];
        assert_eq!(output.key(), "relay_0_output");
        assert_eq!(output.data_type, DataType::Switch);
        assert!(output.settable);

        let power = &descriptors[1];
        assert_eq!(power.data_type, DataType::Int);
        assert_eq!(power.invalid, Some(WireValue::Int(-1)));
        assert!(!power.settable);
    }

    #[test]
    fn coap_report_honours_sentinels() {
        let descriptors = describe_gen1(&plug_description());
        let report: Gen1StatusReport =
            serde_json::from_value(json!({"G": [[0, 1101, 1], [0, 4101, -1], [0, 3104, 41], [0, 5555, 3]]}))
                .unwrap();

        let readings = normalize_gen1_report(&report, &descriptors);
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].value, Some(NormalizedValue::Enum(SWITCH_ON.into())));
        assert_eq!(readings[1].value, None);
        assert_eq!(readings[2].value, Some(NormalizedValue::Int(41)));
    }

    #[test]
    fn http_status_maps_onto_descriptors() {
        let descriptors = describe_gen1(&plug_description());
        let status: Gen1Status = serde_json::from_value(json!({
            "relays": [{"ison": false, "has_timer": false}],
            "meters": [{"power": 12.0, "is_valid": true}],
            "temperature": 45.5
        }))
        .unwrap();

        let readings = normalize_gen1_status(&status, &descriptors);
        let keys: Vec<_> = readings.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["relay_0_output", "relay_0_power", "device_deviceTemp"]);
        assert_eq!(readings[1].value, Some(NormalizedValue::Int(12)));
        // Fractional readings of an integer range are truncated.
        assert_eq!(readings[2].value, Some(NormalizedValue::Int(45)));
    }

    fn plus_config() -> Gen2DeviceConfig {
        serde_json::from_value(json!({
            "switch:0": {"id": 0, "name": "Heater"},
            "cover:1": {"id": 1},
            "input:0": {"id": 0, "type": "button"}
        }))
        .unwrap()
    }

    #[test]
    fn gen2_descriptors_cover_components() {
        let descriptors = describe_gen2(&plus_config());
        let keys: Vec<_> = descriptors.iter().map(|d| d.key.as_str()).collect();
        assert!(keys.contains(&"switch_0_output"));
        assert!(keys.contains(&"cover_1_position"));
        assert!(keys.contains(&"input_0_state"));
        assert_eq!(descriptors[0].name.as_deref(), Some("Heater"));
    }

    #[test]
    fn gen2_partial_status_only_yields_present_attributes() {
        let descriptors = describe_gen2(&plus_config());
        let status: Gen2DeviceStatus = serde_json::from_value(json!({
            "switch:0": {"id": 0, "output": true},
            "cover:1": {"id": 1, "state": "closing", "current_pos": 40},
            "switch:9": {"id": 9, "output": false}
        }))
        .unwrap();

        let readings = normalize_gen2_status(&status, &descriptors);
        assert_eq!(
            readings,
            vec![
                PropertyReading {
                    key: "switch_0_output".into(),
                    value: Some(NormalizedValue::Enum(SWITCH_ON.into())),
                },
                PropertyReading {
                    key: "cover_1_state".into(),
                    value: Some(NormalizedValue::Enum("closing".into())),
                },
                PropertyReading {
                    key: "cover_1_position".into(),
                    value: Some(NormalizedValue::Int(40)),
                },
            ]
        );
    }

    #[test]
    fn writes_go_through_the_format() {
        let descriptors = describe_gen2(&plus_config());
        let output = descriptors.iter().find(|d| d.key == "switch_0_output").unwrap();
        assert_eq!(
            gen2_write_value(output, &NormalizedValue::Bool(true)).unwrap(),
            WireValue::Text("on".into())
        );

        let state = descriptors.iter().find(|d| d.key == "cover_1_state").unwrap();
        let err = gen2_write_value(state, &NormalizedValue::Enum("closing".into())).unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));

        let power = descriptors.iter().find(|d| d.key == "switch_0_power").unwrap();
        let err = gen2_write_value(power, &NormalizedValue::Float(1.0)).unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
    }

    #[test]
    fn gen1_roller_writes_use_command_literals() {
        let description: Gen1Description = serde_json::from_value(json!({
            "blk": [{"I": 1, "D": "roller_0"}],
            "sen": [{"I": 1102, "T": "S", "D": "roller", "R": "open/close/stop", "L": 1}]
        }))
        .unwrap();
        let descriptors = describe_gen1(&description);
        let wire = gen1_write_value(&descriptors[0], &NormalizedValue::Enum("close".into())).unwrap();
        assert_eq!(wire, WireValue::Text("close".into()));
    }
}
