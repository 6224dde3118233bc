//! Attribute translation: raw path-keyed node attributes to [`Device`]
//! records.
//!
//! Attribute paths are `"<endpoint>/<cluster>/<attribute>"` strings. The
//! three paths below are the full read surface; everything else a node
//! reports is ignored.

use serde_json::Value;

use crate::model::{DEFAULT_ENDPOINT_ID, Device, DeviceState, DeviceType};
use matterlink_api::NodeData;

/// OnOff cluster, `OnOff` attribute.
pub const ON_OFF_PATH: &str = "1/6/0";
/// LevelControl cluster, `CurrentLevel` attribute.
pub const LEVEL_PATH: &str = "1/8/0";
/// BasicInformation cluster, `NodeLabel` attribute (endpoint 0).
pub const NAME_PATH: &str = "0/40/14";

/// Wire levels span 0..=254; 2.54 wire units per percent.
const LEVEL_SCALE: f64 = 2.54;

// ── Brightness scaling ───────────────────────────────────────────────

/// Raw wire level (0..=254) to percent (0..=100), rounded half-up.
#[allow(clippy::as_conversions, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn level_to_percent(raw: f64) -> u8 {
    (raw / LEVEL_SCALE).round().clamp(0.0, 100.0) as u8
}

/// Percent (0..=100) to raw wire level (0..=254), rounded half-up.
#[allow(clippy::as_conversions, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percent_to_level(percent: u8) -> u8 {
    (f64::from(percent.min(100)) * LEVEL_SCALE).round() as u8
}

// ── Node translation ─────────────────────────────────────────────────

/// Build a [`Device`] from one raw node descriptor.
///
/// Absent or wrongly-typed attributes leave their state field `None`;
/// the functional class follows from which attributes resolved. A node
/// without a label gets a deterministic placeholder name.
pub fn device_from_node(node: &NodeData) -> Device {
    let on = node.attributes.get(ON_OFF_PATH).and_then(Value::as_bool);
    let brightness = node
        .attributes
        .get(LEVEL_PATH)
        .and_then(Value::as_f64)
        .map(level_to_percent);

    let name = node
        .attributes
        .get(NAME_PATH)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(|| format!("Device {}", node.node_id), str::to_owned);

    let device_type = match (on.is_some(), brightness.is_some()) {
        (_, true) => DeviceType::DimmableLight,
        (true, false) => DeviceType::Light,
        (false, false) => DeviceType::Unknown,
    };

    Device {
        node_id: node.node_id,
        name,
        device_type,
        is_online: node.available,
        endpoint_id: DEFAULT_ENDPOINT_ID,
        state: DeviceState { on, brightness },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node(id: u64, available: bool, attributes: Value) -> NodeData {
        serde_json::from_value(json!({
            "node_id": id,
            "available": available,
            "attributes": attributes,
        }))
        .unwrap()
    }

    #[test]
    fn dimmable_light_with_half_brightness() {
        let device = device_from_node(&node(
            12,
            true,
            json!({ ON_OFF_PATH: true, LEVEL_PATH: 127, NAME_PATH: "Hallway" }),
        ));

        assert_eq!(device.name, "Hallway");
        assert_eq!(device.device_type, DeviceType::DimmableLight);
        assert_eq!(device.state.on, Some(true));
        assert_eq!(device.state.brightness, Some(50));
        assert!(device.is_online);
        assert_eq!(device.endpoint_id, 1);
    }

    #[test]
    fn on_off_only_node_is_a_plain_light() {
        let device = device_from_node(&node(3, true, json!({ ON_OFF_PATH: false })));
        assert_eq!(device.device_type, DeviceType::Light);
        assert_eq!(device.state.on, Some(false));
        assert_eq!(device.state.brightness, None);
    }

    #[test]
    fn node_without_known_clusters_is_unknown() {
        let device = device_from_node(&node(4, false, json!({ "1/99/0": 7 })));
        assert_eq!(device.device_type, DeviceType::Unknown);
        assert_eq!(device.state, DeviceState::default());
        assert!(!device.is_online);
    }

    #[test]
    fn missing_label_falls_back_to_placeholder() {
        let device = device_from_node(&node(42, true, json!({ ON_OFF_PATH: true })));
        assert_eq!(device.name, "Device 42");
    }

    #[test]
    fn wrongly_typed_attributes_are_ignored() {
        let device = device_from_node(&node(
            5,
            true,
            json!({ ON_OFF_PATH: "yes", LEVEL_PATH: "bright", NAME_PATH: 99 }),
        ));
        assert_eq!(device.state.on, None);
        assert_eq!(device.state.brightness, None);
        assert_eq!(device.name, "Device 5");
        assert_eq!(device.device_type, DeviceType::Unknown);
    }

    #[test]
    fn level_scaling_hits_the_endpoints() {
        assert_eq!(level_to_percent(0.0), 0);
        assert_eq!(level_to_percent(127.0), 50);
        assert_eq!(level_to_percent(254.0), 100);
        assert_eq!(level_to_percent(1000.0), 100);

        assert_eq!(percent_to_level(0), 0);
        assert_eq!(percent_to_level(50), 127);
        assert_eq!(percent_to_level(80), 203);
        assert_eq!(percent_to_level(100), 254);
    }

    #[test]
    fn percent_survives_a_wire_round_trip_within_one() {
        for percent in 0..=100u8 {
            let back = level_to_percent(f64::from(percent_to_level(percent)));
            assert!(
                back.abs_diff(percent) <= 1,
                "{percent}% -> {} -> {back}%",
                percent_to_level(percent)
            );
        }
    }
}
