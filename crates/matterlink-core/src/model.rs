//! Device records as exposed to consumers of the registry.

use serde::{Deserialize, Serialize};

/// Endpoint carrying the application clusters on every device this
/// system drives. Endpoint 0 is reserved for node-level metadata.
pub const DEFAULT_ENDPOINT_ID: u16 = 1;

// ── DeviceType ───────────────────────────────────────────────────────

/// Functional class inferred from which attributes a node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Switchable only.
    Light,
    /// Switchable with level control.
    DimmableLight,
    /// Exposes neither cluster this system understands.
    Unknown,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::DimmableLight => "dimmable_light",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── DeviceState ──────────────────────────────────────────────────────

/// Sparse functional state. Fields a device does not expose stay `None`
/// and are omitted from serialized output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,

    /// Brightness in percent, 0..=100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
}

// ── Device ───────────────────────────────────────────────────────────

/// One commissioned node, in consumer-facing vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub node_id: u64,
    pub name: String,
    pub device_type: DeviceType,
    /// Reachability as of the last refresh.
    pub is_online: bool,
    pub endpoint_id: u16,
    pub state: DeviceState,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn device_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(DeviceType::DimmableLight).unwrap(),
            json!("dimmable_light")
        );
        assert_eq!(serde_json::to_value(DeviceType::Light).unwrap(), json!("light"));
        assert_eq!(
            serde_json::to_value(DeviceType::Unknown).unwrap(),
            json!("unknown")
        );
    }

    #[test]
    fn unexposed_state_fields_are_omitted() {
        let state = DeviceState {
            on: Some(true),
            brightness: None,
        };
        assert_eq!(serde_json::to_value(state).unwrap(), json!({ "on": true }));
    }

    #[test]
    fn device_round_trips_through_json() {
        let device = Device {
            node_id: 12,
            name: "Hallway".to_owned(),
            device_type: DeviceType::DimmableLight,
            is_online: true,
            endpoint_id: DEFAULT_ENDPOINT_ID,
            state: DeviceState {
                on: Some(true),
                brightness: Some(50),
            },
        };

        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["device_type"], "dimmable_light");
        assert_eq!(value["state"]["brightness"], 50);

        let back: Device = serde_json::from_value(value).unwrap();
        assert_eq!(back, device);
    }
}
