//! Command translation: consumer-facing verbs to cluster commands.
//!
//! Parsing is strict and happens before any network traffic, so a bad
//! request never reaches the bridge server.

use serde_json::{Value, json};

use crate::convert::percent_to_level;
use crate::error::CoreError;

/// Cluster command names on the wire.
mod wire {
    pub const ON: &str = "on_off.on";
    pub const OFF: &str = "on_off.off";
    pub const TOGGLE: &str = "on_off.toggle";
    pub const MOVE_TO_LEVEL: &str = "level_control.move_to_level";
}

/// Level transitions fade over this many tenths of a second.
const TRANSITION_TIME: u64 = 1;

/// A validated device command, ready for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    On,
    Off,
    Toggle,
    /// Brightness in percent, 0..=100.
    MoveToLevel { percent: u8 },
}

impl DeviceCommand {
    /// Parse a verb and its parameters.
    ///
    /// `level` takes an integer `level` parameter in 0..=100, defaulting
    /// to 100 when absent. Anything out of range or non-integral is
    /// rejected here.
    pub fn parse(name: &str, params: &Value) -> Result<Self, CoreError> {
        match name {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "toggle" => Ok(Self::Toggle),
            "level" => {
                let percent = match params.get("level") {
                    None => 100,
                    Some(value) => value.as_i64().ok_or_else(|| CoreError::InvalidArgument {
                        message: format!("'level' must be an integer, got {value}"),
                    })?,
                };
                let percent =
                    u8::try_from(percent)
                        .ok()
                        .filter(|p| *p <= 100)
                        .ok_or_else(|| CoreError::InvalidArgument {
                            message: format!("'level' must be in 0..=100, got {percent}"),
                        })?;
                Ok(Self::MoveToLevel { percent })
            }
            other => Err(CoreError::UnsupportedCommand {
                command: other.to_owned(),
            }),
        }
    }

    /// Cluster command name on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::On => wire::ON,
            Self::Off => wire::OFF,
            Self::Toggle => wire::TOGGLE,
            Self::MoveToLevel { .. } => wire::MOVE_TO_LEVEL,
        }
    }

    /// Cluster command parameters on the wire.
    pub fn wire_params(self) -> Value {
        match self {
            Self::On | Self::Off | Self::Toggle => json!({}),
            Self::MoveToLevel { percent } => json!({
                "level": percent_to_level(percent),
                "transition_time": TRANSITION_TIME,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn switch_verbs_take_no_parameters() {
        for (verb, name) in [
            ("on", "on_off.on"),
            ("off", "on_off.off"),
            ("toggle", "on_off.toggle"),
        ] {
            let cmd = DeviceCommand::parse(verb, &json!({})).unwrap();
            assert_eq!(cmd.wire_name(), name);
            assert_eq!(cmd.wire_params(), json!({}));
        }
    }

    #[test]
    fn level_converts_percent_to_wire_units() {
        let cmd = DeviceCommand::parse("level", &json!({ "level": 80 })).unwrap();
        assert_eq!(cmd, DeviceCommand::MoveToLevel { percent: 80 });
        assert_eq!(cmd.wire_name(), "level_control.move_to_level");
        assert_eq!(
            cmd.wire_params(),
            json!({ "level": 203, "transition_time": 1 })
        );
    }

    #[test]
    fn level_defaults_to_full_brightness() {
        let cmd = DeviceCommand::parse("level", &json!({})).unwrap();
        assert_eq!(cmd, DeviceCommand::MoveToLevel { percent: 100 });
        assert_eq!(cmd.wire_params()["level"], 254);
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        for bad in [json!({ "level": 150 }), json!({ "level": -5 })] {
            let err = DeviceCommand::parse("level", &bad).unwrap_err();
            assert!(matches!(err, CoreError::InvalidArgument { .. }), "{bad}");
        }
    }

    #[test]
    fn non_integer_level_is_rejected() {
        for bad in [json!({ "level": "eighty" }), json!({ "level": 50.5 })] {
            let err = DeviceCommand::parse("level", &bad).unwrap_err();
            assert!(matches!(err, CoreError::InvalidArgument { .. }), "{bad}");
        }
    }

    #[test]
    fn unknown_verb_is_unsupported() {
        let err = DeviceCommand::parse("disco", &json!({})).unwrap_err();
        match err {
            CoreError::UnsupportedCommand { command } => assert_eq!(command, "disco"),
            other => panic!("expected UnsupportedCommand, got {other:?}"),
        }
    }
}
