//! Controller tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Connection and timeout settings for a [`Controller`].
///
/// [`Controller`]: crate::controller::Controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// WebSocket endpoint of the bridge server.
    pub url: Url,

    /// Budget for establishing the session.
    #[serde(with = "duration_secs", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Default per-call response budget.
    #[serde(with = "duration_secs", default = "default_call_timeout")]
    pub call_timeout: Duration,

    /// Budget for commissioning calls. Pairing negotiates over Bluetooth
    /// and Thread/Wi-Fi and routinely takes over a minute.
    #[serde(with = "duration_secs", default = "default_commission_timeout")]
    pub commission_timeout: Duration,
}

impl ControllerConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            connect_timeout: default_connect_timeout(),
            call_timeout: default_call_timeout(),
            commission_timeout: default_commission_timeout(),
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_commission_timeout() -> Duration {
    Duration::from_secs(120)
}

/// Durations as whole seconds in serialized form.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = ControllerConfig::new(Url::parse("ws://localhost:5580/ws").unwrap());
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.call_timeout, Duration::from_secs(20));
        assert_eq!(config.commission_timeout, Duration::from_secs(120));
    }

    #[test]
    fn deserializes_with_partial_overrides() {
        let config: ControllerConfig = serde_json::from_str(
            r#"{ "url": "ws://bridge:5580/ws", "call_timeout": 5 }"#,
        )
        .unwrap();
        assert_eq!(config.url.as_str(), "ws://bridge:5580/ws");
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.commission_timeout, Duration::from_secs(120));
    }
}
