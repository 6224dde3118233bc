//! Server configuration.
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `MATTERLINK_`-prefixed environment variables (`__` separates nested
//! keys, e.g. `MATTERLINK_BRIDGE__URL`).

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use matterlink_core::ControllerConfig;

pub const DEFAULT_CONFIG_FILE: &str = "matterlink.toml";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config sections ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Socket the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub bridge: BridgeSection,

    #[serde(default)]
    pub database: DatabaseSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            bridge: BridgeSection::default(),
            database: DatabaseSection::default(),
        }
    }
}

/// Upstream bridge-server session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeSection {
    /// WebSocket endpoint, e.g. `ws://localhost:5580/ws`.
    #[serde(default = "default_bridge_url")]
    pub url: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_commission_timeout")]
    pub commission_timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            connect_timeout_secs: default_connect_timeout(),
            call_timeout_secs: default_call_timeout(),
            commission_timeout_secs: default_commission_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSection {
    /// SQLite connection string.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".into()
}
fn default_bridge_url() -> String {
    "ws://localhost:5580/ws".into()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_call_timeout() -> u64 {
    20
}
fn default_commission_timeout() -> u64 {
    120
}
fn default_database_url() -> String {
    "sqlite://matterlink.db".into()
}

// ── Loading ─────────────────────────────────────────────────────────

impl ServerConfig {
    /// Load from defaults, an optional TOML file, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("MATTERLINK_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Translate the bridge section into controller settings.
    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        let url = Url::parse(&self.bridge.url).map_err(|e| ConfigError::Validation {
            field: "bridge.url".into(),
            reason: e.to_string(),
        })?;

        let mut config = ControllerConfig::new(url);
        config.connect_timeout = Duration::from_secs(self.bridge.connect_timeout_secs);
        config.call_timeout = Duration::from_secs(self.bridge.call_timeout_secs);
        config.commission_timeout = Duration::from_secs(self.bridge.commission_timeout_secs);
        Ok(config)
    }
}
