//! Poller configuration loading from file and environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clawlist_types::BuyerProfile;
use serde::Deserialize;
use thiserror::Error;

use crate::poller::{PollerSettings, ShutdownPolicy};

/// Top-level poller configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matrix: MatrixConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Buyer agents watching the room. At least one is required.
    #[serde(default)]
    pub buyers: Vec<BuyerProfile>,
}

/// Homeserver connection settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatrixConfig {
    /// Base URL, e.g. `http://127.0.0.1:18008`.
    #[serde(default)]
    pub homeserver: String,

    /// Room id of the marketplace room, e.g. `!abc123:localhost`.
    #[serde(default)]
    pub market_room_id: String,
}

/// Poll loop timing and persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Where cursor and seen ids are persisted.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,

    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,

    /// Events per sync response for the market room.
    #[serde(default = "default_timeline_limit")]
    pub timeline_limit: u32,

    /// `detach` (default): on SIGINT/SIGTERM the binary waits for already
    /// scheduled triggers to fire before exiting; a second signal exits at
    /// once. `abort_pending`: scheduled triggers are cancelled on stop.
    #[serde(default)]
    pub shutdown: ShutdownPolicy,
}

/// Trigger delivery settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Agent CLI invoked once per trigger.
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_dispatch_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clawlist_poller=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

fn default_state_file() -> String {
    "state/poller.env".to_string()
}

fn default_delay_min_ms() -> u64 {
    30_000
}

fn default_delay_max_ms() -> u64 {
    90_000
}

fn default_timeline_limit() -> u32 {
    10
}

fn default_program() -> String {
    "openclaw".to_string()
}

fn default_dispatch_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            state_file: default_state_file(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            timeline_limit: default_timeline_limit(),
            shutdown: ShutdownPolicy::default(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_secs: default_dispatch_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Checks that the configuration can drive a poller.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first missing or
    /// inconsistent setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matrix.homeserver.trim().is_empty() {
            return Err(ConfigError::Invalid("matrix.homeserver is required".into()));
        }
        if self.matrix.market_room_id.trim().is_empty() {
            return Err(ConfigError::Invalid("matrix.market_room_id is required".into()));
        }
        if self.poller.state_file.trim().is_empty() {
            return Err(ConfigError::Invalid("poller.state_file is required".into()));
        }
        if self.buyers.is_empty() {
            return Err(ConfigError::Invalid("at least one [[buyers]] entry is required".into()));
        }
        if let Some(buyer) = self.buyers.iter().find(|b| b.access_token.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "buyer '{}' has no access_token",
                buyer.profile
            )));
        }
        if self.poller.delay_min_ms > self.poller.delay_max_ms {
            return Err(ConfigError::Invalid(format!(
                "poller.delay_min_ms ({}) exceeds poller.delay_max_ms ({})",
                self.poller.delay_min_ms, self.poller.delay_max_ms
            )));
        }
        Ok(())
    }

    /// Loop settings derived from this configuration.
    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            room_id: self.matrix.market_room_id.clone(),
            state_file: PathBuf::from(&self.poller.state_file),
            poll_interval: Duration::from_millis(self.poller.poll_interval_ms),
            delay_min: Duration::from_millis(self.poller.delay_min_ms),
            delay_max: Duration::from_millis(self.poller.delay_max_ms),
            shutdown: self.poller.shutdown,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but cannot drive a poller.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `CLAWLIST_HOMESERVER` overrides `matrix.homeserver`
/// - `CLAWLIST_MARKET_ROOM` overrides `matrix.market_room_id`
/// - `CLAWLIST_POLL_INTERVAL_MS` overrides `poller.poll_interval_ms`
/// - `CLAWLIST_STATE_FILE` overrides `poller.state_file`
/// - `CLAWLIST_LOG_LEVEL` overrides `logging.level`
/// - `CLAWLIST_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
/// Validation is separate; see [`Config::validate`].
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(homeserver) = var("CLAWLIST_HOMESERVER") {
        config.matrix.homeserver = homeserver;
    }
    if let Some(room) = var("CLAWLIST_MARKET_ROOM") {
        config.matrix.market_room_id = room;
    }
    if let Some(interval) = var("CLAWLIST_POLL_INTERVAL_MS") {
        if let Ok(parsed) = interval.parse() {
            config.poller.poll_interval_ms = parsed;
        }
    }
    if let Some(state_file) = var("CLAWLIST_STATE_FILE") {
        config.poller.state_file = state_file;
    }
    if let Some(level) = var("CLAWLIST_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("CLAWLIST_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
