//! Service configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via GREETER_CONFIG)
//! 3. Environment variables

use chrono::NaiveTime;
use greeter_core::Thresholds;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tracked chat.
    pub chat: ChatConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Sweep timing.
    pub sweep: SweepConfig,
    /// Adapter listener.
    pub network: NetworkConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("GREETER_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.chat.apply_env_overrides();
        self.storage.apply_env_overrides();
        self.sweep.apply_env_overrides();
        self.network.apply_env_overrides();
    }

    /// Checks values that would make the service misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.chat_id == 0 {
            return Err(ConfigError::ValidationError(
                "chat.chat_id is not set".to_string(),
            ));
        }
        self.sweep.validate()
    }
}

/// Tracked chat configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Platform id of the group whose members are tracked.
    pub chat_id: i64,
}

impl ChatConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("GREETER_CHAT_ID") {
            if let Ok(parsed) = id.parse() {
                self.chat_id = parsed;
            }
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the membership state file.
    pub state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("./data/members.json"),
        }
    }
}

impl StorageConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("GREETER_STATE_FILE") {
            self.state_file = PathBuf::from(path);
        }
    }
}

/// Sweep timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Seconds after joining before a member is reminded.
    pub notify_after_secs: u64,
    /// Seconds after joining before a reminded member is penalized.
    pub kick_after_secs: u64,
    /// Time of day (UTC) of the daily sweep.
    pub daily_at: NaiveTime,
    /// Delay before the sweep triggered by a test notification.
    pub test_delay_secs: u64,
    /// Start the daily sweep at boot instead of waiting for start-tracking.
    pub autostart: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            notify_after_secs: thresholds.notify_after.as_secs(),
            kick_after_secs: thresholds.kick_after.as_secs(),
            daily_at: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(),
            test_delay_secs: 2,
            autostart: false,
        }
    }
}

impl SweepConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(secs) = std::env::var("GREETER_NOTIFY_AFTER") {
            if let Ok(n) = secs.parse() {
                self.notify_after_secs = n;
            }
        }

        if let Ok(secs) = std::env::var("GREETER_KICK_AFTER") {
            if let Ok(n) = secs.parse() {
                self.kick_after_secs = n;
            }
        }

        if let Ok(at) = std::env::var("GREETER_DAILY_AT") {
            if let Some(parsed) = parse_time_of_day(&at) {
                self.daily_at = parsed;
            }
        }

        if let Ok(secs) = std::env::var("GREETER_TEST_DELAY") {
            if let Ok(n) = secs.parse() {
                self.test_delay_secs = n;
            }
        }

        if let Ok(autostart) = std::env::var("GREETER_AUTOSTART") {
            self.autostart = autostart == "1" || autostart.to_lowercase() == "true";
        }
    }

    /// Returns the escalation thresholds.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(
            Duration::from_secs(self.notify_after_secs),
            Duration::from_secs(self.kick_after_secs),
        )
    }

    /// Returns the test notification delay as Duration.
    pub fn test_delay(&self) -> Duration {
        Duration::from_secs(self.test_delay_secs)
    }

    /// Validates sweep timing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notify_after_secs == 0 {
            return Err(ConfigError::ValidationError(
                "sweep.notify_after_secs must be greater than zero".to_string(),
            ));
        }
        if self.kick_after_secs < self.notify_after_secs {
            return Err(ConfigError::ValidationError(format!(
                "sweep.kick_after_secs ({}) must not be less than sweep.notify_after_secs ({})",
                self.kick_after_secs, self.notify_after_secs
            )));
        }
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the adapter connects to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7410)),
            idle_timeout_secs: 3600,
            max_connections: 16,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("GREETER_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("GREETER_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Ok(max) = std::env::var("GREETER_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Parses `HH:MM:SS` or `HH:MM`.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
