use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{}", name)
    }
}

/// Which modules emit debug output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugCategories {
    /// Adapter state and device provisioning
    pub simulation: bool,
    /// Discovery, connect, read/write
    pub gatt: bool,
    /// Control protocol decoding
    pub protocol: bool,
    /// Test runner
    pub harness: bool,
    /// Everything
    pub all: bool,
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Deadline for a regular test case
    #[serde(with = "duration_millis")]
    pub test_timeout: Duration,

    /// Deadline for a test case marked `timeout=long`
    #[serde(with = "duration_millis")]
    pub long_test_timeout: Duration,

    /// Capacity of the request channel into the simulation task
    pub channel_capacity: usize,

    /// Capacity of each event subscriber channel
    pub event_buffer: usize,

    /// Log level
    pub log_level: LogLevel,

    /// Optional log file
    pub log_file: Option<PathBuf>,

    /// Whether to log to stderr
    pub console_logging: bool,

    /// Debug categories
    pub debug: DebugCategories,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            test_timeout: Duration::from_secs(10),
            long_test_timeout: Duration::from_secs(60),
            channel_capacity: 100,
            event_buffer: 100,
            log_level: LogLevel::Info,
            log_file: None,
            console_logging: true,
            debug: DebugCategories::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the default location, falling back to defaults
    /// when no file exists
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_settings_path();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a JSON file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as JSON
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.test_timeout.is_zero() {
            return Err(ConfigError::Invalid("test_timeout must be non-zero".to_string()));
        }
        if self.long_test_timeout < self.test_timeout {
            return Err(ConfigError::Invalid(
                "long_test_timeout must not be shorter than test_timeout".to_string(),
            ));
        }
        if self.channel_capacity == 0 || self.event_buffer == 0 {
            return Err(ConfigError::Invalid("channel capacities must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Deadline for a test case
    pub fn timeout_for(&self, long: bool) -> Duration {
        if long {
            self.long_test_timeout
        } else {
            self.test_timeout
        }
    }
}

/// Get the default settings path
pub fn default_settings_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|config_dir| config_dir.join("bluebridge").join("settings.json"))
        .unwrap_or_else(|| PathBuf::from("settings.json"))
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
