//! Runtime configuration of the sled stack
//!
//! The configuration is read from a TOML file. Every field has a default, so an empty file is a
//! valid configuration:
//!
//! ```toml
//! node_id = 1
//! can_device = "can0"
//!
//! [watchdog]
//! timeout_ms = 2000
//! period_ms = 3000
//!
//! [profiles]
//! capacity = 99
//! task_base = 201
//! default_table = 2
//! ```

use std::path::Path;

use serde::Deserialize;
use sled_common::NodeId;
use snafu::{ResultExt, Snafu};

/// Error loading a [`SledConfig`]
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// The file could not be read
    #[snafu(display("Failed to read {path}: {source}"))]
    Io {
        /// The path which was read
        path: String,
        /// The underlying error
        source: std::io::Error,
    },
    /// The file is not a valid configuration
    #[snafu(display("Failed to parse configuration: {source}"))]
    Parse {
        /// The underlying error
        source: toml::de::Error,
    },
    /// The file parsed, but a value is out of range
    #[snafu(display("Invalid configuration: {reason}"))]
    Invalid {
        /// What is wrong with the configuration
        reason: String,
    },
}

fn default_can_device() -> String {
    "can0".into()
}

/// Top level configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SledConfig {
    /// Node ID of the drive
    #[serde(default)]
    pub node_id: NodeId,
    /// Name of the CAN adapter
    #[serde(default = "default_can_device")]
    pub can_device: String,
    /// Heartbeat watchdog settings
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// Motion profile table settings
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

impl Default for SledConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId::default(),
            can_device: default_can_device(),
            watchdog: WatchdogConfig::default(),
            profiles: ProfilesConfig::default(),
        }
    }
}

impl SledConfig {
    /// Read a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).context(IoSnafu {
            path: path.display().to_string(),
        })?;
        Self::load_from_str(&text)
    }

    /// Parse a configuration from a TOML string
    pub fn load_from_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).context(ParseSnafu)?;
        config.profiles.validate()?;
        Ok(config)
    }
}

/// Heartbeat watchdog settings
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct WatchdogConfig {
    /// Maximum time allowed between two heartbeats, in milliseconds
    pub timeout_ms: u32,
    /// How often the watchdog is checked, in milliseconds
    pub period_ms: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            period_ms: 3000,
        }
    }
}

/// Motion profile table settings
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ProfilesConfig {
    /// Number of profile slots
    pub capacity: usize,
    /// Device motion task number used by slot 0. Slot n uses `task_base + n`.
    pub task_base: u16,
    /// Profile table assigned to newly created profiles
    pub default_table: u32,
}

impl ProfilesConfig {
    /// The number of slots which fit between `task_base` and the last device task
    pub fn max_capacity(&self) -> usize {
        (u16::MAX - self.task_base) as usize + 1
    }

    /// Check that every slot maps onto a device task other than task 0
    ///
    /// Two slots are always reserved for the sinusoid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_base == 0 {
            return InvalidSnafu {
                reason: "profiles.task_base must not be 0, task 0 is the working task",
            }
            .fail();
        }
        if self.capacity < 2 {
            return InvalidSnafu {
                reason: format!("profiles.capacity is {}, at least 2 needed", self.capacity),
            }
            .fail();
        }
        if self.capacity > self.max_capacity() {
            return InvalidSnafu {
                reason: format!(
                    "profiles.capacity {} does not fit above task_base {}, at most {} slots",
                    self.capacity,
                    self.task_base,
                    self.max_capacity()
                ),
            }
            .fail();
        }
        Ok(())
    }
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            capacity: 99,
            task_base: 201,
            default_table: 2,
        }
    }
}
