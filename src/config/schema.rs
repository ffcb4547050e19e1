//! Configuration schema definitions.
//!
//! The file has a `[link]` table holding a [`PortConfig`] and a `[logging]`
//! table. Both are optional; `port_name` and `baud_rate` are required inside
//! `[link]` when it is present.

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use crate::state::PortConfig;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link settings
    pub link: Option<PortConfig>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// The link settings, or an error naming what is missing.
    pub fn link(&self) -> ConfigResult<&PortConfig> {
        self.link
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("[link] port_name and baud_rate".into()))
    }

    /// Reject values no serial backend accepts.
    pub fn validate(&self) -> ConfigResult<()> {
        let Some(link) = &self.link else {
            return Ok(());
        };
        if link.port_name.trim().is_empty() {
            return Err(ConfigError::validation("link.port_name", "must not be empty"));
        }
        if link.baud_rate == 0 {
            return Err(ConfigError::validation("link.baud_rate", "must be positive"));
        }
        if !(5..=8).contains(&link.data_bits) {
            return Err(ConfigError::validation(
                "link.data_bits",
                format!("must be between 5 and 8, got {}", link.data_bits),
            ));
        }
        Ok(())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "pretty" or "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line format with colors
    Pretty,
    /// Single-line format
    #[default]
    Compact,
}
