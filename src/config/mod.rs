//! Configuration module for serial-link.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_LINK_CONFIG` environment variable (explicit path)
//! 2. `./serial-link.toml` (current directory)
//! 3. `~/.config/serial-link/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-link\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `SERIAL_LINK_PORT`, `SERIAL_LINK_BAUD`
//! - `SERIAL_LINK_READ_TIMEOUT_MS`, `SERIAL_LINK_WRITE_TIMEOUT_MS`
//! - `SERIAL_LINK_LOG_LEVEL`
//!
//! # Example
//!
//! ```rust,ignore
//! use serial_link::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let link = loader.config().link()?;
//! println!("Port: {} @ {}", link.port_name, link.baud_rate);
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig};
