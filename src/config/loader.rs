//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use crate::state::PortConfig;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_LINK";

/// Config file name in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "serial-link.toml";

/// Config file name inside the per-user config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_LINK_CONFIG";

/// Baud rate used when the link is defined only through the environment.
const FALLBACK_BAUD_RATE: u32 = 9600;

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_LINK_CONFIG` environment variable (explicit path)
    /// 2. `./serial-link.toml` (current directory)
    /// 3. `~/.config/serial-link/config.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\serial-link\config.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. XDG config directory (Linux/macOS) or APPDATA (Windows)
    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join("serial-link").join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_number<T: std::str::FromStr>(suffix: &str, what: &str) -> ConfigResult<Option<T>> {
    let var = format!("{}_{}", ENV_PREFIX, suffix);
    match std::env::var(&var) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, what)),
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// - `SERIAL_LINK_PORT=/dev/ttyUSB0` (creates the link if the file had none)
/// - `SERIAL_LINK_BAUD=115200`
/// - `SERIAL_LINK_READ_TIMEOUT_MS=20`
/// - `SERIAL_LINK_WRITE_TIMEOUT_MS=20`
/// - `SERIAL_LINK_LOG_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let baud: Option<u32> = env_number("BAUD", "Invalid baud rate")?;

    if let Ok(port) = std::env::var(format!("{}_PORT", ENV_PREFIX)) {
        match config.link.as_mut() {
            Some(link) => link.port_name = port,
            None => {
                config.link = Some(PortConfig::new(port, baud.unwrap_or(FALLBACK_BAUD_RATE)));
            }
        }
    }

    if let Some(link) = config.link.as_mut() {
        if let Some(baud) = baud {
            link.baud_rate = baud;
        }
        if let Some(ms) = env_number("READ_TIMEOUT_MS", "Invalid timeout")? {
            link.read_timeout_ms = ms;
        }
        if let Some(ms) = env_number("WRITE_TIMEOUT_MS", "Invalid timeout")? {
            link.write_timeout_ms = ms;
        }
    }

    if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
        config.logging.level = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_no_env_leaves_defaults() {
        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();
        assert!(config.link.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    #[serial]
    fn test_env_creates_link() {
        env::set_var("SERIAL_LINK_PORT", "COM9");
        env::set_var("SERIAL_LINK_READ_TIMEOUT_MS", "20");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();
        let link = config.link().unwrap();
        assert_eq!(link.port_name, "COM9");
        assert_eq!(link.baud_rate, 9600);
        assert_eq!(link.read_timeout_ms, 20);

        // Clean up
        env::remove_var("SERIAL_LINK_PORT");
        env::remove_var("SERIAL_LINK_READ_TIMEOUT_MS");
    }

    #[test]
    #[serial]
    fn test_env_parse_error() {
        env::set_var("SERIAL_LINK_BAUD", "fast");

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));

        env::remove_var("SERIAL_LINK_BAUD");
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link.toml");
        std::fs::write(
            &path,
            "[link]\nport_name = \"/dev/ttyACM0\"\nbaud_rate = 57600\n",
        )
        .unwrap();
        env::set_var("SERIAL_LINK_BAUD", "115200");

        let loader = ConfigLoader::load_from(&path).unwrap();
        let link = loader.config().link().unwrap();
        assert_eq!(link.port_name, "/dev/ttyACM0");
        assert_eq!(link.baud_rate, 115200);
        assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));

        env::remove_var("SERIAL_LINK_BAUD");
    }

    #[test]
    #[serial]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from("/nonexistent/serial-link.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
