//! Daemon configuration.
//!
//! Values are resolved in this order, later sources winning:
//! 1. Built-in defaults
//! 2. TOML config file (`--config`, or the per-user default path if present)
//! 3. `CHATD_LISTEN` environment variable
//! 4. `--listen` command-line flag (applied by the CLI)
//!
//! Example `chatd.toml`:
//!
//! ```toml
//! listen = "127.0.0.1:9000"
//! max_line_length = 4096
//! log_filter = "chatd=debug"
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default listen address (all interfaces, port 8080).
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default maximum inbound line length (1 MB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1_048_576;

/// Environment variable overriding the listen address.
pub const LISTEN_ENV: &str = "CHATD_LISTEN";

/// Configuration for the chat daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatdConfig {
    /// Address the listener binds to
    pub listen: SocketAddr,

    /// Longest accepted inbound line in bytes; longer lines disconnect the client
    pub max_line_length: usize,

    /// `tracing` filter used when `RUST_LOG` is not set
    pub log_filter: Option<String>,
}

impl Default for ChatdConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            log_filter: None,
        }
    }
}

impl ChatdConfig {
    /// Per-user config file location (`<config dir>/linechat/chatd.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("linechat").join("chatd.toml"))
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ChatdConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolves the file and environment layers.
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// only when the file is present; otherwise built-in defaults apply.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_listen_override(std::env::var(LISTEN_ENV).ok().as_deref())?;
        Ok(config)
    }

    /// Replaces the listen address with `value` when one is given.
    pub fn apply_listen_override(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        if let Some(raw) = value {
            self.listen = raw.trim().parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidListen {
                    value: raw.to_string(),
                    error: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_line_length",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid listen address {value:?}: {error}")]
    InvalidListen { value: String, error: String },

    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ChatdConfig::default();
        assert_eq!(config.listen, DEFAULT_LISTEN_ADDR.parse().unwrap());
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(ChatdConfig::from_toml_str("").unwrap(), ChatdConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = ChatdConfig::from_toml_str("listen = \"127.0.0.1:9000\"").unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ChatdConfig::from_toml_str("port = 8080").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_line_length_rejected() {
        let err = ChatdConfig::from_toml_str("max_line_length = 0").unwrap_err();
        assert!(err.to_string().contains("max_line_length"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen = \"[::1]:7000\"").unwrap();
        writeln!(file, "max_line_length = 512").unwrap();
        writeln!(file, "log_filter = \"chatd=debug\"").unwrap();

        let config = ChatdConfig::load(file.path()).unwrap();
        assert_eq!(config.listen, "[::1]:7000".parse().unwrap());
        assert_eq!(config.max_line_length, 512);
        assert_eq!(config.log_filter.as_deref(), Some("chatd=debug"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = ChatdConfig::resolve(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_listen_override() {
        let mut config = ChatdConfig::default();

        config.apply_listen_override(None).unwrap();
        assert_eq!(config.listen, DEFAULT_LISTEN_ADDR.parse().unwrap());

        config.apply_listen_override(Some(" 127.0.0.1:1234 ")).unwrap();
        assert_eq!(config.listen, "127.0.0.1:1234".parse().unwrap());
    }

    #[test]
    fn test_invalid_listen_override() {
        let mut config = ChatdConfig::default();
        let err = config.apply_listen_override(Some("not-an-addr")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidListen { .. }));
        assert_eq!(config.listen, DEFAULT_LISTEN_ADDR.parse().unwrap());
    }
}
