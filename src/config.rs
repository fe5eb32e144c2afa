//! Configuration file
//!
//! A single JSON object. Every section and field is optional:
//!
//! ```json
//! {
//!   "server":  { "host": "127.0.0.1", "port": 8080, "cors_origins": [], "max_body_bytes": 2097152 },
//!   "codec":   { "eager_binary_validation": true, "max_decoded_bytes": 16777216 },
//!   "auth":    { "require_token": false, "static_token": null },
//!   "logging": { "level": "info" }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::CodecOptions;
use crate::http_server::HttpServerConfig;
use crate::observability::Severity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Reject requests that carry no bearer token
    #[serde(default)]
    pub require_token: bool,

    /// Accept exactly this token. Without it tokens are passed to handlers
    /// unverified.
    #[serde(default)]
    pub static_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: Severity,
}

fn default_level() -> Severity {
    Severity::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub codec: CodecOptions,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::invalid("server.host", "must not be empty"));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid("server.max_body_bytes", "must be > 0"));
        }

        if self.codec.max_decoded_bytes == 0 {
            return Err(ConfigError::invalid("codec.max_decoded_bytes", "must be > 0"));
        }

        if let Some(origin) = self
            .server
            .cors_origins
            .iter()
            .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
        {
            return Err(ConfigError::invalid(
                "server.cors_origins",
                format!("'{}' is not an http(s) origin", origin),
            ));
        }

        if let Some(token) = &self.auth.static_token {
            if token.trim().is_empty() {
                return Err(ConfigError::invalid("auth.static_token", "must not be blank"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("flatapi.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_config_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({}));

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.port, 54321);
        assert!(config.codec.eager_binary_validation);
        assert!(!config.auth.require_token);
        assert_eq!(config.logging.level, Severity::Info);
    }

    #[test]
    fn test_config_sections() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            json!({
                "server": {"host": "127.0.0.1", "port": 8080, "cors_origins": []},
                "codec": {"eager_binary_validation": false},
                "auth": {"require_token": true, "static_token": "s3cret"},
                "logging": {"level": "warn"}
            }),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.socket_addr(), "127.0.0.1:8080");
        assert!(!config.codec.eager_binary_validation);
        assert_eq!(
            config.codec.max_decoded_bytes,
            crate::envelope::DEFAULT_MAX_DECODED_BYTES
        );
        assert_eq!(config.auth.static_token.as_deref(), Some("s3cret"));
        assert_eq!(config.logging.level, Severity::Warn);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Config::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(matches!(
            Config::from_json(r#"{"database": {}}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validates_body_limit() {
        let err = Config::from_json(r#"{"server": {"max_body_bytes": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("server.max_body_bytes"));

        let err = Config::from_json(r#"{"codec": {"max_decoded_bytes": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("codec.max_decoded_bytes"));
    }

    #[test]
    fn test_validates_cors_origins() {
        let err = Config::from_json(r#"{"server": {"cors_origins": ["localhost:3000"]}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "server.cors_origins",
                ..
            }
        ));
    }

    #[test]
    fn test_validates_static_token() {
        assert!(Config::from_json(r#"{"auth": {"static_token": "  "}}"#).is_err());
    }
}
