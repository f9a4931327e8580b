//! Configuration management for tokengate
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::auth::AuthConfig;

/// Longest token lifetime accepted from configuration
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token and credential configuration
    #[serde(default)]
    pub auth: AuthSettings,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables with prefix TOKENGATE_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("TOKENGATE_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("TOKENGATE_SERVER_PORT") {
            config.server.port = parse_env("TOKENGATE_SERVER_PORT", &port)?;
        }

        if let Ok(path) = std::env::var("TOKENGATE_DATABASE_PATH") {
            config.database.path = path;
        }
        if let Ok(size) = std::env::var("TOKENGATE_DATABASE_POOL_SIZE") {
            config.database.pool_size = parse_env("TOKENGATE_DATABASE_POOL_SIZE", &size)?;
        }

        if let Ok(ttl) = std::env::var("TOKENGATE_AUTH_TOKEN_TTL_SECS") {
            config.auth.token_ttl_secs = parse_env("TOKENGATE_AUTH_TOKEN_TTL_SECS", &ttl)?;
        }
        if let Ok(timeout) = std::env::var("TOKENGATE_AUTH_STORE_TIMEOUT_MS") {
            config.auth.store_timeout_ms = parse_env("TOKENGATE_AUTH_STORE_TIMEOUT_MS", &timeout)?;
        }
        if let Ok(interval) = std::env::var("TOKENGATE_AUTH_PURGE_INTERVAL_SECS") {
            config.auth.purge_interval_secs =
                parse_env("TOKENGATE_AUTH_PURGE_INTERVAL_SECS", &interval)?;
        }

        if let Ok(level) = std::env::var("TOKENGATE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("TOKENGATE_LOG_FORMAT") {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the service unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.token_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.token_ttl_secs must be at most {} (10 years)",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.auth.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.store_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::InvalidValue(
                "database.pool_size must be greater than 0".to_string(),
            ));
        }
        if self.database.path.is_empty() {
            return Err(ConfigError::MissingRequired("database.path".to_string()));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidValue(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Parse(format!("Invalid value for {}: {}", name, value)))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

/// Token and credential settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSettings {
    /// Lifetime of login tokens in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Timeout for a single store call in milliseconds
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// How often expired tokens are purged, 0 disables the purge task
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl AuthSettings {
    /// Runtime configuration for [`crate::auth::AuthManager`]
    pub fn to_auth_config(&self) -> AuthConfig {
        AuthConfig {
            token_ttl: Duration::from_secs(self.token_ttl_secs),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }

    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_secs > 0).then(|| Duration::from_secs(self.purge_interval_secs))
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl(),
            store_timeout_ms: default_store_timeout(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

fn default_token_ttl() -> u64 {
    86400 // 24 hours
}

fn default_store_timeout() -> u64 {
    5000
}

fn default_purge_interval() -> u64 {
    3600 // 1 hour
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Number of connections in the pool
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/tokengate.db".to_string()
}

fn default_pool_size() -> usize {
    4
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Parse complete configuration from YAML
    #[test]
    fn test_parse_complete_yaml_config() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090

auth:
  token_ttl_secs: 3600
  store_timeout_ms: 250
  purge_interval_secs: 0

database:
  path: "/tmp/test.db"
  pool_size: 8

logging:
  level: "debug"
  format: "pretty"
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);

        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert_eq!(config.auth.store_timeout_ms, 250);
        assert_eq!(config.auth.purge_interval(), None);

        assert_eq!(config.database.path, "/tmp/test.db");
        assert_eq!(config.database.pool_size, 8);

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    // Test 2: Default values are applied for missing fields
    #[test]
    fn test_default_values_applied() {
        let yaml = r#"
server:
  port: 3000
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);

        assert_eq!(config.auth.token_ttl_secs, 86400);
        assert_eq!(config.auth.store_timeout_ms, 5000);
        assert_eq!(
            config.auth.purge_interval(),
            Some(Duration::from_secs(3600))
        );

        assert_eq!(config.database.path, "/data/db/tokengate.db");
        assert_eq!(config.database.pool_size, 4);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");
    }

    // Test 3: Environment variable expansion
    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("TEST_TOKENGATE_DB_PATH", "/var/data/test.db");

        let yaml = r#"
database:
  path: "${TEST_TOKENGATE_DB_PATH}"
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.database.path, "/var/data/test.db");

        std::env::remove_var("TEST_TOKENGATE_DB_PATH");
    }

    // Test 4: Unset variables are left as-is
    #[test]
    fn test_env_var_expansion_unset() {
        let expanded = expand_env_vars("path: ${TOKENGATE_SURELY_UNSET_VAR}");
        assert_eq!(expanded, "path: ${TOKENGATE_SURELY_UNSET_VAR}");
    }

    // Test 5: from_env loads config from environment variables
    #[test]
    fn test_from_env() {
        std::env::set_var("TOKENGATE_SERVER_HOST", "localhost");
        std::env::set_var("TOKENGATE_SERVER_PORT", "9999");
        std::env::set_var("TOKENGATE_DATABASE_PATH", "/env/test.db");
        std::env::set_var("TOKENGATE_AUTH_TOKEN_TTL_SECS", "60");
        std::env::set_var("TOKENGATE_LOG_FORMAT", "pretty");

        let config = Config::from_env().unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.database.path, "/env/test.db");
        assert_eq!(config.auth.token_ttl_secs, 60);
        assert_eq!(config.logging.format, "pretty");

        std::env::remove_var("TOKENGATE_SERVER_HOST");
        std::env::remove_var("TOKENGATE_SERVER_PORT");
        std::env::remove_var("TOKENGATE_DATABASE_PATH");
        std::env::remove_var("TOKENGATE_AUTH_TOKEN_TTL_SECS");
        std::env::remove_var("TOKENGATE_LOG_FORMAT");
    }

    // Test 6: Parse error for invalid YAML
    #[test]
    fn test_parse_error_invalid_yaml() {
        let yaml = r#"
server:
  port: "not_a_number"
"#;

        let result = Config::from_yaml(yaml);
        match result {
            Err(ConfigError::Parse(msg)) => {
                assert!(msg.contains("Failed to parse YAML"));
            }
            _ => panic!("Expected ConfigError::Parse"),
        }
    }

    // Test 7: Zero TTL is rejected
    #[test]
    fn test_validate_rejects_zero_ttl() {
        let yaml = r#"
auth:
  token_ttl_secs: 0
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    // Test 8: TTLs beyond ten years are rejected
    #[test]
    fn test_validate_rejects_oversized_ttl() {
        for ttl in ["10000000000000", "400000000000", "315360001"] {
            let yaml = format!("auth:\n  token_ttl_secs: {}\n", ttl);
            assert!(
                matches!(Config::from_yaml(&yaml), Err(ConfigError::InvalidValue(_))),
                "{ttl} should be rejected"
            );
        }

        let yaml = format!("auth:\n  token_ttl_secs: {}\n", MAX_TOKEN_TTL_SECS);
        assert!(Config::from_yaml(&yaml).is_ok());
    }

    // Test 9: Unknown log format is rejected
    #[test]
    fn test_validate_rejects_log_format() {
        let yaml = r#"
logging:
  format: "xml"
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    // Test 10: Settings convert into the manager's runtime config
    #[test]
    fn test_to_auth_config() {
        let settings = AuthSettings {
            token_ttl_secs: 120,
            store_timeout_ms: 300,
            purge_interval_secs: 0,
        };
        let auth = settings.to_auth_config();
        assert_eq!(auth.token_ttl, Duration::from_secs(120));
        assert_eq!(auth.store_timeout, Duration::from_millis(300));
    }

    // Test 11: Config serialization round-trip
    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(config, parsed);
    }

    // Test 12: Empty YAML results in defaults
    #[test]
    fn test_empty_yaml_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
    }
}
