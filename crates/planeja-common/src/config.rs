//! Configuration for Planeja+

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `PLANEJA__API__PORT=9000`
const ENV_PREFIX: &str = "PLANEJA";

/// Longest rate-limit window or block, in seconds
const MAX_RATE_LIMIT_SECS: i64 = 86_400;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Local state directory (used by the `file` backend)
    #[serde(default)]
    pub state: StateConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Invitation lifecycle settings
    #[serde(default)]
    pub invitations: InvitationConfig,

    /// Invitation send rate limit
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            bind_address: default_bind_address(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Persistence backend: "postgres", "file" or "memory"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL (for postgres)
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_db_backend() -> String {
    "file".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Local state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding one JSON document per state key
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./data/state")
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// SHA-256 hex digest of the shared gateway key; no key check when unset
    pub api_key_sha256: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            cors_origins: Vec::new(),
            api_key_sha256: None,
        }
    }
}

fn default_api_port() -> u16 {
    8080
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
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

/// Invitation lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationConfig {
    /// Default validity of a new invitation in days
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,

    /// Validity granted by a resend, counted from the resend time
    #[serde(default = "default_resend_extension_days")]
    pub resend_extension_days: i64,

    /// Interval of the background expiry sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Base URL shareable links are built from
    #[serde(default = "default_link_base_url")]
    pub link_base_url: String,

    /// Whether `DELETE /api/v1/invitations/activities` may wipe the log
    #[serde(default)]
    pub allow_activity_clear: bool,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_expiration_days(),
            resend_extension_days: default_resend_extension_days(),
            sweep_interval_secs: default_sweep_interval(),
            link_base_url: default_link_base_url(),
            allow_activity_clear: false,
        }
    }
}

fn default_expiration_days() -> i64 {
    7
}

fn default_resend_extension_days() -> i64 {
    7
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_link_base_url() -> String {
    "http://localhost:5173/invite".to_string()
}

/// Rate limit applied to invitation sends and resends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sends permitted per window
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,

    /// Block imposed once the window is exhausted, in seconds
    #[serde(default = "default_block_secs")]
    pub block_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_secs: default_window_secs(),
            block_secs: default_block_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_window_secs() -> i64 {
    60
}

fn default_block_secs() -> i64 {
    30
}

impl Config {
    /// Load configuration from a file, applying environment overrides
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        Self::build(Some(path))
    }

    /// Load configuration from the default locations and the environment
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/planeja/config.toml"),
        ];

        let found = paths.iter().find(|p| p.exists());
        if found.is_none() {
            tracing::warn!("No configuration file found, using defaults and environment");
        }

        Self::build(found.map(PathBuf::as_path))
    }

    fn build(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(crate::Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if !(1..=30).contains(&self.invitations.expiration_days) {
            return Err(crate::Error::Config(
                "invitations.expiration_days must be between 1 and 30".to_string(),
            ));
        }
        if !(1..=30).contains(&self.invitations.resend_extension_days) {
            return Err(crate::Error::Config(
                "invitations.resend_extension_days must be between 1 and 30".to_string(),
            ));
        }
        if self.invitations.sweep_interval_secs == 0 {
            return Err(crate::Error::Config(
                "invitations.sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.rate_limit.max_attempts == 0 {
            return Err(crate::Error::Config(
                "rate_limit.max_attempts must be positive".to_string(),
            ));
        }
        if !(1..=MAX_RATE_LIMIT_SECS).contains(&self.rate_limit.window_secs) {
            return Err(crate::Error::Config(format!(
                "rate_limit.window_secs must be between 1 and {}",
                MAX_RATE_LIMIT_SECS
            )));
        }
        if !(0..=MAX_RATE_LIMIT_SECS).contains(&self.rate_limit.block_secs) {
            return Err(crate::Error::Config(format!(
                "rate_limit.block_secs must be between 0 and {}",
                MAX_RATE_LIMIT_SECS
            )));
        }
        if self.database.backend == "postgres" && self.database.url.is_none() {
            return Err(crate::Error::Config(
                "Database URL required for PostgreSQL".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.hostname, "localhost");
        assert_eq!(config.database.backend, "file");
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.invitations.expiration_days, 7);
        assert_eq!(config.invitations.sweep_interval_secs, 60);
        assert_eq!(config.rate_limit.max_attempts, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.block_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "planeja.example.com"

[database]
backend = "postgres"
url = "postgres://localhost/planeja"

[invitations]
expiration_days = 14

[rate_limit]
max_attempts = 3
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "planeja.example.com");
        assert_eq!(config.database.backend, "postgres");
        assert_eq!(config.invitations.expiration_days, 14);
        assert_eq!(config.invitations.resend_extension_days, 7);
        assert_eq!(config.rate_limit.max_attempts, 3);
        assert_eq!(config.rate_limit.block_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.invitations.expiration_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.backend = "postgres".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_resend_and_rate_limit_windows() {
        let mut config = Config::default();
        config.invitations.resend_extension_days = 30;
        config.rate_limit.window_secs = 86_400;
        config.rate_limit.block_secs = 0;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.invitations.resend_extension_days = 31;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.invitations.resend_extension_days = i64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.window_secs = 86_401;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.block_secs = i64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.invitations.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_activity_clear_is_off_by_default() {
        assert!(!Config::default().invitations.allow_activity_clear);

        let toml = r#"
[invitations]
allow_activity_clear = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.invitations.allow_activity_clear);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Config::from_file(Path::new("/nonexistent/planeja.toml"));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}
