//! Configuration management for the global notifier
//!
//! A notifier is configured with the working directory the sync engine keeps
//! its replicas under, the sync session settings, and the ambient logging
//! settings. Configuration can be loaded from a TOML file or from
//! `GLOBAL_NOTIFIER_*` environment variables and is validated before a
//! notifier is created; configuration errors never reach the lifecycle
//! callback.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Length in bytes of a store encryption key
pub const ENCRYPTION_KEY_LEN: usize = 64;

/// URL schemes the sync server may be reached through
pub const SUPPORTED_SCHEMES: [&str; 6] = ["realm", "realms", "ws", "wss", "http", "https"];

const ENV_PREFIX: &str = "GLOBAL_NOTIFIER_";

/// Main notifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Directory the sync engine keeps watched replicas under
    pub working_directory: PathBuf,

    /// Report a start failure if the initial download takes longer than this
    #[serde(default, with = "humantime_serde")]
    pub download_timeout: Option<Duration>,

    /// Sync session configuration
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sync session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Sync server URL, e.g. `realms://sync.example.com/~/notifier`
    pub server_url: String,

    /// Validate the server's TLS certificate
    #[serde(default = "default_validate_ssl")]
    pub client_validate_ssl: bool,

    /// Custom CA bundle used when validating the server certificate
    #[serde(default)]
    pub trusted_ca_path: Option<PathBuf>,

    /// When sessions are torn down after their last user goes away
    #[serde(default)]
    pub stop_policy: StopPolicy,

    /// Hex-encoded 64 byte key the replicas are encrypted with
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Credentials of the admin user the notifier syncs as
    pub user: SyncUser,
}

/// Credentials the sync session is opened with
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncUser {
    pub identity: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for SyncUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncUser")
            .field("identity", &self.identity)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Session stop policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Stop as soon as the last reference is released
    #[default]
    Immediately,
    /// Keep the session open for the lifetime of the process
    LiveIndefinitely,
    /// Stop once pending local changes are uploaded
    AfterChangesUploaded,
}

impl FromStr for StopPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "immediately" => Ok(StopPolicy::Immediately),
            "live_indefinitely" => Ok(StopPolicy::LiveIndefinitely),
            "after_changes_uploaded" => Ok(StopPolicy::AfterChangesUploaded),
            other => Err(ConfigError::InvalidValue(format!("Invalid stop policy: {}", other))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), case-insensitive
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,
}

fn default_validate_ssl() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json_format: false }
    }
}

impl SyncUser {
    pub fn new(identity: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { identity: identity.into(), refresh_token: refresh_token.into() }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.trim().is_empty() {
            return Err(ConfigError::InvalidCredentials("identity must not be empty".to_string()));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(ConfigError::InvalidCredentials(
                "refresh_token must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl SyncConfig {
    pub fn new(server_url: impl Into<String>, user: SyncUser) -> Self {
        Self {
            server_url: server_url.into(),
            client_validate_ssl: default_validate_ssl(),
            trusted_ca_path: None,
            stop_policy: StopPolicy::default(),
            encryption_key: None,
            user,
        }
    }

    /// Parse and check the server URL
    pub fn parsed_url(&self) -> Result<url::Url, ConfigError> {
        let parsed = url::Url::parse(&self.server_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;

        if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
            return Err(ConfigError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                parsed.scheme(),
                self.server_url
            )));
        }
        if parsed.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(ConfigError::InvalidUrl(format!("missing host in {}", self.server_url)));
        }

        Ok(parsed)
    }

    /// Decode the encryption key, if one is configured
    pub fn encryption_key_bytes(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let Some(key) = &self.encryption_key else {
            return Ok(None);
        };

        let bytes = hex::decode(key)
            .map_err(|e| ConfigError::InvalidEncryptionKey(format!("not valid hex: {}", e)))?;
        if bytes.len() != ENCRYPTION_KEY_LEN {
            return Err(ConfigError::InvalidEncryptionKey(format!(
                "expected {} bytes, got {}",
                ENCRYPTION_KEY_LEN,
                bytes.len()
            )));
        }
        Ok(Some(bytes))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_url()?;
        self.user.validate()?;

        if let Some(path) = &self.trusted_ca_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "trusted_ca_path must not be empty when set".to_string(),
                ));
            }
        }

        self.encryption_key_bytes()?;
        Ok(())
    }
}

impl NotifierConfig {
    pub fn new(working_directory: impl Into<PathBuf>, sync: SyncConfig) -> Self {
        Self {
            working_directory: working_directory.into(),
            download_timeout: None,
            sync,
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// Variables follow the pattern `GLOBAL_NOTIFIER_<KEY>`.
    /// Example: `GLOBAL_NOTIFIER_SERVER_URL=realms://sync.example.com/`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let required = |name: &str| {
            var(name).ok_or_else(|| ConfigError::MissingValue(format!("{}{}", ENV_PREFIX, name)))
        };

        let user = SyncUser::new(required("IDENTITY")?, required("REFRESH_TOKEN")?);
        let mut config =
            Self::new(required("WORKING_DIRECTORY")?, SyncConfig::new(required("SERVER_URL")?, user));

        if let Some(validate) = var("VALIDATE_SSL") {
            config.sync.client_validate_ssl = validate
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid SSL flag: {}", e)))?;
        }
        if let Some(path) = var("TRUSTED_CA_PATH") {
            config.sync.trusted_ca_path = Some(PathBuf::from(path));
        }
        if let Some(policy) = var("STOP_POLICY") {
            config.sync.stop_policy = policy.parse()?;
        }
        if let Some(key) = var("ENCRYPTION_KEY") {
            config.sync.encryption_key = Some(key);
        }
        if let Some(secs) = var("DOWNLOAD_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid download timeout: {}", e)))?;
            config.download_timeout = Some(Duration::from_secs(secs));
        }

        // Logging config
        if let Some(level) = var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = var("LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.working_directory.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "working_directory must not be empty".to_string(),
            ));
        }

        if self.download_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ValidationFailed(
                "download_timeout must be greater than 0".to_string(),
            ));
        }

        self.sync.validate()?;

        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn config() -> NotifierConfig {
        NotifierConfig::new(
            "/var/lib/notifier",
            SyncConfig::new("realms://sync.example.com/~/notifier", SyncUser::new("admin", "token")),
        )
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_url_validation() {
        let mut config = config();

        config.sync.server_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        config.sync.server_url = "ftp://sync.example.com/".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        config.sync.server_url = "wss://sync.example.com:9443/".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credential_validation() {
        let mut config = config();
        config.sync.user.identity = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCredentials(_))));

        let mut config = self::config();
        config.sync.user.refresh_token = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCredentials(_))));
    }

    #[test]
    fn test_encryption_key_validation() {
        let mut config = config();

        config.sync.encryption_key = Some("zz".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEncryptionKey(_))));

        config.sync.encryption_key = Some(hex::encode([7u8; 32]));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEncryptionKey(_))));

        config.sync.encryption_key = Some(hex::encode([7u8; ENCRYPTION_KEY_LEN]));
        assert_eq!(config.sync.encryption_key_bytes().unwrap().unwrap().len(), ENCRYPTION_KEY_LEN);
    }

    #[test]
    fn test_working_directory_and_log_level() {
        let mut config = config();
        config.working_directory = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = self::config();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        let mut config = config();
        for level in ["INFO", "Warn", "warning"] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{} should be accepted", level);
        }

        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn test_sync_user_debug_redacts_token() {
        let rendered = format!("{:?}", SyncUser::new("admin", "secret-token"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("GLOBAL_NOTIFIER_WORKING_DIRECTORY", "/srv/notifier"),
            ("GLOBAL_NOTIFIER_SERVER_URL", "realm://127.0.0.1:9080/"),
            ("GLOBAL_NOTIFIER_IDENTITY", "admin"),
            ("GLOBAL_NOTIFIER_REFRESH_TOKEN", "token"),
            ("GLOBAL_NOTIFIER_VALIDATE_SSL", "false"),
            ("GLOBAL_NOTIFIER_STOP_POLICY", "after_changes_uploaded"),
            ("GLOBAL_NOTIFIER_DOWNLOAD_TIMEOUT_SECS", "30"),
            ("GLOBAL_NOTIFIER_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        let config =
            NotifierConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.working_directory, PathBuf::from("/srv/notifier"));
        assert!(!config.sync.client_validate_ssl);
        assert_eq!(config.sync.stop_policy, StopPolicy::AfterChangesUploaded);
        assert_eq!(config.download_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_from_lookup_missing_value() {
        let err = NotifierConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue(_)));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notifier.toml");

        let mut original = config();
        original.download_timeout = Some(Duration::from_secs(90));
        original.sync.trusted_ca_path = Some(PathBuf::from("/etc/ssl/ca.pem"));
        original.save_to_file(&path).unwrap();

        let loaded = NotifierConfig::from_file(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notifier.toml");
        std::fs::write(
            &path,
            r#"
working_directory = "/srv/notifier"
download_timeout = "2m"

[sync]
server_url = "realms://sync.example.com/"

[sync.user]
identity = "admin"
refresh_token = "token"
"#,
        )
        .unwrap();

        let config = NotifierConfig::from_file(&path).unwrap();
        assert!(config.sync.client_validate_ssl);
        assert_eq!(config.sync.stop_policy, StopPolicy::Immediately);
        assert_eq!(config.download_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
