//! Configuration management with validation and defaults
//!
//! Sections can be loaded from a TOML file and overridden with `RULETA_*`
//! environment variables. Every section has defaults so a partial file is
//! enough.

use crate::errors::ConfigError;
use crate::games::validator::{TableLimits, MAX_BET_AMOUNT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuletaConfig {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub monitoring: MonitoringConfig,
}

/// Wager engine tuning
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra commit attempts after the first failure
    pub commit_retry_attempts: u32,
    /// Backoff grows linearly with the attempt number
    pub commit_retry_backoff_ms: u64,
    /// Draws held for failed spins awaiting a retry; the oldest is evicted first
    pub max_retained_draws: usize,
    pub table_limits: TableLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commit_retry_attempts: 2,
            commit_retry_backoff_ms: 25,
            max_retained_draws: 10_000,
            table_limits: TableLimits::default(),
        }
    }
}

impl EngineConfig {
    pub fn commit_retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.commit_retry_backoff_ms.saturating_mul(attempt as u64))
    }
}

/// Where balances and the ledger live
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    RocksDb,
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Snappy,
    Lz4,
    Zstd,
}

/// Storage configuration with RocksDB tuning
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    pub max_write_buffer_number: usize,
    pub compression_type: CompressionType,
    /// Whether to clear database on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            data_directory: "./DB/ruleta_data".to_string(),
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            compression_type: CompressionType::Lz4,
            clear_on_start: false,
        }
    }
}

/// HTTP layer configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Header the auth proxy fills with the authenticated user id
    pub user_id_header: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            user_id_header: "x-user-id".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_filter: "ruleta=info,tower_http=info".to_string(),
        }
    }
}

impl RuletaConfig {
    /// Durable storage, conservative limits
    pub fn production() -> Self {
        Self {
            engine: EngineConfig {
                table_limits: TableLimits {
                    min_bet: 1,
                    max_bet: 100_000,
                },
                commit_retry_attempts: 3,
                commit_retry_backoff_ms: 50,
                max_retained_draws: 100_000,
            },
            storage: StorageConfig {
                write_buffer_size_mb: 128,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// In-memory storage, no backoff
    pub fn testing() -> Self {
        Self {
            engine: EngineConfig {
                commit_retry_backoff_ms: 0,
                ..Default::default()
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                clear_on_start: true,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_filter: "ruleta=debug".to_string(),
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.engine.table_limits;
        if limits.min_bet == 0 {
            return Err(invalid("engine.table_limits.min_bet", 0, "Minimum bet must be positive"));
        }
        if limits.max_bet < limits.min_bet {
            return Err(invalid(
                "engine.table_limits.max_bet",
                limits.max_bet,
                "Maximum bet cannot be below the minimum bet",
            ));
        }
        if limits.max_bet > MAX_BET_AMOUNT {
            return Err(invalid(
                "engine.table_limits.max_bet",
                limits.max_bet,
                "Maximum bet exceeds the supported ceiling",
            ));
        }

        if self.engine.max_retained_draws == 0 {
            return Err(invalid(
                "engine.max_retained_draws",
                0,
                "At least one failed draw must be retained",
            ));
        }

        if self.storage.backend == StorageBackend::RocksDb {
            if self.storage.data_directory.is_empty() {
                return Err(ConfigError::MissingRequired("storage.data_directory".to_string()));
            }
            if self.storage.write_buffer_size_mb == 0 {
                return Err(invalid("storage.write_buffer_size_mb", 0, "Write buffer cannot be zero"));
            }
        }

        if self.api.port == 0 {
            return Err(invalid("api.port", 0, "Port cannot be zero"));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(invalid("api.request_timeout_secs", 0, "Timeout must be positive"));
        }
        if axum::http::HeaderName::from_bytes(self.api.user_id_header.as_bytes()).is_err() {
            return Err(invalid(
                "api.user_id_header",
                &self.api.user_id_header,
                "Not a valid HTTP header name",
            ));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), toml_string).map_err(|e| {
            ConfigError::SaveFailed(format!("Failed to write to {}: {}", path.as_ref().display(), e))
        })
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Loads configuration from an optional file plus environment overrides
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load from file and process environment, then validate
    pub fn load(&self) -> Result<RuletaConfig, ConfigError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Same as `load`, reading overrides through `lookup`
    pub fn load_with_env<F>(&self, lookup: F) -> Result<RuletaConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => RuletaConfig::default(),
        };

        Self::apply_env_overrides(&mut config, lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<RuletaConfig, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides<F>(config: &mut RuletaConfig, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(data_dir) = lookup("RULETA_DATA_DIR") {
            config.storage.data_directory = data_dir;
        }
        if let Some(backend) = lookup("RULETA_STORAGE_BACKEND") {
            config.storage.backend = match backend.to_lowercase().as_str() {
                "rocksdb" => StorageBackend::RocksDb,
                "memory" => StorageBackend::Memory,
                _ => {
                    return Err(invalid(
                        "RULETA_STORAGE_BACKEND",
                        backend,
                        "Expected 'rocksdb' or 'memory'",
                    ))
                }
            };
        }
        if let Some(host) = lookup("RULETA_API_HOST") {
            config.api.host = host;
        }
        if let Some(port) = lookup("RULETA_API_PORT") {
            config.api.port = port
                .parse()
                .map_err(|_| invalid("RULETA_API_PORT", &port, "Invalid port number"))?;
        }
        if let Some(filter) = lookup("RULETA_LOG") {
            config.monitoring.log_filter = filter;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_presets_are_valid() {
        assert!(RuletaConfig::default().validate().is_ok());
        assert!(RuletaConfig::production().validate().is_ok());
        assert!(RuletaConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_invalid_table_limits() {
        let mut config = RuletaConfig::default();
        config.engine.table_limits.min_bet = 0;
        assert!(config.validate().is_err());

        let mut config = RuletaConfig::default();
        config.engine.table_limits = TableLimits { min_bet: 10, max_bet: 5 };
        assert!(config.validate().is_err());

        let mut config = RuletaConfig::default();
        config.engine.table_limits.max_bet = MAX_BET_AMOUNT + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retained_draws_must_be_positive() {
        let mut config = RuletaConfig::default();
        config.engine.max_retained_draws = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_user_header() {
        let mut config = RuletaConfig::default();
        config.api.user_id_header = "bad header".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RuletaConfig = toml::from_str(
            r#"
            [engine.table_limits]
            min_bet = 5
            max_bet = 5000

            [api]
            port = 9090
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.table_limits.min_bet, 5);
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.api.user_id_header, "x-user-id");
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_file_and_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ruleta.toml");
        RuletaConfig::production().save(&path).unwrap();

        let env: HashMap<&str, &str> = [
            ("RULETA_API_PORT", "7070"),
            ("RULETA_STORAGE_BACKEND", "memory"),
        ]
        .into_iter()
        .collect();

        let config = ConfigLoader::new()
            .with_path(&path)
            .load_with_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api.port, 7070);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.engine.table_limits.max_bet, 100_000);
    }

    #[test]
    fn test_bad_env_override() {
        let result = ConfigLoader::new().load_with_env(|key| {
            (key == "RULETA_API_PORT").then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_retry_backoff_is_linear() {
        let engine = EngineConfig {
            commit_retry_backoff_ms: 10,
            ..Default::default()
        };
        assert_eq!(engine.commit_retry_backoff(3), Duration::from_millis(30));
    }
}
