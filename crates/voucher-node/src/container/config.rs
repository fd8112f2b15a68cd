//! # Node Configuration
//!
//! Runtime configuration read from the environment. CLI flags override
//! individual fields after loading.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `VR_DATA_DIR` | `./data` | Store file, RocksDB directory and signatures |
//! | `VR_STORAGE_BACKEND` | `file` | `memory`, `file` or `rocksdb` |
//! | `VR_PUBLIC_TOKEN_STATUS` | `false` | Enables the unauthenticated status lookup |
//! | `VR_DEFAULT_EXPIRY_DAYS` | `30` | Instance lifetime when a batch omits it |
//! | `VR_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directive |
//! | `VR_JSON_LOGS` | `false` | Emit logs as JSON lines |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use redemption_engine::EngineConfig;
use thiserror::Error;

pub const ENV_DATA_DIR: &str = "VR_DATA_DIR";
pub const ENV_STORAGE_BACKEND: &str = "VR_STORAGE_BACKEND";
pub const ENV_PUBLIC_TOKEN_STATUS: &str = "VR_PUBLIC_TOKEN_STATUS";
pub const ENV_DEFAULT_EXPIRY_DAYS: &str = "VR_DEFAULT_EXPIRY_DAYS";
pub const ENV_LOG_LEVEL: &str = "VR_LOG_LEVEL";
pub const ENV_RUST_LOG: &str = "RUST_LOG";
pub const ENV_JSON_LOGS: &str = "VR_JSON_LOGS";

/// Where records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process memory only; nothing survives exit.
    Memory,
    /// Single snapshot file under the data directory.
    File,
    /// RocksDB under the data directory (`rocksdb` feature).
    RocksDb,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::File => "file",
            StorageBackend::RocksDb => "rocksdb",
        }
    }

    /// Whether the backend writes under the data directory.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, StorageBackend::Memory)
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "rocksdb" => Ok(StorageBackend::RocksDb),
            other => Err(ConfigError::InvalidValue {
                var: ENV_STORAGE_BACKEND,
                value: other.to_string(),
                reason: "expected memory, file or rocksdb",
            }),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub storage_backend: StorageBackend,
    pub public_token_status: bool,
    pub default_expiry_days: u32,
    /// `EnvFilter` directive.
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            storage_backend: StorageBackend::File,
            public_token_status: false,
            default_expiry_days: EngineConfig::default().default_expiry_days,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source. Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup(ENV_STORAGE_BACKEND) {
            config.storage_backend = backend.parse()?;
        }
        if let Some(flag) = lookup(ENV_PUBLIC_TOKEN_STATUS) {
            config.public_token_status = parse_flag(ENV_PUBLIC_TOKEN_STATUS, &flag)?;
        }
        if let Some(days) = lookup(ENV_DEFAULT_EXPIRY_DAYS) {
            config.default_expiry_days =
                days.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: ENV_DEFAULT_EXPIRY_DAYS,
                        value: days.clone(),
                        reason: "expected a positive integer",
                    })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).or_else(|| lookup(ENV_RUST_LOG)) {
            config.log_level = level;
        }
        if let Some(flag) = lookup(ENV_JSON_LOGS) {
            config.json_logs = parse_flag(ENV_JSON_LOGS, &flag)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_expiry_days == 0 {
            return Err(ConfigError::InvalidValue {
                var: ENV_DEFAULT_EXPIRY_DAYS,
                value: "0".to_string(),
                reason: "expected a positive integer",
            });
        }
        if self.storage_backend == StorageBackend::RocksDb && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::BackendUnavailable(self.storage_backend));
        }
        Ok(())
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_default_expiry_days(self.default_expiry_days)
            .with_public_token_status(self.public_token_status)
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: "expected true or false",
        }),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("storage backend '{0}' is not compiled in (enable the `rocksdb` feature)")]
    BackendUnavailable(StorageBackend),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<NodeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.storage_backend, StorageBackend::File);
        assert_eq!(config.default_expiry_days, 30);
        assert!(!config.public_token_status);
    }

    #[test]
    fn test_env_overrides() {
        let config = load(&[
            (ENV_DATA_DIR, "/var/lib/vouchers"),
            (ENV_STORAGE_BACKEND, "Memory"),
            (ENV_PUBLIC_TOKEN_STATUS, "yes"),
            (ENV_DEFAULT_EXPIRY_DAYS, "7"),
            (ENV_JSON_LOGS, "1"),
        ])
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/vouchers"));
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert!(config.public_token_status);
        assert!(config.json_logs);

        let engine = config.engine_config();
        assert_eq!(engine.default_expiry_days, 7);
        assert!(engine.public_token_status);
    }

    #[test]
    fn test_log_level_prefers_vr_variable() {
        let config = load(&[(ENV_RUST_LOG, "warn"), (ENV_LOG_LEVEL, "debug")]).unwrap();
        assert_eq!(config.log_level, "debug");

        let config = load(&[(ENV_RUST_LOG, "warn")]).unwrap();
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            load(&[(ENV_STORAGE_BACKEND, "postgres")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(load(&[(ENV_DEFAULT_EXPIRY_DAYS, "0")]).is_err());
        assert!(load(&[(ENV_DEFAULT_EXPIRY_DAYS, "soon")]).is_err());
        assert!(load(&[(ENV_JSON_LOGS, "maybe")]).is_err());
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_requires_feature() {
        assert_eq!(
            load(&[(ENV_STORAGE_BACKEND, "rocksdb")]),
            Err(ConfigError::BackendUnavailable(StorageBackend::RocksDb))
        );
    }
}
