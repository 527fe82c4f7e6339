//! Configuration for the Hongbao service.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Default database file for the durable backend.
pub const DEFAULT_DB_PATH: &str = "hongbao.db";

/// Environment variable selecting the backend (`memory` or `sqlite`).
pub const ENV_STORAGE: &str = "HONGBAO_STORAGE";
/// Environment variable with the SQLite database path.
pub const ENV_DB_PATH: &str = "HONGBAO_DB_PATH";
/// Environment variable toggling the in-memory fallback.
pub const ENV_FALLBACK: &str = "HONGBAO_FALLBACK_TO_MEMORY";

/// Errors loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Which store to open.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Volatile in-process store. Data is lost on restart.
    Memory,
    /// Durable SQLite store at `path`.
    Sqlite { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

/// Configuration for the Hongbao service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HongbaoConfig {
    /// Storage backend.
    pub storage: StorageConfig,
    /// Whether to fall back to the in-memory store when the durable store
    /// cannot be opened.
    pub fallback_to_memory: bool,
}

impl Default for HongbaoConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            fallback_to_memory: true,
        }
    }
}

impl HongbaoConfig {
    /// In-memory storage, no fallback needed.
    pub fn memory() -> Self {
        Self {
            storage: StorageConfig::Memory,
            fallback_to_memory: false,
        }
    }

    /// SQLite storage at `path`, with the default fallback.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig::Sqlite { path: path.into() },
            ..Self::default()
        }
    }

    /// Load from `HONGBAO_*` environment variables, defaulting what is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let path = lookup(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        config.storage = match lookup(ENV_STORAGE).as_deref().map(str::trim) {
            None | Some("") | Some("sqlite") => StorageConfig::Sqlite { path },
            Some("memory") => StorageConfig::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: ENV_STORAGE,
                    value: other.to_string(),
                })
            }
        };

        if let Some(value) = lookup(ENV_FALLBACK) {
            config.fallback_to_memory = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: ENV_FALLBACK,
                        value,
                    })
                }
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HongbaoConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, HongbaoConfig::default());
        assert!(config.fallback_to_memory);
        assert_eq!(
            config.storage,
            StorageConfig::Sqlite {
                path: PathBuf::from(DEFAULT_DB_PATH)
            }
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = HongbaoConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/var/lib/hongbao/data.db"),
            (ENV_FALLBACK, "off"),
        ]))
        .unwrap();
        assert_eq!(config, {
            let mut expected = HongbaoConfig::sqlite("/var/lib/hongbao/data.db");
            expected.fallback_to_memory = false;
            expected
        });

        let config = HongbaoConfig::from_lookup(lookup(&[(ENV_STORAGE, "memory")])).unwrap();
        assert_eq!(config.storage, StorageConfig::Memory);
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(matches!(
            HongbaoConfig::from_lookup(lookup(&[(ENV_STORAGE, "postgres")])),
            Err(ConfigError::InvalidValue { var: ENV_STORAGE, .. })
        ));
        assert!(matches!(
            HongbaoConfig::from_lookup(lookup(&[(ENV_FALLBACK, "maybe")])),
            Err(ConfigError::InvalidValue { var: ENV_FALLBACK, .. })
        ));
    }

    #[test]
    fn test_deserialize() {
        let config: HongbaoConfig = serde_json::from_str(
            r#"{"storage": {"backend": "sqlite", "path": "packets.db"}, "fallback_to_memory": false}"#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageConfig::Sqlite { path: "packets.db".into() });
        assert!(!config.fallback_to_memory);

        let config: HongbaoConfig = serde_json::from_str(r#"{"storage": {"backend": "memory"}}"#).unwrap();
        assert_eq!(config.storage, StorageConfig::Memory);
        assert!(config.fallback_to_memory);
    }
}
