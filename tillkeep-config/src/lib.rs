//! Configuration for the tillkeep core.
//!
//! Two layers live here:
//!
//! - [`ConfigManager`] / [`ConfigService`]: process configuration assembled at
//!   start-up from `TILLKEEP_*` environment variables, an optional `.env` file
//!   and JSON/TOML files, resolved into a validated [`CoreConfig`].
//! - [`SettingsService`]: operator-editable store settings (returns window,
//!   return reasons, store-credit validity) persisted through a durable
//!   [`SettingsStore`] so every instance of a horizontally scaled deployment
//!   sees the same values.

pub mod config_service;
pub mod core_config;
pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use config_service::{ConfigService, ConfigServiceBuilder};
pub use core_config::CoreConfig;
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{InMemorySettingsStore, SettingsService, SettingsStore, StoreSettings};
pub use validation::{ConfigValidator, Validate};

#[cfg(feature = "redis")]
pub use settings::RedisSettingsStore;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Thread-safe key/value view over every configuration source.
///
/// Later loads override earlier ones key by key.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::default(),
            env_prefix: Some(prefix.into()),
        }
    }

    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let vars = loader.load()?;

        let mut config = self.config.write();
        for (key, value) in vars {
            config.insert(key, Value::String(value));
        }
        Ok(())
    }

    /// Load a `.env` file into the process environment, then re-read it.
    /// A missing default `.env` is not an error; a missing explicit path is.
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    pub fn load_file(&self, path: &str, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.merge_value(data);
        Ok(())
    }

    /// Merge the top-level entries of a JSON object.
    pub fn merge_value(&self, data: Value) {
        if let Value::Object(map) = data {
            let mut config = self.config.write();
            for (key, value) in map {
                config.insert(key, value);
            }
        }
    }

    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        self.config.write().insert(key.to_string(), value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .config
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value)
            .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Read a scalar that may have arrived either typed (JSON/TOML) or as
    /// text (environment). Text is parsed with [`FromStr`].
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.config.read().get(key).cloned() else {
            return Ok(None);
        };

        match value {
            Value::Null => Ok(None),
            Value::String(text) => text
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", key, e))),
            other => serde_json::from_value(other)
                .map(Some)
                .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e))),
        }
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Non-empty string, `None` when absent or blank.
    pub fn get_opt_string(&self, key: &str) -> Option<String> {
        self.get::<String>(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }

    pub fn has(&self, key: &str) -> bool {
        self.config.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    pub fn merge(&self, other: &ConfigManager) {
        let other_config = other.config.read().clone();
        let mut config = self.config.write();
        config.extend(other_config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("provider_base_url", "https://carrier.example").unwrap();

        let value: String = manager.get("provider_base_url").unwrap();
        assert_eq!(value, "https://carrier.example");
        assert!(manager.has("provider_base_url"));
        assert!(!manager.has("missing"));
    }

    #[test]
    fn test_get_parsed_from_text_and_typed() {
        let manager = ConfigManager::new();
        manager.set("from_env", "12").unwrap();
        manager.set("from_file", 12).unwrap();
        manager.set("garbage", "twelve").unwrap();

        assert_eq!(manager.get_parsed::<u64>("from_env").unwrap(), Some(12));
        assert_eq!(manager.get_parsed::<u64>("from_file").unwrap(), Some(12));
        assert_eq!(manager.get_parsed::<u64>("absent").unwrap(), None);
        assert!(manager.get_parsed::<u64>("garbage").is_err());
    }

    #[test]
    fn test_get_opt_string_treats_blank_as_absent() {
        let manager = ConfigManager::new();
        manager.set("webhook_secret", "  ").unwrap();
        assert_eq!(manager.get_opt_string("webhook_secret"), None);

        manager.set("webhook_secret", "whsec").unwrap();
        assert_eq!(manager.get_opt_string("webhook_secret").as_deref(), Some("whsec"));
    }

    #[test]
    fn test_merge_overrides() {
        let base = ConfigManager::new();
        base.set("a", 1).unwrap();
        base.set("b", 1).unwrap();

        let overlay = ConfigManager::new();
        overlay.set("b", 2).unwrap();

        base.merge(&overlay);
        assert_eq!(base.get::<i64>("a").unwrap(), 1);
        assert_eq!(base.get::<i64>("b").unwrap(), 2);
    }
}
