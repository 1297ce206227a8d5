//! Store settings persisted through a durable key-value store.
//!
//! Settings such as the returns window are edited by operators at runtime.
//! Keeping them only in process memory would let instances drift apart, so
//! [`SettingsService`] writes through a [`SettingsStore`] and serves reads
//! from a local snapshot refreshed with [`SettingsService::reload`].

use crate::{ConfigError, ConfigValidator, Result, Validate};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tillkeep_log::{debug, info};

/// Storage key of the settings document.
pub const SETTINGS_KEY: &str = "settings:store";

/// Operator-editable store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Days after a sale during which a return is accepted
    pub returns_window_days: u32,

    /// Reasons offered when recording a return
    pub return_reasons: Vec<String>,

    /// Days a store credit stays redeemable after issue
    pub store_credit_validity_days: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            returns_window_days: 30,
            return_reasons: vec![
                "DAMAGED".to_string(),
                "WRONG_ITEM".to_string(),
                "NOT_AS_DESCRIBED".to_string(),
                "CHANGED_MIND".to_string(),
            ],
            store_credit_validity_days: 365,
        }
    }
}

impl Validate for StoreSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::in_range(self.returns_window_days, 0, 365, "returns_window_days")?;
        ConfigValidator::in_range(
            self.store_credit_validity_days,
            1,
            3650,
            "store_credit_validity_days",
        )?;
        if self.return_reasons.is_empty() {
            return Err(ConfigError::ValidationError(
                "return_reasons must list at least one reason".to_string(),
            ));
        }
        for reason in &self.return_reasons {
            ConfigValidator::not_empty(reason, "return_reasons[]")?;
        }
        Ok(())
    }
}

/// Durable key-value storage for settings documents.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a raw JSON document, `None` when never written.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, document: String) -> Result<()>;
}

/// Process-local store, for tests and single-instance deployments.
#[derive(Default)]
pub struct InMemorySettingsStore {
    documents: RwLock<HashMap<String, String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.documents.read().get(key).cloned())
    }

    async fn save(&self, key: &str, document: String) -> Result<()> {
        self.documents.write().insert(key.to_string(), document);
        Ok(())
    }
}

/// Redis-backed store shared by every instance.
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisSettingsStore {
    connection: redis::aio::ConnectionManager,
}

#[cfg(feature = "redis")]
impl RedisSettingsStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(ConfigError::store_unavailable)?;
        let connection = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(ConfigError::store_unavailable)?;
        Ok(Self { connection })
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl SettingsStore for RedisSettingsStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;

        let mut conn = self.connection.clone();
        conn.get(key)
            .await
            .map_err(ConfigError::store_unavailable)
    }

    async fn save(&self, key: &str, document: String) -> Result<()> {
        use redis::AsyncCommands;

        let mut conn = self.connection.clone();
        let _: () = conn
            .set(key, document)
            .await
            .map_err(ConfigError::store_unavailable)?;
        Ok(())
    }
}

/// Owned settings service, constructed once at start-up and shared by
/// reference (`Arc`) with whatever needs it.
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    snapshot: RwLock<StoreSettings>,
}

impl SettingsService {
    /// Load settings from `store`, seeding defaults if none were persisted.
    pub async fn load(store: Arc<dyn SettingsStore>) -> Result<Self> {
        let settings = match Self::fetch(store.as_ref()).await? {
            Some(settings) => settings,
            None => {
                info!("No persisted store settings, seeding defaults");
                let defaults = StoreSettings::default();
                store.save(SETTINGS_KEY, encode(&defaults)?).await?;
                defaults
            }
        };

        Ok(Self {
            store,
            snapshot: RwLock::new(settings),
        })
    }

    /// The settings as of the last load, reload or update.
    pub fn current(&self) -> StoreSettings {
        self.snapshot.read().clone()
    }

    /// Re-read the persisted document, picking up edits made elsewhere.
    pub async fn reload(&self) -> Result<StoreSettings> {
        if let Some(settings) = Self::fetch(self.store.as_ref()).await? {
            *self.snapshot.write() = settings;
        }
        debug!("Store settings reloaded");
        Ok(self.current())
    }

    /// Apply `change`, validate, persist, then publish the new snapshot.
    /// Nothing is published when validation or persistence fails.
    pub async fn update<F>(&self, change: F) -> Result<StoreSettings>
    where
        F: FnOnce(&mut StoreSettings),
    {
        let mut next = self.current();
        change(&mut next);
        next.validate()?;

        self.store.save(SETTINGS_KEY, encode(&next)?).await?;
        *self.snapshot.write() = next.clone();
        info!(
            fields: {
                "returns_window_days" => next.returns_window_days,
                "store_credit_validity_days" => next.store_credit_validity_days
            },
            "Store settings updated"
        );
        Ok(next)
    }

    async fn fetch(store: &dyn SettingsStore) -> Result<Option<StoreSettings>> {
        match store.load(SETTINGS_KEY).await? {
            Some(document) => {
                let settings: StoreSettings = serde_json::from_str(&document)
                    .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
                settings.validate()?;
                Ok(Some(settings))
            }
            None => Ok(None),
        }
    }
}

fn encode(settings: &StoreSettings) -> Result<String> {
    serde_json::to_string(settings).map_err(|e| ConfigError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_seeds_defaults() {
        let store = Arc::new(InMemorySettingsStore::new());
        let service = SettingsService::load(store.clone()).await.unwrap();

        assert_eq!(service.current(), StoreSettings::default());
        assert!(store.load(SETTINGS_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_is_visible_to_other_instances() {
        let store: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());
        let first = SettingsService::load(store.clone()).await.unwrap();
        let second = SettingsService::load(store.clone()).await.unwrap();

        first.update(|s| s.returns_window_days = 14).await.unwrap();
        assert_eq!(second.current().returns_window_days, 30);

        let reloaded = second.reload().await.unwrap();
        assert_eq!(reloaded.returns_window_days, 14);
    }

    #[tokio::test]
    async fn test_invalid_update_is_not_published() {
        let store = Arc::new(InMemorySettingsStore::new());
        let service = SettingsService::load(store).await.unwrap();

        let result = service.update(|s| s.return_reasons.clear()).await;
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
        assert_eq!(service.current(), StoreSettings::default());
    }

    #[tokio::test]
    async fn test_partial_document_uses_defaults() {
        let store = Arc::new(InMemorySettingsStore::new());
        store
            .save(SETTINGS_KEY, r#"{"returns_window_days": 7}"#.to_string())
            .await
            .unwrap();

        let service = SettingsService::load(store).await.unwrap();
        let settings = service.current();
        assert_eq!(settings.returns_window_days, 7);
        assert_eq!(settings.store_credit_validity_days, 365);
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_redis_settings_shared_between_instances() {
        let store: Arc<dyn SettingsStore> =
            Arc::new(RedisSettingsStore::connect("redis://127.0.0.1:6379").await.unwrap());
        let first = SettingsService::load(store.clone()).await.unwrap();
        let second = SettingsService::load(store).await.unwrap();

        first.update(|s| s.returns_window_days = 21).await.unwrap();
        assert_eq!(second.reload().await.unwrap().returns_window_days, 21);
    }
}
