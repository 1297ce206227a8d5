//! Redis-backed idempotency store.

use crate::error::{IdempotencyError, IdempotencyResult};
use crate::store::{IdempotencyRecord, IdempotencyStore, SaveOutcome};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde_json::Value;
use std::time::Duration;

/// Key prefix for stored records.
pub const DEFAULT_KEY_PREFIX: &str = "idempotency:";

/// Idempotency store using `SET NX EX` for create-once writes.
///
/// Records expire after the retention window, which is the garbage
/// collection the record lifecycle allows for.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    connection: ConnectionManager,
    prefix: String,
    retention: Duration,
}

impl RedisIdempotencyStore {
    /// Connect to Redis.
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use tillkeep_idempotency::RedisIdempotencyStore;
    ///
    /// # async fn run() -> Result<(), tillkeep_idempotency::IdempotencyError> {
    /// let store = RedisIdempotencyStore::connect(
    ///     "redis://localhost:6379",
    ///     Duration::from_secs(30 * 24 * 3600),
    /// )
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str, retention: Duration) -> IdempotencyResult<Self> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self {
            connection,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            retention,
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn lookup(&self, key: &str) -> IdempotencyResult<Option<Value>> {
        if key.is_empty() {
            return Ok(None);
        }

        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(self.build_key(key)).await?;

        match raw {
            Some(raw) => {
                let record: IdempotencyRecord = serde_json::from_str(&raw)?;
                Ok(Some(record.result))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, result: &Value) -> IdempotencyResult<SaveOutcome> {
        if key.is_empty() {
            return Ok(SaveOutcome::Skipped);
        }

        let record = IdempotencyRecord::new(key, result.clone());
        let payload = serde_json::to_string(&record)?;
        let ttl = self.retention.as_secs().max(1);

        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.build_key(key))
            .arg(payload)
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e| IdempotencyError::StoreUnavailable(e.to_string()))?;

        match reply {
            Some(_) => Ok(SaveOutcome::Created),
            None => {
                tillkeep_log::debug!(
                    fields: { "key" => key },
                    "Idempotency record already present, keeping first write"
                );
                Ok(SaveOutcome::AlreadyExists)
            }
        }
    }
}
