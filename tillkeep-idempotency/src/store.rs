//! Idempotency store trait and the in-memory backend.

use crate::error::IdempotencyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;

/// A stored result, written once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub result: Value,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(key: impl Into<String>, result: Value) -> Self {
        Self {
            key: key.into(),
            result,
            created_at: Utc::now(),
        }
    }
}

/// What a [`IdempotencyStore::save`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// This call wrote the record.
    Created,
    /// Another writer got there first; the stored record was left untouched.
    AlreadyExists,
    /// The key was empty, so nothing was stored.
    Skipped,
}

/// Durable mapping from idempotency key to a previously returned result.
///
/// Implementations must give read-your-writes: a `lookup` issued after a
/// `save` completed observes it. A duplicate key on save is not an error.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Stored result for `key`, or `None` for an empty or unknown key.
    async fn lookup(&self, key: &str) -> IdempotencyResult<Option<Value>>;

    /// Create the record for `key` unless one already exists.
    async fn save(&self, key: &str, result: &Value) -> IdempotencyResult<SaveOutcome>;
}

/// Process-local store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    records: RwLock<HashMap<String, IdempotencyRecord>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full record for `key`, including its creation time.
    pub async fn record(&self, key: &str) -> Option<IdempotencyRecord> {
        self.records.read().await.get(key).cloned()
    }

    /// Drop records created before `cutoff`. Returns how many were removed.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.created_at >= cutoff);
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn lookup(&self, key: &str) -> IdempotencyResult<Option<Value>> {
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self
            .records
            .read()
            .await
            .get(key)
            .map(|record| record.result.clone()))
    }

    async fn save(&self, key: &str, result: &Value) -> IdempotencyResult<SaveOutcome> {
        if key.is_empty() {
            return Ok(SaveOutcome::Skipped);
        }

        let mut records = self.records.write().await;
        match records.entry(key.to_string()) {
            Entry::Occupied(_) => {
                tillkeep_log::debug!(
                    fields: { "key" => key },
                    "Idempotency record already present, keeping first write"
                );
                Ok(SaveOutcome::AlreadyExists)
            }
            Entry::Vacant(slot) => {
                slot.insert(IdempotencyRecord::new(key, result.clone()));
                Ok(SaveOutcome::Created)
            }
        }
    }
}
