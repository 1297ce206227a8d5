//! The mutation gateway.

use crate::error::GatewayError;
use crate::key::scoped_client_key;
use crate::locks::ResourceLocks;
use crate::store::{IdempotencyStore, SaveOutcome};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// Whether an operation insists on an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Financial state changes: no key, no execution.
    Required,
    /// Run directly when no key is supplied.
    Optional,
}

/// Result of a gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution<T> {
    pub value: T,
    /// `true` when `value` came from the store rather than from running the
    /// operation in this call.
    pub replayed: bool,
}

impl<T> Execution<T> {
    fn fresh(value: T) -> Self {
        Self { value, replayed: false }
    }

    fn replayed(value: T) -> Self {
        Self { value, replayed: true }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Wraps operations with idempotency-key lookup and store-and-return.
///
/// Two concurrent first attempts with the same key may both run the
/// operation. Only the first save is kept, and the loser returns the
/// winner's stored result, so every caller sees the same value. Use
/// [`execute_exclusive`](Self::execute_exclusive) when running twice would
/// itself be visible.
#[derive(Clone)]
pub struct MutationGateway {
    store: Arc<dyn IdempotencyStore>,
    locks: ResourceLocks,
}

impl MutationGateway {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            store,
            locks: ResourceLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn IdempotencyStore> {
        &self.store
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.locks
    }

    /// Run `op` at most once per idempotency key.
    ///
    /// `key` is used as the store key verbatim, so callers own its
    /// namespace; client-supplied keys go through
    /// [`execute_exclusive`](Self::execute_exclusive). A blank key counts as
    /// no key. If the store cannot be reached before
    /// the operation runs, the operation is not run. If `op` fails, nothing
    /// is stored and the same key may be retried.
    pub async fn execute<T, E, F, Fut>(
        &self,
        key: Option<&str>,
        policy: KeyPolicy,
        op: F,
    ) -> Result<Execution<T>, GatewayError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => {
                return match policy {
                    KeyPolicy::Required => Err(GatewayError::MissingIdempotencyKey),
                    KeyPolicy::Optional => op()
                        .await
                        .map(Execution::fresh)
                        .map_err(GatewayError::Operation),
                };
            }
        };

        if let Some(stored) = self.lookup(key).await? {
            tillkeep_log::debug!(fields: { "key" => key }, "Replaying stored result");
            return decode(key, stored).map(Execution::replayed);
        }

        let value = op().await.map_err(GatewayError::Operation)?;

        let encoded = serde_json::to_value(&value)
            .map_err(|e| GatewayError::UnencodableResult(format!("{}: {}", key, e)))?;

        match self.store.save(key, &encoded).await {
            Ok(SaveOutcome::Created) => {
                tillkeep_log::debug!(fields: { "key" => key }, "Stored result");
                Ok(Execution::fresh(value))
            }
            Ok(SaveOutcome::Skipped) => Ok(Execution::fresh(value)),
            Ok(SaveOutcome::AlreadyExists) => {
                tillkeep_log::debug!(
                    fields: { "key" => key },
                    "Lost save race, returning the stored result"
                );
                match self.lookup(key).await? {
                    Some(winner) => decode(key, winner).map(Execution::replayed),
                    None => Ok(Execution::fresh(value)),
                }
            }
            Err(err) => {
                tillkeep_log::error!(
                    fields: { "key" => key, "error" => err },
                    "Idempotency store unavailable after operation ran"
                );
                Err(GatewayError::StoreUnavailable(err))
            }
        }
    }

    /// Run a client request against `resource`, holding an exclusive lock on
    /// it for the whole lookup, run and save.
    ///
    /// `key` is the client's key and is stored under
    /// [`scoped_client_key`], so it only replays for the same resource and
    /// can never collide with a key the service derives for itself.
    /// Sequential retries of the same key always observe the first
    /// attempt's saved result, and two different keys cannot touch the same
    /// resource at once.
    pub async fn execute_exclusive<T, E, F, Fut>(
        &self,
        key: Option<&str>,
        policy: KeyPolicy,
        resource: &str,
        op: F,
    ) -> Result<Execution<T>, GatewayError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let scoped = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| scoped_client_key(resource, k));

        let _guard = self.locks.acquire(resource).await;
        self.execute(scoped.as_deref(), policy, op).await
    }

    async fn lookup<E>(&self, key: &str) -> Result<Option<serde_json::Value>, GatewayError<E>> {
        self.store.lookup(key).await.map_err(|err| {
            tillkeep_log::error!(
                fields: { "key" => key, "error" => err },
                "Idempotency store unavailable"
            );
            GatewayError::StoreUnavailable(err)
        })
    }
}

fn decode<T: DeserializeOwned, E>(key: &str, stored: serde_json::Value) -> Result<T, GatewayError<E>> {
    serde_json::from_value(stored)
        .map_err(|e| GatewayError::CorruptRecord(format!("{}: {}", key, e)))
}
