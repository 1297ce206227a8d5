//! Exactly-once effect for retried mutations.
//!
//! This crate provides three pieces that work together:
//!
//! - [`fingerprint`]: canonical serialization and hashing of structured
//!   input, used to derive stable identifiers
//! - [`IdempotencyStore`]: a create-once mapping from a client-supplied key
//!   to the result that was returned for it
//! - [`MutationGateway`]: wraps an operation so that a repeat of the same
//!   key returns the stored result instead of running it again
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tillkeep_idempotency::{InMemoryIdempotencyStore, KeyPolicy, MutationGateway};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let gateway = MutationGateway::new(Arc::new(InMemoryIdempotencyStore::new()));
//!
//! let first = gateway
//!     .execute(Some("abc"), KeyPolicy::Required, || async {
//!         Ok::<_, String>("CANCELLED".to_string())
//!     })
//!     .await
//!     .unwrap();
//!
//! // Same key: the stored result comes back and the closure is not run.
//! let again = gateway
//!     .execute(Some("abc"), KeyPolicy::Required, || async {
//!         Ok::<_, String>("SOMETHING ELSE".to_string())
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(first.value, again.value);
//! assert!(again.replayed);
//! # }
//! ```
//!
//! ## Backends
//!
//! [`InMemoryIdempotencyStore`] is always available. Enable the `redis`
//! feature for `RedisIdempotencyStore`, which uses `SET NX EX` so records
//! expire after a retention window.

pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod key;
pub mod locks;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;

pub use error::{GatewayError, IdempotencyError, IdempotencyResult};
pub use fingerprint::{
    Node, NodeId, ValueGraph, canonical_json, canonical_serialize, derive_id, derive_id_for,
    fingerprint, hash,
};
pub use gateway::{Execution, KeyPolicy, MutationGateway};
pub use key::{CLIENT_KEY_SCOPE, IDEMPOTENCY_KEY_HEADER, extract_key, scoped_client_key};
pub use locks::{ResourceGuard, ResourceLocks};
#[cfg(feature = "redis")]
pub use redis_store::RedisIdempotencyStore;
pub use store::{IdempotencyRecord, IdempotencyStore, InMemoryIdempotencyStore, SaveOutcome};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::error::{GatewayError, IdempotencyError};
    pub use crate::gateway::{Execution, KeyPolicy, MutationGateway};
    pub use crate::key::extract_key;
    pub use crate::store::{IdempotencyStore, InMemoryIdempotencyStore, SaveOutcome};
}
