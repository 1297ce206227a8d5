//! Per-resource async locks.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A set of named async mutexes, one per resource id.
///
/// Entries are created on first use and removed when the last holder or
/// waiter lets go, so the map only grows with the number of resources
/// currently in contention.
#[derive(Clone, Default)]
pub struct ResourceLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `resource`.
    pub async fn acquire(&self, resource: &str) -> ResourceGuard {
        let mutex = self
            .inner
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = mutex.lock_owned().await;

        ResourceGuard {
            locks: self.inner.clone(),
            resource: resource.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of resources currently locked or awaited.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held while a resource is locked; releases on drop.
pub struct ResourceGuard {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    resource: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ResourceGuard {
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.resource, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_releases_entry() {
        let locks = ResourceLocks::new();
        {
            let guard = locks.acquire("S1").await;
            assert_eq!(guard.resource(), "S1");
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_resource_is_serialized() {
        let locks = ResourceLocks::new();
        let first = locks.acquire("S1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("S1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_resources_do_not_block() {
        let locks = ResourceLocks::new();
        let _a = locks.acquire("A").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("B")).await;
        assert!(b.is_ok());
    }
}
