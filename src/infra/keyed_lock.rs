//! Per-key async mutual exclusion
//!
//! Serializes check-then-write sequences that share a key (for example one
//! external identity) without blocking unrelated keys. Lock creation is
//! double-checked so that two callers racing on a fresh key always end up
//! with the same mutex. Callers hand the key back with
//! [`KeyedLocks::release`] once their guard is dropped, so the map only holds
//! keys that are in use.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of lazily created async mutexes, one per key
pub struct KeyedLocks<K> {
    locks: RwLock<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `key`, waiting for any current holder
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        self.entry(key).lock_owned().await
    }

    fn entry(&self, key: &K) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(lock) = locks.get(key) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have created it between the two acquisitions
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the mutex for `key` if nobody holds or waits on it.
    /// Returns whether it was removed.
    pub fn release(&self, key: &K) -> bool {
        let mut locks = self.locks.write().unwrap_or_else(PoisonError::into_inner);
        // The map's own reference is the only one left
        let idle = locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(key);
        }
        idle
    }

    pub fn len(&self) -> usize {
        self.locks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<String>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        let key = "github:alice".to_string();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                let guard = locks.lock(&key).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                drop(guard);
                locks.release(&key);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::<&'static str>::new();
        let _a = locks.lock(&"a").await;

        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&"b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_release_keeps_held_locks() {
        let locks = KeyedLocks::<u32>::new();
        let held = locks.lock(&1).await;
        drop(locks.lock(&2).await);

        assert!(!locks.release(&1));
        assert!(locks.release(&2));
        assert!(!locks.release(&3));
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.release(&1));
        assert!(locks.is_empty());
    }
}
