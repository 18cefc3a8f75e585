//! Read-through caching for account status lookups
//!
//! Every API-key request needs the owning account's status and role. Those
//! reads go through an in-memory LRU with TTL in front of the account store.
//! Status-changing writes must call [`AccountStatusCache::invalidate`] before
//! they return so that a ban is never served stale.
//!
//! A fill that read the store before an invalidation must not land after it.
//! Every invalidation bumps a generation counter, and a fill is dropped when
//! the generation moved while it was reading.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{AccountId, AccountStatus, Role};

use super::{AccountStore, Result};

// ============================================================================
// LRU Cache
// ============================================================================

/// LRU cache with TTL expiry
pub struct LruCache<K, V> {
    max_entries: usize,
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    stats: CacheStats,
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_accessed: Instant,
}

/// Cache statistics
#[derive(Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries: max_entries.max(1),
            ttl,
            entries: RwLock::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    /// Get a live value, dropping it if its TTL has passed
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.get_mut(key) {
            if entry.inserted_at.elapsed() > self.ttl {
                entries.remove(key);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            entry.last_accessed = Instant::now();
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.value.clone());
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn insert(&self, key: K, value: V) {
        self.insert_if(key, value, || true).await;
    }

    /// Insert only if `still_valid` holds once the write lock is taken.
    /// Returns whether the value was stored.
    pub async fn insert_if(&self, key: K, value: V, still_valid: impl FnOnce() -> bool) -> bool {
        let mut entries = self.entries.write().await;
        if !still_valid() {
            return false;
        }

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            self.evict_least_recent(&mut entries);
        }

        let now = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                last_accessed: now,
            },
        );
        true
    }

    pub async fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(key).map(|e| e.value);
        if removed.is_some() {
            self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn evict_least_recent(&self, entries: &mut HashMap<K, CacheEntry<V>>) {
        if let Some(oldest_key) = entries
            .iter()
            .min_by_key(|(_, e)| e.last_accessed)
            .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest_key);
        }
    }
}

// ============================================================================
// Account Status Cache
// ============================================================================

/// The parts of an account needed to gate machine traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub status: AccountStatus,
    pub role: Role,
}

/// Read-through cache of account status and role keyed by account id
pub struct AccountStatusCache {
    accounts: Arc<dyn AccountStore>,
    entries: LruCache<AccountId, AccountSnapshot>,
    generation: AtomicU64,
}

impl AccountStatusCache {
    pub fn new(accounts: Arc<dyn AccountStore>, max_entries: usize, ttl: Duration) -> Self {
        Self {
            accounts,
            entries: LruCache::new(max_entries, ttl),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the account, or `None` if it no longer exists
    pub async fn snapshot(&self, id: AccountId) -> Result<Option<AccountSnapshot>> {
        if let Some(snapshot) = self.entries.get(&id).await {
            return Ok(Some(snapshot));
        }

        let generation = self.generation.load(Ordering::Acquire);
        let Some(account) = self.accounts.get_by_id(id).await? else {
            return Ok(None);
        };

        let snapshot = AccountSnapshot {
            status: account.status,
            role: account.role,
        };
        let stored = self
            .entries
            .insert_if(id, snapshot, || {
                self.generation.load(Ordering::Acquire) == generation
            })
            .await;
        if !stored {
            debug!(account_id = %id, "Skipped caching a snapshot read before an invalidation");
        }
        Ok(Some(snapshot))
    }

    /// Whether the account exists and is enabled
    pub async fn is_enabled(&self, id: AccountId) -> Result<bool> {
        Ok(self
            .snapshot(id)
            .await?
            .map(|s| s.status.is_enabled())
            .unwrap_or(false))
    }

    /// Drop the cached entry; must be awaited by every status or role write
    pub async fn invalidate(&self, id: AccountId) {
        // Bump before removing so a fill racing this call sees the change
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.remove(&id).await;
    }

    pub fn stats(&self) -> &CacheStats {
        self.entries.stats()
    }
}
