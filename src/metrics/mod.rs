//! Authentication outcome counters

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

pub const API_KEY_SUCCESS: &str = "auth.api_key.success";
pub const API_KEY_FAILURE: &str = "auth.api_key.failure";
pub const SESSION_FAILURE: &str = "auth.session.failure";
pub const PASSWORD_LOGIN: &str = "auth.password.login";
pub const PASSWORD_LOGIN_FAILURE: &str = "auth.password.failure";
pub const OAUTH_LOGIN: &str = "oauth.login";
pub const OAUTH_BIND: &str = "oauth.bind";
pub const OAUTH_PROVISIONED: &str = "oauth.provisioned";
pub const OAUTH_FAILURE: &str = "oauth.failure";

/// Named monotonic counters
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    start_time: Instant,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter
    pub async fn inc_counter(&self, name: &str) {
        self.add_counter(name, 1).await;
    }

    /// Add to a counter
    pub async fn add_counter(&self, name: &str, value: u64) {
        let counters = self.counters.read().await;
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        drop(counters);

        let mut counters = self.counters.write().await;
        counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(value, Ordering::Relaxed);
    }

    /// Current value, 0 for a counter never touched
    pub async fn get_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .await
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.get_counter(OAUTH_LOGIN).await, 0);

        registry.inc_counter(OAUTH_LOGIN).await;
        registry.add_counter(OAUTH_LOGIN, 4).await;

        assert_eq!(registry.get_counter(OAUTH_LOGIN).await, 5);
        assert_eq!(registry.get_counter(OAUTH_BIND).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_increment() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.inc_counter(API_KEY_SUCCESS).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.get_counter(API_KEY_SUCCESS).await, 16);
    }
}
