use moka::future::Cache;
use std::time::Duration;
use tracing::trace;

/// Remembers unknown short codes for a fixed TTL
pub struct MokaNegativeCache {
    inner: Cache<String, ()>,
}

impl MokaNegativeCache {
    pub fn new(max_capacity: u64, ttl_secs: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        trace!(
            "MokaNegativeCache initialized: max_capacity={}, ttl={}s",
            max_capacity, ttl_secs
        );

        Self { inner }
    }

    pub fn contains(&self, key: &str) -> bool {
        let result = self.inner.contains_key(key);
        if result {
            trace!("Negative cache hit for key: {}", key);
        }
        result
    }

    pub async fn mark(&self, key: &str) {
        self.inner.insert(key.to_string(), ()).await;
    }

    pub async fn remove(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    #[cfg(test)]
    pub(crate) async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_and_contains() {
        let cache = MokaNegativeCache::new(1000, 60);

        assert!(!cache.contains("test_key"));

        cache.mark("test_key").await;
        assert!(cache.contains("test_key"));
        assert!(!cache.contains("other_key"));
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = MokaNegativeCache::new(1000, 60);

        cache.mark("test_key").await;
        cache.remove("test_key").await;
        assert!(!cache.contains("test_key"));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MokaNegativeCache::new(1000, 60);

        cache.mark("key1").await;
        cache.mark("key2").await;
        cache.clear();

        // Moka 的 invalidate_all 是异步的，需要等待同步
        cache.sync().await;

        assert!(!cache.contains("key1"));
        assert!(!cache.contains("key2"));
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = MokaNegativeCache::new(1000, 1);

        cache.mark("expiring_key").await;
        assert!(cache.contains("expiring_key"));

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        cache.sync().await;

        assert!(!cache.contains("expiring_key"));
    }
}
