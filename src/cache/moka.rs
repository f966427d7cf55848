use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::negative::MokaNegativeCache;
use crate::cache::{CacheResult, ShortLinkCache};
use crate::config::CacheConfig;
use crate::storage::ResolvedShortLink;

/// 过期策略：TTL = min(default_ttl, expires_at - now)
struct ShortLinkExpiry {
    default_ttl: Duration,
}

impl ShortLinkExpiry {
    fn ttl_for(&self, value: &ResolvedShortLink) -> Duration {
        match value.short_link.expires_at {
            Some(expires_at) => {
                let now = chrono::Utc::now();
                if expires_at <= now {
                    // 已过期，设置极短 TTL
                    Duration::from_secs(1)
                } else {
                    let remaining = (expires_at - now).num_seconds().max(1) as u64;
                    Duration::from_secs(remaining.min(self.default_ttl.as_secs()))
                }
            }
            None => self.default_ttl,
        }
    }
}

impl Expiry<String, ResolvedShortLink> for ShortLinkExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &ResolvedShortLink,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl_for(value))
    }
}

/// Positive + negative short code cache backed by moka
pub struct MokaShortLinkCache {
    inner: Cache<String, ResolvedShortLink>,
    negative: MokaNegativeCache,
}

impl MokaShortLinkCache {
    pub fn new(config: &CacheConfig) -> Self {
        let default_ttl = Duration::from_secs(config.default_ttl);

        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(ShortLinkExpiry { default_ttl })
            .build();

        debug!(
            "MokaShortLinkCache initialized with max capacity: {}, default TTL: {}s, negative TTL: {}s",
            config.max_capacity, config.default_ttl, config.negative_ttl
        );
        Self {
            inner,
            negative: MokaNegativeCache::new(config.max_capacity, config.negative_ttl),
        }
    }
}

#[async_trait]
impl ShortLinkCache for MokaShortLinkCache {
    async fn get(&self, code: &str) -> CacheResult {
        if let Some(value) = self.inner.get(code).await {
            return CacheResult::Found(Box::new(value));
        }
        if self.negative.contains(code) {
            return CacheResult::NotFound;
        }
        CacheResult::Miss
    }

    async fn insert(&self, code: &str, value: ResolvedShortLink) {
        self.negative.remove(code).await;
        self.inner.insert(code.to_string(), value).await;
    }

    async fn mark_not_found(&self, code: &str) {
        self.negative.mark(code).await;
    }

    async fn remove(&self, code: &str) {
        self.inner.invalidate(code).await;
        self.negative.remove(code).await;
    }

    async fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.negative.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ArtistSummary, ShortLink, SmartLinkSummary};
    use chrono::Utc;

    fn test_config() -> CacheConfig {
        CacheConfig {
            enabled: true,
            default_ttl: 3600,
            max_capacity: 100,
            negative_ttl: 60,
        }
    }

    fn resolved(code: &str, expires_at: Option<chrono::DateTime<Utc>>) -> ResolvedShortLink {
        ResolvedShortLink::new(
            ShortLink {
                short_code: code.to_string(),
                smart_link_id: 1,
                click_count: 0,
                unique_visitors: 0,
                is_active: true,
                expires_at,
                created_by: None,
                last_accessed_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            SmartLinkSummary {
                id: 1,
                track_title: "Night Drive".to_string(),
                slug: "night-drive".to_string(),
            },
            ArtistSummary {
                id: 1,
                name: "Nova".to_string(),
                slug: "nova".to_string(),
            },
        )
    }

    #[test]
    fn test_ttl_is_capped_by_expiry() {
        let expiry = ShortLinkExpiry {
            default_ttl: Duration::from_secs(3600),
        };
        assert_eq!(
            expiry.ttl_for(&resolved("a", None)),
            Duration::from_secs(3600)
        );

        let soon = resolved("a", Some(Utc::now() + chrono::Duration::seconds(120)));
        assert!(expiry.ttl_for(&soon) <= Duration::from_secs(120));

        let past = resolved("a", Some(Utc::now() - chrono::Duration::seconds(5)));
        assert_eq!(expiry.ttl_for(&past), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_found_miss_and_not_found() {
        let cache = MokaShortLinkCache::new(&test_config());

        assert!(matches!(cache.get("abc123").await, CacheResult::Miss));

        cache.mark_not_found("abc123").await;
        assert!(matches!(cache.get("abc123").await, CacheResult::NotFound));

        // 写入正缓存会清除负缓存
        cache.insert("abc123", resolved("abc123", None)).await;
        match cache.get("abc123").await {
            CacheResult::Found(value) => assert_eq!(value.artist.slug, "nova"),
            other => panic!("unexpected cache result: {:?}", other),
        }

        cache.remove("abc123").await;
        assert!(matches!(cache.get("abc123").await, CacheResult::Miss));
    }
}
