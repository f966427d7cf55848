use async_trait::async_trait;
use tracing::trace;

use crate::cache::{CacheResult, ShortLinkCache};
use crate::storage::ResolvedShortLink;

/// Used when `cache.enabled = false`: every lookup goes to the database.
pub struct NullShortLinkCache;

#[async_trait]
impl ShortLinkCache for NullShortLinkCache {
    async fn get(&self, code: &str) -> CacheResult {
        trace!("NullShortLinkCache.get called for key: {}", code);
        CacheResult::Miss
    }

    async fn insert(&self, _code: &str, _value: ResolvedShortLink) {}

    async fn mark_not_found(&self, _code: &str) {}

    async fn remove(&self, _code: &str) {}

    async fn invalidate_all(&self) {}
}
