pub mod moka;
pub mod negative;
pub mod null;
pub mod traits;

use std::sync::Arc;

use tracing::info;

pub use traits::{CacheResult, ShortLinkCache};

use crate::config::CacheConfig;

/// 根据配置创建短码缓存
pub fn create_cache(config: &CacheConfig) -> Arc<dyn ShortLinkCache> {
    if config.enabled {
        Arc::new(moka::MokaShortLinkCache::new(config))
    } else {
        info!("Short link cache disabled");
        Arc::new(null::NullShortLinkCache)
    }
}
