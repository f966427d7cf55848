use std::sync::Arc;

use crate::errors::Result;

pub mod backend;
pub mod models;

pub use backend::SeaOrmStorage;
pub use models::*;

/// Filters for the artist list
#[derive(Default, Clone, Debug)]
pub struct ArtistFilter {
    /// 模糊搜索 name 或 slug
    pub search: Option<String>,
}

/// Filters for the SmartLink list
#[derive(Default, Clone, Debug)]
pub struct SmartLinkFilter {
    pub artist_id: Option<i64>,
    pub is_published: Option<bool>,
    /// 模糊搜索 track_title 或 slug
    pub search: Option<String>,
}

/// Filters for the short link list
#[derive(Default, Clone, Debug)]
pub struct ShortLinkFilter {
    pub is_active: Option<bool>,
    pub smart_link_id: Option<i64>,
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create() -> Result<Arc<SeaOrmStorage>> {
        let config = crate::config::get_config();
        let database_url = &config.database.database_url;

        // 从 URL 自动推断数据库类型
        let backend_type = backend::infer_backend_from_url(database_url)?;

        let storage = SeaOrmStorage::new(database_url, &backend_type).await?;
        Ok(Arc::new(storage))
    }
}
