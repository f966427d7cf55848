use async_trait::async_trait;

use crate::storage::ResolvedShortLink;

/// 缓存查询结果
#[derive(Debug, Clone)]
pub enum CacheResult {
    /// 确定不存在（命中负缓存）
    NotFound,
    /// 缓存未命中，需要查询数据库
    Miss,
    /// 成功获取到缓存值
    Found(Box<ResolvedShortLink>),
}

/// Cache of resolved short codes
#[async_trait]
pub trait ShortLinkCache: Send + Sync {
    async fn get(&self, code: &str) -> CacheResult;
    async fn insert(&self, code: &str, value: ResolvedShortLink);
    /// 记录不存在的短码
    async fn mark_not_found(&self, code: &str);
    async fn remove(&self, code: &str);
    async fn invalidate_all(&self);
}
