//! SeaORM storage backend
//!
//! This module provides database storage using SeaORM,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL.

mod analytics;
mod artists;
mod connection;
mod converters;
mod counter_sink;
mod short_links;
mod smart_links;
mod tracking;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::{debug, warn};

use crate::analytics::CounterSink;
use crate::errors::{Result, SmartlinkError};

pub use analytics::{
    AbTestRow, ClickTotalsRow, GlobalTotalsRow, PlatformStatsRow, TopSmartLinkRow,
    UtmConversionRow, UtmSourceRow,
};
pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use converters::*;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(SmartlinkError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 把 DbErr 转换为带上下文的错误（唯一约束冲突保留为 Conflict）
pub(crate) fn op_error(context: &str, err: DbErr) -> SmartlinkError {
    match SmartlinkError::from(err) {
        SmartlinkError::DatabaseOperation(msg) => {
            SmartlinkError::database_operation(format!("{}失败: {}", context, msg))
        }
        other => other,
    }
}

/// 分页后计算总页数
pub fn total_pages(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    /// 分页 COUNT 缓存（TTL 30秒）
    count_cache: Cache<String, u64>,
    retry_config: retry::RetryConfig,
}

impl SeaOrmStorage {
    pub async fn new(database_url: &str, backend_name: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(SmartlinkError::database_config(
                "database_url 未设置".to_string(),
            ));
        }

        let config = crate::config::get_config();
        let retry_config = retry::RetryConfig::from_config(&config.database);

        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, backend_name).await?
        };

        let storage = SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
            count_cache: Cache::builder()
                .time_to_live(Duration::from_secs(30))
                .max_capacity(100)
                .build(),
            retry_config,
        };

        run_migrations(&storage.db).await?;

        warn!(
            "{} Storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn as_counter_sink(&self) -> Arc<dyn CounterSink> {
        Arc::new(self.clone()) as Arc<dyn CounterSink>
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 数据库连通性检查（健康检查使用）
    pub async fn ping(&self) -> Result<()> {
        self.db
            .execute_unprepared("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| SmartlinkError::database_connection(e.to_string()))
    }

    /// 清除分页 COUNT 缓存（数据变更时调用）
    pub fn invalidate_count_cache(&self) {
        self.count_cache.invalidate_all();
    }

    /// 从缓存读取 COUNT，未命中时执行 `count` 并缓存
    async fn cached_count<F, Fut>(&self, cache_key: String, count: F) -> Result<u64>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<u64, DbErr>>,
    {
        if let Some(cached) = self.count_cache.get(&cache_key) {
            debug!("count cache hit: key={}, value={}", cache_key, cached);
            return Ok(cached);
        }

        let total = retry::with_retry(&cache_key, self.retry_config, count)
            .await
            .map_err(|e| op_error("COUNT 查询", e))?;
        self.count_cache.insert(cache_key, total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("sqlite://data.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("links.db").unwrap(), "sqlite");
        assert_eq!(
            infer_backend_from_url("mariadb://u:p@localhost/db").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("postgresql://localhost/db").unwrap(),
            "postgres"
        );
        assert!(infer_backend_from_url("redis://localhost").is_err());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 25), 0);
        assert_eq!(total_pages(25, 25), 1);
        assert_eq!(total_pages(26, 25), 2);
        assert_eq!(total_pages(10, 0), 0);
    }

    #[test]
    fn test_op_error_keeps_not_found_context() {
        let err = op_error("查询艺人", DbErr::Custom("boom".to_string()));
        assert!(matches!(
            err,
            SmartlinkError::DatabaseOperation(ref m) if m.starts_with("查询艺人失败")
        ));
    }
}
