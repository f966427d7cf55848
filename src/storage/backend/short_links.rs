//! Short link persistence

use chrono::Utc;
use sea_orm::sea_query::{IntoCondition, Query};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use tracing::info;

use super::converters::{model_to_short_link, short_link_to_active_model};
use super::{SeaOrmStorage, op_error, retry};
use crate::errors::Result;
use crate::storage::ShortLinkFilter;
use crate::storage::models::{AccessStat, ShortLink};

use migration::entities::{short_link, short_link_access_stat, smart_link};

impl SeaOrmStorage {
    pub async fn short_code_exists(&self, code: &str) -> Result<bool> {
        let count = short_link::Entity::find_by_id(code)
            .count(&self.db)
            .await
            .map_err(|e| op_error("检查短码", e))?;
        Ok(count > 0)
    }

    /// 插入新短链；短码冲突时返回 Conflict
    pub async fn insert_short_link(&self, link: &ShortLink) -> Result<()> {
        let db = &self.db;
        retry::with_retry(
            &format!("insert_short_link({})", link.short_code),
            self.retry_config,
            || async {
                short_link::Entity::insert(short_link_to_active_model(link))
                    .exec_without_returning(db)
                    .await
            },
        )
        .await
        .map_err(|e| op_error("创建短链", e))?;

        self.invalidate_count_cache();
        info!(
            "Short link created: {} -> SmartLink {}",
            link.short_code, link.smart_link_id
        );
        Ok(())
    }

    pub async fn get_short_link(&self, code: &str) -> Result<Option<ShortLink>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_short_link({})", code),
            self.retry_config,
            || async { short_link::Entity::find_by_id(code).one(db).await },
        )
        .await
        .map_err(|e| op_error("查询短链", e))?;

        Ok(model.map(model_to_short_link))
    }

    /// SmartLink 当前可用的短链（激活状态，最新创建优先）
    pub async fn find_active_short_link(&self, smart_link_id: i64) -> Result<Option<ShortLink>> {
        let now = Utc::now();
        let model = short_link::Entity::find()
            .filter(short_link::Column::SmartLinkId.eq(smart_link_id))
            .filter(short_link::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(short_link::Column::ExpiresAt.is_null())
                    .add(short_link::Column::ExpiresAt.gt(now)),
            )
            .order_by_desc(short_link::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(|e| op_error("查询激活短链", e))?;

        Ok(model.map(model_to_short_link))
    }

    /// SmartLink 名下全部短码（含未激活）
    pub async fn short_codes_for_smart_link(&self, smart_link_id: i64) -> Result<Vec<String>> {
        self.short_codes_where(short_link::Column::SmartLinkId.eq(smart_link_id))
            .await
    }

    /// 艺人所有 SmartLink 名下的短码
    pub async fn short_codes_for_artist(&self, artist_id: i64) -> Result<Vec<String>> {
        let owned = Query::select()
            .column(smart_link::Column::Id)
            .from(smart_link::Entity)
            .and_where(smart_link::Column::ArtistId.eq(artist_id))
            .to_owned();
        self.short_codes_where(short_link::Column::SmartLinkId.in_subquery(owned))
            .await
    }

    async fn short_codes_where(&self, condition: impl IntoCondition) -> Result<Vec<String>> {
        short_link::Entity::find()
            .select_only()
            .column(short_link::Column::ShortCode)
            .filter(condition)
            .into_tuple::<String>()
            .all(&self.db)
            .await
            .map_err(|e| op_error("查询短码", e))
    }

    pub async fn list_short_links(
        &self,
        page: u64,
        page_size: u64,
        filter: &ShortLinkFilter,
    ) -> Result<(Vec<ShortLink>, u64)> {
        let mut condition = Condition::all();
        if let Some(active) = filter.is_active {
            condition = condition.add(short_link::Column::IsActive.eq(active));
        }
        if let Some(smart_link_id) = filter.smart_link_id {
            condition = condition.add(short_link::Column::SmartLinkId.eq(smart_link_id));
        }

        let db = &self.db;
        let cache_key = format!(
            "count:short_links:a={:?}:l={:?}",
            filter.is_active, filter.smart_link_id
        );
        let total = self
            .cached_count(cache_key, || {
                let cond = condition.clone();
                async move { short_link::Entity::find().filter(cond).count(db).await }
            })
            .await?;

        let page_offset = page.saturating_sub(1);
        let models = retry::with_retry("list_short_links", self.retry_config, || async {
            short_link::Entity::find()
                .filter(condition.clone())
                .order_by_desc(short_link::Column::CreatedAt)
                .order_by_desc(short_link::Column::ShortCode)
                .paginate(db, page_size)
                .fetch_page(page_offset)
                .await
        })
        .await
        .map_err(|e| op_error("分页查询短链", e))?;

        Ok((models.into_iter().map(model_to_short_link).collect(), total))
    }

    /// 修改激活状态，返回短码是否存在
    pub async fn set_short_link_active(&self, code: &str, active: bool) -> Result<bool> {
        let db = &self.db;
        let now = Utc::now();
        let result = retry::with_retry(
            &format!("set_short_link_active({}, {})", code, active),
            self.retry_config,
            || async {
                short_link::Entity::update_many()
                    .set(short_link::ActiveModel {
                        is_active: Set(active),
                        updated_at: Set(now),
                        ..Default::default()
                    })
                    .filter(short_link::Column::ShortCode.eq(code))
                    .exec(db)
                    .await
            },
        )
        .await
        .map_err(|e| op_error("更新短链状态", e))?;

        if result.rows_affected > 0 {
            self.invalidate_count_cache();
            info!(
                "Short link {}: {}",
                if active { "activated" } else { "deactivated" },
                code
            );
        }
        Ok(result.rows_affected > 0)
    }

    /// 访问统计 map，按 count 降序
    pub async fn access_stats(&self, code: &str) -> Result<Vec<AccessStat>> {
        let rows = short_link_access_stat::Entity::find()
            .filter(short_link_access_stat::Column::ShortCode.eq(code))
            .order_by_desc(short_link_access_stat::Column::Count)
            .order_by_asc(short_link_access_stat::Column::Value)
            .all(&self.db)
            .await
            .map_err(|e| op_error("查询访问统计", e))?;

        Ok(rows
            .into_iter()
            .map(|m| AccessStat {
                dimension: m.dimension,
                value: m.value,
                count: m.count,
            })
            .collect())
    }
}
