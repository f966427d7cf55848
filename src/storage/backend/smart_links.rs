//! SmartLink persistence and per-platform click counters

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, DatabaseBackend,
    EntityTrait, ExprTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use tracing::info;

use super::converters::{model_to_smart_link, smart_link_draft_to_active_model};
use super::{SeaOrmStorage, op_error, retry};
use crate::errors::{Result, SmartlinkError};
use crate::storage::SmartLinkFilter;
use crate::storage::models::{PlatformClickCounts, SmartLink, SmartLinkDraft};

use migration::entities::{
    short_link, short_link_access_stat, smart_link, smart_link_platform_click,
};

impl SeaOrmStorage {
    pub async fn insert_smart_link(&self, draft: &SmartLinkDraft) -> Result<SmartLink> {
        let db = &self.db;
        let active = smart_link_draft_to_active_model(draft, None, Utc::now())?;

        let model = retry::with_retry("insert_smart_link", self.retry_config, || async {
            active.clone().insert(db).await
        })
        .await
        .map_err(|e| op_error("创建 SmartLink", e))?;

        self.invalidate_count_cache();
        info!(
            "SmartLink created: {} (artist {}, id {})",
            model.slug, model.artist_id, model.id
        );
        Ok(model_to_smart_link(model))
    }

    pub async fn get_smart_link(&self, id: i64) -> Result<Option<SmartLink>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_smart_link({})", id),
            self.retry_config,
            || async { smart_link::Entity::find_by_id(id).one(db).await },
        )
        .await
        .map_err(|e| op_error("查询 SmartLink", e))?;

        Ok(model.map(model_to_smart_link))
    }

    pub async fn get_smart_link_by_slug(
        &self,
        artist_id: i64,
        slug: &str,
    ) -> Result<Option<SmartLink>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_smart_link_by_slug({}/{})", artist_id, slug),
            self.retry_config,
            || async {
                smart_link::Entity::find()
                    .filter(smart_link::Column::ArtistId.eq(artist_id))
                    .filter(smart_link::Column::Slug.eq(slug))
                    .one(db)
                    .await
            },
        )
        .await
        .map_err(|e| op_error("查询 SmartLink", e))?;

        Ok(model.map(model_to_smart_link))
    }

    pub async fn get_smart_links_by_ids(&self, ids: &[i64]) -> Result<Vec<SmartLink>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = smart_link::Entity::find()
            .filter(smart_link::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(|e| op_error("批量查询 SmartLink", e))?;
        Ok(models.into_iter().map(model_to_smart_link).collect())
    }

    /// 同一艺人下 slug 是否已被占用
    pub async fn smart_link_slug_taken(
        &self,
        artist_id: i64,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let mut condition = Condition::all()
            .add(smart_link::Column::ArtistId.eq(artist_id))
            .add(smart_link::Column::Slug.eq(slug));
        if let Some(id) = exclude_id {
            condition = condition.add(smart_link::Column::Id.ne(id));
        }

        let count = smart_link::Entity::find()
            .filter(condition)
            .count(&self.db)
            .await
            .map_err(|e| op_error("检查 SmartLink slug", e))?;
        Ok(count > 0)
    }

    pub async fn list_smart_links(
        &self,
        page: u64,
        page_size: u64,
        filter: &SmartLinkFilter,
    ) -> Result<(Vec<SmartLink>, u64)> {
        let mut condition = Condition::all();
        if let Some(artist_id) = filter.artist_id {
            condition = condition.add(smart_link::Column::ArtistId.eq(artist_id));
        }
        if let Some(published) = filter.is_published {
            condition = condition.add(smart_link::Column::IsPublished.eq(published));
        }
        if let Some(ref search) = filter.search {
            condition = condition.add(
                Condition::any()
                    .add(smart_link::Column::TrackTitle.contains(search))
                    .add(smart_link::Column::Slug.contains(search)),
            );
        }

        let db = &self.db;
        let cache_key = format!(
            "count:smart_links:a={:?}:p={:?}:s={:?}",
            filter.artist_id, filter.is_published, filter.search
        );
        let total = self
            .cached_count(cache_key, || {
                let cond = condition.clone();
                async move { smart_link::Entity::find().filter(cond).count(db).await }
            })
            .await?;

        let page_offset = page.saturating_sub(1);
        let models = retry::with_retry("list_smart_links", self.retry_config, || async {
            smart_link::Entity::find()
                .filter(condition.clone())
                .order_by_desc(smart_link::Column::CreatedAt)
                .order_by_desc(smart_link::Column::Id)
                .paginate(db, page_size)
                .fetch_page(page_offset)
                .await
        })
        .await
        .map_err(|e| op_error("分页查询 SmartLink", e))?;

        Ok((models.into_iter().map(model_to_smart_link).collect(), total))
    }

    /// 最近创建的 SmartLink（仪表盘动态）
    pub async fn recent_smart_links(&self, limit: u64) -> Result<Vec<SmartLink>> {
        let models = smart_link::Entity::find()
            .order_by_desc(smart_link::Column::CreatedAt)
            .order_by_desc(smart_link::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(|e| op_error("查询最近 SmartLink", e))?;
        Ok(models.into_iter().map(model_to_smart_link).collect())
    }

    pub async fn update_smart_link(&self, id: i64, draft: &SmartLinkDraft) -> Result<SmartLink> {
        let db = &self.db;
        let active = smart_link_draft_to_active_model(draft, Some(id), Utc::now())?;

        let model = retry::with_retry(
            &format!("update_smart_link({})", id),
            self.retry_config,
            || async { active.clone().update(db).await },
        )
        .await
        .map_err(|e| match e {
            sea_orm::DbErr::RecordNotUpdated => {
                SmartlinkError::not_found(format!("SmartLink {} not found", id))
            }
            other => op_error("更新 SmartLink", other),
        })?;

        self.invalidate_count_cache();
        Ok(model_to_smart_link(model))
    }

    /// 删除 SmartLink 及其平台点击、短链和访问统计（事务）
    ///
    /// 返回被删除的短码，`None` 表示 SmartLink 不存在。
    pub async fn delete_smart_link(&self, id: i64) -> Result<Option<Vec<String>>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| op_error("开始事务", e))?;

        let codes: Vec<String> = short_link::Entity::find()
            .select_only()
            .column(short_link::Column::ShortCode)
            .filter(short_link::Column::SmartLinkId.eq(id))
            .into_tuple::<String>()
            .all(&txn)
            .await
            .map_err(|e| op_error("查询短链", e))?;

        if !codes.is_empty() {
            short_link_access_stat::Entity::delete_many()
                .filter(short_link_access_stat::Column::ShortCode.is_in(codes.clone()))
                .exec(&txn)
                .await
                .map_err(|e| op_error("删除访问统计", e))?;
            short_link::Entity::delete_many()
                .filter(short_link::Column::SmartLinkId.eq(id))
                .exec(&txn)
                .await
                .map_err(|e| op_error("删除短链", e))?;
        }

        smart_link_platform_click::Entity::delete_many()
            .filter(smart_link_platform_click::Column::SmartLinkId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| op_error("删除平台点击", e))?;

        let result = smart_link::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| op_error("删除 SmartLink", e))?;

        if result.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(|e| op_error("回滚事务", e))?;
            return Ok(None);
        }

        txn.commit()
            .await
            .map_err(|e| op_error("提交事务", e))?;

        self.invalidate_count_cache();
        info!(
            "SmartLink deleted: {} ({} short links removed)",
            id,
            codes.len()
        );
        Ok(Some(codes))
    }

    /// SmartLink 总数，可按艺人和创建时间过滤
    pub async fn count_smart_links(
        &self,
        artist_id: Option<i64>,
        created_before: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let mut query = smart_link::Entity::find();
        if let Some(artist_id) = artist_id {
            query = query.filter(smart_link::Column::ArtistId.eq(artist_id));
        }
        if let Some(before) = created_before {
            query = query.filter(smart_link::Column::CreatedAt.lt(before));
        }
        query
            .count(&self.db)
            .await
            .map_err(|e| op_error("统计 SmartLink", e))
    }

    /// 所有 SmartLink 的浏览量之和
    pub async fn total_views(&self) -> Result<i64> {
        let sum: Option<Option<i64>> = smart_link::Entity::find()
            .select_only()
            .column_as(smart_link::Column::ViewCount.sum(), "total_views")
            .into_tuple::<Option<i64>>()
            .one(&self.db)
            .await
            .map_err(|e| op_error("统计浏览量", e))?;
        Ok(sum.flatten().unwrap_or(0))
    }

    /// 记录一次平台点击（事务）：
    /// `platform_click_count += 1` 且 `clicks[platform] += 1`
    ///
    /// SmartLink 不存在时返回 `None`。
    pub async fn increment_platform_click(
        &self,
        id: i64,
        platform: &str,
    ) -> Result<Option<PlatformClickCounts>> {
        let db = &self.db;
        retry::with_retry(
            &format!("increment_platform_click({}, {})", id, platform),
            self.retry_config,
            || async {
                let txn = db.begin().await?;

                let updated = smart_link::Entity::update_many()
                    .col_expr(
                        smart_link::Column::PlatformClickCount,
                        Expr::col(smart_link::Column::PlatformClickCount).add(1),
                    )
                    .filter(smart_link::Column::Id.eq(id))
                    .exec(&txn)
                    .await?;

                if updated.rows_affected == 0 {
                    txn.rollback().await?;
                    return Ok(None);
                }

                let qualified_clicks = (
                    smart_link_platform_click::Entity,
                    smart_link_platform_click::Column::Clicks,
                );
                let on_conflict = match txn.get_database_backend() {
                    DatabaseBackend::MySql => OnConflict::columns([
                        smart_link_platform_click::Column::SmartLinkId,
                        smart_link_platform_click::Column::Platform,
                    ])
                    .value(
                        smart_link_platform_click::Column::Clicks,
                        Expr::col(qualified_clicks).add(Expr::cust("VALUES(clicks)")),
                    )
                    .to_owned(),
                    _ => OnConflict::columns([
                        smart_link_platform_click::Column::SmartLinkId,
                        smart_link_platform_click::Column::Platform,
                    ])
                    .value(
                        smart_link_platform_click::Column::Clicks,
                        Expr::col(qualified_clicks).add(Expr::cust("excluded.clicks")),
                    )
                    .to_owned(),
                };

                smart_link_platform_click::Entity::insert(smart_link_platform_click::ActiveModel {
                    smart_link_id: Set(id),
                    platform: Set(platform.to_string()),
                    clicks: Set(1),
                    ..Default::default()
                })
                .on_conflict(on_conflict)
                .exec_without_returning(&txn)
                .await?;

                let total_clicks: Option<i64> = smart_link::Entity::find_by_id(id)
                    .select_only()
                    .column(smart_link::Column::PlatformClickCount)
                    .into_tuple::<i64>()
                    .one(&txn)
                    .await?;
                let platform_clicks: Option<i64> = smart_link_platform_click::Entity::find()
                    .select_only()
                    .column(smart_link_platform_click::Column::Clicks)
                    .filter(smart_link_platform_click::Column::SmartLinkId.eq(id))
                    .filter(smart_link_platform_click::Column::Platform.eq(platform))
                    .into_tuple::<i64>()
                    .one(&txn)
                    .await?;

                txn.commit().await?;

                Ok::<_, sea_orm::DbErr>(Some(PlatformClickCounts {
                    total_clicks: total_clicks.unwrap_or(0),
                    platform_clicks: platform_clicks.unwrap_or(0),
                }))
            },
        )
        .await
        .map_err(|e| op_error("记录平台点击", e))
    }

    /// 读取 SmartLink 的平台点击 map
    pub async fn platform_clicks(&self, id: i64) -> Result<Vec<(String, i64)>> {
        smart_link_platform_click::Entity::find()
            .select_only()
            .column(smart_link_platform_click::Column::Platform)
            .column(smart_link_platform_click::Column::Clicks)
            .filter(smart_link_platform_click::Column::SmartLinkId.eq(id))
            .order_by_desc(smart_link_platform_click::Column::Clicks)
            .into_tuple::<(String, i64)>()
            .all(&self.db)
            .await
            .map_err(|e| op_error("查询平台点击", e))
    }
}
