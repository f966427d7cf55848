//! Artist persistence

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use tracing::info;

use super::converters::{artist_draft_to_active_model, model_to_artist};
use super::{SeaOrmStorage, op_error, retry};
use crate::errors::{Result, SmartlinkError};
use crate::storage::ArtistFilter;
use crate::storage::models::{Artist, ArtistDraft};

use migration::entities::artist;

impl SeaOrmStorage {
    pub async fn insert_artist(&self, draft: &ArtistDraft) -> Result<Artist> {
        let db = &self.db;
        let now = Utc::now();

        let model = retry::with_retry("insert_artist", self.retry_config, || async {
            artist_draft_to_active_model(draft, None, now)
                .insert(db)
                .await
        })
        .await
        .map_err(|e| op_error("创建艺人", e))?;

        self.invalidate_count_cache();
        info!("Artist created: {} ({})", model.slug, model.id);
        Ok(model_to_artist(model))
    }

    pub async fn get_artist(&self, id: i64) -> Result<Option<Artist>> {
        let db = &self.db;
        let model = retry::with_retry(&format!("get_artist({})", id), self.retry_config, || async {
            artist::Entity::find_by_id(id).one(db).await
        })
        .await
        .map_err(|e| op_error("查询艺人", e))?;

        Ok(model.map(model_to_artist))
    }

    pub async fn get_artist_by_slug(&self, slug: &str) -> Result<Option<Artist>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_artist_by_slug({})", slug),
            self.retry_config,
            || async {
                artist::Entity::find()
                    .filter(artist::Column::Slug.eq(slug))
                    .one(db)
                    .await
            },
        )
        .await
        .map_err(|e| op_error("查询艺人", e))?;

        Ok(model.map(model_to_artist))
    }

    /// 批量获取艺人（列表页拼接艺人名称使用）
    pub async fn get_artists_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Artist>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let db = &self.db;
        let models = retry::with_retry("get_artists_by_ids", self.retry_config, || async {
            artist::Entity::find()
                .filter(artist::Column::Id.is_in(ids.iter().copied()))
                .all(db)
                .await
        })
        .await
        .map_err(|e| op_error("批量查询艺人", e))?;

        Ok(models
            .into_iter()
            .map(|m| (m.id, model_to_artist(m)))
            .collect())
    }

    /// slug 是否已被其它艺人占用
    pub async fn artist_slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let mut condition = Condition::all().add(artist::Column::Slug.eq(slug));
        if let Some(id) = exclude_id {
            condition = condition.add(artist::Column::Id.ne(id));
        }

        let count = artist::Entity::find()
            .filter(condition)
            .count(&self.db)
            .await
            .map_err(|e| op_error("检查艺人 slug", e))?;
        Ok(count > 0)
    }

    pub async fn list_artists(
        &self,
        page: u64,
        page_size: u64,
        filter: &ArtistFilter,
    ) -> Result<(Vec<Artist>, u64)> {
        let mut condition = Condition::all();
        if let Some(ref search) = filter.search {
            condition = condition.add(
                Condition::any()
                    .add(artist::Column::Name.contains(search))
                    .add(artist::Column::Slug.contains(search)),
            );
        }

        let db = &self.db;
        let cache_key = format!("count:artists:s={:?}", filter.search);
        let total = self
            .cached_count(cache_key, || {
                let cond = condition.clone();
                async move { artist::Entity::find().filter(cond).count(db).await }
            })
            .await?;

        let page_offset = page.saturating_sub(1);
        let models = retry::with_retry("list_artists", self.retry_config, || async {
            artist::Entity::find()
                .filter(condition.clone())
                .order_by_asc(artist::Column::Name)
                .paginate(db, page_size)
                .fetch_page(page_offset)
                .await
        })
        .await
        .map_err(|e| op_error("分页查询艺人", e))?;

        Ok((models.into_iter().map(model_to_artist).collect(), total))
    }

    pub async fn update_artist(&self, id: i64, draft: &ArtistDraft) -> Result<Artist> {
        let db = &self.db;
        let now = Utc::now();

        let model = retry::with_retry(
            &format!("update_artist({})", id),
            self.retry_config,
            || async {
                artist_draft_to_active_model(draft, Some(id), now)
                    .update(db)
                    .await
            },
        )
        .await
        .map_err(|e| match e {
            sea_orm::DbErr::RecordNotUpdated => {
                SmartlinkError::not_found(format!("Artist {} not found", id))
            }
            other => op_error("更新艺人", other),
        })?;

        self.invalidate_count_cache();
        Ok(model_to_artist(model))
    }

    /// 删除艺人，返回是否存在
    pub async fn delete_artist(&self, id: i64) -> Result<bool> {
        let db = &self.db;
        let result = retry::with_retry(
            &format!("delete_artist({})", id),
            self.retry_config,
            || async { artist::Entity::delete_by_id(id).exec(db).await },
        )
        .await
        .map_err(|e| op_error("删除艺人", e))?;

        if result.rows_affected > 0 {
            self.invalidate_count_cache();
            info!("Artist deleted: {}", id);
        }
        Ok(result.rows_affected > 0)
    }

    /// 艺人总数；`created_before` 用于计算环比
    pub async fn count_artists(&self, created_before: Option<DateTime<Utc>>) -> Result<u64> {
        let mut query = artist::Entity::find();
        if let Some(before) = created_before {
            query = query.filter(artist::Column::CreatedAt.lt(before));
        }
        query
            .count(&self.db)
            .await
            .map_err(|e| op_error("统计艺人", e))
    }
}
