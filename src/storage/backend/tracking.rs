//! URL tracking persistence

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ExprTrait, QueryFilter, QueryOrder,
};

use super::converters::{model_to_tracking, new_click_to_active_model};
use super::{SeaOrmStorage, op_error, retry};
use crate::errors::{Result, SmartlinkError};
use crate::storage::models::{DedupKey, NewClick, UrlTracking};

use migration::entities::url_tracking;

/// `column = value`，值为 None 时匹配 NULL
fn eq_or_null<V>(column: url_tracking::Column, value: Option<V>) -> Condition
where
    V: Into<sea_orm::Value>,
{
    match value {
        Some(v) => Condition::all().add(column.eq(v)),
        None => Condition::all().add(column.is_null()),
    }
}

impl SeaOrmStorage {
    /// 在去重窗口内查找相同点击
    pub async fn find_duplicate_click(
        &self,
        key: &DedupKey<'_>,
        since: DateTime<Utc>,
    ) -> Result<Option<UrlTracking>> {
        let condition = Condition::all()
            .add(eq_or_null(url_tracking::Column::SmartLinkId, key.smart_link_id))
            .add(url_tracking::Column::Url.eq(key.url))
            .add(eq_or_null(url_tracking::Column::Platform, key.platform))
            .add(url_tracking::Column::UtmSource.eq(key.utm_source))
            .add(url_tracking::Column::UtmMedium.eq(key.utm_medium))
            .add(eq_or_null(url_tracking::Column::UserAgent, key.user_agent))
            .add(url_tracking::Column::CreatedAt.gte(since));

        let db = &self.db;
        let model = retry::with_retry("find_duplicate_click", self.retry_config, || async {
            url_tracking::Entity::find()
                .filter(condition.clone())
                .order_by_desc(url_tracking::Column::CreatedAt)
                .one(db)
                .await
        })
        .await
        .map_err(|e| op_error("查询重复点击", e))?;

        Ok(model.map(model_to_tracking))
    }

    pub async fn insert_click(&self, click: &NewClick) -> Result<UrlTracking> {
        let db = &self.db;
        let now = Utc::now();
        let model = retry::with_retry("insert_click", self.retry_config, || async {
            new_click_to_active_model(click, now).insert(db).await
        })
        .await
        .map_err(|e| op_error("记录点击", e))?;

        Ok(model_to_tracking(model))
    }

    /// 原子递增：`click_count += 1`，`last_click_at = now`
    pub async fn bump_click(&self, id: i64) -> Result<UrlTracking> {
        let db = &self.db;
        let now = Utc::now();
        retry::with_retry(&format!("bump_click({})", id), self.retry_config, || async {
            url_tracking::Entity::update_many()
                .col_expr(
                    url_tracking::Column::ClickCount,
                    Expr::col(url_tracking::Column::ClickCount).add(1),
                )
                .col_expr(url_tracking::Column::LastClickAt, Expr::val(now))
                .filter(url_tracking::Column::Id.eq(id))
                .exec(db)
                .await
        })
        .await
        .map_err(|e| op_error("更新点击", e))?;

        let model = url_tracking::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(|e| op_error("查询点击", e))?;

        model
            .map(model_to_tracking)
            .ok_or_else(|| SmartlinkError::not_found(format!("Tracking record {} not found", id)))
    }
}
