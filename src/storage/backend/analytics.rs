//! Aggregation queries over URL tracking records
//!
//! All aggregations are pushed down to the database with
//! `select_only` + `group_by` and decoded through `FromQueryResult` rows.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Order};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, ExprTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect,
};

use super::{SeaOrmStorage, op_error};
use crate::errors::Result;
use crate::storage::models::DateRange;

use migration::entities::url_tracking;

/// UTM 转化分组
#[derive(Debug, Clone, FromQueryResult)]
pub struct UtmConversionRow {
    pub utm_source: String,
    pub utm_medium: String,
    pub clicks: Option<i64>,
    pub unique_visitors: i64,
    pub platform_count: i64,
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct TopSmartLinkRow {
    pub smart_link_id: i64,
    pub clicks: Option<i64>,
    pub unique_clicks: i64,
    pub platform_count: i64,
}

#[derive(Debug, Clone, Default, FromQueryResult)]
pub struct GlobalTotalsRow {
    pub total_clicks: Option<i64>,
    pub unique_clicks: i64,
    pub smart_links: i64,
    pub artists: i64,
    pub platforms: i64,
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct UtmSourceRow {
    pub utm_source: String,
    pub clicks: Option<i64>,
    pub unique_clicks: i64,
}

/// A/B 测试分组；平均位置由 `position_sum / position_count` 计算
#[derive(Debug, Clone, FromQueryResult)]
pub struct AbTestRow {
    pub variant: String,
    pub clicks: Option<i64>,
    pub unique_clicks: i64,
    pub position_sum: Option<i64>,
    pub position_count: i64,
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct PlatformStatsRow {
    pub platform: String,
    pub clicks: Option<i64>,
    pub unique_clicks: i64,
    pub position_sum: Option<i64>,
    pub position_count: i64,
}

#[derive(Debug, Clone, Default, FromQueryResult)]
pub struct ClickTotalsRow {
    pub clicks: Option<i64>,
    pub unique_clicks: i64,
}

fn range_condition(range: &DateRange) -> Condition {
    Condition::all()
        .add(url_tracking::Column::CreatedAt.gte(range.start))
        .add(url_tracking::Column::CreatedAt.lte(range.end))
}

impl SeaOrmStorage {
    /// 艺人维度：按 (utm_source, utm_medium) 分组
    pub async fn conversions_by_utm(
        &self,
        artist_id: i64,
        range: &DateRange,
    ) -> Result<Vec<UtmConversionRow>> {
        url_tracking::Entity::find()
            .select_only()
            .column(url_tracking::Column::UtmSource)
            .column(url_tracking::Column::UtmMedium)
            .column_as(url_tracking::Column::ClickCount.sum(), "clicks")
            .column_as(url_tracking::Column::Id.count(), "unique_visitors")
            .column_as(Expr::cust("COUNT(DISTINCT platform)"), "platform_count")
            .filter(url_tracking::Column::ArtistId.eq(artist_id))
            .filter(range_condition(range))
            .group_by(url_tracking::Column::UtmSource)
            .group_by(url_tracking::Column::UtmMedium)
            .order_by(url_tracking::Column::ClickCount.sum(), Order::Desc)
            .into_model::<UtmConversionRow>()
            .all(&self.db)
            .await
            .map_err(|e| op_error("统计 UTM 转化", e))
    }

    /// 按点击量排序的 SmartLink，可限定艺人
    pub async fn top_smart_links(
        &self,
        artist_id: Option<i64>,
        range: &DateRange,
        limit: u64,
    ) -> Result<Vec<TopSmartLinkRow>> {
        let mut query = url_tracking::Entity::find()
            .select_only()
            .column(url_tracking::Column::SmartLinkId)
            .column_as(url_tracking::Column::ClickCount.sum(), "clicks")
            .column_as(url_tracking::Column::Id.count(), "unique_clicks")
            .column_as(Expr::cust("COUNT(DISTINCT platform)"), "platform_count")
            .filter(url_tracking::Column::SmartLinkId.is_not_null())
            .filter(range_condition(range));
        if let Some(artist_id) = artist_id {
            query = query.filter(url_tracking::Column::ArtistId.eq(artist_id));
        }

        query
            .group_by(url_tracking::Column::SmartLinkId)
            .order_by(url_tracking::Column::ClickCount.sum(), Order::Desc)
            .limit(limit)
            .into_model::<TopSmartLinkRow>()
            .all(&self.db)
            .await
            .map_err(|e| op_error("统计热门 SmartLink", e))
    }

    pub async fn global_totals(&self, range: &DateRange) -> Result<GlobalTotalsRow> {
        let row = url_tracking::Entity::find()
            .select_only()
            .column_as(url_tracking::Column::ClickCount.sum(), "total_clicks")
            .column_as(url_tracking::Column::Id.count(), "unique_clicks")
            .column_as(Expr::cust("COUNT(DISTINCT smart_link_id)"), "smart_links")
            .column_as(Expr::cust("COUNT(DISTINCT artist_id)"), "artists")
            .column_as(Expr::cust("COUNT(DISTINCT platform)"), "platforms")
            .filter(range_condition(range))
            .into_model::<GlobalTotalsRow>()
            .one(&self.db)
            .await
            .map_err(|e| op_error("统计全局点击", e))?;

        Ok(row.unwrap_or_default())
    }

    /// 按 utm_source 分组，可限定 SmartLink 和时间
    pub async fn top_utm_sources(
        &self,
        smart_link_id: Option<i64>,
        range: Option<&DateRange>,
        limit: u64,
    ) -> Result<Vec<UtmSourceRow>> {
        let mut query = url_tracking::Entity::find()
            .select_only()
            .column(url_tracking::Column::UtmSource)
            .column_as(url_tracking::Column::ClickCount.sum(), "clicks")
            .column_as(url_tracking::Column::Id.count(), "unique_clicks");
        if let Some(id) = smart_link_id {
            query = query.filter(url_tracking::Column::SmartLinkId.eq(id));
        }
        if let Some(range) = range {
            query = query.filter(range_condition(range));
        }

        query
            .group_by(url_tracking::Column::UtmSource)
            .order_by(url_tracking::Column::ClickCount.sum(), Order::Desc)
            .limit(limit)
            .into_model::<UtmSourceRow>()
            .all(&self.db)
            .await
            .map_err(|e| op_error("统计 UTM 来源", e))
    }

    pub async fn ab_test_performance(&self, range: &DateRange) -> Result<Vec<AbTestRow>> {
        url_tracking::Entity::find()
            .select_only()
            .column_as(url_tracking::Column::AbTestVariant, "variant")
            .column_as(url_tracking::Column::ClickCount.sum(), "clicks")
            .column_as(url_tracking::Column::Id.count(), "unique_clicks")
            .column_as(url_tracking::Column::PlatformPosition.sum(), "position_sum")
            .column_as(url_tracking::Column::PlatformPosition.count(), "position_count")
            .filter(url_tracking::Column::AbTestVariant.is_not_null())
            .filter(range_condition(range))
            .group_by(url_tracking::Column::AbTestVariant)
            .order_by(url_tracking::Column::ClickCount.sum(), Order::Desc)
            .into_model::<AbTestRow>()
            .all(&self.db)
            .await
            .map_err(|e| op_error("统计 A/B 测试", e))
    }

    /// 平台维度统计（全时段）
    pub async fn platform_stats(&self, limit: u64) -> Result<Vec<PlatformStatsRow>> {
        url_tracking::Entity::find()
            .select_only()
            .column(url_tracking::Column::Platform)
            .column_as(url_tracking::Column::ClickCount.sum(), "clicks")
            .column_as(url_tracking::Column::Id.count(), "unique_clicks")
            .column_as(url_tracking::Column::PlatformPosition.sum(), "position_sum")
            .column_as(url_tracking::Column::PlatformPosition.count(), "position_count")
            .filter(url_tracking::Column::Platform.is_not_null())
            .group_by(url_tracking::Column::Platform)
            .order_by(url_tracking::Column::ClickCount.sum(), Order::Desc)
            .limit(limit)
            .into_model::<PlatformStatsRow>()
            .all(&self.db)
            .await
            .map_err(|e| op_error("统计平台", e))
    }

    /// 点击总量与记录数，时间边界为 `[since, until)`
    pub async fn click_totals(
        &self,
        smart_link_id: Option<i64>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<ClickTotalsRow> {
        let mut query = url_tracking::Entity::find()
            .select_only()
            .column_as(url_tracking::Column::ClickCount.sum(), "clicks")
            .column_as(url_tracking::Column::Id.count(), "unique_clicks");
        if let Some(id) = smart_link_id {
            query = query.filter(url_tracking::Column::SmartLinkId.eq(id));
        }
        if let Some(since) = since {
            query = query.filter(url_tracking::Column::CreatedAt.gte(since));
        }
        if let Some(until) = until {
            query = query.filter(url_tracking::Column::CreatedAt.lt(until));
        }

        let row = query
            .into_model::<ClickTotalsRow>()
            .one(&self.db)
            .await
            .map_err(|e| op_error("统计点击总量", e))?;
        Ok(row.unwrap_or_default())
    }
}
