//! Analytics API 端点
//!
//! - SmartLink 浏览/平台点击转化
//! - 艺人 UTM 转化与热门 SmartLink
//! - 全局汇总与 A/B 测试
//! - 平台排行
//! - 仪表盘

use actix_web::{HttpResponse, Result as ActixResult, web};
use std::sync::Arc;
use tracing::trace;

use crate::services::{AnalyticsService, parse_date_range};

use super::error_code::Resource;
use super::helpers::{api_result, resource_error};
use super::types::{DateRangeQuery, LimitQuery};

const DEFAULT_PLATFORM_LIMIT: u64 = 10;

pub async fn get_smartlink_analytics(
    path: web::Path<i64>,
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(
        Resource::Analytics,
        service.smartlink_analytics(path.into_inner()).await,
    ))
}

pub async fn get_smartlink_click_stats(
    path: web::Path<i64>,
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(
        Resource::Analytics,
        service.smartlink_click_stats(path.into_inner()).await,
    ))
}

pub async fn get_artist_analytics(
    path: web::Path<i64>,
    query: web::Query<DateRangeQuery>,
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    let range = match parse_date_range(query.start_date.as_deref(), query.end_date.as_deref()) {
        Ok(range) => range,
        Err(e) => return Ok(resource_error(Resource::Analytics, &e)),
    };
    trace!("Analytics API: artist {} in {:?}", path, range);

    Ok(api_result(
        Resource::Analytics,
        service.artist_analytics(path.into_inner(), &range).await,
    ))
}

pub async fn get_global_analytics(
    query: web::Query<DateRangeQuery>,
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    let range = match parse_date_range(query.start_date.as_deref(), query.end_date.as_deref()) {
        Ok(range) => range,
        Err(e) => return Ok(resource_error(Resource::Analytics, &e)),
    };

    Ok(api_result(
        Resource::Analytics,
        service.global_analytics(&range).await,
    ))
}

pub async fn get_top_platforms(
    query: web::Query<LimitQuery>,
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_PLATFORM_LIMIT);
    Ok(api_result(
        Resource::Analytics,
        service.top_platforms(limit).await,
    ))
}

pub async fn get_dashboard(
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(Resource::Analytics, service.dashboard().await))
}
