//! Admin API 短链管理

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Result as ActixResult, web};
use std::sync::Arc;
use tracing::{info, trace};

use crate::services::{CreateShortLinkInput, ShortLinkService};

use super::error_code::{ErrorCode, Resource};
use super::helpers::{api_result, json_response, resource_error, success_response};
use super::types::{PaginatedData, ShortLinkListQuery};

const DEFAULT_LIMIT: u64 = 25;

/// 已有有效短链时复用（200），否则新建（201）
pub async fn create_short_link(
    body: web::Json<CreateShortLinkInput>,
    service: web::Data<Arc<ShortLinkService>>,
) -> ActixResult<HttpResponse> {
    Ok(match service.create_short_link(body.into_inner()).await {
        Ok(created) if created.reused => json_response(
            StatusCode::OK,
            ErrorCode::Success,
            "Short link already exists",
            Some(created),
        ),
        Ok(created) => {
            info!(
                "Admin API: short link {} created for SmartLink {}",
                created.short_link.short_code, created.short_link.smart_link_id
            );
            json_response(
                StatusCode::CREATED,
                ErrorCode::Success,
                "Short link created",
                Some(created),
            )
        }
        Err(e) => resource_error(Resource::ShortLink, &e),
    })
}

pub async fn list_short_links(
    query: web::Query<ShortLinkListQuery>,
    service: web::Data<Arc<ShortLinkService>>,
) -> ActixResult<HttpResponse> {
    let query = query.into_inner();
    trace!("Admin API: list short links {:?}", query);

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 100);

    Ok(match service.list(page, limit, query.is_active).await {
        Ok((items, total)) => success_response(PaginatedData::new(items, page, limit, total)),
        Err(e) => resource_error(Resource::ShortLink, &e),
    })
}

pub async fn get_short_link_stats(
    path: web::Path<String>,
    service: web::Data<Arc<ShortLinkService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(
        Resource::ShortLink,
        service.stats(&path.into_inner()).await,
    ))
}

pub async fn deactivate_short_link(
    path: web::Path<String>,
    service: web::Data<Arc<ShortLinkService>>,
) -> ActixResult<HttpResponse> {
    let code = path.into_inner();
    Ok(match service.deactivate(&code).await {
        Ok(()) => json_response(
            StatusCode::OK,
            ErrorCode::Success,
            "Short link deactivated",
            Some(serde_json::json!({ "short_code": code, "is_active": false })),
        ),
        Err(e) => resource_error(Resource::ShortLink, &e),
    })
}

pub async fn activate_short_link(
    path: web::Path<String>,
    service: web::Data<Arc<ShortLinkService>>,
) -> ActixResult<HttpResponse> {
    let code = path.into_inner();
    Ok(match service.activate(&code).await {
        Ok(()) => json_response(
            StatusCode::OK,
            ErrorCode::Success,
            "Short link activated",
            Some(serde_json::json!({ "short_code": code, "is_active": true })),
        ),
        Err(e) => resource_error(Resource::ShortLink, &e),
    })
}
