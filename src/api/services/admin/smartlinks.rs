//! Admin API SmartLink 管理

use actix_web::{HttpResponse, Result as ActixResult, web};
use std::sync::Arc;
use tracing::{info, trace};

use crate::services::{PlatformLinkService, SmartLinkInput, SmartLinkService};
use crate::storage::SmartLinkFilter;

use super::error_code::Resource;
use super::helpers::{
    api_result, created_response, error_from_smartlinker, resource_error, success_response,
};
use super::types::{DeletedSmartLink, FetchPlatformLinksRequest, PaginatedData, SmartLinkListQuery};

const DEFAULT_PAGE_SIZE: u64 = 20;

pub async fn list_smart_links(
    query: web::Query<SmartLinkListQuery>,
    service: web::Data<Arc<SmartLinkService>>,
) -> ActixResult<HttpResponse> {
    let query = query.into_inner();
    trace!("Admin API: list SmartLinks {:?}", query);

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let filter = SmartLinkFilter {
        artist_id: query.artist_id,
        is_published: query.is_published,
        search: query.search,
    };

    Ok(match service.list_smart_links(page, page_size, filter).await {
        Ok((items, total)) => {
            success_response(PaginatedData::new(items, page, page_size, total))
        }
        Err(e) => resource_error(Resource::SmartLink, &e),
    })
}

pub async fn create_smart_link(
    body: web::Json<SmartLinkInput>,
    service: web::Data<Arc<SmartLinkService>>,
) -> ActixResult<HttpResponse> {
    Ok(match service.create_smart_link(body.into_inner()).await {
        Ok(link) => {
            info!(
                "Admin API: SmartLink created {} (artist {}, slug {})",
                link.id, link.artist_id, link.slug
            );
            created_response("SmartLink created", link)
        }
        Err(e) => resource_error(Resource::SmartLink, &e),
    })
}

pub async fn get_smart_link(
    path: web::Path<i64>,
    service: web::Data<Arc<SmartLinkService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(
        Resource::SmartLink,
        service.get_smart_link(path.into_inner()).await,
    ))
}

pub async fn update_smart_link(
    path: web::Path<i64>,
    body: web::Json<SmartLinkInput>,
    service: web::Data<Arc<SmartLinkService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(
        Resource::SmartLink,
        service
            .update_smart_link(path.into_inner(), body.into_inner())
            .await,
    ))
}

pub async fn delete_smart_link(
    path: web::Path<i64>,
    service: web::Data<Arc<SmartLinkService>>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    Ok(match service.delete_smart_link(id).await {
        Ok(codes) => {
            info!(
                "Admin API: SmartLink {} deleted with {} short link(s)",
                id,
                codes.len()
            );
            success_response(DeletedSmartLink {
                id,
                deleted_short_codes: codes,
            })
        }
        Err(e) => resource_error(Resource::SmartLink, &e),
    })
}

/// 通过 Odesli 查询跨平台链接
pub async fn fetch_platform_links(
    body: web::Json<FetchPlatformLinksRequest>,
    service: web::Data<Arc<PlatformLinkService>>,
) -> ActixResult<HttpResponse> {
    let body = body.into_inner();
    Ok(
        match service
            .fetch(&body.source_url, body.user_country.as_deref())
            .await
        {
            Ok(result) => {
                info!(
                    "Admin API: fetched {} platform link(s) for '{}'",
                    result.links.len(),
                    body.source_url
                );
                success_response(result)
            }
            Err(e) => error_from_smartlinker(&e),
        },
    )
}
