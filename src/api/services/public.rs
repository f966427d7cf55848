//! Public API: landing pages, click tracking and short link resolution
//!
//! Served under `{api_prefix}/v1` without authentication.

use std::sync::{Arc, LazyLock};

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use tracing::{debug, info};

use crate::api::services::admin::{
    ErrorCode, PlatformClickRequest, Resource, api_result, json_response, resource_error,
};
use crate::services::{
    ClientInfo, PixelQuery, RequestContext, ShortLinkService, SmartLinkService, TrackAction,
    TrackClickInput, TrackingService, build_click, build_pixel_click,
};
use crate::utils::extract_client_ip;

/// 1x1 透明 GIF
const PIXEL_GIF_BASE64: &str = "R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

static PIXEL_GIF: LazyLock<Bytes> = LazyLock::new(|| {
    STANDARD
        .decode(PIXEL_GIF_BASE64)
        .map(Bytes::from)
        .unwrap_or_default()
});

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// 从请求头与连接信息提取追踪上下文
pub fn request_context(req: &HttpRequest) -> RequestContext {
    RequestContext {
        user_agent: header_value(req, "user-agent"),
        referrer: header_value(req, "referer"),
        ip_address: extract_client_ip(req),
        country: header_value(req, "cf-ipcountry"),
    }
}

// ============ SmartLinks ============

pub async fn get_public_smart_link(
    path: web::Path<(String, String)>,
    service: web::Data<Arc<SmartLinkService>>,
) -> ActixResult<HttpResponse> {
    let (artist_slug, track_slug) = path.into_inner();
    Ok(api_result(
        Resource::SmartLink,
        service.get_public(&artist_slug, &track_slug).await,
    ))
}

pub async fn log_platform_click(
    path: web::Path<i64>,
    body: web::Json<PlatformClickRequest>,
    service: web::Data<Arc<SmartLinkService>>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    Ok(api_result(
        Resource::SmartLink,
        service
            .log_platform_click(id, body.platform_name.as_deref())
            .await,
    ))
}

// ============ Tracking ============

/// 新建返回 201，去重合并返回 200
pub async fn track_click(
    req: HttpRequest,
    body: web::Json<TrackClickInput>,
    service: web::Data<Arc<TrackingService>>,
) -> ActixResult<HttpResponse> {
    let click = match build_click(body.into_inner(), request_context(&req)) {
        Ok(click) => click,
        Err(e) => return Ok(resource_error(Resource::Tracking, &e)),
    };

    Ok(match service.track_click(click).await {
        Ok(outcome) => {
            let (status, message) = match outcome.action {
                TrackAction::Created => (StatusCode::CREATED, "Click tracked"),
                TrackAction::Incremented => (StatusCode::OK, "Click count incremented"),
            };
            json_response(status, ErrorCode::Success, message, Some(outcome))
        }
        Err(e) => resource_error(Resource::Tracking, &e),
    })
}

/// 追踪像素：后台记录，始终返回 GIF
pub async fn tracking_pixel(
    req: HttpRequest,
    query: web::Query<PixelQuery>,
    service: web::Data<Arc<TrackingService>>,
) -> HttpResponse {
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.path().to_string());
    let click = build_pixel_click(&query, url, request_context(&req));

    let service = service.get_ref().clone();
    tokio::spawn(async move {
        service.record_pixel(click).await;
    });

    HttpResponse::Ok()
        .insert_header(("Content-Type", "image/gif"))
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Expires", "0"))
        .body(PIXEL_GIF.clone())
}

// ============ Short links ============

pub async fn resolve_short_link(
    req: HttpRequest,
    path: web::Path<String>,
    service: web::Data<Arc<ShortLinkService>>,
) -> ActixResult<HttpResponse> {
    let code = path.into_inner();
    let client = ClientInfo::from_request(&req);
    debug!("Public API: resolve {} from {:?}", code, client.ip);

    let result = service.resolve_and_track(&code, &client).await;
    if let Ok(ref view) = result {
        info!(
            "Short link {} resolved to SmartLink {}",
            view.short_code, view.smart_link.id
        );
    }
    Ok(api_result(Resource::ShortLink, result))
}

/// Public API v1 路由
pub fn public_v1_routes() -> actix_web::Scope {
    web::scope("/v1")
        .service(
            web::scope("/smartlinks")
                .route(
                    "/{id}/log-platform-click",
                    web::post().to(log_platform_click),
                )
                .route(
                    "/{artist_slug}/{track_slug}",
                    web::get().to(get_public_smart_link),
                ),
        )
        .service(
            web::scope("/analytics")
                .route("/click", web::post().to(track_click))
                .route("/pixel.gif", web::get().to(tracking_pixel)),
        )
        .service(web::scope("/shortlinks").route("/{code}", web::get().to(resolve_short_link)))
}
