use std::borrow::Cow;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::config::get_config;
use crate::errors::SmartlinkError;
use crate::services::{ClientInfo, ShortLinkService};
use crate::utils::is_valid_short_code;

const UTM_KEYS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
];

/// Short-code redirect to the public SmartLink page
pub struct RedirectService;

impl RedirectService {
    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        service: web::Data<Arc<ShortLinkService>>,
    ) -> impl Responder {
        let code = path.into_inner();

        if !is_valid_short_code(&code) {
            // 非法短码，直接 404（不查缓存、不查库）
            trace!("Invalid short code rejected: {}", &code);
            return Self::not_found_response();
        }

        match service.resolve(&code).await {
            Ok(resolved) => {
                let client = ClientInfo::from_request(&req);
                service.record_hit(&resolved, &client);

                let base = &get_config().features.smartlink_page_base_url;
                let page = ShortLinkService::page_url(base, &resolved);
                let target = Self::build_target_url(&req, &page);
                debug!("Redirect {} -> {}", code, target);

                HttpResponse::build(StatusCode::TEMPORARY_REDIRECT)
                    .insert_header(("Location", target.as_ref()))
                    .finish()
            }
            Err(SmartlinkError::NotFound(_)) => {
                debug!("Redirect target not found: {}", &code);
                Self::not_found_response()
            }
            Err(SmartlinkError::Gone(_)) => {
                debug!("Redirect target expired: {}", &code);
                Self::gone_response()
            }
            Err(e) => {
                error!("Redirect lookup failed for {}: {}", &code, e);
                Self::error_response()
            }
        }
    }

    #[inline]
    fn not_found_response() -> HttpResponse {
        HttpResponse::build(StatusCode::NOT_FOUND)
            .insert_header(("Content-Type", "text/html; charset=utf-8"))
            .insert_header(("Cache-Control", "public, max-age=60"))
            .body("Not Found")
    }

    #[inline]
    fn gone_response() -> HttpResponse {
        HttpResponse::build(StatusCode::GONE)
            .insert_header(("Content-Type", "text/html; charset=utf-8"))
            .body("Gone")
    }

    #[inline]
    fn error_response() -> HttpResponse {
        HttpResponse::build(StatusCode::INTERNAL_SERVER_ERROR)
            .insert_header(("Content-Type", "text/html; charset=utf-8"))
            .body("Internal Server Error")
    }

    /// 透传请求中的 UTM 参数到落地页
    fn build_target_url<'a>(req: &HttpRequest, target: &'a str) -> Cow<'a, str> {
        let Some(query) = req.uri().query() else {
            return Cow::Borrowed(target);
        };

        let utm_params = extract_utm_params_raw(query);
        if utm_params.is_empty() {
            return Cow::Borrowed(target);
        }

        let separator = if target.contains('?') { "&" } else { "?" };
        Cow::Owned(format!("{}{}{}", target, separator, utm_params.join("&")))
    }
}

/// 一次遍历提取 UTM 片段（保持原始编码）
fn extract_utm_params_raw(query: &str) -> Vec<&str> {
    query
        .split('&')
        .filter(|part| {
            part.find('=')
                .map(|pos| UTM_KEYS.contains(&&part[..pos]))
                .unwrap_or(false)
        })
        .collect()
}

/// 短码跳转路由，注册在最后
pub fn redirect_routes() -> actix_web::Resource {
    web::resource("/{code}")
        .route(web::get().to(RedirectService::handle_redirect))
        .route(web::head().to(RedirectService::handle_redirect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_utm_params_raw() {
        let parts = extract_utm_params_raw("utm_source=ig&x=1&utm_campaign=spring%20drop&utm_=y");
        assert_eq!(parts, vec!["utm_source=ig", "utm_campaign=spring%20drop"]);
        assert!(extract_utm_params_raw("a=1&b=2").is_empty());
        assert!(extract_utm_params_raw("").is_empty());
    }
}
