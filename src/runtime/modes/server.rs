//! Server mode
//!
//! This module contains the HTTP server startup logic.
//! It configures and starts the HTTP server with all necessary routes.

use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{
    App, HttpServer,
    error::InternalError,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::warn;

use crate::api::middleware::{AdminAuth, RequestIdMiddleware};
use crate::api::services::admin::{ErrorCode, error_response, routes::admin_v1_routes};
use crate::api::services::{AppStartTime, health_routes, public_v1_routes, redirect_routes};
use crate::config::{CorsConfig, HttpMethod, get_config};
use crate::runtime::lifetime;
use crate::runtime::lifetime::startup::StartupContext;

const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// CORS settings resolved from the `cors` config section
#[derive(Clone, Debug)]
struct CorsSettings {
    enabled: bool,
    allowed_origins: Vec<String>,
    allowed_methods: Vec<HttpMethod>,
    allowed_headers: Vec<String>,
    max_age: u64,
    allow_credentials: bool,
}

impl From<&CorsConfig> for CorsSettings {
    fn from(cors: &CorsConfig) -> Self {
        Self {
            enabled: cors.enabled,
            allowed_origins: cors.allowed_origins.clone(),
            allowed_methods: cors.allowed_methods.clone(),
            allowed_headers: cors.allowed_headers.clone(),
            max_age: cors.max_age,
            allow_credentials: cors.allow_credentials,
        }
    }
}

/// Validate CORS configuration at startup (runs once)
fn validate_cors_config(cors_config: &CorsSettings) {
    if !cors_config.enabled {
        return;
    }

    if cors_config.allowed_origins.is_empty() {
        warn!(
            "CORS enabled but allowed_origins is empty. \
            No cross-origin requests will be allowed. \
            Set allowed_origins explicitly or use '[\"*\"]' for any origin."
        );
    }

    let is_any_origin = cors_config.allowed_origins.iter().any(|o| o == "*");
    if is_any_origin && cors_config.allow_credentials {
        tracing::error!(
            "SECURITY WARNING: allow_any_origin + allow_credentials is a dangerous combination! \
            Disabling credentials."
        );
    }
}

/// Build CORS middleware from configuration
fn build_cors_middleware(cors_config: &CorsSettings) -> Cors {
    // 未启用时保持浏览器默认同源策略
    if !cors_config.enabled {
        return Cors::default();
    }

    let mut cors = Cors::default();
    let is_any_origin = cors_config.allowed_origins.iter().any(|o| o == "*");

    if is_any_origin {
        cors = cors.allow_any_origin();
    } else {
        for origin in &cors_config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }

    let methods: Vec<actix_web::http::Method> = cors_config
        .allowed_methods
        .iter()
        .filter_map(|m| m.to_string().parse().ok())
        .collect();
    if !methods.is_empty() {
        cors = cors.allowed_methods(methods);
    }

    for header in &cors_config.allowed_headers {
        cors = cors.allowed_header(header);
    }

    cors = cors.max_age(cors_config.max_age as usize);

    // any_origin + credentials 组合强制禁用 credentials
    if cors_config.allow_credentials && !is_any_origin {
        cors = cors.supports_credentials();
    }

    cors
}

/// 请求体/查询参数解析失败统一返回 JSON 400
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_PAYLOAD_BYTES)
        .error_handler(|err, _req| {
            let response =
                error_response(StatusCode::BAD_REQUEST, ErrorCode::BadRequest, &err.to_string());
            InternalError::from_response(err, response).into()
        })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let response =
            error_response(StatusCode::BAD_REQUEST, ErrorCode::BadRequest, &err.to_string());
        InternalError::from_response(err, response).into()
    })
}

/// Register shared state and every route scope.
///
/// The redirect resource is registered last so it never shadows a prefix.
pub fn configure_app(cfg: &mut web::ServiceConfig, ctx: &StartupContext, started: AppStartTime) {
    let route = &ctx.route_config;
    let services = &ctx.services;

    cfg.app_data(web::Data::new(ctx.storage.clone()))
        .app_data(web::Data::new(ctx.cache.clone()))
        .app_data(web::Data::new(ctx.click_manager.clone()))
        .app_data(web::Data::new(services.artists.clone()))
        .app_data(web::Data::new(services.smart_links.clone()))
        .app_data(web::Data::new(services.short_links.clone()))
        .app_data(web::Data::new(services.tracking.clone()))
        .app_data(web::Data::new(services.analytics.clone()))
        .app_data(web::Data::new(services.platform_links.clone()))
        .app_data(web::Data::new(started))
        .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
        .app_data(json_config())
        .app_data(query_config())
        .service(
            web::scope(&route.admin_prefix)
                .wrap(AdminAuth)
                .service(admin_v1_routes()),
        )
        .service(web::scope(&route.api_prefix).service(public_v1_routes()))
        .service(web::scope(&route.health_prefix).service(health_routes()))
        .service(redirect_routes());
}

/// Run the HTTP server
///
/// This function:
/// 1. Records startup time
/// 2. Prepares server components (storage, cache, services)
/// 3. Configures and starts the HTTP server
/// 4. Listens for graceful shutdown signals
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let startup = lifetime::startup::prepare_server_startup()
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {}", e);
            e
        })?;

    let config = get_config();
    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let cors_config = CorsSettings::from(&config.cors);
    validate_cors_config(&cors_config);

    if config.api.trusted_proxies.is_empty() {
        warn!(
            "Client IP: auto-detect mode. Connections from private IPs will use X-Forwarded-For. \
             Configure api.trusted_proxies explicitly to restrict this."
        );
    }

    let click_manager = startup.click_manager.clone();
    let ctx = startup.clone();

    let server = HttpServer::new(move || {
        let cors = build_cors_middleware(&cors_config);

        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("Connection", "keep-alive"))
                    .add(("Keep-Alive", "timeout=30, max=1000")),
            )
            .configure(|cfg| configure_app(cfg, &ctx, app_start_time.clone()))
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();

    // Wait for server or shutdown signal
    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown(click_manager) => {
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    Ok(())
}
