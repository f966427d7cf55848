//! Admin API 路由配置
//!
//! 将 /v1 下的路由按资源拆分，固定路径必须注册在通配路径之前。

use actix_web::web;

use super::analytics::{
    get_artist_analytics, get_dashboard, get_global_analytics, get_smartlink_analytics,
    get_smartlink_click_stats, get_top_platforms,
};
use super::artists::{
    create_artist, delete_artist, get_artist, get_artist_by_slug, list_artists, update_artist,
};
use super::shortlinks::{
    activate_short_link, create_short_link, deactivate_short_link, get_short_link_stats,
    list_short_links,
};
use super::smartlinks::{
    create_smart_link, delete_smart_link, fetch_platform_links, get_smart_link,
    list_smart_links, update_smart_link,
};

/// 艺人路由 `/artists`
pub fn artists_routes() -> actix_web::Scope {
    web::scope("/artists")
        .route("", web::get().to(list_artists))
        .route("", web::head().to(list_artists))
        .route("", web::post().to(create_artist))
        .route("/slug/{slug}", web::get().to(get_artist_by_slug))
        .route("/{id}", web::get().to(get_artist))
        .route("/{id}", web::put().to(update_artist))
        .route("/{id}", web::delete().to(delete_artist))
}

/// SmartLink 路由 `/smartlinks`
///
/// - POST /smartlinks/fetch-platform-links - Odesli 查询（必须在 /{id} 之前）
pub fn smartlinks_routes() -> actix_web::Scope {
    web::scope("/smartlinks")
        .route("", web::get().to(list_smart_links))
        .route("", web::head().to(list_smart_links))
        .route("", web::post().to(create_smart_link))
        .route("/fetch-platform-links", web::post().to(fetch_platform_links))
        .route("/{id}", web::get().to(get_smart_link))
        .route("/{id}", web::put().to(update_smart_link))
        .route("/{id}", web::delete().to(delete_smart_link))
}

/// 短链路由 `/shortlinks`
pub fn shortlinks_routes() -> actix_web::Scope {
    web::scope("/shortlinks")
        .route("", web::get().to(list_short_links))
        .route("", web::head().to(list_short_links))
        .route("", web::post().to(create_short_link))
        .route("/{code}/stats", web::get().to(get_short_link_stats))
        .route("/{code}/activate", web::patch().to(activate_short_link))
        .route("/{code}", web::delete().to(deactivate_short_link))
}

/// 统计路由 `/analytics`
pub fn analytics_routes() -> actix_web::Scope {
    web::scope("/analytics")
        .route("/dashboard", web::get().to(get_dashboard))
        .route("/global", web::get().to(get_global_analytics))
        .route("/platforms", web::get().to(get_top_platforms))
        .route("/artists/{id}", web::get().to(get_artist_analytics))
        .route(
            "/smartlinks/{id}/clicks",
            web::get().to(get_smartlink_click_stats),
        )
        .route("/smartlinks/{id}", web::get().to(get_smartlink_analytics))
}

/// Admin API v1 路由
///
/// 组合所有子模块路由
pub fn admin_v1_routes() -> actix_web::Scope {
    web::scope("/v1")
        .service(artists_routes())
        .service(smartlinks_routes())
        .service(shortlinks_routes())
        .service(analytics_routes())
}
