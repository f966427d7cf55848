use crate::analytics::ClickManager;
use crate::cache::{self, ShortLinkCache};
use crate::config::get_config;
use crate::services::{
    AnalyticsService, ArtistService, PlatformLinkService, ShortLinkService, SmartLinkService,
    TrackingService,
};
use crate::storage::{SeaOrmStorage, StorageFactory};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared components handed to every HTTP worker
#[derive(Clone)]
pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub cache: Arc<dyn ShortLinkCache>,
    pub click_manager: Arc<ClickManager>,
    pub services: AppServices,
    pub route_config: RouteConfig,
}

#[derive(Clone)]
pub struct AppServices {
    pub artists: Arc<ArtistService>,
    pub smart_links: Arc<SmartLinkService>,
    pub short_links: Arc<ShortLinkService>,
    pub tracking: Arc<TrackingService>,
    pub analytics: Arc<AnalyticsService>,
    pub platform_links: Arc<PlatformLinkService>,
}

impl AppServices {
    /// 基于同一份存储、缓存和计数器构建全部 service
    pub fn build(
        storage: Arc<SeaOrmStorage>,
        cache: Arc<dyn ShortLinkCache>,
        click_manager: Arc<ClickManager>,
    ) -> Self {
        let config = get_config();
        Self {
            artists: Arc::new(ArtistService::new(storage.clone(), cache.clone())),
            smart_links: Arc::new(SmartLinkService::new(
                storage.clone(),
                cache.clone(),
                click_manager.clone(),
            )),
            short_links: Arc::new(ShortLinkService::new(
                storage.clone(),
                cache,
                click_manager,
                config.features.short_code_length,
            )),
            tracking: Arc::new(TrackingService::new(
                storage.clone(),
                config.features.dedup_window_hours,
            )),
            analytics: Arc::new(AnalyticsService::new(storage)),
            platform_links: Arc::new(PlatformLinkService::new(&config.platform_links)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RouteConfig {
    pub api_prefix: String,
    pub admin_prefix: String,
    pub health_prefix: String,
}

/// 按配置创建 ClickManager（不启动后台任务）
pub fn build_click_manager(storage: &SeaOrmStorage) -> Arc<ClickManager> {
    let config = get_config();
    Arc::new(ClickManager::new(
        storage.as_counter_sink(),
        Duration::from_secs(config.click.flush_interval.max(1)),
        config.click.max_clicks_before_flush as usize,
    ))
}

/// 准备服务器启动的上下文
/// 包括存储、缓存、计数器和各业务 service
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    // 已安装时返回 Err，可忽略
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let storage = StorageFactory::create()
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let config = get_config();

    let click_manager = build_click_manager(&storage);
    // 启动后台任务，并保持强引用以确保任务不会被过早销毁
    let mgr_for_task = click_manager.clone();
    tokio::spawn(async move {
        mgr_for_task.start_background_task().await;
    });
    debug!(
        "ClickManager initialized with {} seconds and {} max clicks before flush",
        config.click.flush_interval, config.click.max_clicks_before_flush
    );

    let cache = cache::create_cache(&config.cache);

    let services = AppServices::build(storage.clone(), cache.clone(), click_manager.clone());

    let route_config = RouteConfig {
        api_prefix: config.routes.api_prefix.clone(),
        admin_prefix: config.routes.admin_prefix.clone(),
        health_prefix: config.routes.health_prefix.clone(),
    };

    check_component_enabled(&route_config);

    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        storage,
        cache,
        click_manager,
        services,
        route_config,
    })
}

fn check_component_enabled(route_config: &RouteConfig) {
    let config = get_config();

    let admin_token = config.api.admin_token.as_str();
    if admin_token.is_empty() {
        info!("Admin API is disabled (api.admin_token not set)");
    } else {
        if admin_token.len() < 16 {
            warn!("WARNING: Admin Token is very short. Consider using a stronger token.");
        }
        info!("Admin API available at: {}/v1", route_config.admin_prefix);
    }

    info!("Public API available at: {}/v1", route_config.api_prefix);
    info!("Health API available at: {}", route_config.health_prefix);

    if !config.platform_links.enabled {
        info!("Platform link lookup is disabled");
    }
}
