//! Click tracking with UTM attribution
//!
//! Identical clicks inside the dedup window bump the existing record instead
//! of creating a new one. Matching treats missing values as equal.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::artist_service::non_empty;
use crate::errors::{Result, SmartlinkError};
use crate::storage::{NewClick, SeaOrmStorage, UrlTracking};

pub const DEFAULT_UTM_SOURCE: &str = "direct";
pub const DEFAULT_UTM_MEDIUM: &str = "link";
pub const DEFAULT_MDMC_VERSION: &str = "2.0";
pub const PIXEL_PLATFORM: &str = "pixel_tracking";

const ORDER_SOURCES: [&str; 4] = ["default", "custom", "ab_test", "regional"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UtmParams {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub mdmc_id: Option<String>,
    pub mdmc_timestamp: Option<i64>,
    pub mdmc_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClickData {
    pub screen_resolution: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Body of `POST /analytics/click`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackClickInput {
    pub url: Option<String>,
    #[serde(default)]
    pub utm_params: UtmParams,
    #[serde(default)]
    pub click_data: ClickData,
    pub platform: Option<String>,
    #[serde(alias = "smartlink_id")]
    pub smart_link_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub position: Option<i32>,
    pub order_source: Option<String>,
    pub ab_test_variant: Option<String>,
    pub destination_url: Option<String>,
}

/// Request attributes read from headers and the connection
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub ip_address: Option<String>,
    /// `CF-IPCountry`
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackAction {
    Created,
    Incremented,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackOutcome {
    pub action: TrackAction,
    pub tracking: UrlTracking,
}

/// Query string of the tracking pixel; every field is optional and
/// parsed leniently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PixelQuery {
    pub id: Option<String>,
    pub artist: Option<String>,
    pub platform: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
}

/// 构造待记录的点击，UTM 默认值在此填充
pub fn build_click(input: TrackClickInput, ctx: RequestContext) -> Result<NewClick> {
    let url = non_empty(input.url.as_deref())
        .ok_or_else(|| SmartlinkError::validation("url is required"))?;

    if let Some(position) = input.position
        && position < 1
    {
        return Err(SmartlinkError::validation("position must be >= 1"));
    }

    let order_source = non_empty(input.order_source.as_deref())
        .unwrap_or_else(|| "default".to_string());
    if !ORDER_SOURCES.contains(&order_source.as_str()) {
        return Err(SmartlinkError::validation(format!(
            "order_source must be one of {:?}",
            ORDER_SOURCES
        )));
    }

    let utm = input.utm_params;
    let data = input.click_data;

    Ok(NewClick {
        smart_link_id: input.smart_link_id,
        artist_id: input.artist_id,
        url,
        short_url: None,
        platform: non_empty(input.platform.as_deref()),
        utm_source: non_empty(utm.utm_source.as_deref())
            .unwrap_or_else(|| DEFAULT_UTM_SOURCE.to_string()),
        utm_medium: non_empty(utm.utm_medium.as_deref())
            .unwrap_or_else(|| DEFAULT_UTM_MEDIUM.to_string()),
        utm_campaign: non_empty(utm.utm_campaign.as_deref()),
        utm_term: non_empty(utm.utm_term.as_deref()),
        utm_content: non_empty(utm.utm_content.as_deref()),
        mdmc_id: non_empty(utm.mdmc_id.as_deref()),
        mdmc_timestamp: utm.mdmc_timestamp,
        mdmc_version: non_empty(utm.mdmc_version.as_deref())
            .unwrap_or_else(|| DEFAULT_MDMC_VERSION.to_string()),
        user_agent: ctx.user_agent,
        referrer: ctx.referrer,
        screen_resolution: non_empty(data.screen_resolution.as_deref()),
        language: non_empty(data.language.as_deref()),
        timezone: non_empty(data.timezone.as_deref()),
        ip_address: ctx.ip_address,
        country: ctx.country.or_else(|| non_empty(data.country.as_deref())),
        city: non_empty(data.city.as_deref()),
        platform_position: input.position,
        order_source,
        ab_test_variant: non_empty(input.ab_test_variant.as_deref()),
        destination_url: non_empty(input.destination_url.as_deref()),
    })
}

/// 像素请求 -> 点击记录
pub fn build_pixel_click(query: &PixelQuery, url: String, ctx: RequestContext) -> NewClick {
    let parse_id = |raw: &Option<String>| raw.as_deref().and_then(|s| s.trim().parse::<i64>().ok());

    NewClick {
        smart_link_id: parse_id(&query.id),
        artist_id: parse_id(&query.artist),
        url,
        platform: Some(PIXEL_PLATFORM.to_string()),
        utm_source: non_empty(query.utm_source.as_deref())
            .unwrap_or_else(|| DEFAULT_UTM_SOURCE.to_string()),
        utm_medium: non_empty(query.utm_medium.as_deref())
            .unwrap_or_else(|| DEFAULT_UTM_MEDIUM.to_string()),
        utm_campaign: non_empty(query.utm_campaign.as_deref()),
        utm_term: non_empty(query.utm_term.as_deref()),
        utm_content: non_empty(query.utm_content.as_deref()),
        mdmc_version: DEFAULT_MDMC_VERSION.to_string(),
        user_agent: ctx.user_agent,
        referrer: ctx.referrer,
        ip_address: ctx.ip_address,
        country: ctx.country,
        order_source: "default".to_string(),
        ..Default::default()
    }
}

pub struct TrackingService {
    storage: Arc<SeaOrmStorage>,
    dedup_window: Duration,
}

impl TrackingService {
    pub fn new(storage: Arc<SeaOrmStorage>, dedup_window_hours: i64) -> Self {
        Self {
            storage,
            dedup_window: Duration::hours(dedup_window_hours.max(0)),
        }
    }

    /// 去重窗口内相同点击则递增，否则新建
    pub async fn track_click(&self, click: NewClick) -> Result<TrackOutcome> {
        let since = Utc::now() - self.dedup_window;

        if let Some(existing) = self
            .storage
            .find_duplicate_click(&click.dedup_key(), since)
            .await?
        {
            let tracking = self.storage.bump_click(existing.id).await?;
            debug!(
                "Duplicate click merged into record {} (count={})",
                tracking.id, tracking.click_count
            );
            return Ok(TrackOutcome {
                action: TrackAction::Incremented,
                tracking,
            });
        }

        let tracking = self.storage.insert_click(&click).await?;
        debug!("Click recorded: {} -> {}", tracking.id, tracking.url);
        Ok(TrackOutcome {
            action: TrackAction::Created,
            tracking,
        })
    }

    /// 像素点击直接插入，不做去重
    pub async fn record_pixel(&self, click: NewClick) {
        if let Err(e) = self.storage.insert_click(&click).await {
            warn!("Pixel tracking insert failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(url: &str) -> TrackClickInput {
        TrackClickInput {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_required() {
        let err = build_click(TrackClickInput::default(), RequestContext::default()).unwrap_err();
        assert!(matches!(err, SmartlinkError::Validation(_)));
        assert!(build_click(input("   "), RequestContext::default()).is_err());
    }

    #[test]
    fn test_utm_defaults() {
        let click = build_click(input("https://x.test/a"), RequestContext::default()).unwrap();
        assert_eq!(click.utm_source, DEFAULT_UTM_SOURCE);
        assert_eq!(click.utm_medium, DEFAULT_UTM_MEDIUM);
        assert_eq!(click.mdmc_version, DEFAULT_MDMC_VERSION);
        assert_eq!(click.order_source, "default");
    }

    #[test]
    fn test_country_prefers_header() {
        let mut inp = input("https://x.test/a");
        inp.click_data.country = Some("DE".into());

        let ctx = RequestContext {
            country: Some("FR".into()),
            ..Default::default()
        };
        assert_eq!(build_click(inp.clone(), ctx).unwrap().country.as_deref(), Some("FR"));
        assert_eq!(
            build_click(inp, RequestContext::default()).unwrap().country.as_deref(),
            Some("DE")
        );
    }

    #[test]
    fn test_position_and_order_source_checked() {
        let mut bad_pos = input("https://x.test/a");
        bad_pos.position = Some(0);
        assert!(build_click(bad_pos, RequestContext::default()).is_err());

        let mut bad_order = input("https://x.test/a");
        bad_order.order_source = Some("random".into());
        assert!(build_click(bad_order, RequestContext::default()).is_err());

        let mut ab = input("https://x.test/a");
        ab.order_source = Some("ab_test".into());
        ab.position = Some(2);
        let click = build_click(ab, RequestContext::default()).unwrap();
        assert_eq!(click.order_source, "ab_test");
        assert_eq!(click.platform_position, Some(2));
    }

    #[test]
    fn test_smartlink_id_alias() {
        let body: TrackClickInput = serde_json::from_str(
            r#"{"url":"https://x.test","smartlink_id":7,"utm_params":{"utm_source":"ig"}}"#,
        )
        .unwrap();
        assert_eq!(body.smart_link_id, Some(7));
        assert_eq!(body.utm_params.utm_source.as_deref(), Some("ig"));
    }

    #[test]
    fn test_pixel_click_is_lenient() {
        let query = PixelQuery {
            id: Some("12".into()),
            artist: Some("abc".into()),
            utm_source: Some("newsletter".into()),
            ..Default::default()
        };
        let click = build_pixel_click(
            &query,
            "/api/v1/analytics/pixel.gif?id=12".into(),
            RequestContext::default(),
        );
        assert_eq!(click.smart_link_id, Some(12));
        assert_eq!(click.artist_id, None);
        assert_eq!(click.platform.as_deref(), Some(PIXEL_PLATFORM));
        assert_eq!(click.utm_source, "newsletter");
        assert_eq!(click.utm_medium, DEFAULT_UTM_MEDIUM);
    }
}
