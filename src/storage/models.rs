use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 默认副标题
pub const DEFAULT_SUBTITLE: &str = "Choose music service";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformLink {
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable artist fields, already validated
#[derive(Debug, Clone)]
pub struct ArtistDraft {
    pub name: String,
    pub slug: String,
    pub bio: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartLink {
    pub id: i64,
    pub artist_id: i64,
    pub track_title: String,
    pub slug: String,
    pub release_date: Option<NaiveDate>,
    pub cover_image_url: Option<String>,
    pub preview_audio_url: Option<String>,
    pub description: Option<String>,
    pub custom_subtitle: String,
    pub use_description_as_subtitle: bool,
    pub platform_links: Vec<PlatformLink>,
    pub tracking_mode: String,
    pub ga4_id: Option<String>,
    pub gtm_id: Option<String>,
    pub meta_pixel_id: Option<String>,
    pub tiktok_pixel_id: Option<String>,
    pub view_count: i64,
    pub platform_click_count: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SmartLink {
    /// 落地页显示的副标题
    pub fn subtitle(&self) -> &str {
        match &self.description {
            Some(desc) if self.use_description_as_subtitle && !desc.is_empty() => desc,
            _ => &self.custom_subtitle,
        }
    }
}

/// Writable SmartLink fields, already validated
#[derive(Debug, Clone)]
pub struct SmartLinkDraft {
    pub artist_id: i64,
    pub track_title: String,
    pub slug: String,
    pub release_date: Option<NaiveDate>,
    pub cover_image_url: Option<String>,
    pub preview_audio_url: Option<String>,
    pub description: Option<String>,
    pub custom_subtitle: String,
    pub use_description_as_subtitle: bool,
    pub platform_links: Vec<PlatformLink>,
    pub tracking_mode: String,
    pub ga4_id: Option<String>,
    pub gtm_id: Option<String>,
    pub meta_pixel_id: Option<String>,
    pub tiktok_pixel_id: Option<String>,
    pub is_published: bool,
}

/// 平台点击后的计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformClickCounts {
    pub total_clicks: i64,
    pub platform_clicks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortLink {
    pub short_code: String,
    pub smart_link_id: i64,
    pub click_count: i64,
    pub unique_visitors: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortLink {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp <= Utc::now())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartLinkSummary {
    pub id: i64,
    pub track_title: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<&SmartLink> for SmartLinkSummary {
    fn from(link: &SmartLink) -> Self {
        Self {
            id: link.id,
            track_title: link.track_title.clone(),
            slug: link.slug.clone(),
        }
    }
}

impl From<&Artist> for ArtistSummary {
    fn from(artist: &Artist) -> Self {
        Self {
            id: artist.id,
            name: artist.name.clone(),
            slug: artist.slug.clone(),
        }
    }
}

/// A short link joined with the SmartLink and artist it points to
///
/// Clones share the hit counter, so every copy handed out by the resolution
/// cache sees the hits recorded since the row was loaded.
#[derive(Debug, Clone)]
pub struct ResolvedShortLink {
    pub short_link: ShortLink,
    pub smart_link: SmartLinkSummary,
    pub artist: ArtistSummary,
    hits_since_load: Arc<AtomicI64>,
}

impl ResolvedShortLink {
    pub fn new(short_link: ShortLink, smart_link: SmartLinkSummary, artist: ArtistSummary) -> Self {
        Self {
            short_link,
            smart_link,
            artist,
            hits_since_load: Arc::new(AtomicI64::new(0)),
        }
    }

    /// 记一次访问，返回包含本次在内的点击数
    pub fn note_hit(&self) -> i64 {
        let hits = self.hits_since_load.fetch_add(1, Ordering::Relaxed) + 1;
        self.short_link.click_count + hits
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessStat {
    pub dimension: String,
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlTracking {
    pub id: i64,
    pub smart_link_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub url: String,
    pub short_url: Option<String>,
    pub platform: Option<String>,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub mdmc_id: Option<String>,
    pub mdmc_timestamp: Option<i64>,
    pub mdmc_version: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub screen_resolution: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub platform_position: Option<i32>,
    pub order_source: String,
    pub ab_test_variant: Option<String>,
    pub destination_url: Option<String>,
    pub click_count: i64,
    pub last_click_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A click to record, UTM defaults already applied
#[derive(Debug, Clone, Default)]
pub struct NewClick {
    pub smart_link_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub url: String,
    pub short_url: Option<String>,
    pub platform: Option<String>,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub mdmc_id: Option<String>,
    pub mdmc_timestamp: Option<i64>,
    pub mdmc_version: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub screen_resolution: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub platform_position: Option<i32>,
    pub order_source: String,
    pub ab_test_variant: Option<String>,
    pub destination_url: Option<String>,
}

/// 去重匹配字段
#[derive(Debug, Clone)]
pub struct DedupKey<'a> {
    pub smart_link_id: Option<i64>,
    pub url: &'a str,
    pub platform: Option<&'a str>,
    pub utm_source: &'a str,
    pub utm_medium: &'a str,
    pub user_agent: Option<&'a str>,
}

impl NewClick {
    pub fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            smart_link_id: self.smart_link_id,
            url: &self.url,
            platform: self.platform.as_deref(),
            utm_source: &self.utm_source,
            utm_medium: &self.utm_medium,
            user_agent: self.user_agent.as_deref(),
        }
    }
}

/// Inclusive `[start, end]` time window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
