//! SmartLink management service
//!
//! Validation, slug handling and the public landing-page lookup. View counts
//! go through the buffered `ClickManager`; platform clicks are written
//! immediately because the caller reads the new totals back.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::artist_service::{check_len, non_empty, optional_url, resolve_slug};
use crate::analytics::ClickManager;
use crate::cache::ShortLinkCache;
use crate::errors::{Result, SmartlinkError};
use crate::storage::{
    Artist, ArtistSummary, DEFAULT_SUBTITLE, PlatformLink, SeaOrmStorage, SmartLink,
    SmartLinkDraft, SmartLinkFilter,
};

pub const MAX_TRACK_TITLE_LEN: usize = 150;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_SUBTITLE_LEN: usize = 40;

const TRACKING_MODES: [&str; 2] = ["global", "custom"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformLinkInput {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Request body for creating or replacing a SmartLink
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmartLinkInput {
    pub artist_id: i64,
    pub track_title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub preview_audio_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub custom_subtitle: Option<String>,
    #[serde(default)]
    pub use_description_as_subtitle: bool,
    #[serde(default)]
    pub platform_links: Vec<PlatformLinkInput>,
    #[serde(default)]
    pub tracking_mode: Option<String>,
    #[serde(default)]
    pub ga4_id: Option<String>,
    #[serde(default)]
    pub gtm_id: Option<String>,
    #[serde(default)]
    pub meta_pixel_id: Option<String>,
    #[serde(default)]
    pub tiktok_pixel_id: Option<String>,
    #[serde(default)]
    pub is_published: Option<bool>,
}

/// Public landing page payload
#[derive(Debug, Clone, Serialize)]
pub struct PublicSmartLink {
    pub smart_link: SmartLink,
    pub subtitle: String,
    pub artist: Artist,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartLinkListItem {
    #[serde(flatten)]
    pub smart_link: SmartLink,
    pub artist: Option<ArtistSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformClickResult {
    pub total_clicks: i64,
    pub platform_clicks: i64,
    pub platform: String,
}

/// 过滤空条目；半填的条目和非法 URL 直接拒绝
fn normalize_platform_links(inputs: &[PlatformLinkInput]) -> Result<Vec<PlatformLink>> {
    let mut links = Vec::with_capacity(inputs.len());
    for (idx, entry) in inputs.iter().enumerate() {
        let platform = non_empty(entry.platform.as_deref());
        let url = non_empty(entry.url.as_deref());
        match (platform, url) {
            (None, None) => continue,
            (Some(platform), Some(url)) => {
                crate::utils::validate_url(&url).map_err(|e| {
                    SmartlinkError::validation(format!("platform_links[{}].url: {}", idx, e))
                })?;
                links.push(PlatformLink { platform, url });
            }
            _ => {
                return Err(SmartlinkError::validation(format!(
                    "platform_links[{}] needs both platform and url",
                    idx
                )));
            }
        }
    }

    if links.is_empty() {
        return Err(SmartlinkError::validation(
            "At least one platform link is required",
        ));
    }
    Ok(links)
}

fn build_draft(input: &SmartLinkInput) -> Result<SmartLinkDraft> {
    let track_title = input.track_title.trim();
    if track_title.is_empty() {
        return Err(SmartlinkError::validation("track_title is required"));
    }
    check_len("track_title", track_title, MAX_TRACK_TITLE_LEN)?;

    let description = non_empty(input.description.as_deref());
    if let Some(ref desc) = description {
        check_len("description", desc, MAX_DESCRIPTION_LEN)?;
    }

    let custom_subtitle = non_empty(input.custom_subtitle.as_deref())
        .unwrap_or_else(|| DEFAULT_SUBTITLE.to_string());
    check_len("custom_subtitle", &custom_subtitle, MAX_SUBTITLE_LEN)?;

    let tracking_mode = non_empty(input.tracking_mode.as_deref())
        .map(|m| m.to_lowercase())
        .unwrap_or_else(|| "global".to_string());
    if !TRACKING_MODES.contains(&tracking_mode.as_str()) {
        return Err(SmartlinkError::validation(format!(
            "tracking_mode must be one of {:?}",
            TRACKING_MODES
        )));
    }

    Ok(SmartLinkDraft {
        artist_id: input.artist_id,
        track_title: track_title.to_string(),
        slug: resolve_slug(input.slug.as_deref(), track_title)?,
        release_date: input.release_date,
        cover_image_url: optional_url("cover_image_url", input.cover_image_url.as_deref())?,
        preview_audio_url: optional_url("preview_audio_url", input.preview_audio_url.as_deref())?,
        description,
        custom_subtitle,
        use_description_as_subtitle: input.use_description_as_subtitle,
        platform_links: normalize_platform_links(&input.platform_links)?,
        tracking_mode,
        ga4_id: non_empty(input.ga4_id.as_deref()),
        gtm_id: non_empty(input.gtm_id.as_deref()),
        meta_pixel_id: non_empty(input.meta_pixel_id.as_deref()),
        tiktok_pixel_id: non_empty(input.tiktok_pixel_id.as_deref()),
        is_published: input.is_published.unwrap_or(true),
    })
}

pub struct SmartLinkService {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<dyn ShortLinkCache>,
    click_manager: Arc<ClickManager>,
}

impl SmartLinkService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        cache: Arc<dyn ShortLinkCache>,
        click_manager: Arc<ClickManager>,
    ) -> Self {
        Self {
            storage,
            cache,
            click_manager,
        }
    }

    async fn require_artist(&self, artist_id: i64) -> Result<Artist> {
        self.storage
            .get_artist(artist_id)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("Artist {} not found", artist_id)))
    }

    async fn ensure_slug_free(&self, draft: &SmartLinkDraft, exclude: Option<i64>) -> Result<()> {
        if self
            .storage
            .smart_link_slug_taken(draft.artist_id, &draft.slug, exclude)
            .await?
        {
            return Err(SmartlinkError::conflict(format!(
                "SmartLink slug '{}' already exists for artist {}",
                draft.slug, draft.artist_id
            )));
        }
        Ok(())
    }

    // ============ Admin CRUD ============

    pub async fn create_smart_link(&self, input: SmartLinkInput) -> Result<SmartLink> {
        let draft = build_draft(&input)?;
        self.require_artist(draft.artist_id).await?;
        self.ensure_slug_free(&draft, None).await?;

        let link = self.storage.insert_smart_link(&draft).await?;
        info!(
            "SmartLinkService: created '{}' ({}) for artist {}",
            link.track_title, link.id, link.artist_id
        );
        Ok(link)
    }

    pub async fn get_smart_link(&self, id: i64) -> Result<SmartLink> {
        self.storage
            .get_smart_link(id)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("SmartLink {} not found", id)))
    }

    pub async fn list_smart_links(
        &self,
        page: u64,
        page_size: u64,
        filter: SmartLinkFilter,
    ) -> Result<(Vec<SmartLinkListItem>, u64)> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let filter = SmartLinkFilter {
            search: non_empty(filter.search.as_deref()),
            ..filter
        };

        let (links, total) = self
            .storage
            .list_smart_links(page, page_size, &filter)
            .await?;

        let mut artist_ids: Vec<i64> = links.iter().map(|l| l.artist_id).collect();
        artist_ids.sort_unstable();
        artist_ids.dedup();
        let artists = self.storage.get_artists_by_ids(&artist_ids).await?;

        let items = links
            .into_iter()
            .map(|smart_link| SmartLinkListItem {
                artist: artists.get(&smart_link.artist_id).map(ArtistSummary::from),
                smart_link,
            })
            .collect();
        Ok((items, total))
    }

    pub async fn update_smart_link(&self, id: i64, input: SmartLinkInput) -> Result<SmartLink> {
        self.get_smart_link(id).await?;
        let draft = build_draft(&input)?;
        self.require_artist(draft.artist_id).await?;
        self.ensure_slug_free(&draft, Some(id)).await?;

        let link = self.storage.update_smart_link(id, &draft).await?;

        // 缓存的解析结果带着旧 slug 和标题
        for code in self.storage.short_codes_for_smart_link(id).await? {
            self.cache.remove(&code).await;
        }
        info!("SmartLinkService: updated {}", id);
        Ok(link)
    }

    /// 删除 SmartLink 及其短链，返回被删除的短码
    pub async fn delete_smart_link(&self, id: i64) -> Result<Vec<String>> {
        let codes = self
            .storage
            .delete_smart_link(id)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("SmartLink {} not found", id)))?;

        for code in &codes {
            self.cache.remove(code).await;
        }
        Ok(codes)
    }

    // ============ Public ============

    /// 落地页：艺人 slug + 曲目 slug，仅已发布
    pub async fn get_public(&self, artist_slug: &str, track_slug: &str) -> Result<PublicSmartLink> {
        let not_found = || {
            SmartlinkError::not_found(format!(
                "SmartLink '{}/{}' not found",
                artist_slug, track_slug
            ))
        };

        let artist = self
            .storage
            .get_artist_by_slug(artist_slug)
            .await?
            .ok_or_else(not_found)?;

        let smart_link = self
            .storage
            .get_smart_link_by_slug(artist.id, track_slug)
            .await?
            .filter(|link| link.is_published)
            .ok_or_else(not_found)?;

        self.click_manager.record_view(smart_link.id);
        debug!("SmartLink view recorded: {}", smart_link.id);

        Ok(PublicSmartLink {
            subtitle: smart_link.subtitle().to_string(),
            smart_link,
            artist,
        })
    }

    pub async fn log_platform_click(
        &self,
        id: i64,
        platform: Option<&str>,
    ) -> Result<PlatformClickResult> {
        let platform = non_empty(platform)
            .ok_or_else(|| SmartlinkError::validation("platform_name is required"))?;

        let counts = self
            .storage
            .increment_platform_click(id, &platform)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("SmartLink {} not found", id)))?;

        Ok(PlatformClickResult {
            total_clicks: counts.total_clicks,
            platform_clicks: counts.platform_clicks,
            platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(platform: &str, url: &str) -> PlatformLinkInput {
        PlatformLinkInput {
            platform: Some(platform.to_string()),
            url: Some(url.to_string()),
        }
    }

    fn input() -> SmartLinkInput {
        SmartLinkInput {
            artist_id: 1,
            track_title: "Midnight Drive".to_string(),
            platform_links: vec![link("Spotify", "https://open.spotify.com/track/1")],
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let draft = build_draft(&input()).unwrap();
        assert_eq!(draft.slug, "midnight-drive");
        assert_eq!(draft.custom_subtitle, DEFAULT_SUBTITLE);
        assert_eq!(draft.tracking_mode, "global");
        assert!(draft.is_published);
        assert!(!draft.use_description_as_subtitle);
    }

    #[test]
    fn test_empty_platform_entries_dropped() {
        let mut inp = input();
        inp.platform_links.push(PlatformLinkInput::default());
        inp.platform_links.push(PlatformLinkInput {
            platform: Some("  ".into()),
            url: Some("".into()),
        });
        let draft = build_draft(&inp).unwrap();
        assert_eq!(draft.platform_links.len(), 1);
        assert_eq!(draft.platform_links[0].platform, "Spotify");
    }

    #[test]
    fn test_platform_links_rules() {
        let mut none = input();
        none.platform_links.clear();
        assert!(build_draft(&none).is_err());

        let mut partial = input();
        partial.platform_links.push(PlatformLinkInput {
            platform: Some("Deezer".into()),
            url: None,
        });
        assert!(build_draft(&partial).is_err());

        let mut bad_url = input();
        bad_url.platform_links = vec![link("Deezer", "ftp://deezer.com/track/1")];
        assert!(build_draft(&bad_url).is_err());
    }

    #[test]
    fn test_field_limits() {
        let mut long_title = input();
        long_title.track_title = "x".repeat(MAX_TRACK_TITLE_LEN + 1);
        assert!(build_draft(&long_title).is_err());

        let mut long_subtitle = input();
        long_subtitle.custom_subtitle = Some("y".repeat(MAX_SUBTITLE_LEN + 1));
        assert!(build_draft(&long_subtitle).is_err());

        let mut long_desc = input();
        long_desc.description = Some("z".repeat(MAX_DESCRIPTION_LEN + 1));
        assert!(build_draft(&long_desc).is_err());
    }

    #[test]
    fn test_tracking_mode_checked() {
        let mut custom = input();
        custom.tracking_mode = Some("Custom".into());
        assert_eq!(build_draft(&custom).unwrap().tracking_mode, "custom");

        let mut bad = input();
        bad.tracking_mode = Some("per-page".into());
        assert!(build_draft(&bad).is_err());
    }

    #[test]
    fn test_explicit_slug_normalized() {
        let mut inp = input();
        inp.slug = Some("Midnight Drive (Remix)".into());
        assert_eq!(build_draft(&inp).unwrap().slug, "midnight-drive-remix");
    }
}
