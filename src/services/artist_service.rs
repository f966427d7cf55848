//! Artist management service

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::cache::ShortLinkCache;
use crate::errors::{Result, SmartlinkError};
use crate::storage::{Artist, ArtistDraft, ArtistFilter, SeaOrmStorage};
use crate::utils::url_validator::validate_url;
use crate::utils::{is_valid_slug, slugify};

pub const MAX_ARTIST_NAME_LEN: usize = 100;
pub const MAX_ARTIST_BIO_LEN: usize = 1000;

/// Request body for creating or replacing an artist
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// 空字符串视为未设置
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Validate an optional http(s) URL field
pub(crate) fn optional_url(field: &str, value: Option<&str>) -> Result<Option<String>> {
    match non_empty(value) {
        Some(url) => {
            validate_url(&url)
                .map_err(|e| SmartlinkError::validation(format!("{}: {}", field, e)))?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}

pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(SmartlinkError::validation(format!(
            "{} cannot exceed {} characters",
            field, max
        )));
    }
    Ok(())
}

/// 提供的 slug 规范化，否则从 fallback 派生
pub(crate) fn resolve_slug(provided: Option<&str>, fallback: &str) -> Result<String> {
    let slug = match non_empty(provided) {
        Some(s) => slugify(&s),
        None => slugify(fallback),
    };
    if slug.is_empty() || !is_valid_slug(&slug) {
        return Err(SmartlinkError::validation(format!(
            "Cannot derive a valid slug from '{}'",
            provided.unwrap_or(fallback)
        )));
    }
    Ok(slug)
}

pub struct ArtistService {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<dyn ShortLinkCache>,
}

impl ArtistService {
    pub fn new(storage: Arc<SeaOrmStorage>, cache: Arc<dyn ShortLinkCache>) -> Self {
        Self { storage, cache }
    }

    fn build_draft(input: &ArtistInput) -> Result<ArtistDraft> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(SmartlinkError::validation("Artist name is required"));
        }
        check_len("name", name, MAX_ARTIST_NAME_LEN)?;

        let bio = non_empty(input.bio.as_deref());
        if let Some(ref bio) = bio {
            check_len("bio", bio, MAX_ARTIST_BIO_LEN)?;
        }

        Ok(ArtistDraft {
            name: name.to_string(),
            slug: resolve_slug(input.slug.as_deref(), name)?,
            bio,
            image_url: optional_url("image_url", input.image_url.as_deref())?,
        })
    }

    pub async fn create_artist(&self, input: ArtistInput) -> Result<Artist> {
        let draft = Self::build_draft(&input)?;

        if self.storage.artist_slug_taken(&draft.slug, None).await? {
            return Err(SmartlinkError::conflict(format!(
                "Artist slug '{}' already exists",
                draft.slug
            )));
        }

        let artist = self.storage.insert_artist(&draft).await?;
        info!("ArtistService: created '{}' ({})", artist.name, artist.id);
        Ok(artist)
    }

    pub async fn get_artist(&self, id: i64) -> Result<Artist> {
        self.storage
            .get_artist(id)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("Artist {} not found", id)))
    }

    pub async fn get_artist_by_slug(&self, slug: &str) -> Result<Artist> {
        self.storage
            .get_artist_by_slug(slug)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("Artist '{}' not found", slug)))
    }

    pub async fn list_artists(
        &self,
        page: u64,
        page_size: u64,
        search: Option<String>,
    ) -> Result<(Vec<Artist>, u64)> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let filter = ArtistFilter {
            search: non_empty(search.as_deref()),
        };
        self.storage.list_artists(page, page_size, &filter).await
    }

    pub async fn update_artist(&self, id: i64, input: ArtistInput) -> Result<Artist> {
        self.get_artist(id).await?;
        let draft = Self::build_draft(&input)?;

        if self.storage.artist_slug_taken(&draft.slug, Some(id)).await? {
            return Err(SmartlinkError::conflict(format!(
                "Artist slug '{}' already exists",
                draft.slug
            )));
        }

        let artist = self.storage.update_artist(id, &draft).await?;

        // 短链解析缓存里存着艺人的 slug 和名字
        let codes = self.storage.short_codes_for_artist(id).await?;
        for code in &codes {
            self.cache.remove(code).await;
        }
        debug!("ArtistService: evicted {} cached short links", codes.len());
        info!("ArtistService: updated {}", id);
        Ok(artist)
    }

    /// 仍有 SmartLink 的艺人不允许删除
    pub async fn delete_artist(&self, id: i64) -> Result<()> {
        self.get_artist(id).await?;

        let owned = self.storage.count_smart_links(Some(id), None).await?;
        if owned > 0 {
            return Err(SmartlinkError::conflict(format!(
                "Artist {} still owns {} SmartLink(s)",
                id, owned
            )));
        }

        if !self.storage.delete_artist(id).await? {
            return Err(SmartlinkError::not_found(format!("Artist {} not found", id)));
        }
        Ok(())
    }
}
