//! Short link service
//!
//! Code generation, resolution through the cache, buffered hit recording
//! and per-link access statistics.

use std::sync::Arc;
use std::time::Duration;

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::analytics::{AccessDimension, ClickManager};
use crate::cache::{CacheResult, ShortLinkCache};
use crate::errors::{Result, SmartlinkError};
use crate::storage::{
    AccessStat, ArtistSummary, ResolvedShortLink, SeaOrmStorage, ShortLink, ShortLinkFilter,
    SmartLinkSummary,
};
use crate::utils::{
    MAX_SHORT_CODE_LENGTH, TimeParser, extract_client_ip, generate_random_code,
    is_valid_short_code,
};

/// 生成短码的最大尝试次数
const MAX_CODE_ATTEMPTS: usize = 10;
const VISITOR_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
const VISITOR_CACHE_CAPACITY: u64 = 100_000;
const TOP_ENTRIES: usize = 10;

/// Request-derived attributes used for access statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub country: String,
    pub referrer: String,
    pub device: String,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap, ip: Option<String>) -> Self {
        let user_agent = header_str(headers, "user-agent");
        let country = header_str(headers, "cf-ipcountry")
            .or_else(|| header_str(headers, "x-country"))
            .unwrap_or_else(|| "Unknown".to_string());
        let referrer = header_str(headers, "referer").unwrap_or_else(|| "Direct".to_string());
        let device = match user_agent.as_deref() {
            Some(ua) if ua.contains("Mobile") => "Mobile",
            _ => "Desktop",
        };

        Self {
            ip,
            user_agent,
            country,
            referrer,
            device: device.to_string(),
        }
    }

    pub fn from_request(req: &HttpRequest) -> Self {
        Self::from_headers(req.headers(), extract_client_ip(req))
    }

    fn visitor_key(&self, code: &str) -> String {
        format!(
            "{}|{}|{}",
            code,
            self.ip.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-")
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateShortLinkInput {
    pub smart_link_id: i64,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortLinkCreated {
    pub short_link: ShortLink,
    pub reused: bool,
}

/// Public resolution payload
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedView {
    pub smart_link: SmartLinkSummary,
    pub artist: ArtistSummary,
    pub short_code: String,
    pub click_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatEntry {
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessStats {
    pub total_clicks: i64,
    pub unique_visitors: i64,
    pub top_countries: Vec<StatEntry>,
    pub top_referrers: Vec<StatEntry>,
    pub device_breakdown: Vec<StatEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSmartLink {
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortLinkStats {
    pub short_code: String,
    pub smart_link: Option<StatsSmartLink>,
    pub total_clicks: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_stats: AccessStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortLinkListItem {
    #[serde(flatten)]
    pub short_link: ShortLink,
    pub smart_link: Option<SmartLinkSummary>,
    pub artist_name: Option<String>,
}

/// 按维度拆分访问统计，各自按 count 降序
fn group_access_stats(stats: Vec<AccessStat>) -> (Vec<StatEntry>, Vec<StatEntry>, Vec<StatEntry>) {
    let mut countries = Vec::new();
    let mut referrers = Vec::new();
    let mut devices = Vec::new();

    for stat in stats {
        let entry = StatEntry {
            value: stat.value,
            count: stat.count,
        };
        match stat.dimension.as_str() {
            d if d == AccessDimension::Country.as_str() => countries.push(entry),
            d if d == AccessDimension::Referrer.as_str() => referrers.push(entry),
            d if d == AccessDimension::Device.as_str() => devices.push(entry),
            other => trace!("Ignoring unknown access dimension: {}", other),
        }
    }

    for list in [&mut countries, &mut referrers, &mut devices] {
        list.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    }
    countries.truncate(TOP_ENTRIES);
    referrers.truncate(TOP_ENTRIES);
    (countries, referrers, devices)
}

pub struct ShortLinkService {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<dyn ShortLinkCache>,
    click_manager: Arc<ClickManager>,
    /// 24 小时内见过的 code|ip|ua
    visitors: Cache<String, ()>,
    code_length: usize,
}

impl ShortLinkService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        cache: Arc<dyn ShortLinkCache>,
        click_manager: Arc<ClickManager>,
        code_length: usize,
    ) -> Self {
        Self {
            storage,
            cache,
            click_manager,
            visitors: Cache::builder()
                .time_to_live(VISITOR_WINDOW)
                .max_capacity(VISITOR_CACHE_CAPACITY)
                .build(),
            code_length: code_length.clamp(1, MAX_SHORT_CODE_LENGTH),
        }
    }

    // ============ Create ============

    pub async fn create_short_link(&self, input: CreateShortLinkInput) -> Result<ShortLinkCreated> {
        let smart_link = self
            .storage
            .get_smart_link(input.smart_link_id)
            .await?
            .ok_or_else(|| {
                SmartlinkError::not_found(format!("SmartLink {} not found", input.smart_link_id))
            })?;

        if let Some(existing) = self.storage.find_active_short_link(smart_link.id).await? {
            debug!(
                "Reusing short link {} for SmartLink {}",
                existing.short_code, smart_link.id
            );
            return Ok(ShortLinkCreated {
                short_link: existing,
                reused: true,
            });
        }

        let expires_at = match input.expires_at.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let parsed =
                    TimeParser::parse_expire_time(raw).map_err(SmartlinkError::date_parse)?;
                if parsed <= Utc::now() {
                    return Err(SmartlinkError::validation("expires_at must be in the future"));
                }
                Some(parsed)
            }
            _ => None,
        };

        let now = Utc::now();
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_random_code(self.code_length);
            if self.storage.short_code_exists(&code).await? {
                trace!("Short code collision on attempt {}: {}", attempt, code);
                continue;
            }

            let link = ShortLink {
                short_code: code,
                smart_link_id: smart_link.id,
                click_count: 0,
                unique_visitors: 0,
                is_active: true,
                expires_at,
                created_by: input.created_by.clone().filter(|s| !s.trim().is_empty()),
                last_accessed_at: None,
                created_at: now,
                updated_at: now,
            };

            match self.storage.insert_short_link(&link).await {
                Ok(()) => {
                    // 清掉可能存在的负缓存
                    self.cache.remove(&link.short_code).await;
                    return Ok(ShortLinkCreated {
                        short_link: link,
                        reused: false,
                    });
                }
                // 并发插入了相同短码
                Err(SmartlinkError::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        warn!(
            "Failed to generate a unique short code after {} attempts",
            MAX_CODE_ATTEMPTS
        );
        Err(SmartlinkError::conflict(
            "Could not generate a unique short code, please retry",
        ))
    }

    // ============ Resolve ============

    async fn load(&self, code: &str) -> Result<Option<ResolvedShortLink>> {
        match self.cache.get(code).await {
            CacheResult::Found(resolved) => return Ok(Some(*resolved)),
            CacheResult::NotFound => return Ok(None),
            CacheResult::Miss => {}
        }

        let Some(short_link) = self.storage.get_short_link(code).await? else {
            self.cache.mark_not_found(code).await;
            return Ok(None);
        };

        let Some(smart_link) = self.storage.get_smart_link(short_link.smart_link_id).await? else {
            warn!(
                "Short link {} points to missing SmartLink {}",
                code, short_link.smart_link_id
            );
            return Ok(None);
        };
        let Some(artist) = self.storage.get_artist(smart_link.artist_id).await? else {
            return Ok(None);
        };

        let resolved = ResolvedShortLink::new(
            short_link,
            SmartLinkSummary::from(&smart_link),
            ArtistSummary::from(&artist),
        );
        self.cache.insert(code, resolved.clone()).await;
        Ok(Some(resolved))
    }

    /// 查找短码：不存在或停用为 404，过期为 410
    pub async fn resolve(&self, code: &str) -> Result<ResolvedShortLink> {
        let not_found = || SmartlinkError::not_found(format!("Short link '{}' not found", code));

        if !is_valid_short_code(code) {
            return Err(not_found());
        }

        let resolved = self.load(code).await?.ok_or_else(not_found)?;
        if !resolved.short_link.is_active {
            return Err(not_found());
        }
        if resolved.short_link.is_expired() {
            return Err(SmartlinkError::gone(format!("Short link '{}' has expired", code)));
        }
        Ok(resolved)
    }

    /// 记录一次访问（缓冲计数），返回包含本次在内的点击数
    ///
    /// 计数以载入缓存时的库内值为基准，加上此后本进程记录的访问。
    pub fn record_hit(&self, resolved: &ResolvedShortLink, client: &ClientInfo) -> i64 {
        let code = resolved.short_link.short_code.as_str();
        let key = client.visitor_key(code);
        let unique = !self.visitors.contains_key(&key);
        if unique {
            self.visitors.insert(key, ());
        }

        self.click_manager.record_short_link_hit(
            code,
            unique,
            &client.country,
            &client.referrer,
            &client.device,
        );
        resolved.note_hit()
    }

    /// Resolve a code for the public API and record the hit.
    pub async fn resolve_and_track(&self, code: &str, client: &ClientInfo) -> Result<ResolvedView> {
        let resolved = self.resolve(code).await?;
        let click_count = self.record_hit(&resolved, client);

        Ok(ResolvedView {
            short_code: resolved.short_link.short_code,
            click_count,
            smart_link: resolved.smart_link,
            artist: resolved.artist,
        })
    }

    /// 落地页地址：`{base}/{artist_slug}/{track_slug}`
    pub fn page_url(base_url: &str, resolved: &ResolvedShortLink) -> String {
        format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            resolved.artist.slug,
            resolved.smart_link.slug
        )
    }

    // ============ Admin ============

    pub async fn stats(&self, code: &str) -> Result<ShortLinkStats> {
        let short_link = self
            .storage
            .get_short_link(code)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("Short link '{}' not found", code)))?;

        let smart_link = match self.storage.get_smart_link(short_link.smart_link_id).await? {
            Some(link) => {
                let artist = self
                    .storage
                    .get_artist(link.artist_id)
                    .await?
                    .map(|a| a.name)
                    .unwrap_or_default();
                Some(StatsSmartLink {
                    title: link.track_title,
                    artist,
                })
            }
            None => None,
        };

        let (top_countries, top_referrers, device_breakdown) =
            group_access_stats(self.storage.access_stats(code).await?);

        Ok(ShortLinkStats {
            short_code: short_link.short_code,
            smart_link,
            total_clicks: short_link.click_count,
            is_active: short_link.is_active,
            created_at: short_link.created_at,
            last_accessed_at: short_link.last_accessed_at,
            access_stats: AccessStats {
                total_clicks: short_link.click_count,
                unique_visitors: short_link.unique_visitors,
                top_countries,
                top_referrers,
                device_breakdown,
            },
        })
    }

    pub async fn list(
        &self,
        page: u64,
        limit: u64,
        is_active: Option<bool>,
    ) -> Result<(Vec<ShortLinkListItem>, u64)> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let filter = ShortLinkFilter {
            is_active,
            smart_link_id: None,
        };
        let (links, total) = self.storage.list_short_links(page, limit, &filter).await?;

        let mut ids: Vec<i64> = links.iter().map(|l| l.smart_link_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let smart_links = self.storage.get_smart_links_by_ids(&ids).await?;

        let mut artist_ids: Vec<i64> = smart_links.iter().map(|s| s.artist_id).collect();
        artist_ids.sort_unstable();
        artist_ids.dedup();
        let artists = self.storage.get_artists_by_ids(&artist_ids).await?;

        let items = links
            .into_iter()
            .map(|short_link| {
                let smart_link = smart_links
                    .iter()
                    .find(|s| s.id == short_link.smart_link_id);
                ShortLinkListItem {
                    smart_link: smart_link.map(SmartLinkSummary::from),
                    artist_name: smart_link
                        .and_then(|s| artists.get(&s.artist_id))
                        .map(|a| a.name.clone()),
                    short_link,
                }
            })
            .collect();
        Ok((items, total))
    }

    async fn set_active(&self, code: &str, active: bool) -> Result<()> {
        if !self.storage.set_short_link_active(code, active).await? {
            return Err(SmartlinkError::not_found(format!(
                "Short link '{}' not found",
                code
            )));
        }
        self.cache.remove(code).await;
        info!(
            "Short link {} {}",
            code,
            if active { "activated" } else { "deactivated" }
        );
        Ok(())
    }

    pub async fn activate(&self, code: &str) -> Result<()> {
        self.set_active(code, true).await
    }

    pub async fn deactivate(&self, code: &str) -> Result<()> {
        self.set_active(code, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_client_info_defaults() {
        let info = ClientInfo::from_headers(&HeaderMap::new(), None);
        assert_eq!(info.country, "Unknown");
        assert_eq!(info.referrer, "Direct");
        assert_eq!(info.device, "Desktop");
        assert_eq!(info.user_agent, None);
    }

    #[test]
    fn test_client_info_from_headers() {
        let info = ClientInfo::from_headers(
            &headers(&[
                ("cf-ipcountry", "FR"),
                ("x-country", "DE"),
                ("referer", "https://instagram.com/"),
                ("user-agent", "Mozilla/5.0 (iPhone) Mobile/15E148"),
            ]),
            Some("203.0.113.9".to_string()),
        );
        assert_eq!(info.country, "FR");
        assert_eq!(info.referrer, "https://instagram.com/");
        assert_eq!(info.device, "Mobile");

        let fallback = ClientInfo::from_headers(&headers(&[("x-country", "DE")]), None);
        assert_eq!(fallback.country, "DE");
    }

    #[test]
    fn test_visitor_key() {
        let info = ClientInfo::from_headers(
            &headers(&[("user-agent", "curl/8")]),
            Some("1.2.3.4".into()),
        );
        assert_eq!(info.visitor_key("abc123"), "abc123|1.2.3.4|curl/8");
    }

    #[test]
    fn test_group_access_stats() {
        let stat = |d: &str, v: &str, c: i64| AccessStat {
            dimension: d.to_string(),
            value: v.to_string(),
            count: c,
        };
        let mut stats = vec![
            stat("country", "FR", 2),
            stat("country", "US", 5),
            stat("referrer", "Direct", 7),
            stat("device", "Desktop", 4),
            stat("device", "Mobile", 3),
        ];
        for i in 0..12 {
            stats.push(stat("referrer", &format!("site{:02}", i), 1));
        }

        let (countries, referrers, devices) = group_access_stats(stats);
        assert_eq!(countries[0].value, "US");
        assert_eq!(countries[1].value, "FR");
        assert_eq!(referrers.len(), TOP_ENTRIES);
        assert_eq!(referrers[0].value, "Direct");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].value, "Desktop");
    }

    #[test]
    fn test_page_url() {
        let now = Utc::now();
        let resolved = ResolvedShortLink::new(
            ShortLink {
                short_code: "abc123".into(),
                smart_link_id: 1,
                click_count: 0,
                unique_visitors: 0,
                is_active: true,
                expires_at: None,
                created_by: None,
                last_accessed_at: None,
                created_at: now,
                updated_at: now,
            },
            SmartLinkSummary {
                id: 1,
                track_title: "Midnight Drive".into(),
                slug: "midnight-drive".into(),
            },
            ArtistSummary {
                id: 1,
                name: "Nova".into(),
                slug: "nova".into(),
            },
        );
        assert_eq!(
            ShortLinkService::page_url("https://links.example.com/", &resolved),
            "https://links.example.com/nova/midnight-drive"
        );
    }
}
