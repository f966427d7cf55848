//! Cross-platform link lookup through the Odesli (song.link) API
//!
//! Requests run on the blocking pool with a shared `ureq` agent. Results are
//! cached per `(input, country)`; concurrent lookups for the same key only
//! hit the API once.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use ureq::Agent;

use crate::config::PlatformLinksConfig;
use crate::errors::{Result, SmartlinkError};

const CACHE_MAX_CAPACITY: u64 = 1_000;

/// Kind of lookup input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Isrc,
    Upc,
    SpotifyUrl,
    AppleUrl,
    YoutubeUrl,
    DeezerUrl,
    Url,
}

fn is_isrc(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 12
        && b[..2].iter().all(u8::is_ascii_uppercase)
        && b[2..5]
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && b[5..].iter().all(u8::is_ascii_digit)
}

fn is_upc(s: &str) -> bool {
    (s.len() == 12 || s.len() == 13) && s.bytes().all(|b| b.is_ascii_digit())
}

/// `prefix` 之后紧跟满足 `pred` 的字符
fn followed_by(s: &str, prefix: &str, pred: impl Fn(char) -> bool) -> bool {
    s.match_indices(prefix)
        .any(|(idx, _)| s[idx + prefix.len()..].chars().next().is_some_and(&pred))
}

fn is_apple_music(s: &str) -> bool {
    const HOST: &str = "music.apple.com/";
    s.match_indices(HOST).any(|(idx, _)| {
        let rest = s[idx + HOST.len()..].as_bytes();
        rest.len() >= 3 && rest[..2].iter().all(u8::is_ascii_lowercase) && rest[2] == b'/'
    })
}

/// Classify a lookup input; anything unrecognised is a validation error.
pub fn detect_input(input: &str) -> Result<InputKind> {
    let s = input.trim();
    if s.is_empty() {
        return Err(SmartlinkError::validation("source_url is required"));
    }

    if is_isrc(s) {
        return Ok(InputKind::Isrc);
    }
    if is_upc(s) {
        return Ok(InputKind::Upc);
    }
    if ["track/", "album/", "playlist/"].iter().any(|kind| {
        followed_by(s, &format!("open.spotify.com/{}", kind), |c| {
            c.is_ascii_alphanumeric()
        })
    }) {
        return Ok(InputKind::SpotifyUrl);
    }
    if is_apple_music(s) {
        return Ok(InputKind::AppleUrl);
    }
    if s.contains("music.youtube.com/watch") {
        return Ok(InputKind::YoutubeUrl);
    }
    if ["track/", "album/", "playlist/"].iter().any(|kind| {
        followed_by(s, &format!("deezer.com/{}", kind), |c| c.is_ascii_digit())
    }) {
        return Ok(InputKind::DeezerUrl);
    }
    if s.starts_with("http://") || s.starts_with("https://") {
        return Ok(InputKind::Url);
    }

    Err(SmartlinkError::validation(
        "Unsupported input: use a Spotify / Apple Music / YouTube Music / Deezer URL, an ISRC (12 characters) or a UPC (12-13 digits)",
    ))
}

/// Odesli 平台 key 到显示名
pub fn odesli_platform_name(key: &str) -> String {
    let name = match key {
        "spotify" => "Spotify",
        "appleMusic" => "Apple Music",
        "youtube" => "YouTube",
        "youtubeMusic" => "YouTube Music",
        "deezer" => "Deezer",
        "amazonMusic" => "Amazon Music",
        "tidal" => "Tidal",
        "soundcloud" => "SoundCloud",
        "pandora" => "Pandora",
        "napster" => "Napster",
        "yandex" => "Yandex Music",
        other => return other.to_string(),
    };
    name.to_string()
}

/// 替换 URL 中第一个 `/WxH` 尺寸段
fn replace_size_segment(url: &str, replacement: &str, trailing_slash: bool) -> String {
    let bytes = url.as_bytes();
    for start in 0..bytes.len() {
        if bytes[start] != b'/' {
            continue;
        }
        let mut i = start + 1;
        let w = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == w || i >= bytes.len() || bytes[i] != b'x' {
            continue;
        }
        i += 1;
        let h = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == h {
            continue;
        }
        if trailing_slash {
            if i >= bytes.len() || bytes[i] != b'/' {
                continue;
            }
            i += 1;
        }
        return format!("{}{}{}", &url[..start], replacement, &url[i..]);
    }
    url.to_string()
}

/// 选用更高分辨率的封面
pub fn best_artwork(thumbnail: &str) -> String {
    if thumbnail.contains("i.scdn.co") {
        replace_size_segment(thumbnail, "/640x640/", true)
    } else if thumbnail.contains("mzstatic.com") {
        replace_size_segment(thumbnail, "/1000x1000", false)
    } else {
        thumbnail.to_string()
    }
}

// ============ Odesli wire format ============

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OdesliEntity {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    album_name: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    isrc: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OdesliLinkDetail {
    url: String,
    #[serde(default)]
    native_app_uri_mobile: Option<String>,
    #[serde(default)]
    native_app_uri_desktop: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OdesliLink {
    Detailed(OdesliLinkDetail),
    Plain(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OdesliResponse {
    #[serde(default)]
    entity_unique_id: Option<String>,
    #[serde(default)]
    user_country: Option<String>,
    #[serde(default)]
    page_url: Option<String>,
    entities_by_unique_id: BTreeMap<String, OdesliEntity>,
    links_by_platform: BTreeMap<String, OdesliLink>,
}

// ============ Normalized output ============

#[derive(Debug, Clone, Serialize)]
pub struct FetchedPlatformLink {
    pub platform: String,
    pub key: String,
    pub url: String,
    pub native_app_uri_mobile: Option<String>,
    pub native_app_uri_desktop: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformLinksResult {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<String>,
    pub isrc: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub page_url: Option<String>,
    pub user_country: Option<String>,
    pub links: Vec<FetchedPlatformLink>,
}

fn normalize_response(response: OdesliResponse) -> Result<PlatformLinksResult> {
    let entity = response
        .entity_unique_id
        .as_ref()
        .and_then(|id| response.entities_by_unique_id.get(id))
        .or_else(|| response.entities_by_unique_id.values().next())
        .ok_or_else(|| SmartlinkError::external_service("Odesli response has no entities"))?;

    let isrc = response
        .entities_by_unique_id
        .values()
        .find_map(|e| e.isrc.clone());

    let links = response
        .links_by_platform
        .iter()
        .map(|(key, link)| {
            let (url, mobile, desktop) = match link {
                OdesliLink::Detailed(d) => (
                    d.url.as_str(),
                    d.native_app_uri_mobile.clone(),
                    d.native_app_uri_desktop.clone(),
                ),
                OdesliLink::Plain(url) => (url.as_str(), None, None),
            };
            FetchedPlatformLink {
                platform: odesli_platform_name(key),
                key: key.clone(),
                url: url.strip_suffix(';').unwrap_or(url).to_string(),
                native_app_uri_mobile: mobile,
                native_app_uri_desktop: desktop,
            }
        })
        .collect();

    Ok(PlatformLinksResult {
        title: entity.title.clone().unwrap_or_default(),
        artist: entity.artist_name.clone().unwrap_or_default(),
        album: entity.album_name.clone().unwrap_or_default(),
        artwork: entity.thumbnail_url.as_deref().map(best_artwork),
        isrc,
        kind: entity.kind.clone().unwrap_or_else(|| "song".to_string()),
        page_url: response.page_url,
        user_country: response.user_country,
        links,
    })
}

pub struct PlatformLinkService {
    enabled: bool,
    api_base_url: String,
    default_country: String,
    agent: Agent,
    cache: Cache<String, PlatformLinksResult>,
}

impl PlatformLinkService {
    pub fn new(config: &PlatformLinksConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs.max(1))))
            .build()
            .into();

        Self {
            enabled: config.enabled,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            default_country: config.user_country.clone(),
            agent,
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .max_capacity(CACHE_MAX_CAPACITY)
                .build(),
        }
    }

    /// 同步请求（在 spawn_blocking 中调用）
    fn fetch_sync(agent: Agent, url: String) -> Result<OdesliResponse> {
        let resp = agent.get(&url).call().map_err(|e| match e {
            ureq::Error::StatusCode(404) => {
                SmartlinkError::not_found("No streaming links found for this input")
            }
            ureq::Error::StatusCode(429) => {
                SmartlinkError::external_service("Odesli rate limit reached, retry later")
            }
            other => {
                warn!("Odesli request to \"{}\" failed: {}", url, other);
                SmartlinkError::external_service(format!("Odesli request failed: {}", other))
            }
        })?;

        resp.into_body().read_json().map_err(|e| {
            warn!("Odesli response from \"{}\" parse failed: {}", url, e);
            SmartlinkError::external_service(format!("Invalid Odesli response: {}", e))
        })
    }

    async fn query(&self, input: String, country: String) -> Result<PlatformLinksResult> {
        let endpoint = format!("{}/links", self.api_base_url);
        let url = url::Url::parse_with_params(
            &endpoint,
            &[
                ("url", input.as_str()),
                ("userCountry", country.as_str()),
                ("songIfSingle", "true"),
            ],
        )
        .map_err(|e| SmartlinkError::external_service(format!("Bad Odesli endpoint: {}", e)))?;

        trace!("Odesli lookup: {}", url);
        let agent = self.agent.clone();
        let response = tokio::task::spawn_blocking(move || Self::fetch_sync(agent, url.to_string()))
            .await
            .map_err(|e| SmartlinkError::external_service(format!("Odesli task failed: {}", e)))??;

        normalize_response(response)
    }

    /// Look up cross-platform links for a URL, ISRC or UPC.
    pub async fn fetch(
        &self,
        source: &str,
        user_country: Option<&str>,
    ) -> Result<PlatformLinksResult> {
        if !self.enabled {
            return Err(SmartlinkError::external_service(
                "Platform link lookup is disabled",
            ));
        }

        let input = source.trim().to_string();
        let kind = detect_input(&input)?;
        let country = user_country
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.default_country)
            .to_uppercase();
        debug!("Platform link lookup: {:?} '{}' ({})", kind, input, country);

        let key = format!("{}_{}", input, country);
        self.cache
            .try_get_with(key, self.query(input, country))
            .await
            .map_err(|e: Arc<SmartlinkError>| (*e).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_input() {
        assert_eq!(detect_input("USRC17607839").unwrap(), InputKind::Isrc);
        assert_eq!(detect_input("  GBAYE0601498 ").unwrap(), InputKind::Isrc);
        assert_eq!(detect_input("602547924117").unwrap(), InputKind::Upc);
        assert_eq!(detect_input("0602547924117").unwrap(), InputKind::Upc);
        assert_eq!(
            detect_input("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC").unwrap(),
            InputKind::SpotifyUrl
        );
        assert_eq!(
            detect_input("https://music.apple.com/fr/album/x/123?i=456").unwrap(),
            InputKind::AppleUrl
        );
        assert_eq!(
            detect_input("https://music.youtube.com/watch?v=abc").unwrap(),
            InputKind::YoutubeUrl
        );
        assert_eq!(
            detect_input("https://www.deezer.com/track/3135556").unwrap(),
            InputKind::DeezerUrl
        );
        assert_eq!(
            detect_input("https://tidal.com/browse/track/1").unwrap(),
            InputKind::Url
        );
    }

    #[test]
    fn test_detect_input_rejects() {
        assert!(detect_input("").is_err());
        assert!(detect_input("usrc17607839").is_err());
        assert!(detect_input("12345").is_err());
        assert!(detect_input("ftp://example.com/song").is_err());
        assert!(matches!(
            detect_input("not a link"),
            Err(SmartlinkError::Validation(_))
        ));
    }

    #[test]
    fn test_best_artwork() {
        assert_eq!(
            best_artwork("https://is1-ssl.mzstatic.com/image/thumb/Music/v4/source/512x512bb.jpg"),
            "https://is1-ssl.mzstatic.com/image/thumb/Music/v4/source/1000x1000bb.jpg"
        );
        assert_eq!(
            best_artwork("https://i.scdn.co/image/300x300/abc"),
            "https://i.scdn.co/image/640x640/abc"
        );
        assert_eq!(
            best_artwork("https://i.scdn.co/image/ab67616d0000b273"),
            "https://i.scdn.co/image/ab67616d0000b273"
        );
        assert_eq!(best_artwork("https://cdn.example/a.jpg"), "https://cdn.example/a.jpg");
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(odesli_platform_name("appleMusic"), "Apple Music");
        assert_eq!(odesli_platform_name("yandex"), "Yandex Music");
        assert_eq!(odesli_platform_name("audius"), "audius");
    }

    #[test]
    fn test_normalize_response() {
        let json = r#"{
            "entityUniqueId": "SPOTIFY_SONG::1",
            "userCountry": "FR",
            "pageUrl": "https://song.link/s/1",
            "entitiesByUniqueId": {
                "APPLE_SONG::9": {"type": "song", "title": "Other", "isrc": "USRC17607839"},
                "SPOTIFY_SONG::1": {
                    "type": "song",
                    "title": "Midnight Drive",
                    "artistName": "Nova",
                    "thumbnailUrl": "https://i.scdn.co/image/300x300/abc"
                }
            },
            "linksByPlatform": {
                "spotify": {"url": "https://open.spotify.com/track/1;", "entityUniqueId": "SPOTIFY_SONG::1"},
                "appleMusic": "https://music.apple.com/fr/album/x/1"
            }
        }"#;
        let response: OdesliResponse = serde_json::from_str(json).unwrap();
        let result = normalize_response(response).unwrap();

        assert_eq!(result.title, "Midnight Drive");
        assert_eq!(result.artist, "Nova");
        assert_eq!(result.album, "");
        assert_eq!(result.kind, "song");
        assert_eq!(result.isrc.as_deref(), Some("USRC17607839"));
        assert_eq!(
            result.artwork.as_deref(),
            Some("https://i.scdn.co/image/640x640/abc")
        );

        let spotify = result.links.iter().find(|l| l.key == "spotify").unwrap();
        assert_eq!(spotify.platform, "Spotify");
        assert_eq!(spotify.url, "https://open.spotify.com/track/1");
        let apple = result.links.iter().find(|l| l.key == "appleMusic").unwrap();
        assert_eq!(apple.platform, "Apple Music");
    }

    #[test]
    fn test_normalize_falls_back_to_first_entity() {
        let json = r#"{
            "entityUniqueId": "MISSING",
            "entitiesByUniqueId": {"A::1": {"title": "Only"}},
            "linksByPlatform": {}
        }"#;
        let response: OdesliResponse = serde_json::from_str(json).unwrap();
        let result = normalize_response(response).unwrap();
        assert_eq!(result.title, "Only");
        assert!(result.links.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let config = PlatformLinksConfig {
            enabled: false,
            api_base_url: "https://api.song.link/v1-alpha.1".to_string(),
            user_country: "FR".to_string(),
            timeout_secs: 5,
            cache_ttl_secs: 60,
        };
        let service = PlatformLinkService::new(&config);
        let err = service
            .fetch("https://open.spotify.com/track/1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SmartlinkError::ExternalService(_)));
    }

    #[tokio::test]
    #[ignore] // 需要网络
    async fn test_fetch_live() {
        let config = PlatformLinksConfig {
            enabled: true,
            api_base_url: "https://api.song.link/v1-alpha.1".to_string(),
            user_country: "US".to_string(),
            timeout_secs: 10,
            cache_ttl_secs: 60,
        };
        let service = PlatformLinkService::new(&config);
        let result = service
            .fetch("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC", None)
            .await
            .unwrap();
        assert!(!result.links.is_empty());
    }
}
