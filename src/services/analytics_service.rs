//! Analytics service
//!
//! Read-only reports over SmartLink counters and URL tracking records.
//! Heavy aggregation runs in the database; this layer joins names, derives
//! rates and shapes the responses.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use crate::errors::{Result, SmartlinkError};
use crate::storage::{DateRange, SeaOrmStorage};

const DEFAULT_RANGE_DAYS: i64 = 30;
const TOP_SMART_LINKS: u64 = 10;
const TOP_UTM_SOURCES: u64 = 10;
const CLICK_STATS_UTM_SOURCES: u64 = 5;
const RECENT_ACTIVITIES: u64 = 4;

/// 平台 key（小写）到显示名
pub fn platform_display_name(platform: &str) -> String {
    let name = match platform.to_lowercase().as_str() {
        "spotify" => "Spotify",
        "deezer" => "Deezer",
        "applemusic" => "Apple Music",
        "youtubemusic" => "YouTube Music",
        "soundcloud" => "SoundCloud",
        "tidal" => "Tidal",
        "amazonmusic" => "Amazon Music",
        "boomplay" => "Boomplay",
        _ => return platform.to_string(),
    };
    name.to_string()
}

/// 保留一位小数
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / whole * 100`，whole 为 0 时返回 0
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        round1(part as f64 / whole as f64 * 100.0)
    }
}

fn average_position(sum: Option<i64>, count: i64) -> Option<f64> {
    match sum {
        Some(sum) if count > 0 => Some(round1(sum as f64 / count as f64)),
        _ => None,
    }
}

/// Parse a date given as RFC3339 or `YYYY-MM-DD`.
///
/// A bare date is taken as the start of that day, or the end of it when
/// `end_of_day` is set.
pub fn parse_date(input: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        SmartlinkError::date_parse(format!(
            "Invalid date '{}': use RFC3339 or YYYY-MM-DD",
            input
        ))
    })?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| SmartlinkError::date_parse(format!("Invalid date '{}'", input)))
}

/// 缺省为最近 30 天；start > end 为 400
pub fn parse_date_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange> {
    let end = match end.filter(|s| !s.trim().is_empty()) {
        Some(raw) => parse_date(raw, true)?,
        None => Utc::now(),
    };
    let start = match start.filter(|s| !s.trim().is_empty()) {
        Some(raw) => parse_date(raw, false)?,
        None => end - Duration::days(DEFAULT_RANGE_DAYS),
    };

    if start > end {
        return Err(SmartlinkError::validation(
            "start_date must not be after end_date",
        ));
    }
    Ok(DateRange { start, end })
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeView {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl From<&DateRange> for RangeView {
    fn from(range: &DateRange) -> Self {
        Self {
            start_date: range.start,
            end_date: range.end,
        }
    }
}

// ============ SmartLink analytics ============

#[derive(Debug, Clone, Serialize)]
pub struct PlatformStat {
    pub platform: String,
    pub display_name: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartLinkAnalytics {
    pub smart_link_id: i64,
    pub track_title: String,
    pub total_views: i64,
    pub total_clicks: i64,
    pub conversion_rate: f64,
    pub platform_stats: Vec<PlatformStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UtmSourceStat {
    pub utm_source: String,
    pub clicks: i64,
    pub unique_clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartLinkClickStats {
    pub smart_link_id: i64,
    pub total_clicks: i64,
    pub unique_clicks: i64,
    pub top_sources: Vec<UtmSourceStat>,
}

// ============ Artist analytics ============

#[derive(Debug, Clone, Serialize)]
pub struct UtmConversion {
    pub utm_source: String,
    pub utm_medium: String,
    pub clicks: i64,
    pub unique_visitors: i64,
    pub platform_count: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopSmartLink {
    pub smart_link_id: i64,
    pub track_title: Option<String>,
    pub slug: Option<String>,
    pub clicks: i64,
    pub unique_clicks: i64,
    pub platform_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtistAnalytics {
    pub artist_id: i64,
    pub artist_name: String,
    pub period: RangeView,
    pub conversions: Vec<UtmConversion>,
    pub top_smart_links: Vec<TopSmartLink>,
}

// ============ Global analytics ============

#[derive(Debug, Clone, Serialize)]
pub struct GlobalTotals {
    pub total_clicks: i64,
    pub unique_clicks: i64,
    pub smart_links: i64,
    pub artists: i64,
    pub platforms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbTestStat {
    pub variant: String,
    pub clicks: i64,
    pub unique_clicks: i64,
    pub average_position: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalAnalytics {
    pub period: RangeView,
    pub totals: GlobalTotals,
    pub top_sources: Vec<UtmSourceStat>,
    pub ab_tests: Vec<AbTestStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformPerformance {
    pub platform: String,
    pub display_name: String,
    pub clicks: i64,
    pub unique_clicks: i64,
    pub average_position: Option<f64>,
}

// ============ Dashboard ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatCard {
    pub value: i64,
    pub change: String,
    pub change_type: ChangeType,
}

impl StatCard {
    /// 相对 `before` 的变化百分比
    pub fn compare(now: i64, before: i64) -> Self {
        let change = if before > 0 {
            (now - before) as f64 / before as f64 * 100.0
        } else if now > 0 {
            100.0
        } else {
            0.0
        };
        let change = round1(change);
        Self {
            value: now,
            change: format!("{}{:.1}%", if change >= 0.0 { "+" } else { "" }, change),
            change_type: if change >= 0.0 {
                ChangeType::Positive
            } else {
                ChangeType::Negative
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_smart_links: StatCard,
    pub active_artists: StatCard,
    pub monthly_views: StatCard,
    pub total_clicks: StatCard,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyPerformance {
    pub new_clicks: i64,
    pub conversion_rate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub subtitle: String,
    pub time: DateTime<Utc>,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub weekly_performance: WeeklyPerformance,
    pub recent_activities: Vec<Activity>,
}

/// 当前自然月与上一自然月的起点
fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (year, month) = (now.year(), now.month());
    let (prev_year, prev_month) = if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    };
    let start = |y: i32, m: u32| {
        Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0)
            .single()
            .unwrap_or(now)
    };
    (start(year, month), start(prev_year, prev_month))
}

pub struct AnalyticsService {
    storage: Arc<SeaOrmStorage>,
}

impl AnalyticsService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    pub async fn smartlink_analytics(&self, id: i64) -> Result<SmartLinkAnalytics> {
        let link = self
            .storage
            .get_smart_link(id)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("SmartLink {} not found", id)))?;

        let mut platform_stats: Vec<PlatformStat> = self
            .storage
            .platform_clicks(id)
            .await?
            .into_iter()
            .filter(|(_, clicks)| *clicks > 0)
            .map(|(platform, clicks)| PlatformStat {
                display_name: platform_display_name(&platform),
                platform,
                clicks,
            })
            .collect();
        platform_stats.sort_by(|a, b| b.clicks.cmp(&a.clicks));

        Ok(SmartLinkAnalytics {
            smart_link_id: link.id,
            track_title: link.track_title,
            total_views: link.view_count,
            total_clicks: link.platform_click_count,
            conversion_rate: percentage(link.platform_click_count, link.view_count),
            platform_stats,
        })
    }

    pub async fn artist_analytics(
        &self,
        artist_id: i64,
        range: &DateRange,
    ) -> Result<ArtistAnalytics> {
        let artist = self
            .storage
            .get_artist(artist_id)
            .await?
            .ok_or_else(|| SmartlinkError::not_found(format!("Artist {} not found", artist_id)))?;

        let conversions = self
            .storage
            .conversions_by_utm(artist_id, range)
            .await?
            .into_iter()
            .map(|row| {
                let clicks = row.clicks.unwrap_or(0);
                UtmConversion {
                    conversion_rate: percentage(clicks, row.unique_visitors),
                    utm_source: row.utm_source,
                    utm_medium: row.utm_medium,
                    clicks,
                    unique_visitors: row.unique_visitors,
                    platform_count: row.platform_count,
                }
            })
            .collect();

        let top_smart_links = self
            .top_smart_links(Some(artist_id), range, TOP_SMART_LINKS)
            .await?;

        Ok(ArtistAnalytics {
            artist_id,
            artist_name: artist.name,
            period: RangeView::from(range),
            conversions,
            top_smart_links,
        })
    }

    async fn top_smart_links(
        &self,
        artist_id: Option<i64>,
        range: &DateRange,
        limit: u64,
    ) -> Result<Vec<TopSmartLink>> {
        let rows = self.storage.top_smart_links(artist_id, range, limit).await?;
        let ids: Vec<i64> = rows.iter().map(|r| r.smart_link_id).collect();
        let links: HashMap<i64, _> = self
            .storage
            .get_smart_links_by_ids(&ids)
            .await?
            .into_iter()
            .map(|l| (l.id, l))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let link = links.get(&row.smart_link_id);
                TopSmartLink {
                    smart_link_id: row.smart_link_id,
                    track_title: link.map(|l| l.track_title.clone()),
                    slug: link.map(|l| l.slug.clone()),
                    clicks: row.clicks.unwrap_or(0),
                    unique_clicks: row.unique_clicks,
                    platform_count: row.platform_count,
                }
            })
            .collect())
    }

    pub async fn global_analytics(&self, range: &DateRange) -> Result<GlobalAnalytics> {
        let totals = self.storage.global_totals(range).await?;

        let top_sources = self
            .storage
            .top_utm_sources(None, Some(range), TOP_UTM_SOURCES)
            .await?
            .into_iter()
            .map(|row| UtmSourceStat {
                utm_source: row.utm_source,
                clicks: row.clicks.unwrap_or(0),
                unique_clicks: row.unique_clicks,
            })
            .collect();

        let ab_tests = self
            .storage
            .ab_test_performance(range)
            .await?
            .into_iter()
            .map(|row| AbTestStat {
                average_position: average_position(row.position_sum, row.position_count),
                variant: row.variant,
                clicks: row.clicks.unwrap_or(0),
                unique_clicks: row.unique_clicks,
            })
            .collect();

        Ok(GlobalAnalytics {
            period: RangeView::from(range),
            totals: GlobalTotals {
                total_clicks: totals.total_clicks.unwrap_or(0),
                unique_clicks: totals.unique_clicks,
                smart_links: totals.smart_links,
                artists: totals.artists,
                platforms: totals.platforms,
            },
            top_sources,
            ab_tests,
        })
    }

    pub async fn smartlink_click_stats(&self, id: i64) -> Result<SmartLinkClickStats> {
        if self.storage.get_smart_link(id).await?.is_none() {
            return Err(SmartlinkError::not_found(format!("SmartLink {} not found", id)));
        }

        let totals = self.storage.click_totals(Some(id), None, None).await?;
        let top_sources = self
            .storage
            .top_utm_sources(Some(id), None, CLICK_STATS_UTM_SOURCES)
            .await?
            .into_iter()
            .map(|row| UtmSourceStat {
                utm_source: row.utm_source,
                clicks: row.clicks.unwrap_or(0),
                unique_clicks: row.unique_clicks,
            })
            .collect();

        Ok(SmartLinkClickStats {
            smart_link_id: id,
            total_clicks: totals.clicks.unwrap_or(0),
            unique_clicks: totals.unique_clicks,
            top_sources,
        })
    }

    pub async fn top_platforms(&self, limit: u64) -> Result<Vec<PlatformPerformance>> {
        let rows = self.storage.platform_stats(limit.clamp(1, 50)).await?;
        Ok(rows
            .into_iter()
            .map(|row| PlatformPerformance {
                display_name: platform_display_name(&row.platform),
                average_position: average_position(row.position_sum, row.position_count),
                platform: row.platform,
                clicks: row.clicks.unwrap_or(0),
                unique_clicks: row.unique_clicks,
            })
            .collect())
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        let now = Utc::now();
        let (month_start, prev_month_start) = month_bounds(now);
        let week_ago = now - Duration::days(7);

        let smart_links_now = self.storage.count_smart_links(None, None).await? as i64;
        let smart_links_before = self
            .storage
            .count_smart_links(None, Some(month_start))
            .await? as i64;
        let artists_now = self.storage.count_artists(None).await? as i64;
        let artists_before = self.storage.count_artists(Some(month_start)).await? as i64;

        let this_month = self.storage.click_totals(None, Some(month_start), None).await?;
        let last_month = self
            .storage
            .click_totals(None, Some(prev_month_start), Some(month_start))
            .await?;
        let all_time = self.storage.click_totals(None, None, None).await?;
        let before_month = self.storage.click_totals(None, None, Some(month_start)).await?;
        let weekly = self.storage.click_totals(None, Some(week_ago), None).await?;

        let weekly_clicks = weekly.clicks.unwrap_or(0);

        let recent = self.storage.recent_smart_links(RECENT_ACTIVITIES).await?;
        let mut artist_ids: Vec<i64> = recent.iter().map(|l| l.artist_id).collect();
        artist_ids.dedup();
        let artists = self.storage.get_artists_by_ids(&artist_ids).await?;

        let recent_activities = recent
            .into_iter()
            .map(|link| {
                let artist = artists
                    .get(&link.artist_id)
                    .map(|a| a.name.as_str())
                    .unwrap_or("Unknown artist");
                Activity {
                    kind: "smartlink_created".to_string(),
                    title: "New SmartLink created".to_string(),
                    subtitle: format!("\"{}\" by {}", link.track_title, artist),
                    time: link.created_at,
                    id: link.id,
                }
            })
            .collect();

        debug!("Dashboard computed for month starting {}", month_start);

        Ok(Dashboard {
            stats: DashboardStats {
                total_smart_links: StatCard::compare(smart_links_now, smart_links_before),
                active_artists: StatCard::compare(artists_now, artists_before),
                monthly_views: StatCard::compare(
                    this_month.clicks.unwrap_or(0),
                    last_month.clicks.unwrap_or(0),
                ),
                total_clicks: StatCard::compare(
                    all_time.clicks.unwrap_or(0),
                    before_month.clicks.unwrap_or(0),
                ),
            },
            weekly_performance: WeeklyPerformance {
                new_clicks: weekly_clicks,
                conversion_rate: format!("{:.1}%", percentage(weekly_clicks, weekly.unique_clicks)),
            },
            recent_activities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_display_name() {
        assert_eq!(platform_display_name("spotify"), "Spotify");
        assert_eq!(platform_display_name("AppleMusic"), "Apple Music");
        assert_eq!(platform_display_name("youtubeMusic"), "YouTube Music");
        assert_eq!(platform_display_name("Napster"), "Napster");
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(0, 10), 0.0);
    }

    #[test]
    fn test_parse_date_formats() {
        let d = parse_date("2025-03-01", false).unwrap();
        assert_eq!(d.to_rfc3339(), "2025-03-01T00:00:00+00:00");
        let e = parse_date("2025-03-01", true).unwrap();
        assert_eq!(e.date_naive(), d.date_naive());
        assert!(e > d);

        let r = parse_date("2025-03-01T10:00:00+02:00", false).unwrap();
        assert_eq!(r.to_rfc3339(), "2025-03-01T08:00:00+00:00");

        assert!(matches!(
            parse_date("03/01/2025", false),
            Err(SmartlinkError::DateParse(_))
        ));
    }

    #[test]
    fn test_parse_date_range() {
        let range = parse_date_range(None, None).unwrap();
        let span = range.end - range.start;
        assert_eq!(span.num_days(), DEFAULT_RANGE_DAYS);

        let same_day = parse_date_range(Some("2025-01-10"), Some("2025-01-10")).unwrap();
        assert!(same_day.start < same_day.end);

        assert!(matches!(
            parse_date_range(Some("2025-02-01"), Some("2025-01-01")),
            Err(SmartlinkError::Validation(_))
        ));
    }

    #[test]
    fn test_stat_card_change() {
        let up = StatCard::compare(15, 10);
        assert_eq!(up.change, "+50.0%");
        assert_eq!(up.change_type, ChangeType::Positive);

        let down = StatCard::compare(5, 10);
        assert_eq!(down.change, "-50.0%");
        assert_eq!(down.change_type, ChangeType::Negative);

        assert_eq!(StatCard::compare(3, 0).change, "+100.0%");
        assert_eq!(StatCard::compare(0, 0).change, "+0.0%");
    }

    #[test]
    fn test_month_bounds() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let (start, prev) = month_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(prev, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_average_position() {
        assert_eq!(average_position(Some(7), 2), Some(3.5));
        assert_eq!(average_position(None, 0), None);
        assert_eq!(average_position(Some(3), 0), None);
    }
}
