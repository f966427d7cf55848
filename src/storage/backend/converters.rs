use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use tracing::warn;

use crate::storage::models::{
    Artist, ArtistDraft, NewClick, PlatformLink, ShortLink, SmartLink, SmartLinkDraft,
    UrlTracking,
};
use migration::entities::{artist, short_link, smart_link, url_tracking};

pub fn model_to_artist(model: artist::Model) -> Artist {
    Artist {
        id: model.id,
        name: model.name,
        slug: model.slug,
        bio: model.bio,
        image_url: model.image_url,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// `id = None` 表示新建
pub fn artist_draft_to_active_model(
    draft: &ArtistDraft,
    id: Option<i64>,
    now: DateTime<Utc>,
) -> artist::ActiveModel {
    artist::ActiveModel {
        id: id.map(Set).unwrap_or(NotSet),
        name: Set(draft.name.clone()),
        slug: Set(draft.slug.clone()),
        bio: Set(draft.bio.clone()),
        image_url: Set(draft.image_url.clone()),
        created_at: if id.is_none() { Set(now) } else { NotSet },
        updated_at: Set(now),
    }
}

/// 平台链接 JSON 解析失败时返回空列表
pub fn parse_platform_links(raw: &str) -> Vec<PlatformLink> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Invalid platform_links JSON ignored: {}", e);
        Vec::new()
    })
}

pub fn model_to_smart_link(model: smart_link::Model) -> SmartLink {
    SmartLink {
        id: model.id,
        artist_id: model.artist_id,
        track_title: model.track_title,
        slug: model.slug,
        release_date: model.release_date,
        cover_image_url: model.cover_image_url,
        preview_audio_url: model.preview_audio_url,
        description: model.description,
        custom_subtitle: model.custom_subtitle,
        use_description_as_subtitle: model.use_description_as_subtitle,
        platform_links: parse_platform_links(&model.platform_links),
        tracking_mode: model.tracking_mode,
        ga4_id: model.ga4_id,
        gtm_id: model.gtm_id,
        meta_pixel_id: model.meta_pixel_id,
        tiktok_pixel_id: model.tiktok_pixel_id,
        view_count: model.view_count.max(0),
        platform_click_count: model.platform_click_count.max(0),
        is_published: model.is_published,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// 新建时计数器置零；更新时计数器不写入
pub fn smart_link_draft_to_active_model(
    draft: &SmartLinkDraft,
    id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<smart_link::ActiveModel, serde_json::Error> {
    let is_new = id.is_none();
    Ok(smart_link::ActiveModel {
        id: id.map(Set).unwrap_or(NotSet),
        artist_id: Set(draft.artist_id),
        track_title: Set(draft.track_title.clone()),
        slug: Set(draft.slug.clone()),
        release_date: Set(draft.release_date),
        cover_image_url: Set(draft.cover_image_url.clone()),
        preview_audio_url: Set(draft.preview_audio_url.clone()),
        description: Set(draft.description.clone()),
        custom_subtitle: Set(draft.custom_subtitle.clone()),
        use_description_as_subtitle: Set(draft.use_description_as_subtitle),
        platform_links: Set(serde_json::to_string(&draft.platform_links)?),
        tracking_mode: Set(draft.tracking_mode.clone()),
        ga4_id: Set(draft.ga4_id.clone()),
        gtm_id: Set(draft.gtm_id.clone()),
        meta_pixel_id: Set(draft.meta_pixel_id.clone()),
        tiktok_pixel_id: Set(draft.tiktok_pixel_id.clone()),
        view_count: if is_new { Set(0) } else { NotSet },
        platform_click_count: if is_new { Set(0) } else { NotSet },
        is_published: Set(draft.is_published),
        created_at: if is_new { Set(now) } else { NotSet },
        updated_at: Set(now),
    })
}

pub fn model_to_short_link(model: short_link::Model) -> ShortLink {
    ShortLink {
        short_code: model.short_code,
        smart_link_id: model.smart_link_id,
        click_count: model.click_count.max(0),
        unique_visitors: model.unique_visitors.max(0),
        is_active: model.is_active,
        expires_at: model.expires_at,
        created_by: model.created_by,
        last_accessed_at: model.last_accessed_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub fn short_link_to_active_model(link: &ShortLink) -> short_link::ActiveModel {
    short_link::ActiveModel {
        short_code: Set(link.short_code.clone()),
        smart_link_id: Set(link.smart_link_id),
        click_count: Set(link.click_count),
        unique_visitors: Set(link.unique_visitors),
        is_active: Set(link.is_active),
        expires_at: Set(link.expires_at),
        created_by: Set(link.created_by.clone()),
        last_accessed_at: Set(link.last_accessed_at),
        created_at: Set(link.created_at),
        updated_at: Set(link.updated_at),
    }
}

pub fn model_to_tracking(model: url_tracking::Model) -> UrlTracking {
    UrlTracking {
        id: model.id,
        smart_link_id: model.smart_link_id,
        artist_id: model.artist_id,
        url: model.url,
        short_url: model.short_url,
        platform: model.platform,
        utm_source: model.utm_source,
        utm_medium: model.utm_medium,
        utm_campaign: model.utm_campaign,
        utm_term: model.utm_term,
        utm_content: model.utm_content,
        mdmc_id: model.mdmc_id,
        mdmc_timestamp: model.mdmc_timestamp,
        mdmc_version: model.mdmc_version,
        user_agent: model.user_agent,
        referrer: model.referrer,
        screen_resolution: model.screen_resolution,
        language: model.language,
        timezone: model.timezone,
        ip_address: model.ip_address,
        country: model.country,
        city: model.city,
        platform_position: model.platform_position,
        order_source: model.order_source,
        ab_test_variant: model.ab_test_variant,
        destination_url: model.destination_url,
        click_count: model.click_count,
        last_click_at: model.last_click_at,
        created_at: model.created_at,
    }
}

pub fn new_click_to_active_model(
    click: &NewClick,
    now: DateTime<Utc>,
) -> url_tracking::ActiveModel {
    url_tracking::ActiveModel {
        id: NotSet,
        smart_link_id: Set(click.smart_link_id),
        artist_id: Set(click.artist_id),
        url: Set(click.url.clone()),
        short_url: Set(click.short_url.clone()),
        platform: Set(click.platform.clone()),
        utm_source: Set(click.utm_source.clone()),
        utm_medium: Set(click.utm_medium.clone()),
        utm_campaign: Set(click.utm_campaign.clone()),
        utm_term: Set(click.utm_term.clone()),
        utm_content: Set(click.utm_content.clone()),
        mdmc_id: Set(click.mdmc_id.clone()),
        mdmc_timestamp: Set(click.mdmc_timestamp),
        mdmc_version: Set(click.mdmc_version.clone()),
        user_agent: Set(click.user_agent.clone()),
        referrer: Set(click.referrer.clone()),
        screen_resolution: Set(click.screen_resolution.clone()),
        language: Set(click.language.clone()),
        timezone: Set(click.timezone.clone()),
        ip_address: Set(click.ip_address.clone()),
        country: Set(click.country.clone()),
        city: Set(click.city.clone()),
        platform_position: Set(click.platform_position),
        order_source: Set(click.order_source.clone()),
        ab_test_variant: Set(click.ab_test_variant.clone()),
        destination_url: Set(click.destination_url.clone()),
        click_count: Set(1),
        last_click_at: Set(now),
        created_at: Set(now),
    }
}
