//! SmartLink entity
//!
//! `platform_links` holds the ordered `[{platform, url}]` list as JSON text.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "smart_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub artist_id: i64,
    pub track_title: String,
    pub slug: String,
    pub release_date: Option<Date>,
    #[sea_orm(column_type = "Text", nullable)]
    pub cover_image_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub preview_audio_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub custom_subtitle: String,
    pub use_description_as_subtitle: bool,
    #[sea_orm(column_type = "Text")]
    pub platform_links: String,
    pub tracking_mode: String,
    pub ga4_id: Option<String>,
    pub gtm_id: Option<String>,
    pub meta_pixel_id: Option<String>,
    pub tiktok_pixel_id: Option<String>,
    pub view_count: i64,
    pub platform_click_count: i64,
    pub is_published: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
