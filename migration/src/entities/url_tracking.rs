//! URL tracking entity (one row per deduplicated click)

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "url_trackings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub smart_link_id: Option<i64>,
    pub artist_id: Option<i64>,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub short_url: Option<String>,
    pub platform: Option<String>,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    #[sea_orm(unique)]
    pub mdmc_id: Option<String>,
    pub mdmc_timestamp: Option<i64>,
    pub mdmc_version: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
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
    #[sea_orm(column_type = "Text", nullable)]
    pub destination_url: Option<String>,
    pub click_count: i64,
    pub last_click_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
