//! Per-platform click counters of a SmartLink

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "smart_link_platform_clicks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub smart_link_id: i64,
    pub platform: String,
    pub clicks: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
