//! Catalog tables: artists, smart links and their per-platform click counters

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Artists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Artists::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Artists::Name).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Artists::Slug)
                            .string_len(120)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Artists::Bio).text().null())
                    .col(ColumnDef::new(Artists::ImageUrl).text().null())
                    .col(
                        ColumnDef::new(Artists::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Artists::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SmartLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SmartLinks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SmartLinks::ArtistId).big_integer().not_null())
                    .col(
                        ColumnDef::new(SmartLinks::TrackTitle)
                            .string_len(150)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SmartLinks::Slug).string_len(160).not_null())
                    .col(ColumnDef::new(SmartLinks::ReleaseDate).date().null())
                    .col(ColumnDef::new(SmartLinks::CoverImageUrl).text().null())
                    .col(ColumnDef::new(SmartLinks::PreviewAudioUrl).text().null())
                    .col(ColumnDef::new(SmartLinks::Description).text().null())
                    .col(
                        ColumnDef::new(SmartLinks::CustomSubtitle)
                            .string_len(40)
                            .not_null()
                            .default("Choose music service"),
                    )
                    .col(
                        ColumnDef::new(SmartLinks::UseDescriptionAsSubtitle)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SmartLinks::PlatformLinks).text().not_null())
                    .col(
                        ColumnDef::new(SmartLinks::TrackingMode)
                            .string_len(16)
                            .not_null()
                            .default("global"),
                    )
                    .col(ColumnDef::new(SmartLinks::Ga4Id).string_len(64).null())
                    .col(ColumnDef::new(SmartLinks::GtmId).string_len(64).null())
                    .col(ColumnDef::new(SmartLinks::MetaPixelId).string_len(64).null())
                    .col(ColumnDef::new(SmartLinks::TiktokPixelId).string_len(64).null())
                    .col(
                        ColumnDef::new(SmartLinks::ViewCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SmartLinks::PlatformClickCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SmartLinks::IsPublished)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SmartLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SmartLinks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一艺人下 slug 唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_smart_links_artist_slug")
                    .table(SmartLinks::Table)
                    .col(SmartLinks::ArtistId)
                    .col(SmartLinks::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_smart_links_created_at")
                    .table(SmartLinks::Table)
                    .col(SmartLinks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SmartLinkPlatformClicks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SmartLinkPlatformClicks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SmartLinkPlatformClicks::SmartLinkId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SmartLinkPlatformClicks::Platform)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SmartLinkPlatformClicks::Clicks)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // upsert 依赖此唯一索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_platform_clicks_link_platform")
                    .table(SmartLinkPlatformClicks::Table)
                    .col(SmartLinkPlatformClicks::SmartLinkId)
                    .col(SmartLinkPlatformClicks::Platform)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(SmartLinkPlatformClicks::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SmartLinks::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Artists::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Artists {
    #[sea_orm(iden = "artists")]
    Table,
    Id,
    Name,
    Slug,
    Bio,
    ImageUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SmartLinks {
    #[sea_orm(iden = "smart_links")]
    Table,
    Id,
    ArtistId,
    TrackTitle,
    Slug,
    ReleaseDate,
    CoverImageUrl,
    PreviewAudioUrl,
    Description,
    CustomSubtitle,
    UseDescriptionAsSubtitle,
    PlatformLinks,
    TrackingMode,
    #[sea_orm(iden = "ga4_id")]
    Ga4Id,
    GtmId,
    MetaPixelId,
    TiktokPixelId,
    ViewCount,
    PlatformClickCount,
    IsPublished,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SmartLinkPlatformClicks {
    #[sea_orm(iden = "smart_link_platform_clicks")]
    Table,
    Id,
    SmartLinkId,
    Platform,
    Clicks,
}
