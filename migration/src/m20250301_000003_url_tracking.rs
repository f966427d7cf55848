//! URL tracking table
//!
//! 去重查询按 (smart_link_id, url, created_at) 走索引，其余字段在结果集上过滤。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UrlTrackings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UrlTrackings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UrlTrackings::SmartLinkId).big_integer().null())
                    .col(ColumnDef::new(UrlTrackings::ArtistId).big_integer().null())
                    .col(ColumnDef::new(UrlTrackings::Url).text().not_null())
                    .col(ColumnDef::new(UrlTrackings::ShortUrl).string_len(255).null())
                    .col(ColumnDef::new(UrlTrackings::Platform).string_len(64).null())
                    .col(
                        ColumnDef::new(UrlTrackings::UtmSource)
                            .string_len(255)
                            .not_null()
                            .default("direct"),
                    )
                    .col(
                        ColumnDef::new(UrlTrackings::UtmMedium)
                            .string_len(255)
                            .not_null()
                            .default("link"),
                    )
                    .col(ColumnDef::new(UrlTrackings::UtmCampaign).string_len(255).null())
                    .col(ColumnDef::new(UrlTrackings::UtmTerm).string_len(255).null())
                    .col(ColumnDef::new(UrlTrackings::UtmContent).string_len(255).null())
                    .col(
                        ColumnDef::new(UrlTrackings::MdmcId)
                            .string_len(128)
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(UrlTrackings::MdmcTimestamp).big_integer().null())
                    .col(
                        ColumnDef::new(UrlTrackings::MdmcVersion)
                            .string_len(16)
                            .not_null()
                            .default("2.0"),
                    )
                    .col(ColumnDef::new(UrlTrackings::UserAgent).text().null())
                    .col(ColumnDef::new(UrlTrackings::Referrer).text().null())
                    .col(
                        ColumnDef::new(UrlTrackings::ScreenResolution)
                            .string_len(32)
                            .null(),
                    )
                    .col(ColumnDef::new(UrlTrackings::Language).string_len(32).null())
                    .col(ColumnDef::new(UrlTrackings::Timezone).string_len(64).null())
                    .col(ColumnDef::new(UrlTrackings::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(UrlTrackings::Country).string_len(64).null())
                    .col(ColumnDef::new(UrlTrackings::City).string_len(100).null())
                    .col(ColumnDef::new(UrlTrackings::PlatformPosition).integer().null())
                    .col(
                        ColumnDef::new(UrlTrackings::OrderSource)
                            .string_len(16)
                            .not_null()
                            .default("default"),
                    )
                    .col(ColumnDef::new(UrlTrackings::AbTestVariant).string_len(64).null())
                    .col(ColumnDef::new(UrlTrackings::DestinationUrl).text().null())
                    .col(
                        ColumnDef::new(UrlTrackings::ClickCount)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(UrlTrackings::LastClickAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UrlTrackings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_trackings_link_time")
                    .table(UrlTrackings::Table)
                    .col(UrlTrackings::SmartLinkId)
                    .col(UrlTrackings::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_trackings_artist_time")
                    .table(UrlTrackings::Table)
                    .col(UrlTrackings::ArtistId)
                    .col(UrlTrackings::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_trackings_utm")
                    .table(UrlTrackings::Table)
                    .col(UrlTrackings::UtmSource)
                    .col(UrlTrackings::UtmMedium)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_trackings_created_at")
                    .table(UrlTrackings::Table)
                    .col(UrlTrackings::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UrlTrackings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UrlTrackings {
    #[sea_orm(iden = "url_trackings")]
    Table,
    Id,
    SmartLinkId,
    ArtistId,
    Url,
    ShortUrl,
    Platform,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    UtmTerm,
    UtmContent,
    MdmcId,
    MdmcTimestamp,
    MdmcVersion,
    UserAgent,
    Referrer,
    ScreenResolution,
    Language,
    Timezone,
    IpAddress,
    Country,
    City,
    PlatformPosition,
    OrderSource,
    AbTestVariant,
    DestinationUrl,
    ClickCount,
    LastClickAt,
    CreatedAt,
}
