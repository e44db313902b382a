//! 分析统计表迁移
//!
//! - analytics_events: 原始交互事件（只追加）
//! - offer_analytics: 优惠按天汇总
//! - business_analytics: 商家按天汇总

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 计数列：BIGINT NOT NULL DEFAULT 0
fn counter<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. analytics_events
        manager
            .create_table(
                Table::create()
                    .table(AnalyticsEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalyticsEvents::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsEvents::EventType)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsEvents::SessionId)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(AnalyticsEvents::UserId).big_integer().null())
                    .col(ColumnDef::new(AnalyticsEvents::OfferId).big_integer().null())
                    .col(ColumnDef::new(AnalyticsEvents::Metadata).text().null())
                    .col(
                        ColumnDef::new(AnalyticsEvents::IpAddress)
                            .string_len(45)
                            .null(),
                    )
                    .col(ColumnDef::new(AnalyticsEvents::UserAgent).text().null())
                    .col(
                        ColumnDef::new(AnalyticsEvents::CreatedAt)
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
                    .name("idx_events_offer_created")
                    .table(AnalyticsEvents::Table)
                    .col(AnalyticsEvents::OfferId)
                    .col(AnalyticsEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // 2. offer_analytics
        manager
            .create_table(
                Table::create()
                    .table(OfferAnalytics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OfferAnalytics::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OfferAnalytics::OfferId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OfferAnalytics::Date).date().not_null())
                    .col(counter(OfferAnalytics::Views))
                    .col(counter(OfferAnalytics::Clicks))
                    .col(counter(OfferAnalytics::Conversions))
                    .col(counter(OfferAnalytics::ConversionCalls))
                    .col(counter(OfferAnalytics::ConversionDirections))
                    .col(counter(OfferAnalytics::ConversionWebsite))
                    .col(ColumnDef::new(OfferAnalytics::UserId).big_integer().null())
                    .col(
                        ColumnDef::new(OfferAnalytics::UserCity)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OfferAnalytics::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引：offer_id + date（upsert 冲突键）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offer_analytics_offer_date")
                    .table(OfferAnalytics::Table)
                    .col(OfferAnalytics::OfferId)
                    .col(OfferAnalytics::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offer_analytics_date")
                    .table(OfferAnalytics::Table)
                    .col(OfferAnalytics::Date)
                    .to_owned(),
            )
            .await?;

        // 3. business_analytics
        manager
            .create_table(
                Table::create()
                    .table(BusinessAnalytics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BusinessAnalytics::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BusinessAnalytics::BusinessId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BusinessAnalytics::Date).date().not_null())
                    .col(counter(BusinessAnalytics::TotalViews))
                    .col(counter(BusinessAnalytics::TotalClicks))
                    .col(counter(BusinessAnalytics::TotalConversions))
                    .col(counter(BusinessAnalytics::TotalSpent))
                    .col(counter(BusinessAnalytics::ActiveOffers))
                    .col(counter(BusinessAnalytics::ConversionCalls))
                    .col(counter(BusinessAnalytics::ConversionDirections))
                    .col(counter(BusinessAnalytics::ConversionWebsite))
                    .col(
                        ColumnDef::new(BusinessAnalytics::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引：business_id + date
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_business_analytics_business_date")
                    .table(BusinessAnalytics::Table)
                    .col(BusinessAnalytics::BusinessId)
                    .col(BusinessAnalytics::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_business_analytics_business_date")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(BusinessAnalytics::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_offer_analytics_date").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_offer_analytics_offer_date")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(OfferAnalytics::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_events_offer_created").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnalyticsEvents::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum AnalyticsEvents {
    Table,
    Id,
    EventType,
    SessionId,
    UserId,
    OfferId,
    Metadata,
    IpAddress,
    UserAgent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OfferAnalytics {
    Table,
    Id,
    OfferId,
    Date,
    Views,
    Clicks,
    Conversions,
    ConversionCalls,
    ConversionDirections,
    ConversionWebsite,
    UserId,
    UserCity,
    CreatedAt,
}

#[derive(DeriveIden)]
enum BusinessAnalytics {
    Table,
    Id,
    BusinessId,
    Date,
    TotalViews,
    TotalClicks,
    TotalConversions,
    TotalSpent,
    ActiveOffers,
    ConversionCalls,
    ConversionDirections,
    ConversionWebsite,
    CreatedAt,
}
