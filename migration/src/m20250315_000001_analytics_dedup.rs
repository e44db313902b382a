//! 去重表迁移
//!
//! 每个 (offer_id, user_id, date, kind) 只允许一行，插入冲突即视为重复事件。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalyticsDedup::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalyticsDedup::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsDedup::OfferId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsDedup::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalyticsDedup::Date).date().not_null())
                    .col(
                        ColumnDef::new(AnalyticsDedup::Kind)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsDedup::CreatedAt)
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
                    .name("idx_analytics_dedup_key")
                    .table(AnalyticsDedup::Table)
                    .col(AnalyticsDedup::OfferId)
                    .col(AnalyticsDedup::UserId)
                    .col(AnalyticsDedup::Date)
                    .col(AnalyticsDedup::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 索引：date（用于清理过期去重记录）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_analytics_dedup_date")
                    .table(AnalyticsDedup::Table)
                    .col(AnalyticsDedup::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_analytics_dedup_date").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_analytics_dedup_key").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnalyticsDedup::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum AnalyticsDedup {
    Table,
    Id,
    OfferId,
    UserId,
    Date,
    Kind,
    CreatedAt,
}
