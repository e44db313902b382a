//! 市场基础表迁移
//!
//! 用户、商家、优惠与 AI 凭据由外部服务维护，这里只建出本服务读写所需的列：
//! - users: 城市与每日 AI 聊天配额
//! - businesses: 商家名称与联系方式
//! - offers: 搜索与活跃度统计使用的字段
//! - ai_model_credentials: 模型 API 凭据

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::City).string_len(100).null())
                    .col(
                        ColumnDef::new(Users::AiChatCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Users::AiChatDate).date().null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Businesses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Businesses::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Businesses::BusinessName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Businesses::Phone).string_len(50).null())
                    .col(ColumnDef::new(Businesses::Email).string_len(255).null())
                    .col(
                        ColumnDef::new(Businesses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Offers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Offers::BusinessId).big_integer().null())
                    .col(ColumnDef::new(Offers::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Offers::Description).text().null())
                    .col(ColumnDef::new(Offers::Keywords).text().null())
                    .col(ColumnDef::new(Offers::Category).string_len(100).null())
                    // 自由文本、JSON 数组字符串、逗号分隔列表或 "koko maa"
                    .col(ColumnDef::new(Offers::City).text().null())
                    .col(ColumnDef::new(Offers::Address).string_len(255).null())
                    .col(
                        ColumnDef::new(Offers::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Offers::IsPremium)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Offers::IsNationwide)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Offers::OfferType).string_len(50).null())
                    .col(ColumnDef::new(Offers::Cost).double().null())
                    .col(ColumnDef::new(Offers::ImageUrl).text().null())
                    .col(ColumnDef::new(Offers::OfferUrl).text().null())
                    .col(
                        ColumnDef::new(Offers::StartsAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Offers::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Offers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offers::ApprovedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 索引：搜索过滤（status + expires_at）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offers_status_expires")
                    .table(Offers::Table)
                    .col(Offers::Status)
                    .col(Offers::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        // 索引：active_offers 统计
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offers_business")
                    .table(Offers::Table)
                    .col(Offers::BusinessId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AiModelCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AiModelCredentials::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AiModelCredentials::ServiceName)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AiModelCredentials::ApiKey).text().not_null())
                    .col(
                        ColumnDef::new(AiModelCredentials::ModelName)
                            .string_len(100)
                            .null(),
                    )
                    .col(ColumnDef::new(AiModelCredentials::ChatLimit).integer().null())
                    .col(
                        ColumnDef::new(AiModelCredentials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AiModelCredentials::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_offers_business").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_offers_status_expires").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Businesses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    City,
    AiChatCount,
    AiChatDate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Businesses {
    Table,
    Id,
    BusinessName,
    Phone,
    Email,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Offers {
    Table,
    Id,
    BusinessId,
    Title,
    Description,
    Keywords,
    Category,
    City,
    Address,
    Status,
    IsPremium,
    IsNationwide,
    OfferType,
    Cost,
    ImageUrl,
    OfferUrl,
    StartsAt,
    ExpiresAt,
    CreatedAt,
    ApprovedAt,
}

#[derive(DeriveIden)]
enum AiModelCredentials {
    Table,
    Id,
    ServiceName,
    ApiKey,
    ModelName,
    ChatLimit,
    CreatedAt,
}
