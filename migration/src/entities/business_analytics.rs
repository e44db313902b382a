//! 商家按天汇总实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "business_analytics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub business_id: i64,
    pub date: Date,
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_conversions: i64,
    pub total_spent: i64,
    /// 非累加：每次事件触达时重新统计
    pub active_offers: i64,
    pub conversion_calls: i64,
    pub conversion_directions: i64,
    pub conversion_website: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
