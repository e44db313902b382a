//! 优惠按天汇总实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "offer_analytics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub offer_id: i64,
    pub date: Date,
    pub views: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversion_calls: i64,
    pub conversion_directions: i64,
    pub conversion_website: i64,
    /// 当天第一个触达该行的用户
    pub user_id: Option<i64>,
    pub user_city: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
