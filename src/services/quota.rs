//! 用户每日 AI 聊天配额
//!
//! 计数存放在 `users.ai_chat_count` / `users.ai_chat_date`，
//! 日期与今天不同即视为新的一天，计数从 0 开始。

use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ExprTrait, QueryFilter, QuerySelect,
    TransactionTrait,
    sea_query::{Expr, SimpleExpr},
};
use serde::Serialize;
use tracing::debug;

use crate::analytics::today;
use migration::entities::user;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub current_usage: i32,
    pub date: NaiveDate,
}

pub struct UserQuota {
    db: DatabaseConnection,
}

impl UserQuota {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 是否还能继续聊天；未知用户返回 false
    pub async fn check_limit(&self, user_id: i64, daily_limit: i32) -> Result<bool, DbErr> {
        let Some(row) = self.load(user_id).await? else {
            return Ok(false);
        };
        if row.ai_chat_date != Some(today()) {
            return Ok(daily_limit > 0);
        }
        Ok(row.ai_chat_count < daily_limit)
    }

    /// 计数加一并返回新值（跨天自动从 1 开始）
    pub async fn increment_usage(&self, user_id: i64) -> Result<i32, DbErr> {
        let today = today();
        let txn = self.db.begin().await?;

        let next: SimpleExpr = Expr::case(
            Expr::col(user::Column::AiChatDate).eq(today),
            Expr::col(user::Column::AiChatCount).add(1),
        )
        .finally(1)
        .into();

        let result = user::Entity::update_many()
            .col_expr(user::Column::AiChatCount, next)
            .col_expr(user::Column::AiChatDate, Expr::value(today))
            .filter(user::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DbErr::RecordNotFound(format!("User {} not found", user_id)));
        }

        let count = user::Entity::find_by_id(user_id)
            .select_only()
            .column(user::Column::AiChatCount)
            .into_tuple::<i32>()
            .one(&txn)
            .await?
            .unwrap_or(0);

        txn.commit().await?;
        debug!("AI chat usage for user {}: {}", user_id, count);
        Ok(count)
    }

    /// 今日用量；未知用户视为 0
    pub async fn get_usage(&self, user_id: i64) -> Result<UsageSnapshot, DbErr> {
        let today = today();
        let current_usage = match self.load(user_id).await? {
            Some(row) if row.ai_chat_date == Some(today) => row.ai_chat_count,
            _ => 0,
        };
        Ok(UsageSnapshot {
            current_usage,
            date: today,
        })
    }

    async fn load(&self, user_id: i64) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::Id.eq(user_id))
            .one(&self.db)
            .await
    }
}
