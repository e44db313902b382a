//! 去重守卫
//!
//! 以 `(offer_id, user_id, date, kind)` 为唯一键。匿名事件从不视为重复，
//! 也不写入去重表。`claim` 依赖唯一索引的 ON CONFLICT DO NOTHING，
//! 并发的同一键只有一个调用方得到 `true`。

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, sea_query::OnConflict,
};
use tracing::trace;

use migration::entities::analytics_dedup;

use super::DedupKind;

pub struct DedupGuard {
    db: DatabaseConnection,
}

impl DedupGuard {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 只读检查：该用户当天是否已计入过此类交互
    pub async fn is_duplicate(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        date: NaiveDate,
        kind: DedupKind,
    ) -> Result<bool, DbErr> {
        let Some(user_id) = user_id else {
            return Ok(false);
        };

        let count = analytics_dedup::Entity::find()
            .filter(analytics_dedup::Column::OfferId.eq(offer_id))
            .filter(analytics_dedup::Column::UserId.eq(user_id))
            .filter(analytics_dedup::Column::Date.eq(date))
            .filter(analytics_dedup::Column::Kind.eq(kind.as_str()))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// 原子登记，首次出现返回 `true`
    ///
    /// 在汇总事务内调用，使去重标记与计数一起提交或回滚。
    pub async fn claim<C: ConnectionTrait>(
        db: &C,
        offer_id: i64,
        user_id: Option<i64>,
        date: NaiveDate,
        kind: DedupKind,
    ) -> Result<bool, DbErr> {
        let Some(user_id) = user_id else {
            return Ok(true);
        };

        let model = analytics_dedup::ActiveModel {
            offer_id: Set(offer_id),
            user_id: Set(user_id),
            date: Set(date),
            kind: Set(kind.as_str().to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let result = analytics_dedup::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    analytics_dedup::Column::OfferId,
                    analytics_dedup::Column::UserId,
                    analytics_dedup::Column::Date,
                    analytics_dedup::Column::Kind,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotInserted) => {
                trace!(
                    "Duplicate {} for offer {} by user {} on {}",
                    kind.as_str(),
                    offer_id,
                    user_id,
                    date
                );
                Ok(false)
            }
            Err(e) => {
                // 部分后端在 do_nothing 未插入时返回文本错误
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("no rows") || err_str.contains("record not inserted") {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// 删除 `cutoff` 之前的去重记录
    pub async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64, DbErr> {
        let result = analytics_dedup::Entity::delete_many()
            .filter(analytics_dedup::Column::Date.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
