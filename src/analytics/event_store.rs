//! 原始事件存储
//!
//! 只追加。单条写入失败只记录日志与指标，从不阻断触发它的用户操作。

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter,
};
use tracing::{debug, warn};

use crate::metrics_core::{MetricsRecorder, db_failure_reason};
use migration::entities::analytics_event;

use super::NewEvent;

/// 单条 INSERT 的最大行数
const INSERT_CHUNK_SIZE: usize = 100;

pub struct EventStore {
    db: DatabaseConnection,
    metrics: Arc<dyn MetricsRecorder>,
}

impl EventStore {
    pub fn new(db: DatabaseConnection, metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self { db, metrics }
    }

    /// 追加单条事件，失败返回 None
    pub async fn append(&self, event: &NewEvent) -> Option<String> {
        match self.try_append(event).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(
                    "Failed to store analytics event '{}' (offer {:?}): {}",
                    event.event_type, event.offer_id, e
                );
                self.metrics
                    .inc_analytics_failure("event_store", db_failure_reason(&e));
                None
            }
        }
    }

    pub async fn try_append(&self, event: &NewEvent) -> Result<String, DbErr> {
        let id = uuid::Uuid::new_v4().to_string();
        analytics_event::Entity::insert(to_active_model(event, id.clone()))
            .exec(&self.db)
            .await?;
        Ok(id)
    }

    /// 批量追加（每 100 行一条 INSERT）
    pub async fn append_batch<C: ConnectionTrait>(
        db: &C,
        events: &[NewEvent],
    ) -> Result<usize, DbErr> {
        if events.is_empty() {
            return Ok(0);
        }

        for chunk in events.chunks(INSERT_CHUNK_SIZE) {
            let models: Vec<analytics_event::ActiveModel> = chunk
                .iter()
                .map(|event| to_active_model(event, uuid::Uuid::new_v4().to_string()))
                .collect();
            analytics_event::Entity::insert_many(models).exec(db).await?;
        }

        debug!("Stored {} analytics events", events.len());
        Ok(events.len())
    }

    /// 某优惠的原始事件数量
    pub async fn count_for_offer(&self, offer_id: i64) -> Result<u64, DbErr> {
        analytics_event::Entity::find()
            .filter(analytics_event::Column::OfferId.eq(offer_id))
            .count(&self.db)
            .await
    }
}

fn to_active_model(event: &NewEvent, id: String) -> analytics_event::ActiveModel {
    analytics_event::ActiveModel {
        id: Set(id),
        event_type: Set(event.event_type.clone()),
        session_id: Set(event.session_id.clone()),
        user_id: Set(event.user_id),
        offer_id: Set(event.offer_id),
        metadata: Set(event.metadata.as_ref().map(|m| m.to_string())),
        ip_address: Set(event.ip_address.clone()),
        user_agent: Set(event.user_agent.clone()),
        created_at: Set(event.created_at.unwrap_or_else(Utc::now)),
    }
}
