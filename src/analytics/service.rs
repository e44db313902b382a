//! 分析服务门面
//!
//! HTTP 层只与这里交互。所有追踪接口都不会返回错误：
//! 失败在下层被记录并吸收。

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::metrics_core::MetricsRecorder;
use crate::storage::backend::retry::RetryConfig;

use super::{
    AggregateRollup, BatchIngestor, BatchSink, ConversionKind, EventStore, IngestWorkerPool,
    InteractionKind, NewEvent, RollupOutcome, SubmitError,
};

pub struct AnalyticsService {
    events: EventStore,
    rollup: AggregateRollup,
    pool: Arc<IngestWorkerPool>,
}

impl AnalyticsService {
    pub fn new(events: EventStore, rollup: AggregateRollup, pool: Arc<IngestWorkerPool>) -> Self {
        Self {
            events,
            rollup,
            pool,
        }
    }

    /// 基于同一连接构建完整的服务（含 worker 池）
    pub fn from_connection(
        db: DatabaseConnection,
        retry_config: RetryConfig,
        metrics: Arc<dyn MetricsRecorder>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let sink: Arc<dyn BatchSink> = Arc::new(BatchIngestor::new(
            db.clone(),
            retry_config,
            metrics.clone(),
        ));
        let pool = Arc::new(IngestWorkerPool::start(
            sink,
            workers,
            queue_capacity,
            metrics.clone(),
        ));
        Self::new(
            EventStore::new(db.clone(), metrics.clone()),
            AggregateRollup::new(db, retry_config, metrics),
            pool,
        )
    }

    /// 记录一条原始事件；可汇总的类型同时进入日汇总
    ///
    /// 返回事件 id（写入失败时为 None）。
    pub async fn track_event(&self, event: NewEvent) -> Option<String> {
        let id = self.events.append(&event).await;

        if let (Some(offer_id), Some(kind)) = (event.offer_id, event.interaction_kind()) {
            let counted = self
                .rollup
                .apply_interaction(offer_id, event.user_id, kind)
                .await;
            debug!(
                "Tracked '{}' for offer {}: counted={}",
                event.event_type, offer_id, counted
            );
        }

        id
    }

    pub async fn track_interaction(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: InteractionKind,
    ) -> bool {
        self.rollup.apply_interaction(offer_id, user_id, kind).await
    }

    pub async fn track_conversion(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: ConversionKind,
    ) -> bool {
        self.rollup.apply_conversion(offer_id, user_id, kind).await
    }

    /// 单次交互并返回汇总结果（写入失败为 None）
    pub async fn record_interaction(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: InteractionKind,
    ) -> Option<RollupOutcome> {
        self.rollup.record_interaction(offer_id, user_id, kind).await
    }

    pub async fn record_conversion(
        &self,
        offer_id: i64,
        user_id: Option<i64>,
        kind: ConversionKind,
    ) -> Option<RollupOutcome> {
        self.rollup.record_conversion(offer_id, user_id, kind).await
    }

    /// 异步批量写入，立即返回
    pub fn submit_batch(&self, events: Vec<NewEvent>) -> Result<(), SubmitError> {
        if events.is_empty() {
            return Ok(());
        }
        self.pool.submit(events)
    }

    pub fn rollup(&self) -> &AggregateRollup {
        &self.rollup
    }

    pub fn pool(&self) -> &Arc<IngestWorkerPool> {
        &self.pool
    }

    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
