//! Core metrics traits.
//!
//! Provides the `MetricsRecorder` trait, `NoopMetrics` for tests, and
//! `InMemoryMetrics`, a lock-free counter store whose snapshot is served on
//! the health endpoint. Every swallowed analytics failure goes through
//! `inc_analytics_failure` so silent data loss stays observable.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Trait for recording application metrics.
///
/// All methods are no-op by default, allowing partial implementation.
/// Implementations must be thread-safe (Send + Sync).
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync {
    // ===== Analytics =====

    /// Record a swallowed analytics failure (`stage`: event_store, rollup, batch, ...)
    fn inc_analytics_failure(&self, stage: &str, reason: &str) {}

    /// Record the outcome of a single tracked interaction
    fn inc_analytics_event(&self, outcome: &str) {}

    /// Set current ingest queue depth
    fn set_ingest_queue_depth(&self, depth: i64) {}

    /// Record a batch rejected by the ingest queue
    fn inc_ingest_rejected(&self, reason: &str) {}

    /// Record a processed ingest batch
    fn inc_ingest_batch(&self, status: &str) {}

    // ===== Chat =====

    /// Record a chat request outcome
    fn inc_chat_request(&self, status: &str) {}
}

/// Noop metrics implementation for testing.
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {}

impl NoopMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn arc() -> Arc<dyn MetricsRecorder> {
        Arc::new(Self::new())
    }
}

impl Default for NoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// 指标快照（health 接口输出）
#[derive(Debug, Clone, Serialize, Default)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub ingest_queue_depth: i64,
}

/// 进程内指标存储
///
/// 计数器 key 形如 `analytics_failure{stage=rollup,reason=db}`。
#[derive(Default)]
pub struct InMemoryMetrics {
    counters: DashMap<String, AtomicU64>,
    queue_depth: AtomicI64,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn incr(&self, key: String) {
        if let Some(counter) = self.counters.get(&key) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.counters
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// 读取单个计数器（不存在返回 0）
    pub fn counter(&self, key: &str) -> u64 {
        self.counters
            .get(key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self
                .counters
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                .collect(),
            ingest_queue_depth: self.queue_depth.load(Ordering::Relaxed),
        }
    }
}

impl MetricsRecorder for InMemoryMetrics {
    fn inc_analytics_failure(&self, stage: &str, reason: &str) {
        self.incr(format!("analytics_failure{{stage={},reason={}}}", stage, reason));
    }

    fn inc_analytics_event(&self, outcome: &str) {
        self.incr(format!("analytics_event{{outcome={}}}", outcome));
    }

    fn set_ingest_queue_depth(&self, depth: i64) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    fn inc_ingest_rejected(&self, reason: &str) {
        self.incr(format!("ingest_rejected{{reason={}}}", reason));
    }

    fn inc_ingest_batch(&self, status: &str) {
        self.incr(format!("ingest_batch{{status={}}}", status));
    }

    fn inc_chat_request(&self, status: &str) {
        self.incr(format!("chat_request{{status={}}}", status));
    }
}

/// 将 sea_orm 错误归类为稳定的 reason 标签
pub fn db_failure_reason(err: &sea_orm::DbErr) -> &'static str {
    use sea_orm::DbErr;
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => "connection",
        DbErr::Exec(_) => "exec",
        DbErr::Query(_) => "query",
        DbErr::RecordNotFound(_) => "not_found",
        _ => "other",
    }
}
