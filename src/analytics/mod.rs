//! 交互分析模块
//!
//! 原始事件只追加写入 `analytics_events`，被计入的交互按天汇总到
//! `offer_analytics` 与 `business_analytics`：
//!
//! - `event_store`: 原始事件写入（失败只记录，不向上抛出）
//! - `dedup`: 同一用户、同一优惠、同一天、同一类型只计一次
//! - `rollup`: 单事件汇总（原子 upsert，单事务）
//! - `batch`: 批量写入与分组累加
//! - `worker`: 有界队列 + 固定 worker，批量写入与请求解耦
//! - `service`: 对外门面
//! - `reports`: 城市与商家维度的读取
//! - `dashboard`: 原始事件上的看板与位置分组
//! - `retention`: 过期去重记录清理

pub mod batch;
pub mod dashboard;
pub mod dedup;
pub mod event_store;
pub mod reports;
pub mod retention;
pub mod rollup;
pub mod service;
pub mod worker;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

pub use batch::{BatchIngestor, BatchReport, InteractionTally, tally_by_offer};
pub use dashboard::{DashboardReport, LocationStats};
pub use dedup::DedupGuard;
pub use event_store::EventStore;
pub use reports::{AnalyticsReports, BusinessReport, CityStats, DateRange};
pub use retention::DedupRetentionTask;
pub use rollup::{AggregateRollup, OfferDailyCounters, RollupOutcome};
pub use service::AnalyticsService;
pub use worker::{BatchSink, IngestWorkerPool, SubmitError};

/// 计入汇总的通用交互类型
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InteractionKind {
    View,
    Click,
    Conversion,
}

/// 细分转化类型
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ConversionKind {
    Website,
    Call,
    Directions,
}

/// 去重维度：通用交互与细分转化分别去重
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupKind {
    Interaction(InteractionKind),
    Conversion(ConversionKind),
}

impl DedupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupKind::Interaction(InteractionKind::View) => "view",
            DedupKind::Interaction(InteractionKind::Click) => "click",
            DedupKind::Interaction(InteractionKind::Conversion) => "conversion",
            DedupKind::Conversion(ConversionKind::Website) => "website",
            DedupKind::Conversion(ConversionKind::Call) => "call",
            DedupKind::Conversion(ConversionKind::Directions) => "directions",
        }
    }
}

impl From<InteractionKind> for DedupKind {
    fn from(kind: InteractionKind) -> Self {
        DedupKind::Interaction(kind)
    }
}

impl From<ConversionKind> for DedupKind {
    fn from(kind: ConversionKind) -> Self {
        DedupKind::Conversion(kind)
    }
}

/// 待写入的原始事件
///
/// `event_type` 原样保存；只有 view/click/conversion 会进入汇总。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEvent {
    pub event_type: String,
    pub session_id: Option<String>,
    pub user_id: Option<i64>,
    pub offer_id: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// 为空时使用写入时间
    pub created_at: Option<DateTime<Utc>>,
}

impl NewEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    pub fn with_offer(mut self, offer_id: i64) -> Self {
        self.offer_id = Some(offer_id);
        self
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// 可计入汇总的交互类型
    pub fn interaction_kind(&self) -> Option<InteractionKind> {
        self.event_type.trim().parse().ok()
    }
}

/// 当前统计日（UTC）
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// 数据库后端对应的 "新插入值" 引用
///
/// SQLite/PostgreSQL: `excluded.col`；MySQL: `VALUES(col)`
pub(crate) fn incoming_value(backend: sea_orm::DatabaseBackend, column: &str) -> String {
    match backend {
        sea_orm::DatabaseBackend::MySql => format!("VALUES({})", column),
        _ => format!("excluded.{}", column),
    }
}
