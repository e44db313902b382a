//! 应用级共享服务
//!
//! 服务器与集成测试共用同一套装配与路由注册。

use std::sync::Arc;

use actix_web::web;

use crate::analytics::{AnalyticsReports, AnalyticsService};
use crate::api::jwt::JwtService;
use crate::api::middleware::{ChatRateLimit, chat_rate_limit};
use crate::api::services::{AppStartTime, api_routes, health_routes};
use crate::config::{AiConfig, StaticConfig};
use crate::metrics_core::{InMemoryMetrics, MetricsRecorder};
use crate::services::{ChatOrchestrator, LlmRegistry, OfferSearch, OfferSearcher, UserQuota};
use crate::storage::SeaOrmStorage;

/// 请求体大小上限（批量事件）
const PAYLOAD_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppServices {
    pub storage: Arc<SeaOrmStorage>,
    pub metrics: Arc<InMemoryMetrics>,
    pub analytics: Arc<AnalyticsService>,
    pub reports: Arc<AnalyticsReports>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub quota: Arc<UserQuota>,
    pub jwt: web::Data<JwtService>,
    pub ai: AiConfig,
    pub chat_rate_limit: ChatRateLimit,
    pub start_time: AppStartTime,
}

impl AppServices {
    /// 基于已迁移的存储装配全部服务（会启动批量写入 worker）
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        config: &StaticConfig,
        registry: Arc<LlmRegistry>,
        jwt: JwtService,
    ) -> anyhow::Result<Self> {
        let db = storage.get_db().clone();
        let metrics = InMemoryMetrics::arc();
        let recorder: Arc<dyn MetricsRecorder> = metrics.clone();

        let analytics = Arc::new(AnalyticsService::from_connection(
            db.clone(),
            storage.retry_config(),
            recorder.clone(),
            config.analytics.ingest_workers,
            config.analytics.ingest_queue_capacity,
        ));
        let searcher: Arc<dyn OfferSearcher> = Arc::new(OfferSearch::new(db.clone()));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            registry,
            searcher,
            config.ai.temperature,
            recorder,
        ));

        Ok(Self {
            storage,
            metrics,
            analytics,
            reports: Arc::new(AnalyticsReports::new(db.clone())),
            orchestrator,
            quota: Arc::new(UserQuota::new(db)),
            jwt: web::Data::new(jwt),
            ai: config.ai.clone(),
            chat_rate_limit: chat_rate_limit(config.ai.rate_limit_per_minute)?,
            start_time: AppStartTime::now(),
        })
    }

    /// 注册共享数据与全部路由
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.storage.clone()))
            .app_data(web::Data::new(self.metrics.clone()))
            .app_data(web::Data::new(self.analytics.clone()))
            .app_data(web::Data::new(self.reports.clone()))
            .app_data(web::Data::new(self.orchestrator.clone()))
            .app_data(web::Data::new(self.quota.clone()))
            .app_data(self.jwt.clone())
            .app_data(web::Data::new(self.ai.clone()))
            .app_data(web::Data::new(self.start_time.clone()))
            .app_data(web::PayloadConfig::new(PAYLOAD_LIMIT_BYTES))
            .service(health_routes())
            .service(api_routes(&self.chat_rate_limit));
    }
}
