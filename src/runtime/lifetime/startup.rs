use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::analytics::{DedupGuard, DedupRetentionTask};
use crate::api::jwt::JwtService;
use crate::config::get_config;
use crate::runtime::AppServices;
use crate::services::get_llm_registry;
use crate::storage::StorageFactory;

/// 去重清理间隔（小时）
const DEDUP_CLEANUP_INTERVAL_HOURS: u64 = 24;

pub struct StartupContext {
    pub services: AppServices,
}

/// 准备服务器启动的上下文
/// 包括存储、模型凭据、后台任务与共享服务
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let config = get_config();

    let storage = StorageFactory::create(&config.database)
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let db = storage.get_db().clone();

    // 模型凭据：读取失败不阻止启动，聊天接口返回不可用
    let registry = get_llm_registry();
    match registry.reload(&db, &config.ai).await {
        Ok(true) => debug!("LLM credentials ready"),
        Ok(false) => warn!("AI chat is disabled until credentials are configured"),
        Err(e) => warn!("Failed to load LLM credentials (non-fatal): {}", e),
    }
    registry
        .clone()
        .spawn_refresh_task(db.clone(), config.ai.clone());

    let retention = Arc::new(DedupRetentionTask::new(
        DedupGuard::new(db),
        config.analytics.dedup_retention_days,
    ));
    retention.spawn_background_task(DEDUP_CLEANUP_INTERVAL_HOURS);

    let services = AppServices::new(storage, &config, registry, JwtService::from_config())
        .context("Failed to initialize services")?;

    info!(
        "Pre-startup completed in {} ms ({} ingest workers)",
        start_time.elapsed().as_millis(),
        config.analytics.ingest_workers
    );

    Ok(StartupContext { services })
}
