//! 进程级模型凭据注册表
//!
//! 凭据只在启动、显式 reload 与定时刷新时读取数据库，
//! 聊天请求通过 `current()` 无锁读取当前客户端。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use migration::entities::ai_model_credential;

use super::{ChatCompletionProvider, OpenAiClient};

/// `ai_model_credentials.service_name` 中的服务名
pub const OPENAI_SERVICE_NAME: &str = "OpenAI";

/// 当前生效的模型客户端
pub struct LlmHandle {
    pub provider: Arc<dyn ChatCompletionProvider>,
    pub model: String,
    pub chat_limit: i32,
}

pub struct LlmRegistry {
    current: ArcSwapOption<LlmHandle>,
}

static LLM_REGISTRY: OnceLock<Arc<LlmRegistry>> = OnceLock::new();

/// 全局注册表（首次访问时为空，需要 reload 或 install）
pub fn get_llm_registry() -> Arc<LlmRegistry> {
    LLM_REGISTRY
        .get_or_init(|| Arc::new(LlmRegistry::new()))
        .clone()
}

impl LlmRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    pub fn current(&self) -> Option<Arc<LlmHandle>> {
        self.current.load_full()
    }

    pub fn install(&self, handle: LlmHandle) {
        self.current.store(Some(Arc::new(handle)));
    }

    pub fn clear(&self) {
        self.current.store(None);
    }

    /// 当前每日聊天上限；没有凭据时使用 `default_limit`
    pub fn chat_limit(&self, default_limit: i32) -> i32 {
        self.current
            .load()
            .as_ref()
            .map(|h| h.chat_limit)
            .unwrap_or(default_limit)
    }

    /// 重新读取凭据，返回是否有可用客户端
    ///
    /// 数据库读取失败时保留当前客户端。
    pub async fn reload(&self, db: &DatabaseConnection, ai: &AiConfig) -> anyhow::Result<bool> {
        let row = ai_model_credential::Entity::find()
            .filter(ai_model_credential::Column::ServiceName.eq(OPENAI_SERVICE_NAME))
            .order_by_desc(ai_model_credential::Column::CreatedAt)
            .order_by_desc(ai_model_credential::Column::Id)
            .one(db)
            .await?;

        let timeout = Duration::from_secs(ai.request_timeout_secs.max(1));

        let handle = match row {
            Some(row) if !row.api_key.trim().is_empty() => {
                let model = row
                    .model_name
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| ai.model.clone());
                let chat_limit = row.chat_limit.unwrap_or(ai.default_chat_limit);
                Some(LlmHandle {
                    provider: Arc::new(OpenAiClient::new(row.api_key, &ai.base_url, timeout)),
                    model,
                    chat_limit,
                })
            }
            _ => ai
                .api_key
                .as_ref()
                .filter(|k| !k.trim().is_empty())
                .map(|key| LlmHandle {
                    provider: Arc::new(OpenAiClient::new(key.clone(), &ai.base_url, timeout)),
                    model: ai.model.clone(),
                    chat_limit: ai.default_chat_limit,
                }),
        };

        match handle {
            Some(handle) => {
                info!(
                    "LLM credentials loaded: model={}, chat_limit={}",
                    handle.model, handle.chat_limit
                );
                self.install(handle);
                Ok(true)
            }
            None => {
                warn!("No OpenAI credentials found, AI chat disabled");
                self.clear();
                Ok(false)
            }
        }
    }

    /// 定时刷新凭据
    pub fn spawn_refresh_task(self: Arc<Self>, db: DatabaseConnection, ai: AiConfig) {
        let interval = Duration::from_secs(ai.credentials_refresh_secs.max(10));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match self.reload(&db, &ai).await {
                    Ok(available) => debug!("LLM credentials refreshed (available={})", available),
                    Err(e) => warn!("Failed to refresh LLM credentials: {}", e),
                }
            }
        });
        info!(
            "LLM credential refresh task started (interval: {}s)",
            interval.as_secs()
        );
    }
}

impl Default for LlmRegistry {
    fn default() -> Self {
        Self::new()
    }
}
