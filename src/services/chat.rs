//! Chat orchestrator
//!
//! Stateless two-turn exchange with the language model:
//!
//! 1. system prompt + user message, `search_offers` offered with `tool_choice = auto`
//! 2. if the model calls the tool, run the search and ask for a short follow-up
//!    that only knows the number of results
//!
//! Upstream failures never escape; they become a localized fallback message.

use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::metrics_core::MetricsRecorder;
use crate::services::llm::{
    ChatMessage, ChatRequest, LlmHandle, LlmRegistry, Role, ToolCall,
};
use crate::services::offer_search::{
    OfferSearch, OfferSummary, SEARCH_TOOL_NAME, SearchParams, tool_definition,
};
use crate::services::prompts::{self, Language};

const FIRST_TURN_MAX_TOKENS: u32 = 500;
const FOLLOW_UP_MAX_TOKENS: u32 = 300;

/// Seam between the orchestrator and the offer store
#[async_trait::async_trait]
pub trait OfferSearcher: Send + Sync {
    async fn search_offers(&self, params: &SearchParams) -> anyhow::Result<Vec<OfferSummary>>;
}

#[async_trait::async_trait]
impl OfferSearcher for OfferSearch {
    async fn search_offers(&self, params: &SearchParams) -> anyhow::Result<Vec<OfferSummary>> {
        Ok(self.search(params).await?)
    }
}

#[derive(Debug, Clone)]
pub struct ChatInput {
    pub message: String,
    pub user_city: Option<String>,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub success: bool,
    pub message: String,
    pub offers: Vec<OfferSummary>,
}

impl ChatOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            offers: Vec::new(),
        }
    }
}

pub struct ChatOrchestrator {
    registry: Arc<LlmRegistry>,
    searcher: Arc<dyn OfferSearcher>,
    temperature: f32,
    metrics: Arc<dyn MetricsRecorder>,
}

impl ChatOrchestrator {
    pub fn new(
        registry: Arc<LlmRegistry>,
        searcher: Arc<dyn OfferSearcher>,
        temperature: f32,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            registry,
            searcher,
            temperature,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<LlmRegistry> {
        &self.registry
    }

    pub async fn process_message(&self, input: ChatInput) -> ChatOutcome {
        let Some(handle) = self.registry.current() else {
            warn!("Chat request without LLM credentials");
            self.metrics.inc_chat_request("unavailable");
            return ChatOutcome::failure(prompts::unavailable_message(input.language));
        };

        match self.exchange(&handle, &input).await {
            Ok((message, offers)) => {
                self.metrics.inc_chat_request("ok");
                ChatOutcome {
                    success: true,
                    message,
                    offers,
                }
            }
            Err(e) => {
                warn!(
                    "Chat exchange via {} failed: {:#}",
                    handle.provider.name(),
                    e
                );
                self.metrics.inc_chat_request("upstream_error");
                ChatOutcome::failure(prompts::failure_message(input.language))
            }
        }
    }

    async fn exchange(
        &self,
        handle: &LlmHandle,
        input: &ChatInput,
    ) -> anyhow::Result<(String, Vec<OfferSummary>)> {
        let user_city = input
            .user_city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let mut messages = vec![
            ChatMessage::system(prompts::system_prompt(input.language, user_city)),
            ChatMessage::user(input.message.clone()),
        ];

        let first = handle
            .provider
            .complete(&ChatRequest {
                model: handle.model.clone(),
                messages: messages.clone(),
                tools: vec![tool_definition()],
                tool_choice: Some("auto".to_string()),
                temperature: self.temperature,
                max_tokens: FIRST_TURN_MAX_TOKENS,
            })
            .await?;
        let reply = first
            .first_message()
            .cloned()
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))?;

        let Some(call) = reply
            .tool_calls()
            .iter()
            .find(|c| c.function.name == SEARCH_TOOL_NAME)
            .cloned()
        else {
            return Ok((reply.content.unwrap_or_default(), Vec::new()));
        };

        let params = search_params(&call, user_city);
        let offers = match self.searcher.search_offers(&params).await {
            Ok(offers) => offers,
            Err(e) => {
                warn!("Offer search for chat failed: {:#}", e);
                self.metrics.inc_analytics_failure("offer_search", "query");
                Vec::new()
            }
        };
        debug!(
            "Chat tool call {} returned {} offers",
            call.id,
            offers.len()
        );

        let follow_up = if offers.is_empty() {
            prompts::not_found_follow_up(
                input.language,
                params.keywords.as_deref(),
                params.city.as_deref(),
            )
        } else {
            prompts::found_follow_up(input.language, offers.len())
        };

        messages.push(ChatMessage {
            role: Role::Assistant,
            content: reply.content.clone(),
            tool_calls: Some(vec![call.clone()]),
            tool_call_id: None,
        });
        messages.push(ChatMessage::tool_result(
            call.id.clone(),
            json!({ "offers_count": offers.len() }).to_string(),
        ));
        messages.push(ChatMessage::user(follow_up));

        let second = handle
            .provider
            .complete(&ChatRequest {
                model: handle.model.clone(),
                messages,
                tools: Vec::new(),
                tool_choice: None,
                temperature: self.temperature,
                max_tokens: FOLLOW_UP_MAX_TOKENS,
            })
            .await?;

        let text = second
            .first_message()
            .and_then(|m| m.content.clone())
            .ok_or_else(|| anyhow!("Follow-up completion returned no text"))?;

        Ok((text, offers))
    }
}

/// 解析工具参数；不合法的 JSON 视为空参数，缺少城市时补上用户城市
fn search_params(call: &ToolCall, user_city: Option<&str>) -> SearchParams {
    let params: SearchParams = serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
        debug!("Ignoring malformed tool arguments: {}", e);
        SearchParams::default()
    });
    let mut params = params.normalized();
    if params.city.is_none() {
        params.city = user_city.map(str::to_string);
    }
    params
}
