//! OpenAI 兼容 HTTP 客户端
//!
//! ureq 是同步客户端，请求放在 blocking 线程池中执行；
//! 全局超时保证上游挂起不会拖住整个聊天请求。

use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use tracing::{debug, warn};
use ureq::Agent;

use super::{ChatCompletionProvider, ChatRequest, ChatResponse};

/// 错误响应体在日志/错误中保留的最大长度
const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct OpenAiClient {
    agent: Agent,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn complete_sync(
        agent: Agent,
        url: String,
        api_key: String,
        body: serde_json::Value,
    ) -> anyhow::Result<ChatResponse> {
        let mut resp = agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", api_key))
            .send_json(&body)
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.body_mut().read_to_string().unwrap_or_default();
            let text: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(anyhow!(
                "Chat completion returned HTTP {}: {}",
                status.as_u16(),
                text
            ));
        }

        resp.body_mut()
            .read_json::<ChatResponse>()
            .context("Failed to parse chat completion response")
    }
}

#[async_trait]
impl ChatCompletionProvider for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let body = serde_json::to_value(request)?;
        let agent = self.agent.clone();
        let url = self.endpoint();
        let api_key = self.api_key.clone();

        debug!(
            "Chat completion: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            request.tools.len()
        );

        tokio::task::spawn_blocking(move || Self::complete_sync(agent, url, api_key, body))
            .await
            .map_err(|e| {
                warn!("Chat completion spawn_blocking failed: {}", e);
                anyhow!("Chat completion task failed: {}", e)
            })?
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAiClient::new("sk-test", "https://api.openai.com/v1/", Duration::from_secs(1));
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    /// 连接被拒绝时返回错误而不是挂起
    #[tokio::test]
    async fn test_unreachable_upstream_returns_error() {
        let client = OpenAiClient::new("sk-test", "http://127.0.0.1:9", Duration::from_secs(2));
        let request = ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![super::super::ChatMessage::user("hei")],
            tools: vec![],
            tool_choice: None,
            temperature: 0.7,
            max_tokens: 10,
        };
        assert!(client.complete(&request).await.is_err());
    }
}
