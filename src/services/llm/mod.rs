//! Language model provider
//!
//! Single provider (OpenAI-compatible chat completions) behind a trait so the
//! chat orchestrator can be driven by a scripted provider in tests.

mod client;
mod registry;
mod types;

pub use client::OpenAiClient;
pub use registry::{LlmHandle, LlmRegistry, OPENAI_SERVICE_NAME, get_llm_registry};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, Choice, FunctionCall, FunctionDefinition, Role,
    ToolCall, ToolDefinition,
};

/// Chat completion with optional tool calls
#[async_trait::async_trait]
pub trait ChatCompletionProvider: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse>;

    fn name(&self) -> &'static str;
}
