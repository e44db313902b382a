//! Service layer
//!
//! Offer search, the chat orchestrator and its collaborators (language model
//! provider, prompts, per-user daily quota).

pub mod chat;
pub mod llm;
pub mod offer_search;
pub mod prompts;
pub mod quota;

pub use chat::{ChatInput, ChatOrchestrator, ChatOutcome, OfferSearcher};
pub use llm::{ChatCompletionProvider, LlmHandle, LlmRegistry, get_llm_registry};
pub use offer_search::{OfferSearch, OfferSummary, SearchParams};
pub use prompts::Language;
pub use quota::{UsageSnapshot, UserQuota};
