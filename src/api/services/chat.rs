//! AI chat endpoints
//!
//! `POST /api/ai-chat` validates the message, checks the caller's daily quota,
//! runs the orchestrator and only then counts the message against the quota.
//! `GET /api/chat/usage` reports today's usage.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{Responder, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::api::middleware::AuthenticatedUser;
use crate::config::AiConfig;
use crate::services::{ChatInput, ChatOrchestrator, Language, UserQuota};

use super::helpers::{data_response, error_response, json_response};

/// 未提供城市时的默认值
pub const DEFAULT_USER_CITY: &str = "Helsinki";
const SERVICE_ERROR: &str = "AI chat service temporarily unavailable";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_city: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// 消息校验失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRejection {
    Missing,
    Blank,
    TooLong { max: usize, actual: usize },
}

impl MessageRejection {
    pub fn message(&self) -> String {
        match self {
            MessageRejection::Missing => "Message is required".to_string(),
            MessageRejection::Blank => "Message cannot be empty".to_string(),
            MessageRejection::TooLong { max, actual } => format!(
                "Message too long. Maximum {} characters allowed. Your message has {} characters.",
                max, actual
            ),
        }
    }
}

/// 校验并裁剪用户消息；长度按字符计
pub fn validate_message(raw: Option<&str>, max_chars: usize) -> Result<String, MessageRejection> {
    let raw = raw.filter(|m| !m.is_empty()).ok_or(MessageRejection::Missing)?;
    let message = raw.trim();
    if message.is_empty() {
        return Err(MessageRejection::Blank);
    }
    let actual = message.chars().count();
    if actual > max_chars {
        return Err(MessageRejection::TooLong {
            max: max_chars,
            actual,
        });
    }
    Ok(message.to_string())
}

pub async fn ai_chat(
    user: AuthenticatedUser,
    body: web::Bytes,
    orchestrator: web::Data<Arc<ChatOrchestrator>>,
    quota: web::Data<Arc<UserQuota>>,
    ai: web::Data<AiConfig>,
) -> impl Responder {
    let body: ChatBody = serde_json::from_slice(&body).unwrap_or_default();

    let message = match validate_message(body.message.as_deref(), ai.max_message_chars) {
        Ok(message) => message,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.message());
        }
    };

    let daily_limit = orchestrator.registry().chat_limit(ai.default_chat_limit);
    match quota.check_limit(user.user_id, daily_limit).await {
        Ok(true) => {}
        Ok(false) => {
            info!(
                "User {} reached the daily chat limit ({})",
                user.user_id, daily_limit
            );
            return json_response(
                StatusCode::TOO_MANY_REQUESTS,
                false,
                Some(format!(
                    "Daily chat limit exceeded ({} messages per day). Please try again tomorrow.",
                    daily_limit
                )),
                Some(json!({ "dailyLimit": daily_limit, "limitReached": true })),
            );
        }
        Err(e) => {
            error!("Failed to check chat quota for user {}: {}", user.user_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVICE_ERROR);
        }
    }

    let input = ChatInput {
        message,
        user_city: Some(
            body.user_city
                .unwrap_or_else(|| DEFAULT_USER_CITY.to_string()),
        ),
        language: body
            .language
            .as_deref()
            .map(Language::from_code)
            .unwrap_or_default(),
    };
    let outcome = orchestrator.process_message(input).await;
    if !outcome.success {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, outcome.message);
    }

    let current_usage = match quota.increment_usage(user.user_id).await {
        Ok(count) => count,
        Err(e) => {
            error!("Failed to count chat usage for user {}: {}", user.user_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVICE_ERROR);
        }
    };
    debug!(
        "Chat usage for user {}: {}/{}",
        user.user_id, current_usage, daily_limit
    );

    json_response(
        StatusCode::OK,
        true,
        Some(outcome.message),
        Some(json!({
            "offers": outcome.offers,
            "timestamp": Utc::now().to_rfc3339(),
            "currentUsage": current_usage,
            "dailyLimit": daily_limit,
            "limitReached": current_usage >= daily_limit,
        })),
    )
}

pub async fn chat_usage(
    user: AuthenticatedUser,
    orchestrator: web::Data<Arc<ChatOrchestrator>>,
    quota: web::Data<Arc<UserQuota>>,
    ai: web::Data<AiConfig>,
) -> impl Responder {
    let daily_limit = orchestrator.registry().chat_limit(ai.default_chat_limit);
    match quota.get_usage(user.user_id).await {
        Ok(usage) => data_response(json!({
            "daily_usage": usage.current_usage,
            "daily_limit": daily_limit,
            "remaining_today": (daily_limit - usage.current_usage).max(0),
            "date": usage.date,
            "limitReached": usage.current_usage >= daily_limit,
        })),
        Err(e) => {
            error!("Failed to get chat usage for user {}: {}", user.user_id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get usage statistics",
            )
        }
    }
}
