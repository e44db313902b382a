//! 聊天接口限流（按客户端 IP）

use std::time::Duration;

use actix_governor::{GovernorConfig, GovernorConfigBuilder, KeyExtractor, SimpleKeyExtractionError};
use actix_web::dev::ServiceRequest;
use governor::middleware::NoOpMiddleware;
use tracing::debug;

/// 基于连接 IP（peer_addr）的限流 key，不信任 X-Forwarded-For
#[derive(Clone, Copy)]
pub struct ChatKeyExtractor;

impl KeyExtractor for ChatKeyExtractor {
    type Key = String;
    type KeyExtractionError = SimpleKeyExtractionError<&'static str>;

    fn extract(&self, req: &ServiceRequest) -> Result<Self::Key, Self::KeyExtractionError> {
        req.connection_info()
            .peer_addr()
            .map(str::to_string)
            .ok_or_else(|| SimpleKeyExtractionError::new("Unable to extract peer IP"))
    }
}

pub type ChatRateLimit = GovernorConfig<ChatKeyExtractor, NoOpMiddleware>;

/// 每分钟 `per_minute` 次，允许一次性用完
///
/// 返回的配置持有共享的令牌桶，各 worker 用它构建 `Governor` 时共用额度。
pub fn chat_rate_limit(per_minute: u32) -> anyhow::Result<ChatRateLimit> {
    let per_minute = per_minute.max(1);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_millis(60_000 / u64::from(per_minute)))
        .burst_size(per_minute)
        .key_extractor(ChatKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid chat rate limit: {} per minute", per_minute))?;

    debug!("Chat rate limiter created: {} req/min", per_minute);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_chat_rate_limit_accepts_zero() {
        assert!(chat_rate_limit(0).is_ok());
        assert!(chat_rate_limit(30).is_ok());
    }

    #[test]
    fn test_key_is_peer_ip() {
        let req = TestRequest::default()
            .peer_addr("10.1.2.3:4567".parse().unwrap())
            .to_srv_request();
        assert_eq!(ChatKeyExtractor.extract(&req).unwrap(), "10.1.2.3");
    }
}
