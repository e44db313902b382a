use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

use crate::errors::{EtuhintaError, Result};

/// Global cached JwtService instance
static JWT_SERVICE: OnceLock<JwtService> = OnceLock::new();

/// Get the cached JwtService instance
///
/// Initialized once from `auth.jwt_secret` on first use.
pub fn get_jwt_service() -> &'static JwtService {
    JWT_SERVICE.get_or_init(JwtService::from_config)
}

/// Access token claims; `sub` carries the numeric user id
#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

impl UserClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.trim().parse().ok()
    }
}

/// Validates bearer tokens issued by the account service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Create JwtService from config
    pub fn from_config() -> Self {
        let config = crate::config::get_config();
        let secret = config.auth.jwt_secret.trim();
        if secret.is_empty() {
            // 随机密钥下所有外部 token 都无法通过校验
            warn!("auth.jwt_secret is empty, authenticated routes will reject every token");
            let mut bytes = [0u8; 32];
            rand::rng().fill(&mut bytes);
            let random: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            return Self::new(&random);
        }
        Self::new(secret)
    }

    /// Sign a token for `user_id` (used by tooling and tests)
    pub fn issue_access_token(
        &self,
        user_id: i64,
        ttl_minutes: i64,
    ) -> std::result::Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = UserClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Validate token signature and expiry
    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> std::result::Result<UserClaims, jsonwebtoken::errors::Error> {
        let token_data = decode::<UserClaims>(token, &self.decoding_key, &Validation::default())?;
        Ok(token_data.claims)
    }

    /// Resolve the user id carried by a valid token
    pub fn authenticate(&self, token: &str) -> Result<i64> {
        let claims = self.validate_access_token(token)?;
        claims
            .user_id()
            .ok_or_else(|| EtuhintaError::unauthorized("Token subject is not a user id"))
    }
}
