//! Bearer token 认证提取器
//!
//! token 由外部账号服务签发，这里只校验签名、过期时间与 `sub`。
//! 测试或多实例场景可通过 `web::Data<JwtService>` 注入，
//! 否则使用全局 `get_jwt_service()`。

use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, web};
use tracing::{debug, trace};

use crate::api::jwt::{JwtService, get_jwt_service};
use crate::errors::EtuhintaError;

/// 必须登录的请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

/// 可选登录；token 缺失或无效时为匿名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalUser(pub Option<i64>);

impl OptionalUser {
    pub fn user_id(&self) -> Option<i64> {
        self.0
    }
}

/// 从 Authorization header 提取 Bearer token
fn extract_bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(req: &HttpRequest) -> Result<i64, EtuhintaError> {
    let token = extract_bearer_token(req)
        .ok_or_else(|| EtuhintaError::unauthorized("Missing bearer token"))?;

    let result = match req.app_data::<web::Data<JwtService>>() {
        Some(jwt) => jwt.authenticate(token),
        None => get_jwt_service().authenticate(token),
    };

    match &result {
        Ok(user_id) => trace!("Bearer token accepted for user {}", user_id),
        Err(e) => debug!("Bearer token rejected on {}: {}", req.path(), e),
    }
    result
}

impl FromRequest for AuthenticatedUser {
    type Error = EtuhintaError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map(|user_id| AuthenticatedUser { user_id }))
    }
}

impl FromRequest for OptionalUser {
    type Error = EtuhintaError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        if extract_bearer_token(req).is_none() {
            return ready(Ok(OptionalUser(None)));
        }
        ready(Ok(OptionalUser(authenticate(req).ok())))
    }
}
