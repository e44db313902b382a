//! API 响应帮助函数
//!
//! 所有接口统一使用 `{success, message?, ...}` 信封，
//! 附加字段通过 `#[serde(flatten)]` 平铺在顶层。

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;

/// 统一响应信封
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Option<T>,
}

/// `{"data": ...}` 形式的载荷
#[derive(Debug, Serialize)]
pub struct DataBody<T> {
    pub data: T,
}

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    success: bool,
    message: Option<String>,
    extra: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            success,
            message,
            extra,
        })
}

/// 只有消息的成功响应
pub fn message_response(message: impl Into<String>) -> HttpResponse {
    json_response::<()>(StatusCode::OK, true, Some(message.into()), None)
}

/// `{success: true, data}`
pub fn data_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, true, None, Some(DataBody { data }))
}

/// 构建错误响应
pub fn error_response(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    json_response::<()>(status, false, Some(message.into()), None)
}
