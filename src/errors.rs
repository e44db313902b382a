use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone)]
pub enum EtuhintaError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Validation(String),
    NotFound(String),
    Serialization(String),
    Unauthorized(String),
    Upstream(String),
    FileOperation(String),
}

impl EtuhintaError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            EtuhintaError::DatabaseConfig(_) => "E001",
            EtuhintaError::DatabaseConnection(_) => "E002",
            EtuhintaError::DatabaseOperation(_) => "E003",
            EtuhintaError::Validation(_) => "E004",
            EtuhintaError::NotFound(_) => "E005",
            EtuhintaError::Serialization(_) => "E006",
            EtuhintaError::Unauthorized(_) => "E007",
            EtuhintaError::Upstream(_) => "E008",
            EtuhintaError::FileOperation(_) => "E009",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            EtuhintaError::DatabaseConfig(_) => "Database Configuration Error",
            EtuhintaError::DatabaseConnection(_) => "Database Connection Error",
            EtuhintaError::DatabaseOperation(_) => "Database Operation Error",
            EtuhintaError::Validation(_) => "Validation Error",
            EtuhintaError::NotFound(_) => "Resource Not Found",
            EtuhintaError::Serialization(_) => "Serialization Error",
            EtuhintaError::Unauthorized(_) => "Unauthorized",
            EtuhintaError::Upstream(_) => "Upstream Service Error",
            EtuhintaError::FileOperation(_) => "File Operation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            EtuhintaError::DatabaseConfig(msg)
            | EtuhintaError::DatabaseConnection(msg)
            | EtuhintaError::DatabaseOperation(msg)
            | EtuhintaError::Validation(msg)
            | EtuhintaError::NotFound(msg)
            | EtuhintaError::Serialization(msg)
            | EtuhintaError::Unauthorized(msg)
            | EtuhintaError::Upstream(msg)
            | EtuhintaError::FileOperation(msg) => msg,
        }
    }

    /// 映射到 HTTP 状态码
    pub fn http_status(&self) -> StatusCode {
        match self {
            EtuhintaError::Validation(_) | EtuhintaError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            EtuhintaError::NotFound(_) => StatusCode::NOT_FOUND,
            EtuhintaError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            EtuhintaError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为彩色输出（用于启动失败时的终端输出）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for EtuhintaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for EtuhintaError {}

/// `{success: false, message}`；服务端错误不暴露内部细节
impl actix_web::ResponseError for EtuhintaError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        let status = self.http_status();
        let message = if status.is_server_error() {
            self.error_type()
        } else {
            self.message()
        };
        actix_web::HttpResponse::build(status).json(serde_json::json!({
            "success": false,
            "message": message,
        }))
    }
}

// 便捷的构造函数
impl EtuhintaError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::Serialization(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::Unauthorized(msg.into())
    }

    pub fn upstream<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::Upstream(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        EtuhintaError::FileOperation(msg.into())
    }
}

impl From<sea_orm::DbErr> for EtuhintaError {
    fn from(err: sea_orm::DbErr) -> Self {
        EtuhintaError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for EtuhintaError {
    fn from(err: std::io::Error) -> Self {
        EtuhintaError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for EtuhintaError {
    fn from(err: serde_json::Error) -> Self {
        EtuhintaError::Serialization(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for EtuhintaError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        EtuhintaError::Unauthorized(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EtuhintaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let errors = [
            EtuhintaError::database_config("a"),
            EtuhintaError::database_connection("a"),
            EtuhintaError::database_operation("a"),
            EtuhintaError::validation("a"),
            EtuhintaError::not_found("a"),
            EtuhintaError::serialization("a"),
            EtuhintaError::unauthorized("a"),
            EtuhintaError::upstream("a"),
            EtuhintaError::file_operation("a"),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            EtuhintaError::validation("bad").http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EtuhintaError::unauthorized("no token").http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            EtuhintaError::database_operation("boom").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_error_hides_server_details() {
        use actix_web::ResponseError;

        let resp = EtuhintaError::database_operation("password=secret").error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = EtuhintaError::validation("Message is required").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_db_err_conversion() {
        let err: EtuhintaError = sea_orm::DbErr::Custom("disk full".to_string()).into();
        assert!(matches!(err, EtuhintaError::DatabaseOperation(_)));
        assert!(err.message().contains("disk full"));
        assert_eq!(
            err.to_string(),
            format!("Database Operation Error: {}", err.message())
        );
    }
}
