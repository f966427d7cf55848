use actix_web::http::StatusCode;
use std::fmt;

#[derive(Debug, Clone)]
pub enum SmartlinkError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    Gone(String),
    Serialization(String),
    DateParse(String),
    ExternalService(String),
}

impl SmartlinkError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            SmartlinkError::DatabaseConfig(_) => "E001",
            SmartlinkError::DatabaseConnection(_) => "E002",
            SmartlinkError::DatabaseOperation(_) => "E003",
            SmartlinkError::Validation(_) => "E004",
            SmartlinkError::NotFound(_) => "E005",
            SmartlinkError::Conflict(_) => "E006",
            SmartlinkError::Gone(_) => "E007",
            SmartlinkError::Serialization(_) => "E008",
            SmartlinkError::DateParse(_) => "E009",
            SmartlinkError::ExternalService(_) => "E010",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            SmartlinkError::DatabaseConfig(_) => "Database Configuration Error",
            SmartlinkError::DatabaseConnection(_) => "Database Connection Error",
            SmartlinkError::DatabaseOperation(_) => "Database Operation Error",
            SmartlinkError::Validation(_) => "Validation Error",
            SmartlinkError::NotFound(_) => "Resource Not Found",
            SmartlinkError::Conflict(_) => "Resource Conflict",
            SmartlinkError::Gone(_) => "Resource Expired",
            SmartlinkError::Serialization(_) => "Serialization Error",
            SmartlinkError::DateParse(_) => "Date Parse Error",
            SmartlinkError::ExternalService(_) => "External Service Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            SmartlinkError::DatabaseConfig(msg)
            | SmartlinkError::DatabaseConnection(msg)
            | SmartlinkError::DatabaseOperation(msg)
            | SmartlinkError::Validation(msg)
            | SmartlinkError::NotFound(msg)
            | SmartlinkError::Conflict(msg)
            | SmartlinkError::Gone(msg)
            | SmartlinkError::Serialization(msg)
            | SmartlinkError::DateParse(msg)
            | SmartlinkError::ExternalService(msg) => msg,
        }
    }

    /// HTTP status this error maps to at the API boundary
    pub fn http_status(&self) -> StatusCode {
        match self {
            SmartlinkError::Validation(_) | SmartlinkError::DateParse(_) => {
                StatusCode::BAD_REQUEST
            }
            SmartlinkError::NotFound(_) => StatusCode::NOT_FOUND,
            SmartlinkError::Conflict(_) => StatusCode::CONFLICT,
            SmartlinkError::Gone(_) => StatusCode::GONE,
            SmartlinkError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            SmartlinkError::DatabaseConfig(_)
            | SmartlinkError::DatabaseConnection(_)
            | SmartlinkError::DatabaseOperation(_)
            | SmartlinkError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为彩色输出（启动失败时打印到终端）
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

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for SmartlinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for SmartlinkError {}

// 便捷的构造函数
impl SmartlinkError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::Conflict(msg.into())
    }

    pub fn gone<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::Gone(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::Serialization(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::DateParse(msg.into())
    }

    pub fn external_service<T: Into<String>>(msg: T) -> Self {
        SmartlinkError::ExternalService(msg.into())
    }
}

impl From<sea_orm::DbErr> for SmartlinkError {
    fn from(err: sea_orm::DbErr) -> Self {
        use crate::storage::backend::retry::{DbFailure, classify};

        match classify(&err) {
            DbFailure::UniqueViolation(detail) => {
                SmartlinkError::Conflict(format!("Unique constraint violated: {}", detail))
            }
            DbFailure::ForeignKeyViolation(detail) => {
                SmartlinkError::Conflict(format!("Foreign key constraint violated: {}", detail))
            }
            DbFailure::Transient | DbFailure::Permanent => {
                SmartlinkError::DatabaseOperation(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for SmartlinkError {
    fn from(err: serde_json::Error) -> Self {
        SmartlinkError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for SmartlinkError {
    fn from(err: chrono::ParseError) -> Self {
        SmartlinkError::DateParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SmartlinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            SmartlinkError::validation("x").http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SmartlinkError::not_found("x").http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SmartlinkError::conflict("x").http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(SmartlinkError::gone("x").http_status(), StatusCode::GONE);
        assert_eq!(
            SmartlinkError::external_service("x").http_status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            SmartlinkError::database_operation("x").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_codes_are_unique() {
        let errors = [
            SmartlinkError::database_config(""),
            SmartlinkError::database_connection(""),
            SmartlinkError::database_operation(""),
            SmartlinkError::validation(""),
            SmartlinkError::not_found(""),
            SmartlinkError::conflict(""),
            SmartlinkError::gone(""),
            SmartlinkError::serialization(""),
            SmartlinkError::date_parse(""),
            SmartlinkError::external_service(""),
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display_uses_simple_format() {
        let err = SmartlinkError::not_found("SmartLink 42 not found");
        assert_eq!(
            err.to_string(),
            "Resource Not Found: SmartLink 42 not found"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: SmartlinkError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, SmartlinkError::Serialization(_)));
    }
}
