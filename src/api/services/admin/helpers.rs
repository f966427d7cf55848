//! Admin API 帮助函数

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::errors::SmartlinkError;

use super::error_code::{ErrorCode, Resource};
use super::types::ApiResponse;

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code: code as i32,
            message: message.into(),
            data,
        })
}

/// 构建成功响应
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
}

/// 201 Created
pub fn created_response<T: Serialize>(message: &str, data: T) -> HttpResponse {
    json_response(StatusCode::CREATED, ErrorCode::Success, message, Some(data))
}

/// 构建错误响应
pub fn error_response(status: StatusCode, error_code: ErrorCode, message: &str) -> HttpResponse {
    json_response::<()>(status, error_code, message, None)
}

/// 从 SmartlinkError 构建错误响应（自动映射 HTTP 状态码和 ErrorCode）
pub fn error_from_smartlinker(err: &SmartlinkError) -> HttpResponse {
    error_for(err, ErrorCode::from(err))
}

/// 同上，但错误码按资源细分
pub fn resource_error(resource: Resource, err: &SmartlinkError) -> HttpResponse {
    error_for(err, resource.code_for(err))
}

fn error_for(err: &SmartlinkError, code: ErrorCode) -> HttpResponse {
    let status = err.http_status();
    if status.is_server_error() {
        error!("API error ({}): {}", status.as_u16(), err);
    }
    error_response(status, code, err.message())
}

/// 统一 Result → HttpResponse 转换
///
/// 成功时返回 200 OK + JSON 数据，失败时按资源映射 SmartlinkError。
pub fn api_result<T>(resource: Resource, result: Result<T, SmartlinkError>) -> HttpResponse
where
    T: Serialize,
{
    match result {
        Ok(data) => success_response(data),
        Err(e) => resource_error(resource, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_success_response() {
        let response = success_response("success_data");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_created_response() {
        let response = created_response("Created", 1);
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_error_response_not_found() {
        let response = error_response(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            "Resource not found",
        );
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_from_smartlinker_status() {
        assert_eq!(
            error_from_smartlinker(&SmartlinkError::conflict("taken")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_from_smartlinker(&SmartlinkError::gone("expired")).status(),
            StatusCode::GONE
        );
        assert_eq!(
            error_from_smartlinker(&SmartlinkError::external_service("down")).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[actix_rt::test]
    async fn test_api_result_error_body() {
        let response = api_result::<()>(
            Resource::Artist,
            Err(SmartlinkError::not_found("Artist 9 not found")),
        );
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], ErrorCode::ArtistNotFound as i32);
        assert_eq!(json["message"], "Artist 9 not found");
        assert!(json["data"].is_null());
    }
}
