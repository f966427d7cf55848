//! 统一 API 错误码定义

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::SmartlinkError;

/// API 错误码枚举
///
/// 使用 serde_repr 序列化为数字。按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 2000-2099: 艺人错误
/// - 3000-3099: SmartLink 错误
/// - 4000-4099: 短链错误
/// - 5000-5099: 点击追踪错误
/// - 6000-6099: 统计错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    // 成功
    Success = 0,

    // 通用错误 1000-1099
    BadRequest = 1000,
    Unauthorized = 1001,
    NotFound = 1004,
    InternalServerError = 1005,
    Conflict = 1009,
    Gone = 1010,
    InvalidDateFormat = 1012,
    ServiceUnavailable = 1030,
    UpstreamFailed = 1031,

    // 艺人错误 2000-2099
    ArtistNotFound = 2000,
    ArtistConflict = 2001,

    // SmartLink 错误 3000-3099
    SmartLinkNotFound = 3000,
    SmartLinkSlugTaken = 3001,

    // 短链错误 4000-4099
    ShortLinkNotFound = 4000,
    ShortLinkExpired = 4001,
    ShortLinkInvalidExpireTime = 4002,

    // 点击追踪错误 5000-5099
    TrackingInvalidClick = 5000,
    TrackingDuplicateMdmcId = 5001,

    // Analytics 错误 6000-6099
    AnalyticsQueryFailed = 6000,
    AnalyticsNotFound = 6001,
    AnalyticsInvalidDateRange = 6002,
}

impl From<SmartlinkError> for ErrorCode {
    fn from(err: SmartlinkError) -> Self {
        ErrorCode::from(&err)
    }
}

impl From<&SmartlinkError> for ErrorCode {
    fn from(err: &SmartlinkError) -> Self {
        match err {
            SmartlinkError::Validation(_) => ErrorCode::BadRequest,
            SmartlinkError::DateParse(_) => ErrorCode::InvalidDateFormat,
            SmartlinkError::NotFound(_) => ErrorCode::NotFound,
            SmartlinkError::Conflict(_) => ErrorCode::Conflict,
            SmartlinkError::Gone(_) => ErrorCode::Gone,
            SmartlinkError::ExternalService(_) => ErrorCode::UpstreamFailed,
            SmartlinkError::DatabaseConfig(_)
            | SmartlinkError::DatabaseConnection(_)
            | SmartlinkError::DatabaseOperation(_)
            | SmartlinkError::Serialization(_) => ErrorCode::InternalServerError,
        }
    }
}

/// Resource a handler works on; refines the generic code of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Artist,
    SmartLink,
    ShortLink,
    Tracking,
    Analytics,
}

impl Resource {
    pub fn code_for(self, err: &SmartlinkError) -> ErrorCode {
        use SmartlinkError as E;
        match (self, err) {
            (Resource::Artist, E::NotFound(_)) => ErrorCode::ArtistNotFound,
            (Resource::Artist, E::Conflict(_)) => ErrorCode::ArtistConflict,
            (Resource::SmartLink, E::NotFound(_)) => ErrorCode::SmartLinkNotFound,
            (Resource::SmartLink, E::Conflict(_)) => ErrorCode::SmartLinkSlugTaken,
            (Resource::ShortLink, E::NotFound(_)) => ErrorCode::ShortLinkNotFound,
            (Resource::ShortLink, E::Gone(_)) => ErrorCode::ShortLinkExpired,
            (Resource::ShortLink, E::DateParse(_)) => ErrorCode::ShortLinkInvalidExpireTime,
            (Resource::Tracking, E::Validation(_)) => ErrorCode::TrackingInvalidClick,
            (Resource::Tracking, E::Conflict(_)) => ErrorCode::TrackingDuplicateMdmcId,
            (Resource::Analytics, E::NotFound(_)) => ErrorCode::AnalyticsNotFound,
            (Resource::Analytics, E::Validation(_)) => ErrorCode::AnalyticsInvalidDateRange,
            (
                Resource::Analytics,
                E::DatabaseConnection(_) | E::DatabaseOperation(_),
            ) => ErrorCode::AnalyticsQueryFailed,
            _ => ErrorCode::from(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ErrorCode::Success).unwrap(), "0");
        assert_eq!(serde_json::to_string(&ErrorCode::ShortLinkExpired).unwrap(), "4001");
        let code: ErrorCode = serde_json::from_str("1004").unwrap();
        assert_eq!(code, ErrorCode::NotFound);
    }

    #[test]
    fn test_from_error() {
        assert_eq!(
            ErrorCode::from(SmartlinkError::validation("x")),
            ErrorCode::BadRequest
        );
        assert_eq!(ErrorCode::from(SmartlinkError::gone("x")), ErrorCode::Gone);
        assert_eq!(
            ErrorCode::from(SmartlinkError::database_operation("x")),
            ErrorCode::InternalServerError
        );
    }

    #[test]
    fn test_resource_refines_code() {
        let not_found = SmartlinkError::not_found("x");
        assert_eq!(Resource::Artist.code_for(&not_found), ErrorCode::ArtistNotFound);
        assert_eq!(Resource::ShortLink.code_for(&not_found), ErrorCode::ShortLinkNotFound);
        assert_eq!(
            Resource::ShortLink.code_for(&SmartlinkError::gone("x")),
            ErrorCode::ShortLinkExpired
        );
        // 无细分时回退到通用错误码
        assert_eq!(
            Resource::Artist.code_for(&SmartlinkError::validation("x")),
            ErrorCode::BadRequest
        );
    }
}
