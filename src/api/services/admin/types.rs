//! Admin API 类型定义

use serde::{Deserialize, Serialize};

use crate::storage::backend::total_pages;

/// Envelope of every JSON response
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

/// 分页信息
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<u64>,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let page = page.max(1);
        let total_pages = total_pages(total, limit);
        Self {
            page,
            limit,
            total,
            total_pages,
            next: (page < total_pages).then_some(page + 1),
            prev: (page > 1).then_some(page - 1),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PaginatedData<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PaginatedData<T> {
    pub fn new(items: Vec<T>, page: u64, limit: u64, total: u64) -> Self {
        Self {
            items,
            pagination: Pagination::new(page, limit, total),
        }
    }
}

// ============ 查询参数 ============

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ArtistListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub search: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct SmartLinkListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub artist_id: Option<i64>,
    pub is_published: Option<bool>,
    pub search: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ShortLinkListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

// ============ 请求体 ============

#[derive(Deserialize, Clone, Debug)]
pub struct FetchPlatformLinksRequest {
    #[serde(alias = "sourceUrl")]
    pub source_url: String,
    #[serde(default, alias = "userCountry")]
    pub user_country: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct PlatformClickRequest {
    #[serde(default, alias = "platformName")]
    pub platform_name: Option<String>,
}

// ============ 响应体 ============

#[derive(Serialize, Clone, Debug)]
pub struct DeletedSmartLink {
    pub id: i64,
    pub deleted_short_codes: Vec<String>,
}

// ============ 健康检查相关类型 ============

/// 存储健康检查状态
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthStorageCheck {
    pub status: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 点击缓冲状态
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthCounterCheck {
    pub buffered: usize,
}

/// 健康检查项容器
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthChecks {
    pub storage: HealthStorageCheck,
    pub counters: HealthCounterCheck,
}

/// 健康检查响应
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime: u64,
    pub uptime_human: String,
    pub checks: HealthChecks,
    pub response_time_ms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_links() {
        let p = Pagination::new(2, 25, 60);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.next, Some(3));
        assert_eq!(p.prev, Some(1));

        let last = Pagination::new(3, 25, 60);
        assert_eq!(last.next, None);

        let empty = Pagination::new(1, 25, 0);
        assert_eq!(empty.total_pages, 0);
        assert_eq!(empty.next, None);
        assert_eq!(empty.prev, None);
    }

    #[test]
    fn test_pagination_omits_missing_links() {
        let json = serde_json::to_value(Pagination::new(1, 10, 5)).unwrap();
        assert!(json.get("next").is_none());
        assert!(json.get("prev").is_none());
        assert_eq!(json["total_pages"], 1);
    }

    #[test]
    fn test_platform_click_request_alias() {
        let req: PlatformClickRequest =
            serde_json::from_str(r#"{"platformName":"spotify"}"#).unwrap();
        assert_eq!(req.platform_name.as_deref(), Some("spotify"));
        let empty: PlatformClickRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.platform_name.is_none());
    }
}
