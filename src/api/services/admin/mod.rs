//! Admin API 服务模块
//!
//! 该模块包含管理 API 的所有端点，包括：
//! - 艺人 CRUD
//! - SmartLink CRUD 与跨平台链接查询
//! - 短链管理与访问统计
//! - 分析统计

pub mod analytics;
pub mod artists;
pub mod error_code;
mod helpers;
pub mod routes;
pub mod shortlinks;
pub mod smartlinks;
mod types;

// 重新导出类型
pub use types::*;

// 重新导出帮助函数
pub use helpers::{
    api_result, created_response, error_from_smartlinker, error_response, json_response,
    resource_error, success_response,
};

// 重新导出错误码
pub use error_code::{ErrorCode, Resource};
