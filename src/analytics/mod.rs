pub mod manager;
pub mod sink;

pub use manager::ClickManager;
pub use sink::CounterSink;

use std::fmt;

/// Dimension of a short link access statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum AccessDimension {
    Country,
    Referrer,
    Device,
}

impl AccessDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDimension::Country => "country",
            AccessDimension::Referrer => "referrer",
            AccessDimension::Device => "device",
        }
    }
}

impl fmt::Display for AccessDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 缓冲计数器的键
///
/// 每个键对应一个在刷盘时会被 `+= n` 的数据库计数器。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CounterKey {
    /// `smart_links.view_count`
    SmartLinkView(i64),
    /// `short_links.click_count`，同时更新 `last_accessed_at`
    ShortLinkClick(String),
    /// `short_links.unique_visitors`
    ShortLinkVisitor(String),
    /// `short_link_access_stats.count` of `(code, dimension, value)`
    ShortLinkAccess {
        code: String,
        dimension: AccessDimension,
        value: String,
    },
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKey::SmartLinkView(id) => write!(f, "view:{}", id),
            CounterKey::ShortLinkClick(code) => write!(f, "click:{}", code),
            CounterKey::ShortLinkVisitor(code) => write!(f, "visitor:{}", code),
            CounterKey::ShortLinkAccess {
                code,
                dimension,
                value,
            } => write!(f, "access:{}:{}:{}", code, dimension, value),
        }
    }
}
