//! Storage failure classification and retry policy
//!
//! Every `DbErr` coming out of the backend is sorted into a [`DbFailure`].
//! Transient failures (pool exhaustion, lost connections, deadlocks, a busy
//! SQLite file while the counter flush holds the write lock) are retried
//! with exponential backoff. Constraint violations are returned at once and
//! surface as `Conflict` through `SmartlinkError::from`.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use sea_orm::error::RuntimeErr;
use sea_orm::{DbErr, SqlErr};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

/// 可重试的数据库错误码
///
/// MySQL 死锁/锁超时，PostgreSQL 序列化失败/死锁，SQLite BUSY/LOCKED 及其扩展码
const TRANSIENT_CODES: &[&str] = &[
    "1213", "1205", "40001", "40P01", "5", "6", "261", "262", "517", "773",
];

const TRANSIENT_MESSAGES: &[&str] = &[
    "database is locked",
    "database table is locked",
    "deadlock",
    "lock wait timeout",
    "serialization failure",
    "connection reset",
    "broken pipe",
];

const UNIQUE_MESSAGES: &[&str] = &[
    "unique constraint failed",
    "duplicate entry",
    "duplicate key value",
];

const FOREIGN_KEY_MESSAGES: &[&str] = &["foreign key constraint"];

/// Storage failure class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbFailure {
    /// Worth another attempt after a backoff
    Transient,
    /// Duplicate slug, short code or tracking key
    UniqueViolation(String),
    ForeignKeyViolation(String),
    /// Anything else: bad SQL, missing rows, decode errors
    Permanent,
}

impl DbFailure {
    pub fn is_transient(&self) -> bool {
        matches!(self, DbFailure::Transient)
    }

    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            DbFailure::UniqueViolation(_) | DbFailure::ForeignKeyViolation(_)
        )
    }
}

/// Sort a database error into a failure class.
pub fn classify(err: &DbErr) -> DbFailure {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            return DbFailure::UniqueViolation(detail);
        }
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
            return DbFailure::ForeignKeyViolation(detail);
        }
        _ => {}
    }

    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => DbFailure::Transient,
        DbErr::Exec(runtime_err) | DbErr::Query(runtime_err) => classify_runtime(runtime_err),
        _ => DbFailure::Permanent,
    }
}

fn classify_runtime(err: &RuntimeErr) -> DbFailure {
    let message = match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use std::ops::Deref;
            let code = sqlx_err
                .deref()
                .as_database_error()
                .and_then(|db_err| db_err.code());
            if let Some(code) = code
                && TRANSIENT_CODES.contains(&code.as_ref())
            {
                return DbFailure::Transient;
            }
            sqlx_err.to_string()
        }
        RuntimeErr::Internal(msg) => msg.clone(),
        #[allow(unreachable_patterns)]
        _ => return DbFailure::Permanent,
    };
    classify_message(&message)
}

/// 没有错误码时按消息文本归类
fn classify_message(message: &str) -> DbFailure {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(UNIQUE_MESSAGES) {
        DbFailure::UniqueViolation(message.to_string())
    } else if has(FOREIGN_KEY_MESSAGES) {
        DbFailure::ForeignKeyViolation(message.to_string())
    } else if has(TRANSIENT_MESSAGES) {
        DbFailure::Transient
    } else {
        DbFailure::Permanent
    }
}

/// Backoff settings taken from the `[database]` section
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }

    /// 第 `attempt` 次重试前的等待：base * 2^(attempt-1)，封顶后加 0-25% 抖动
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay_ms);
        let jitter = rand::rng().random_range(0..=capped / 4);
        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// Run `operation`, retrying transient failures.
///
/// `operation_name` only appears in logs, e.g. `"flush_views"` or
/// `"insert_short_link(abc123)"`.
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let failure = classify(&err);
        if !failure.is_transient() {
            if failure.is_constraint() {
                debug!("{} rejected by constraint: {}", operation_name, err);
            } else {
                debug!("{} failed: {}", operation_name, err);
            }
            return Err(err);
        }
        if attempt >= config.max_retries {
            warn!(
                "{} still failing after {} attempts: {}",
                operation_name,
                attempt + 1,
                err
            );
            return Err(err);
        }

        attempt += 1;
        let delay = config.backoff(attempt);
        warn!(
            "{} hit a transient error (retry {}/{} in {:?}): {}",
            operation_name, attempt, config.max_retries, delay, err
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SmartlinkError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn exec_err(msg: &str) -> DbErr {
        DbErr::Exec(RuntimeErr::Internal(msg.to_string()))
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_sqlite_busy_is_transient() {
        assert!(classify(&exec_err("database is locked")).is_transient());
        assert!(classify(&exec_err("(code: 6) database table is locked")).is_transient());
    }

    #[test]
    fn test_pool_and_connection_errors_are_transient() {
        let acquire = DbErr::ConnectionAcquire(sea_orm::error::ConnAcquireErr::Timeout);
        assert_eq!(classify(&acquire), DbFailure::Transient);

        let conn = DbErr::Conn(RuntimeErr::Internal("connection reset by peer".into()));
        assert_eq!(classify(&conn), DbFailure::Transient);
    }

    #[test]
    fn test_duplicate_slug_is_unique_violation() {
        let failure = classify(&exec_err("UNIQUE constraint failed: artists.slug"));
        assert!(
            matches!(failure, DbFailure::UniqueViolation(ref m) if m.contains("artists.slug"))
        );

        let mysql = classify(&exec_err("Duplicate entry 'abc123' for key 'PRIMARY'"));
        assert!(matches!(mysql, DbFailure::UniqueViolation(_)));
    }

    #[test]
    fn test_foreign_key_violation() {
        let failure = classify(&exec_err("FOREIGN KEY constraint failed"));
        assert!(matches!(failure, DbFailure::ForeignKeyViolation(_)));
        assert!(failure.is_constraint());
    }

    #[test]
    fn test_missing_row_is_permanent() {
        let failure = classify(&DbErr::RecordNotFound("smart_links".into()));
        assert_eq!(failure, DbFailure::Permanent);
        assert!(!failure.is_constraint());
    }

    #[test]
    fn test_constraint_violations_map_to_conflict() {
        let unique =
            SmartlinkError::from(exec_err("UNIQUE constraint failed: short_links.short_code"));
        assert!(matches!(unique, SmartlinkError::Conflict(_)));

        let fk = SmartlinkError::from(exec_err("FOREIGN KEY constraint failed"));
        assert!(matches!(fk, SmartlinkError::Conflict(_)));

        let busy = SmartlinkError::from(exec_err("database is locked"));
        assert!(matches!(busy, SmartlinkError::DatabaseOperation(_)));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        let first = config.backoff(1).as_millis();
        assert!((100..=125).contains(&first));
        let third = config.backoff(3).as_millis();
        assert!((400..=500).contains(&third));
        let capped = config.backoff(12).as_millis();
        assert!((1000..=1250).contains(&capped));
    }

    #[tokio::test]
    async fn test_counter_flush_survives_locked_database() {
        let calls = AtomicU32::new(0);

        let result = with_retry("flush_short_link_clicks", fast_config(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(exec_err("database is locked"))
                } else {
                    Ok(7u64)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_locked_database_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);

        let result = with_retry("flush_views", fast_config(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(exec_err("database is locked")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_duplicate_short_code_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result = with_retry("insert_short_link(abc123)", fast_config(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(exec_err("UNIQUE constraint failed: short_links.short_code")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicU32::new(0);

        let result = with_retry("get_artist(1)", fast_config(0), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(DbErr::ConnectionAcquire(
                    sea_orm::error::ConnAcquireErr::Timeout,
                ))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
