//! CounterSink implementation for SeaOrmStorage
//!
//! Buffered counters are applied with one statement per counter kind:
//! `CASE WHEN` batch updates for row counters and a multi-row upsert for the
//! short link access stat maps. All statements use bound parameters.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{CaseStatement, Expr, OnConflict, Query};
use sea_orm::sea_query::{IntoIden, IntoTableRef};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait, ExprTrait,
    QueryFilter, QuerySelect,
};
use tracing::debug;

use super::SeaOrmStorage;
use super::retry;
use crate::analytics::{CounterKey, CounterSink};
use crate::utils::is_valid_short_code;

use migration::entities::{short_link, short_link_access_stat, smart_link};

/// 按类型拆分后的计数更新
#[derive(Default)]
struct SplitUpdates {
    views: Vec<(i64, i64)>,
    clicks: Vec<(String, i64)>,
    visitors: Vec<(String, i64)>,
    access: Vec<(String, short_link_access_stat::ActiveModel)>,
}

fn split_updates(updates: Vec<(CounterKey, usize)>) -> anyhow::Result<SplitUpdates> {
    let mut split = SplitUpdates::default();
    for (key, count) in updates {
        let count = count as i64;
        match key {
            CounterKey::SmartLinkView(id) => split.views.push((id, count)),
            CounterKey::ShortLinkClick(code) => {
                ensure_valid_code(&code)?;
                split.clicks.push((code, count));
            }
            CounterKey::ShortLinkVisitor(code) => {
                ensure_valid_code(&code)?;
                split.visitors.push((code, count));
            }
            CounterKey::ShortLinkAccess {
                code,
                dimension,
                value,
            } => {
                ensure_valid_code(&code)?;
                let model = short_link_access_stat::ActiveModel {
                    short_code: Set(code.clone()),
                    dimension: Set(dimension.as_str().to_string()),
                    value: Set(value),
                    count: Set(count),
                    ..Default::default()
                };
                split.access.push((code, model));
            }
        }
    }
    Ok(split)
}

fn ensure_valid_code(code: &str) -> anyhow::Result<()> {
    if is_valid_short_code(code) {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Invalid short_code format detected: '{}' - refusing to flush",
            code
        ))
    }
}

/// `UPDATE table SET col = CASE WHEN key = k THEN col + n ... END WHERE key IN (...)`
fn case_increment<K, C>(
    table: impl IntoTableRef,
    key_col: K,
    counter_col: C,
    updates: &[(impl Into<sea_orm::Value> + Clone, i64)],
) -> sea_orm::sea_query::UpdateStatement
where
    K: IntoIden + Copy,
    C: IntoIden + Copy,
{
    let mut case_stmt = CaseStatement::new();
    let mut keys: Vec<sea_orm::Value> = Vec::with_capacity(updates.len());
    for (key, count) in updates {
        case_stmt = case_stmt.case(
            Expr::col(key_col).eq(Expr::val(key.clone())),
            Expr::col(counter_col).add(Expr::val(*count)),
        );
        keys.push(key.clone().into());
    }
    // 不匹配的保持原值
    case_stmt = case_stmt.finally(Expr::col(counter_col));

    Query::update()
        .table(table)
        .value(counter_col, case_stmt)
        .and_where(Expr::col(key_col).is_in(keys))
        .to_owned()
}

impl SeaOrmStorage {
    /// 过滤掉短码已不存在的访问统计
    async fn retain_existing_codes(
        &self,
        access: Vec<(String, short_link_access_stat::ActiveModel)>,
    ) -> anyhow::Result<Vec<short_link_access_stat::ActiveModel>> {
        let mut codes: Vec<String> = access.iter().map(|(code, _)| code.clone()).collect();
        codes.sort_unstable();
        codes.dedup();

        let db = &self.db;
        let codes_ref = &codes;
        let rows = retry::with_retry("flush_access_codes", self.retry_config, || async {
            short_link::Entity::find()
                .select_only()
                .column(short_link::Column::ShortCode)
                .filter(short_link::Column::ShortCode.is_in(codes_ref.clone()))
                .into_tuple::<String>()
                .all(db)
                .await
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to look up short codes for access stats: {}", e))?;
        let existing: HashSet<String> = rows.into_iter().collect();

        let before = access.len();
        let kept: Vec<_> = access
            .into_iter()
            .filter(|(code, _)| existing.contains(code))
            .map(|(_, model)| model)
            .collect();
        if kept.len() < before {
            debug!(
                "Dropped {} access stat entries for deleted short links",
                before - kept.len()
            );
        }
        Ok(kept)
    }
}

#[async_trait]
impl CounterSink for SeaOrmStorage {
    async fn flush_counters(&self, updates: Vec<(CounterKey, usize)>) -> anyhow::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let total_count = updates.len();
        let split = split_updates(updates)?;
        let db = &self.db;

        if !split.views.is_empty() {
            let stmt = case_increment(
                smart_link::Entity,
                smart_link::Column::Id,
                smart_link::Column::ViewCount,
                split.views.as_slice(),
            );
            let stmt_ref = &stmt;
            retry::with_retry("flush_views", self.retry_config, || async {
                db.execute(stmt_ref).await
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to batch update view counts: {}", e))?;
        }

        if !split.clicks.is_empty() {
            let mut stmt = case_increment(
                short_link::Entity,
                short_link::Column::ShortCode,
                short_link::Column::ClickCount,
                split.clicks.as_slice(),
            );
            stmt.value(short_link::Column::LastAccessedAt, Expr::val(Utc::now()));
            let stmt_ref = &stmt;
            retry::with_retry("flush_short_link_clicks", self.retry_config, || async {
                db.execute(stmt_ref).await
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to batch update short link clicks: {}", e))?;
        }

        if !split.visitors.is_empty() {
            let stmt = case_increment(
                short_link::Entity,
                short_link::Column::ShortCode,
                short_link::Column::UniqueVisitors,
                split.visitors.as_slice(),
            );
            let stmt_ref = &stmt;
            retry::with_retry("flush_unique_visitors", self.retry_config, || async {
                db.execute(stmt_ref).await
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to batch update unique visitors: {}", e))?;
        }

        // 缓冲期间被删除的短链不再写入访问统计
        let access = if split.access.is_empty() {
            Vec::new()
        } else {
            self.retain_existing_codes(split.access).await?
        };

        if !access.is_empty() {
            // SQLite/PostgreSQL: count = count + excluded.count
            // MySQL: count = count + VALUES(count)
            let existing = (
                short_link_access_stat::Entity,
                short_link_access_stat::Column::Count,
            );
            let incoming = match db.get_database_backend() {
                DatabaseBackend::MySql => Expr::cust("VALUES(count)"),
                _ => Expr::cust("excluded.count"),
            };
            let on_conflict = OnConflict::columns([
                short_link_access_stat::Column::ShortCode,
                short_link_access_stat::Column::Dimension,
                short_link_access_stat::Column::Value,
            ])
            .value(
                short_link_access_stat::Column::Count,
                Expr::col(existing).add(incoming),
            )
            .to_owned();

            let models = &access;
            let on_conflict_ref = &on_conflict;
            retry::with_retry("flush_access_stats", self.retry_config, || async {
                short_link_access_stat::Entity::insert_many(models.clone())
                    .on_conflict(on_conflict_ref.clone())
                    .exec(db)
                    .await
                    .map(|_| ())
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to upsert access stats: {}", e))?;
        }

        debug!(
            "Counters flushed to {} database ({} keys)",
            self.backend_name.to_uppercase(),
            total_count
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AccessDimension;

    #[test]
    fn test_split_updates_by_kind() {
        let split = split_updates(vec![
            (CounterKey::SmartLinkView(1), 3),
            (CounterKey::ShortLinkClick("abc123".into()), 2),
            (CounterKey::ShortLinkVisitor("abc123".into()), 1),
            (
                CounterKey::ShortLinkAccess {
                    code: "abc123".into(),
                    dimension: AccessDimension::Referrer,
                    value: "Direct".into(),
                },
                2,
            ),
        ])
        .unwrap();

        assert_eq!(split.views, vec![(1, 3)]);
        assert_eq!(split.clicks, vec![("abc123".to_string(), 2)]);
        assert_eq!(split.visitors, vec![("abc123".to_string(), 1)]);
        assert_eq!(split.access.len(), 1);
    }

    #[test]
    fn test_split_updates_rejects_bad_code() {
        let result = split_updates(vec![(
            CounterKey::ShortLinkClick("x' OR 1=1 --".into()),
            1,
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_case_increment_sql() {
        let stmt = case_increment(
            smart_link::Entity,
            smart_link::Column::Id,
            smart_link::Column::ViewCount,
            &[(1i64, 2i64), (5i64, 1i64)],
        );
        let sql = stmt.to_string(sea_orm::sea_query::SqliteQueryBuilder);
        assert!(sql.starts_with(r#"UPDATE "smart_links" SET "view_count" = "#));
        assert!(sql.contains("CASE WHEN"));
        assert!(sql.contains(r#""id" IN (1, 5)"#));
    }
}
