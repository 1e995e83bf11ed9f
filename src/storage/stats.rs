//! Aggregate queries over persisted outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// Per-backend totals read back from the outcome log.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BackendRow {
    pub backend: String,
    pub request_count: i64,
    pub success_count: i64,
    pub total_cost: f64,
    pub total_tokens: i64,
    pub avg_latency_secs: f64,
}

/// Aggregate outcomes per backend, optionally only those at or after `since`.
///
/// Rows store UTC RFC 3339 text, so `since` is bound in the same form for
/// the comparison to hold.
///
/// Uses `TOTAL()` for sums and `COALESCE(AVG(), 0)` for latency so empty
/// groups never produce NULL.
pub async fn query_by_backend(
    pool: &SqlitePool,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<BackendRow>, sqlx::Error> {
    let mut sql = String::from(
        "SELECT \
         backend, \
         COUNT(*) as request_count, \
         COUNT(CASE WHEN success = 1 THEN 1 END) as success_count, \
         TOTAL(cost) as total_cost, \
         CAST(TOTAL(tokens) AS INTEGER) as total_tokens, \
         COALESCE(AVG(latency_secs), 0) as avg_latency_secs \
         FROM outcomes",
    );

    if since.is_some() {
        sql.push_str(" WHERE timestamp >= ?");
    }

    sql.push_str(" GROUP BY backend ORDER BY backend");

    let mut query = sqlx::query_as::<_, BackendRow>(&sql);
    if let Some(since) = since {
        query = query.bind(since.to_rfc3339());
    }

    query.fetch_all(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::OutcomeRecord;
    use crate::storage::{memory_pool, OutcomeLog};
    use std::time::Duration;

    async fn insert(pool: &SqlitePool, record: OutcomeRecord) {
        OutcomeLog::from(&record).insert(pool).await.unwrap();
    }

    fn at(timestamp: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(timestamp)
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn insert_at(pool: &SqlitePool, timestamp: &str) {
        let mut record = OutcomeRecord::success("groq", "m", Duration::ZERO, 1, 0.0);
        record.timestamp = at(timestamp);
        insert(pool, record).await;
    }

    #[tokio::test]
    async fn test_empty_table() {
        let pool = memory_pool().await;
        assert!(query_by_backend(&pool, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_groups_per_backend() {
        let pool = memory_pool().await;
        insert(
            &pool,
            OutcomeRecord::success("groq", "m", Duration::from_secs(1), 100, 0.01),
        )
        .await;
        insert(
            &pool,
            OutcomeRecord::success("groq", "m", Duration::from_secs(3), 300, 0.03),
        )
        .await;
        insert(
            &pool,
            OutcomeRecord::failure("claude", "m", Duration::from_secs(2), "503"),
        )
        .await;

        let rows = query_by_backend(&pool, None).await.unwrap();
        assert_eq!(rows.len(), 2);

        let claude = &rows[0];
        assert_eq!(claude.backend, "claude");
        assert_eq!(claude.request_count, 1);
        assert_eq!(claude.success_count, 0);
        assert_eq!(claude.total_tokens, 0);

        let groq = &rows[1];
        assert_eq!(groq.request_count, 2);
        assert_eq!(groq.success_count, 2);
        assert_eq!(groq.total_tokens, 400);
        assert!((groq.total_cost - 0.04).abs() < 1e-9);
        assert!((groq.avg_latency_secs - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_since_filter() {
        let pool = memory_pool().await;
        let mut old = OutcomeRecord::success("groq", "m", Duration::ZERO, 1, 0.0);
        old.timestamp = "2020-01-01T00:00:00Z".parse().unwrap();
        insert(&pool, old).await;
        insert(
            &pool,
            OutcomeRecord::success("groq", "m", Duration::ZERO, 1, 0.0),
        )
        .await;

        let rows = query_by_backend(&pool, Some(at("2024-01-01T00:00:00+00:00")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_count, 1);
    }

    #[tokio::test]
    async fn test_since_with_zulu_suffix_includes_boundary() {
        let pool = memory_pool().await;
        insert_at(&pool, "2026-01-01T01:59:59Z").await;
        insert_at(&pool, "2026-01-01T02:00:00Z").await;
        insert_at(&pool, "2026-01-01T02:00:00.5Z").await;

        let rows = query_by_backend(&pool, Some(at("2026-01-01T02:00:00Z")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_count, 2);
    }

    #[tokio::test]
    async fn test_since_with_offset_is_compared_in_utc() {
        let pool = memory_pool().await;
        insert_at(&pool, "2026-01-01T00:30:00Z").await;
        insert_at(&pool, "2026-01-01T02:00:00Z").await;

        // 06:00 at +05:00 is 01:00 UTC
        let rows = query_by_backend(&pool, Some(at("2026-01-01T06:00:00+05:00")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_count, 1);
    }
}
