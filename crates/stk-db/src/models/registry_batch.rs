//! Registry-extract attachment batches.
//!
//! One row per attachment extracted from a registry email. Batches are
//! append-only; person records reference their batch.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// An attachment extracted from a registry email.
#[derive(Debug, Clone, FromRow)]
pub struct RegistryBatch {
    pub id: i64,
    pub email_id: i64,
    pub filename: String,
}

/// Per-batch summary for the review views: line count plus the rows that
/// still carry validation errors, as JSON.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct RegistryBatchInfo {
    pub id: i64,
    pub received_at: DateTime<Utc>,
    pub parsed_at: DateTime<Utc>,
    pub lines: i64,
    pub incorrect: serde_json::Value,
}

/// Aggregate counters over the whole ingested data set.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct IngestStats {
    pub batches: i64,
    pub sales: i64,
    pub quantity: i64,
    pub amount: i64,
    pub persons: i64,
    pub issuer_batches: i64,
    pub cards: i64,
}

impl RegistryBatch {
    /// Persist a new attachment batch.
    pub async fn create<'e, E>(
        executor: E,
        email_id: i64,
        filename: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            INSERT INTO registry_batches (email_id, filename)
            VALUES ($1, $2)
            RETURNING *
            ",
        )
        .bind(email_id)
        .bind(filename)
        .fetch_one(executor)
        .await
    }

    /// Per-batch summaries, newest first.
    pub async fn get_info<'e, E>(executor: E) -> Result<Vec<RegistryBatchInfo>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT rb.id,
                   e.received_at,
                   e.parsed_at,
                   COALESCE((SELECT COUNT(*) FROM registry_persons rp WHERE rp.batch_id = rb.id), 0) AS lines,
                   COALESCE((SELECT to_json(array_agg(row_to_json(d)))
                             FROM (SELECT rp.id,
                                          rp.snils,
                                          rp.birthdate,
                                          rp.family || ' ' || rp.given || ' ' || rp.patronymic AS full_name,
                                          rp.errors
                                   FROM registry_persons rp
                                   WHERE rp.batch_id = rb.id
                                     AND rp.errors IS NOT NULL) d), '[]') AS incorrect
            FROM registry_batches rb
                     LEFT JOIN emails e ON e.id = rb.email_id
            ORDER BY e.received_at DESC
            ",
        )
        .fetch_all(executor)
        .await
    }

    /// Aggregate counters across both feeds.
    pub async fn get_stats<'e, E>(executor: E) -> Result<IngestStats, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r#"
            SELECT COALESCE((SELECT COUNT(*) FROM registry_batches), 0)                              AS batches,
                   COALESCE((SELECT COUNT(*) FROM registry_persons), 0)                              AS sales,
                   COALESCE((SELECT SUM(count) FROM registry_persons), 0)::BIGINT                    AS quantity,
                   COALESCE((SELECT SUM(spent) FROM registry_persons), 0)::BIGINT                    AS amount,
                   COALESCE((SELECT COUNT(DISTINCT snils) FROM registry_persons WHERE snils != ''), 0) AS persons,
                   COALESCE((SELECT COUNT(*) FROM issuer_batches), 0)                                AS issuer_batches,
                   COALESCE((SELECT COUNT(*) FROM issuer_persons), 0)                                AS cards
            "#,
        )
        .fetch_one(executor)
        .await
    }
}
