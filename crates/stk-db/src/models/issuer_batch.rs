//! Issuer-extract batches.
//!
//! One row per issuer document (social or bank card list). Deleting a batch
//! cascades to its person records, so a corrected file can be re-ingested.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// One ingested issuer document.
#[derive(Debug, Clone, FromRow)]
pub struct IssuerBatch {
    pub id: i64,
    /// 1 = social card list, 2 = bank card list.
    pub type_id: i32,
    pub uploaded_at: DateTime<Utc>,
    /// The effective date the document covers.
    pub from_date: NaiveDate,
}

/// Input for creating a batch.
#[derive(Debug, Clone)]
pub struct CreateIssuerBatch {
    pub type_id: i32,
    pub from_date: NaiveDate,
}

/// Per-batch summary for the review views.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct IssuerBatchInfo {
    pub id: i64,
    pub type_id: i32,
    pub uploaded_at: DateTime<Utc>,
    pub from_date: NaiveDate,
    pub lines: i64,
    pub errors: serde_json::Value,
}

impl IssuerBatch {
    /// Persist a new issuer batch.
    pub async fn create<'e, E>(executor: E, input: CreateIssuerBatch) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            INSERT INTO issuer_batches (type_id, from_date)
            VALUES ($1, $2)
            RETURNING *
            ",
        )
        .bind(input.type_id)
        .bind(input.from_date)
        .fetch_one(executor)
        .await
    }

    /// Delete a batch together with its person records (cascade).
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let result = sqlx::query("DELETE FROM issuer_batches WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Per-batch summaries, newest first.
    pub async fn get_info<'e, E>(executor: E) -> Result<Vec<IssuerBatchInfo>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT ib.id,
                   ib.type_id,
                   ib.uploaded_at,
                   ib.from_date,
                   COALESCE((SELECT COUNT(*) FROM issuer_persons ip WHERE ip.batch_id = ib.id), 0) AS lines,
                   COALESCE((SELECT to_json(array_agg(row_to_json(d)))
                             FROM (SELECT ip.id,
                                          ip.snils,
                                          ip.family || ' ' || ip.given || ' ' || ip.patronymic AS full_name,
                                          ip.errors
                                   FROM issuer_persons ip
                                   WHERE ip.batch_id = ib.id
                                     AND ip.errors IS NOT NULL) d), '[]') AS errors
            FROM issuer_batches ib
            ORDER BY ib.uploaded_at DESC
            ",
        )
        .fetch_all(executor)
        .await
    }
}
