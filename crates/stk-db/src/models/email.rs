//! Polled mailbox messages.
//!
//! One row per message accepted from the remote mailbox. The maximum
//! `received_at` across the table is the polling watermark: a new cycle only
//! looks at messages strictly newer than it.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A raw message pulled from the mailbox, immutable once stored.
#[derive(Debug, Clone, FromRow)]
pub struct Email {
    pub id: i64,
    /// Source-type tag derived from the sender address (0 = unknown).
    pub type_id: i32,
    /// Message-ID header, the dedupe key.
    pub message_id: String,
    pub from_address: String,
    /// Date header of the message.
    pub received_at: DateTime<Utc>,
    /// When this service parsed the message.
    pub parsed_at: DateTime<Utc>,
    /// The raw RFC 822 bytes.
    pub file: Vec<u8>,
}

/// Input for persisting a new message.
#[derive(Debug, Clone)]
pub struct CreateEmail {
    pub type_id: i32,
    pub message_id: String,
    pub from_address: String,
    pub received_at: DateTime<Utc>,
    pub parsed_at: DateTime<Utc>,
    pub file: Vec<u8>,
}

impl Email {
    /// Persist a polled message.
    pub async fn create<'e, E>(executor: E, input: CreateEmail) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            INSERT INTO emails (type_id, message_id, from_address, received_at, parsed_at, file)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(input.type_id)
        .bind(&input.message_id)
        .bind(&input.from_address)
        .bind(input.received_at)
        .bind(input.parsed_at)
        .bind(&input.file)
        .fetch_one(executor)
        .await
    }

    /// The polling watermark: the latest stored `received_at`, if any.
    pub async fn last_received_at<'e, E>(executor: E) -> Result<Option<DateTime<Utc>>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r"
            SELECT received_at
            FROM emails
            ORDER BY received_at DESC
            LIMIT 1
            ",
        )
        .fetch_optional(executor)
        .await?;

        Ok(row.map(|r| r.0))
    }
}
