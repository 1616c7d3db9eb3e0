//! Persistence boundary for the poller.
//!
//! One message with all its attachment batches and person records is stored
//! atomically: the Postgres implementation opens a transaction, writes the
//! message, then every batch with its records, and commits. A failure on any
//! step rolls the whole message back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stk_db::models::{
    CreateEmail, CreateIssuerBatch, Email, IssuerBatch, IssuerPerson, NewIssuerPerson,
    NewRegistryPerson, RegistryBatch, RegistryPerson,
};
use stk_db::DbError;

use crate::issuer::IssuerDocKind;

/// One parsed attachment, ready for persistence.
#[derive(Debug)]
pub enum ParsedAttachment {
    Registry {
        filename: String,
        records: Vec<NewRegistryPerson>,
    },
    Issuer {
        kind: IssuerDocKind,
        from_date: chrono::NaiveDate,
        records: Vec<NewIssuerPerson>,
    },
}

impl ParsedAttachment {
    /// Number of person records the attachment yielded.
    #[must_use]
    pub fn record_count(&self) -> usize {
        match self {
            ParsedAttachment::Registry { records, .. } => records.len(),
            ParsedAttachment::Issuer { records, .. } => records.len(),
        }
    }
}

/// Store boundary consumed by the poller.
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// The watermark: the latest received timestamp already persisted.
    async fn watermark(&self) -> Result<Option<DateTime<Utc>>, DbError>;

    /// Persist one message with its parsed attachments, atomically.
    async fn store_message(
        &self,
        message: CreateEmail,
        attachments: Vec<ParsedAttachment>,
    ) -> Result<(), DbError>;
}

/// Postgres-backed ingest store.
pub struct PgIngestStore {
    pool: PgPool,
}

impl PgIngestStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IngestStore for PgIngestStore {
    async fn watermark(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        Ok(Email::last_received_at(&self.pool).await?)
    }

    async fn store_message(
        &self,
        message: CreateEmail,
        attachments: Vec<ParsedAttachment>,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let email = Email::create(&mut *tx, message).await?;

        for attachment in attachments {
            match attachment {
                ParsedAttachment::Registry { filename, records } => {
                    let batch = RegistryBatch::create(&mut *tx, email.id, &filename).await?;
                    RegistryPerson::create_many(&mut tx, batch.id, &records).await?;
                }
                ParsedAttachment::Issuer {
                    kind,
                    from_date,
                    records,
                } => {
                    let batch = IssuerBatch::create(
                        &mut *tx,
                        CreateIssuerBatch {
                            type_id: kind.type_id(),
                            from_date,
                        },
                    )
                    .await?;
                    IssuerPerson::create_many(&mut tx, batch.id, &records).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
