//! Ingestion error types.
//!
//! Field-level validation failures never show up here: they are collected
//! into the record's error list. These variants abort exactly one unit —
//! a document, a message, or the whole polling cycle.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors aborting an ingestion unit.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The first line of an issuer document matched no known header; the
    /// whole document is rejected.
    #[error("unknown document type: {first_line}")]
    UnknownDocumentType { first_line: String },

    /// Mailbox connect/auth/fetch failure; aborts the polling cycle or, for
    /// a single fetch, just that message.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Transaction or query failure; rolls back the current message.
    #[error(transparent)]
    Persistence(#[from] stk_db::DbError),
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Persistence(err.into())
    }
}
