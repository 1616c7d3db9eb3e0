//! Document ingestion for the card registry.
//!
//! The pipeline: the [`receiver`] polls a POP-style mailbox newest-first,
//! stops at the watermark, extracts MIME attachments and routes each one to
//! the matching fixed-format parser ([`registry`] or [`issuer`]). Records
//! whose identity fields fail validation pass through the [`corrector`]
//! before their error lists are finalized. Everything belonging to one
//! message is persisted in a single transaction behind the [`store`]
//! boundary.

pub mod corrector;
pub mod error;
pub mod issuer;
pub mod receiver;
pub mod registry;
pub mod store;
pub mod text;
pub mod transport;

pub use corrector::{CorrectionSource, PgCorrectionSource};
pub use error::IngestError;
pub use receiver::{MailboxConfig, MailboxPurpose, Receiver};
pub use store::{IngestStore, ParsedAttachment, PgIngestStore};
pub use transport::{MailTransport, Pop3Client, TransportError};
