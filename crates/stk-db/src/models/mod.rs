//! Database models, one module per entity.

pub mod correct_person;
pub mod email;
pub mod issuer_batch;
pub mod issuer_person;
pub mod registry_batch;
pub mod registry_person;
pub mod reported_mark;

pub use correct_person::CorrectPerson;
pub use email::{CreateEmail, Email};
pub use issuer_batch::{CreateIssuerBatch, IssuerBatch, IssuerBatchInfo};
pub use issuer_person::{IssuerPerson, NewIssuerPerson};
pub use registry_batch::{IngestStats, RegistryBatch, RegistryBatchInfo};
pub use registry_person::{CorrectedRow, IncorrectRow, NewRegistryPerson, RegistryPerson};
pub use reported_mark::{ReportRow, ReportedMark};
