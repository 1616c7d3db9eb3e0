//! Outbound reporting for issued-but-unclaimed cards.
//!
//! [`workflow`] selects the eligible identities and marks them reported in
//! one transaction, [`excel`] renders the spreadsheet, [`sender`] delivers it
//! over SMTP. Delivery happens before the transaction commits, so a render or
//! send failure rolls the marks back and the identities stay eligible for the
//! next run.

pub mod error;
pub mod excel;
pub mod sender;
pub mod workflow;

pub use error::ReportError;
pub use sender::{Report, ReportDelivery, SmtpConfig, SmtpDelivery};
pub use workflow::ReportWorkflow;
