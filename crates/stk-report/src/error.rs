use thiserror::Error;

/// Failures of the report and correction workflows.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Spreadsheet rendering failed.
    #[error("report rendering failed: {0}")]
    Render(#[from] rust_xlsxwriter::XlsxError),

    /// A correction spreadsheet could not be read back.
    #[error("correction spreadsheet unreadable: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    /// The report could not be handed to the mail server.
    #[error("report delivery failed: {0}")]
    Delivery(String),

    /// A run exceeded its wall-clock budget and was abandoned uncommitted.
    #[error("report run exceeded its time budget of {0:?}")]
    TimedOut(std::time::Duration),

    #[error(transparent)]
    Persistence(#[from] stk_db::DbError),
}

impl From<sqlx::Error> for ReportError {
    fn from(err: sqlx::Error) -> Self {
        ReportError::Persistence(err.into())
    }
}

impl From<lettre::transport::smtp::Error> for ReportError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        ReportError::Delivery(err.to_string())
    }
}

impl From<lettre::error::Error> for ReportError {
    fn from(err: lettre::error::Error) -> Self {
        ReportError::Delivery(err.to_string())
    }
}
