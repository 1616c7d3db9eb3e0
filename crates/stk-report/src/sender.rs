//! SMTP delivery of rendered reports.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::error::ReportError;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A rendered report ready for delivery.
#[derive(Debug, Clone)]
pub struct Report {
    pub filename: String,
    pub subject: String,
    pub body: String,
    /// The xlsx file contents.
    pub attachment: Vec<u8>,
}

/// Delivery boundary, so the workflow can be exercised without a mail server.
#[async_trait]
pub trait ReportDelivery: Send + Sync {
    async fn deliver(&self, report: &Report) -> Result<(), ReportError>;
}

/// SMTP settings for the outbound mailbox.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: Mailbox,
    pub recipients: Vec<Mailbox>,
}

/// Sends reports through a plaintext SMTP session, one message per recipient
/// list, report attached as xlsx.
pub struct SmtpDelivery {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpDelivery {
    #[must_use]
    pub fn new(config: SmtpConfig) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();
        Self {
            transport,
            from: config.from,
            recipients: config.recipients,
        }
    }
}

#[async_trait]
impl ReportDelivery for SmtpDelivery {
    async fn deliver(&self, report: &Report) -> Result<(), ReportError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(&report.subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        let attachment = Attachment::new(report.filename.clone()).body(
            report.attachment.clone(),
            ContentType::parse(XLSX_MIME).map_err(|e| ReportError::Delivery(e.to_string()))?,
        );
        let message = builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(report.body.clone()))
                .singlepart(attachment),
        )?;

        self.transport.send(message).await?;
        info!(filename = %report.filename, recipients = self.recipients.len(), "report delivered");
        Ok(())
    }
}
