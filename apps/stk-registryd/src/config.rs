//! Application configuration loaded from environment variables.
//!
//! Fail-fast loading with validation: required variables must be present and
//! valid or the daemon exits with a clear error message before any connection
//! is opened.

use std::env;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use stk_ingest::MailboxPurpose;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to parse port: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),
}

/// Mailbox and SMTP settings, one account for both directions.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub pop3_port: u16,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// Only messages from this address are ingested.
    pub expected_from: String,
    /// Which extract format the polled mailbox carries.
    pub purpose: MailboxPurpose,
    /// Sender address of the outbound report.
    pub report_from: String,
    /// Report recipients, comma-separated in `EMAIL_TO`.
    pub recipients: Vec<String>,
}

/// Full daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub mail: MailConfig,
    /// Pause between mailbox poll cycles.
    pub poll_interval: Duration,
    /// Local wall-clock time of the daily report.
    pub report_at: NaiveTime,
    /// Watermark used while the message table is still empty.
    pub init_date: DateTime<Utc>,
    /// Heading printed on the report sheet.
    pub organization: String,
    pub rust_log: String,
}

fn require(var: &str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVar(var.to_string()))
}

fn invalid(var: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        message: message.into(),
    }
}

impl Config {
    /// Load and validate the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL")?;

        let host = require("EMAIL_HOST")?;
        let pop3_port: u16 = env::var("EMAIL_PORT_POP3")
            .unwrap_or_else(|_| "110".to_string())
            .parse()?;
        let smtp_port: u16 = env::var("EMAIL_PORT_SMTP")
            .unwrap_or_else(|_| "25".to_string())
            .parse()?;
        let username = require("EMAIL_USERNAME")?;
        let password = require("EMAIL_PASSWORD")?;
        let expected_from = require("EMAIL_FROM")?;

        let purpose = match env::var("MAILBOX_PURPOSE")
            .unwrap_or_else(|_| "registry".to_string())
            .to_lowercase()
            .as_str()
        {
            "registry" => MailboxPurpose::Registry,
            "issuer" => MailboxPurpose::Issuer,
            other => {
                return Err(invalid(
                    "MAILBOX_PURPOSE",
                    format!("expected 'registry' or 'issuer', got '{other}'"),
                ))
            }
        };

        let report_from = env::var("EMAIL_REPORT_FROM").unwrap_or_else(|_| username.clone());
        let recipients: Vec<String> = require("EMAIL_TO")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if recipients.is_empty() {
            return Err(invalid("EMAIL_TO", "at least one recipient is required"));
        }

        let minutes: u64 = env::var("EMAIL_CHECK_INTERVAL")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| invalid("EMAIL_CHECK_INTERVAL", "expected whole minutes"))?;
        if minutes == 0 {
            return Err(invalid("EMAIL_CHECK_INTERVAL", "must be at least 1 minute"));
        }

        let report_at_raw =
            env::var("EMAIL_SEND_REPORT_AT").unwrap_or_else(|_| "09:00".to_string());
        let report_at = NaiveTime::parse_from_str(&report_at_raw, "%H:%M")
            .map_err(|_| invalid("EMAIL_SEND_REPORT_AT", "expected HH:MM"))?;

        let init_date_raw = require("INIT_DATE")?;
        let init_date = NaiveDate::parse_from_str(&init_date_raw, "%d.%m.%Y")
            .map_err(|_| invalid("INIT_DATE", "expected dd.mm.yyyy"))?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| invalid("INIT_DATE", "not a valid date"))?
            .and_utc();

        let organization =
            env::var("ORGANIZATION").unwrap_or_else(|_| "МУП Транспорт".to_string());
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            database_url,
            mail: MailConfig {
                host,
                pop3_port,
                smtp_port,
                username,
                password,
                expected_from,
                purpose,
                report_from,
                recipients,
            },
            poll_interval: Duration::from_secs(minutes * 60),
            report_at,
            init_date,
            organization,
            rust_log,
        })
    }
}
