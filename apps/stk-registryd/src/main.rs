//! Card registry daemon.
//!
//! Polls a mailbox for sales-registry and card-issuer extracts, persists the
//! parsed records, and mails a daily spreadsheet of issued-but-unclaimed
//! cards. Both jobs run on the shared scheduler and stop on SIGINT.

mod config;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use lettre::message::Mailbox;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use config::Config;
use stk_ingest::{MailboxConfig, PgCorrectionSource, PgIngestStore, Pop3Client, Receiver};
use stk_report::{ReportWorkflow, SmtpConfig, SmtpDelivery};
use stk_scheduler::{DailyJob, PeriodicJob};

/// Delay before the first poll, so a crash loop cannot hammer the server.
const STARTUP_DELAY: Duration = Duration::from_secs(60);

fn parse_mailbox(raw: &str, what: &str) -> Mailbox {
    match raw.parse() {
        Ok(mailbox) => mailbox,
        Err(e) => {
            error!(address = raw, error = %e, "invalid {what} address");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values).
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    let pool = match stk_db::connect(&config.database_url, &stk_db::PoolConfig::default()).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "database connection failed");
            std::process::exit(1);
        }
    };
    if let Err(e) = stk_db::run_migrations(&pool).await {
        error!(error = %e, "database migration failed");
        std::process::exit(1);
    }
    info!("database ready");

    let receiver = Arc::new(Receiver::new(
        Pop3Client::new(
            config.mail.host.clone(),
            config.mail.pop3_port,
            config.mail.username.clone(),
            config.mail.password.clone(),
        ),
        PgIngestStore::new(pool.clone()),
        PgCorrectionSource::new(pool.clone()),
        MailboxConfig {
            expected_from: config.mail.expected_from.clone(),
            purpose: config.mail.purpose,
            init_date: config.init_date,
        },
    ));

    let from = parse_mailbox(&config.mail.report_from, "report sender");
    let recipients = config
        .mail
        .recipients
        .iter()
        .map(|r| parse_mailbox(r, "report recipient"))
        .collect();
    let workflow = Arc::new(ReportWorkflow::new(
        pool.clone(),
        SmtpDelivery::new(SmtpConfig {
            host: config.mail.host.clone(),
            port: config.mail.smtp_port,
            username: config.mail.username.clone(),
            password: config.mail.password.clone(),
            from,
            recipients,
        }),
        config.organization.clone(),
    ));

    let cancel = CancellationToken::new();

    let poll_job = {
        let receiver = receiver.clone();
        PeriodicJob::new("mailbox-poll", STARTUP_DELAY, config.poll_interval).spawn(
            cancel.clone(),
            move || {
                let receiver = receiver.clone();
                async move {
                    match receiver.poll_cycle().await {
                        Ok(true) => info!("poll cycle stored new messages"),
                        Ok(false) => debug!("poll cycle found nothing new"),
                        Err(e) => error!(error = %e, "poll cycle failed"),
                    }
                }
            },
        )
    };

    let report_job = {
        let workflow = workflow.clone();
        DailyJob::new("daily-report", config.report_at).spawn(cancel.clone(), move || {
            let workflow = workflow.clone();
            async move {
                match workflow.send_due_report().await {
                    Ok(0) => debug!("nothing to report"),
                    Ok(reported) => info!(reported, "daily report sent"),
                    Err(e) => error!(error = %e, "daily report failed"),
                }
            }
        })
    };

    info!(
        poll_interval = ?config.poll_interval,
        report_at = %config.report_at,
        "daemon started"
    );

    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }

    cancel.cancel();
    let _ = poll_job.await;
    let _ = report_job.await;
    pool.close().await;
    info!("shutdown complete");
}
