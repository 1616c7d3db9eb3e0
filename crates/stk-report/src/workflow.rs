//! The report-and-mark workflow and the manual-correction workflow.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::time::timeout;
use tracing::info;

use stk_db::models::{RegistryPerson, ReportedMark};

use crate::error::ReportError;
use crate::excel;
use crate::sender::{Report, ReportDelivery};

/// Wall-clock budget for one report run, selection through delivery.
const TIME_BUDGET: Duration = Duration::from_secs(60);

/// Periodic outbound report of issued-but-unclaimed cards.
pub struct ReportWorkflow<D> {
    pool: PgPool,
    delivery: D,
    /// Heading printed on the report sheet.
    organization: String,
    time_budget: Duration,
}

impl<D: ReportDelivery> ReportWorkflow<D> {
    pub fn new(pool: PgPool, delivery: D, organization: String) -> Self {
        Self {
            pool,
            delivery,
            organization,
            time_budget: TIME_BUDGET,
        }
    }

    /// Override the wall-clock budget of one run.
    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// Select the eligible identities, mark them, render and deliver.
    ///
    /// Selection and marking run in one transaction that only commits after
    /// the report was handed to the mail server, so a render or delivery
    /// failure leaves every identity eligible for the next run. The whole
    /// run is bounded by the time budget; hitting it drops the transaction
    /// uncommitted. Returns the number of reported identities; an empty
    /// selection sends nothing.
    pub async fn send_due_report(&self) -> Result<usize, ReportError> {
        match timeout(self.time_budget, self.run()).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::TimedOut(self.time_budget)),
        }
    }

    async fn run(&self) -> Result<usize, ReportError> {
        let mut tx = self.pool.begin().await?;
        let rows = ReportedMark::select_and_mark(&mut tx).await?;
        if rows.is_empty() {
            tx.rollback().await?;
            info!("no identities eligible for reporting");
            return Ok(0);
        }

        let attachment = excel::render_report(&rows, &self.organization)?;
        let today = Utc::now().format("%d.%m.%Y");
        let report = Report {
            filename: format!("cards_{}.xlsx", Utc::now().format("%Y-%m-%d")),
            subject: format!("Социальные карты, готовые к выдаче, на {today}"),
            body: format!(
                "Во вложении список социальных карт, готовых к выдаче: {} шт.",
                rows.len()
            ),
            attachment,
        };
        self.delivery.deliver(&report).await?;

        tx.commit().await?;
        info!(reported = rows.len(), "report sent, identities marked");
        Ok(rows.len())
    }
}

/// Apply an operator-corrected spreadsheet to the stored records.
///
/// All accepted rows are applied in one transaction; rows the sheet parser
/// rejected are simply absent and stay flagged.
pub async fn apply_corrections(pool: &PgPool, sheet: &[u8]) -> Result<u64, ReportError> {
    let rows = excel::parse_corrections(sheet)?;
    let mut tx = pool.begin().await?;
    let mut updated = 0;
    for row in &rows {
        updated += RegistryPerson::update_from_correction(&mut *tx, row).await?;
    }
    tx.commit().await?;
    info!(updated, "manual corrections applied");
    Ok(updated)
}
