//! Reported marks and the outbound-report queries.
//!
//! A reported mark is append-only proof that an identity was already included
//! in an outbound report. `select_and_mark` evaluates the eligibility filter
//! and inserts the marks in a single statement, so selection and marking
//! share one snapshot and an identifier can never be reported twice even
//! across overlapping transactions.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Proof that an identity was reported, at most once per identifier.
#[derive(Debug, Clone, FromRow)]
pub struct ReportedMark {
    pub snils: String,
    pub marked_at: DateTime<Utc>,
}

/// One line of the outbound card-ready report.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct ReportRow {
    pub snils: String,
    pub full_name: String,
    pub date: Option<NaiveDate>,
}

// One row per identifier: the same person can appear in several issuer
// documents (or twice in one), and reported_marks keys on the snils.
const ELIGIBLE: &str = r"
    SELECT DISTINCT ON (ip.snils)
           ip.snils,
           ip.family || ' ' || ip.given || ' ' || ip.patronymic AS full_name,
           ip.date
    FROM issuer_persons ip
             LEFT JOIN registry_persons rp ON rp.snils = ip.snils
             LEFT JOIN reported_marks rm ON rm.snils = ip.snils
    WHERE rp.snils IS NULL -- already redeeming: the card stays unreported
      AND rm.snils IS NULL -- already reported earlier
";

impl ReportedMark {
    /// Select every report-eligible identity and mark it reported, in one
    /// statement. Callers run this inside the report transaction so a
    /// delivery failure before commit rolls the marks back.
    pub async fn select_and_mark(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Vec<ReportRow>, sqlx::Error> {
        let query = format!(
            r"
            WITH eligible AS ({ELIGIBLE}),
                 marked AS (
                     INSERT INTO reported_marks (snils, marked_at)
                         SELECT snils, CURRENT_TIMESTAMP
                         FROM eligible)
            SELECT snils, full_name, date
            FROM eligible
            "
        );
        sqlx::query_as(&query).fetch_all(&mut **tx).await
    }

    /// Read-only variant for ad-hoc reporting: same eligibility filter plus
    /// an inclusive card-ready date range, no marks written.
    pub async fn select_eligible<'e, E>(
        executor: E,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ReportRow>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let query = format!(
            r"
            {ELIGIBLE}
              AND ($1::date IS NULL OR ip.date >= $1)
              AND ($2::date IS NULL OR ip.date <= $2)
            "
        );
        sqlx::query_as(&query)
            .bind(from)
            .bind(to)
            .fetch_all(executor)
            .await
    }
}
