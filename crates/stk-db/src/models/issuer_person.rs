//! Person records parsed from issuer extracts.

use chrono::NaiveDate;
use sqlx::FromRow;

/// One parsed issuer-extract line (an issued card).
#[derive(Debug, Clone, FromRow)]
pub struct IssuerPerson {
    pub id: i64,
    pub batch_id: i64,
    pub snils: String,
    pub family: String,
    pub given: String,
    pub patronymic: String,
    /// The date the card became ready for hand-out.
    pub date: Option<NaiveDate>,
    pub number: String,
    pub errors: Option<Vec<String>>,
}

/// Input for bulk creation.
#[derive(Debug, Clone, Default)]
pub struct NewIssuerPerson {
    pub snils: String,
    pub family: String,
    pub given: String,
    pub patronymic: String,
    pub date: Option<NaiveDate>,
    pub number: String,
    pub errors: Vec<String>,
}

impl IssuerPerson {
    /// Bulk-insert parsed records under one batch; callers supply the
    /// enclosing transaction.
    pub async fn create_many(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        batch_id: i64,
        records: &[NewIssuerPerson],
    ) -> Result<(), sqlx::Error> {
        for r in records {
            let errors = if r.errors.is_empty() {
                None
            } else {
                Some(&r.errors)
            };
            sqlx::query(
                r"
                INSERT INTO issuer_persons (batch_id, snils, family, given, patronymic, date, number, errors)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(batch_id)
            .bind(&r.snils)
            .bind(&r.family)
            .bind(&r.given)
            .bind(&r.patronymic)
            .bind(r.date)
            .bind(&r.number)
            .bind(errors)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
