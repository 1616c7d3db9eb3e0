//! Person records parsed from registry extracts.
//!
//! Created in bulk inside the poller's per-message transaction. A record is
//! never mutated afterwards except by the correction workflow, which
//! overwrites the repaired fields and clears the error list in one statement.

use chrono::NaiveDate;
use sqlx::FromRow;

/// One parsed registry-extract line.
#[derive(Debug, Clone, FromRow)]
pub struct RegistryPerson {
    pub id: i64,
    pub batch_id: i64,
    pub snils: String,
    pub birthdate: Option<NaiveDate>,
    pub family: String,
    pub given: String,
    pub patronymic: String,
    pub year: i32,
    pub semester: i32,
    pub category: String,
    pub count: i32,
    pub spent: i32,
    pub date: Option<NaiveDate>,
    pub cashier_id: i32,
    pub cashier_name: String,
    /// Validation-error messages; `None` means the record is clean.
    pub errors: Option<Vec<String>>,
}

/// Input for bulk creation; the batch id is supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct NewRegistryPerson {
    pub snils: String,
    pub birthdate: Option<NaiveDate>,
    pub family: String,
    pub given: String,
    pub patronymic: String,
    pub year: i32,
    pub semester: i32,
    pub category: String,
    pub count: i32,
    pub spent: i32,
    pub date: Option<NaiveDate>,
    pub cashier_id: i32,
    pub cashier_name: String,
    pub errors: Vec<String>,
}

/// A record still carrying errors, for the manual-correction views.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct IncorrectRow {
    pub id: i64,
    pub snils: String,
    pub birthdate: Option<NaiveDate>,
    pub full_name: String,
    pub errors: Vec<String>,
}

/// A manually corrected row coming back from the correction spreadsheet.
#[derive(Debug, Clone)]
pub struct CorrectedRow {
    pub id: i64,
    pub family: String,
    pub given: String,
    pub patronymic: String,
    pub birthdate: NaiveDate,
    pub snils: String,
}

impl RegistryPerson {
    /// Bulk-insert parsed records under one batch.
    ///
    /// Runs one statement per record; callers wrap this in the message-level
    /// transaction, so a failure rolls the whole message back.
    pub async fn create_many(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        batch_id: i64,
        records: &[NewRegistryPerson],
    ) -> Result<(), sqlx::Error> {
        for r in records {
            let errors = if r.errors.is_empty() {
                None
            } else {
                Some(&r.errors)
            };
            sqlx::query(
                r"
                INSERT INTO registry_persons (batch_id, snils, birthdate, family, given, patronymic,
                                              year, semester, category, count, spent, date,
                                              cashier_id, cashier_name, errors)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                ",
            )
            .bind(batch_id)
            .bind(&r.snils)
            .bind(r.birthdate)
            .bind(&r.family)
            .bind(&r.given)
            .bind(&r.patronymic)
            .bind(r.year)
            .bind(r.semester)
            .bind(&r.category)
            .bind(r.count)
            .bind(r.spent)
            .bind(r.date)
            .bind(r.cashier_id)
            .bind(&r.cashier_name)
            .bind(errors)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// All records still carrying validation errors.
    pub async fn incorrect_rows<'e, E>(executor: E) -> Result<Vec<IncorrectRow>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT id,
                   snils,
                   birthdate,
                   family || ' ' || given || ' ' || patronymic AS full_name,
                   errors
            FROM registry_persons
            WHERE errors IS NOT NULL
            ORDER BY id
            ",
        )
        .fetch_all(executor)
        .await
    }

    /// Apply a manually corrected row: overwrite the identity fields and
    /// clear the error list.
    pub async fn update_from_correction<'e, E>(
        executor: E,
        row: &CorrectedRow,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let result = sqlx::query(
            r"
            UPDATE registry_persons
            SET family     = $2,
                given      = $3,
                patronymic = $4,
                birthdate  = $5,
                snils      = $6,
                errors     = NULL
            WHERE id = $1
            ",
        )
        .bind(row.id)
        .bind(&row.family)
        .bind(&row.given)
        .bind(&row.patronymic)
        .bind(row.birthdate)
        .bind(&row.snils)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
