//! The trusted correction table.
//!
//! Read-only to the ingestion core: rows are maintained out of band and only
//! consulted by the identity corrector.

use chrono::NaiveDate;
use sqlx::FromRow;

/// A trusted (snils, name parts, birthdate) tuple.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CorrectPerson {
    pub snils: String,
    pub family: String,
    pub given: String,
    pub patronymic: String,
    pub birthdate: NaiveDate,
}

impl CorrectPerson {
    /// Look up a trusted entry by identifier.
    pub async fn find_by_snils<'e, E>(executor: E, snils: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT snils, family, given, patronymic, birthdate
            FROM correct_persons
            WHERE snils = $1
            ",
        )
        .bind(snils)
        .fetch_optional(executor)
        .await
    }

    /// Look up a trusted entry by exact name parts and birthdate.
    pub async fn find_by_identity<'e, E>(
        executor: E,
        family: &str,
        given: &str,
        patronymic: &str,
        birthdate: NaiveDate,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT snils, family, given, patronymic, birthdate
            FROM correct_persons
            WHERE family = $1
              AND given = $2
              AND patronymic = $3
              AND birthdate = $4
            ",
        )
        .bind(family)
        .bind(given)
        .bind(patronymic)
        .bind(birthdate)
        .fetch_optional(executor)
        .await
    }
}
