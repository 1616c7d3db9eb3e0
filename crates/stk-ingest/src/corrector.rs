//! Identity correction against the trusted table.
//!
//! Consulted only when a record's identity group (snils, birthdate, name
//! parts) partially failed validation. One pass, one dimension: either the
//! identifier vouches for the name/birthdate group or the group vouches for
//! the identifier, never both. A record failing in both dimensions is left
//! for manual correction.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::warn;

use stk_core::ValidationError;
use stk_db::models::{CorrectPerson, NewRegistryPerson};
use stk_db::DbError;

/// Lookup boundary over the trusted correction table.
#[async_trait]
pub trait CorrectionSource: Send + Sync {
    async fn find_by_snils(&self, snils: &str) -> Result<Option<CorrectPerson>, DbError>;

    async fn find_by_identity(
        &self,
        family: &str,
        given: &str,
        patronymic: &str,
        birthdate: NaiveDate,
    ) -> Result<Option<CorrectPerson>, DbError>;
}

/// Postgres-backed correction source.
pub struct PgCorrectionSource {
    pool: PgPool,
}

impl PgCorrectionSource {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CorrectionSource for PgCorrectionSource {
    async fn find_by_snils(&self, snils: &str) -> Result<Option<CorrectPerson>, DbError> {
        Ok(CorrectPerson::find_by_snils(&self.pool, snils).await?)
    }

    async fn find_by_identity(
        &self,
        family: &str,
        given: &str,
        patronymic: &str,
        birthdate: NaiveDate,
    ) -> Result<Option<CorrectPerson>, DbError> {
        Ok(CorrectPerson::find_by_identity(&self.pool, family, given, patronymic, birthdate).await?)
    }
}

/// Validation outcome of the identity group of one record.
#[derive(Debug, Default)]
pub struct IdentityErrors {
    pub snils: Option<ValidationError>,
    pub birthdate: Option<ValidationError>,
    pub family: Option<ValidationError>,
    pub given: Option<ValidationError>,
    pub patronymic: Option<ValidationError>,
}

impl IdentityErrors {
    /// Any of the name/birthdate fields failed.
    #[must_use]
    pub fn group_failed(&self) -> bool {
        self.birthdate.is_some()
            || self.family.is_some()
            || self.given.is_some()
            || self.patronymic.is_some()
    }

    /// At least one identity field failed.
    #[must_use]
    pub fn any(&self) -> bool {
        self.snils.is_some() || self.group_failed()
    }

    /// Drain the remaining errors into a record's error list, in document
    /// field order (birthdate, family, given, patronymic, snils).
    pub fn collect_into(self, errors: &mut Vec<String>) {
        for err in [
            self.birthdate,
            self.family,
            self.given,
            self.patronymic,
            self.snils,
        ]
        .into_iter()
        .flatten()
        {
            errors.push(err.to_string());
        }
    }
}

/// Best-effort single-pass repair of a record's identity fields.
///
/// Overwrites the repaired fields on the record and clears the matching
/// errors; anything it cannot repair stays in `errs` verbatim. Lookup
/// failures are logged and treated as "no correction found".
pub async fn repair_identity<C: CorrectionSource + ?Sized>(
    record: &mut NewRegistryPerson,
    errs: &mut IdentityErrors,
    source: &C,
) {
    if errs.snils.is_none() && errs.group_failed() {
        // The identifier vouches for the name/birthdate group.
        match source.find_by_snils(&record.snils).await {
            Ok(Some(trusted)) => {
                record.birthdate = Some(trusted.birthdate);
                record.family = trusted.family;
                record.given = trusted.given;
                record.patronymic = trusted.patronymic;
                errs.birthdate = None;
                errs.family = None;
                errs.given = None;
                errs.patronymic = None;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, snils = %record.snils, "correction lookup failed"),
        }
    } else if errs.snils.is_some() && !errs.group_failed() {
        // The name/birthdate group vouches for the identifier.
        let Some(birthdate) = record.birthdate else {
            return;
        };
        match source
            .find_by_identity(&record.family, &record.given, &record.patronymic, birthdate)
            .await
        {
            Ok(Some(trusted)) => {
                record.snils = trusted.snils;
                errs.snils = None;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "correction lookup failed"),
        }
    }
}
