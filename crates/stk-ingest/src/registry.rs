//! Registry-extract parser.
//!
//! Pipe-delimited lines, exactly 13 fields:
//! snils | birthdate | family | given | patronymic | year | semester |
//! category | count | spent | date | cashier id | cashier name.
//!
//! Field failures are collected per record; a line with the wrong column
//! count is logged and dropped without aborting the document. The identity
//! group goes through the corrector before its errors are finalized.

use tracing::warn;

use stk_core::validate;
use stk_db::models::NewRegistryPerson;

use crate::corrector::{repair_identity, CorrectionSource, IdentityErrors};
use crate::text::decode_windows_1251;

const FIELD_COUNT: usize = 13;

/// Parse one windows-1251 registry document into person records.
pub async fn parse_document<C>(raw: &[u8], corrections: &C) -> Vec<NewRegistryPerson>
where
    C: CorrectionSource + ?Sized,
{
    let text = decode_windows_1251(raw);
    let mut records = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(line, corrections).await {
            Some(record) => records.push(record),
            None => warn!(line, "dropping registry line with wrong field count"),
        }
    }

    records
}

async fn parse_row<C>(line: &str, corrections: &C) -> Option<NewRegistryPerson>
where
    C: CorrectionSource + ?Sized,
{
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != FIELD_COUNT {
        return None;
    }

    let mut record = NewRegistryPerson::default();
    let mut identity = IdentityErrors::default();

    match validate::snils(fields[0]) {
        Ok(v) => record.snils = v,
        Err(e) => identity.snils = Some(e),
    }
    match validate::date(fields[1]) {
        Ok(v) => record.birthdate = Some(v),
        Err(e) => identity.birthdate = Some(e),
    }
    match validate::non_empty("family", fields[2]) {
        Ok(v) => record.family = v,
        Err(e) => identity.family = Some(e),
    }
    match validate::non_empty("given", fields[3]) {
        Ok(v) => record.given = v,
        Err(e) => identity.given = Some(e),
    }
    match validate::non_empty("patronymic", fields[4]) {
        Ok(v) => record.patronymic = v,
        Err(e) => identity.patronymic = Some(e),
    }

    if identity.any() {
        repair_identity(&mut record, &mut identity, corrections).await;
    }
    identity.collect_into(&mut record.errors);

    match validate::year(fields[5]) {
        Ok(v) => record.year = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::semester(fields[6]) {
        Ok(v) => record.semester = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::non_empty("category", fields[7]) {
        Ok(v) => record.category = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::integer("count", fields[8]) {
        Ok(v) => record.count = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::integer("spent", fields[9]) {
        Ok(v) => record.spent = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::date(fields[10]) {
        Ok(v) => record.date = Some(v),
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::integer("cashier_id", fields[11]) {
        Ok(v) => record.cashier_id = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::non_empty("cashier_name", fields[12]) {
        Ok(v) => record.cashier_name = v,
        Err(e) => record.errors.push(e.to_string()),
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use encoding_rs::WINDOWS_1251;

    use super::*;
    use crate::corrector::testing::MemoryCorrections;
    use stk_db::models::CorrectPerson;

    fn encode(text: &str) -> Vec<u8> {
        WINDOWS_1251.encode(text).0.into_owned()
    }

    const VALID_ROW: &str =
        "11223344595|01.05.1960|Иванов|Иван|Иванович|2022|1|оранжевая|10|500|15.03.2022|12|Петрова А.А.";

    #[tokio::test]
    async fn parses_clean_row() {
        let records = parse_document(&encode(VALID_ROW), &MemoryCorrections::default()).await;
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.errors.is_empty());
        assert_eq!(r.snils, "11223344595");
        assert_eq!(r.birthdate, NaiveDate::from_ymd_opt(1960, 5, 1));
        assert_eq!(r.family, "Иванов");
        assert_eq!(r.given, "Иван");
        assert_eq!(r.patronymic, "Иванович");
        assert_eq!(r.year, 2022);
        assert_eq!(r.semester, 1);
        assert_eq!(r.category, "оранжевая");
        assert_eq!(r.count, 10);
        assert_eq!(r.spent, 500);
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2022, 3, 15));
        assert_eq!(r.cashier_id, 12);
        assert_eq!(r.cashier_name, "Петрова А.А.");
    }

    #[tokio::test]
    async fn wrong_column_count_is_dropped() {
        let doc = format!("a|b|c\n{VALID_ROW}\n");
        let records = parse_document(&encode(&doc), &MemoryCorrections::default()).await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let doc = format!("\n\n{VALID_ROW}\n\n");
        let records = parse_document(&encode(&doc), &MemoryCorrections::default()).await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn field_failures_are_collected_not_fatal() {
        let row =
            "11223344595|01.05.1960|Иванов|Иван|Иванович|22|5|оранжевая|x|500|15.03.2022|12|Петрова";
        let records = parse_document(&encode(row), &MemoryCorrections::default()).await;
        assert_eq!(records.len(), 1);
        let r = &records[0];
        // year, semester and count failed; the record survives with data.
        assert_eq!(r.errors.len(), 3);
        assert_eq!(r.spent, 500);
    }

    #[tokio::test]
    async fn corrector_repairs_name_group_from_snils() {
        let corrections = MemoryCorrections {
            entries: vec![CorrectPerson {
                snils: "11223344595".to_string(),
                family: "Иванов".to_string(),
                given: "Иван".to_string(),
                patronymic: "Иванович".to_string(),
                birthdate: NaiveDate::from_ymd_opt(1960, 5, 1).unwrap(),
            }],
        };
        // Birthdate and family are broken, snils is valid.
        let row = "11223344595|xx.xx.xxxx||Иван|Иванович|2022|1|оранжевая|10|500|15.03.2022|12|Петрова";
        let records = parse_document(&encode(row), &corrections).await;
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.errors.is_empty());
        assert_eq!(r.family, "Иванов");
        assert_eq!(r.birthdate, NaiveDate::from_ymd_opt(1960, 5, 1));
    }

    #[tokio::test]
    async fn uncorrectable_row_keeps_its_errors() {
        let row = "123|xx.xx.xxxx|Иванов|Иван|Иванович|2022|1|оранжевая|10|500|15.03.2022|12|Петрова";
        let records = parse_document(&encode(row), &MemoryCorrections::default()).await;
        let r = &records[0];
        // birthdate first, then snils, in document field order.
        assert_eq!(r.errors.len(), 2);
        assert!(r.errors[0].contains("date"));
        assert!(r.errors[1].contains("snils"));
    }
}
