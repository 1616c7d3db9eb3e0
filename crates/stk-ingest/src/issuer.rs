//! Issuer-extract parser.
//!
//! Comma-delimited lines, exactly 4 fields: quoted full name (exactly three
//! space-separated tokens), snils, card-ready date, card number. The first
//! non-blank line is a header that classifies the whole document; an
//! unrecognized header rejects the document outright.

use tracing::warn;

use stk_core::validate;
use stk_db::models::NewIssuerPerson;

use crate::error::IngestError;
use crate::text::{decode_windows_1251, trim_field};

const FIELD_COUNT: usize = 4;
const NAME_TOKENS: usize = 3;

const SOCIAL_HEADER: &str = "список социальных карт";
const BANK_HEADER: &str = "список банковских карт";

/// Document classification taken from the header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuerDocKind {
    /// Social transit cards.
    Social,
    /// Bank-issued cards.
    Bank,
}

impl IssuerDocKind {
    /// Database type tag.
    #[must_use]
    pub fn type_id(self) -> i32 {
        match self {
            IssuerDocKind::Social => 1,
            IssuerDocKind::Bank => 2,
        }
    }
}

/// A fully parsed issuer document.
#[derive(Debug)]
pub struct IssuerDocument {
    pub kind: IssuerDocKind,
    pub records: Vec<NewIssuerPerson>,
}

/// Parse one windows-1251 issuer document.
///
/// Returns `UnknownDocumentType` when the header line matches neither known
/// card list; no records are produced in that case.
pub fn parse_document(raw: &[u8]) -> Result<IssuerDocument, IngestError> {
    let text = decode_windows_1251(raw);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next().unwrap_or_default();
    let kind = match header.trim().to_lowercase().as_str() {
        SOCIAL_HEADER => IssuerDocKind::Social,
        BANK_HEADER => IssuerDocKind::Bank,
        _ => {
            return Err(IngestError::UnknownDocumentType {
                first_line: header.to_string(),
            })
        }
    };

    let mut records = Vec::new();
    for line in lines {
        match parse_row(line) {
            Some(record) => records.push(record),
            None => warn!(line, "dropping malformed issuer line"),
        }
    }

    Ok(IssuerDocument { kind, records })
}

fn parse_row(line: &str) -> Option<NewIssuerPerson> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != FIELD_COUNT {
        return None;
    }

    let name_tokens: Vec<&str> = trim_field(fields[0]).split(' ').collect();
    if name_tokens.len() != NAME_TOKENS {
        return None;
    }

    let mut record = NewIssuerPerson::default();

    match validate::snils(trim_field(fields[1])) {
        Ok(v) => record.snils = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::non_empty("family", name_tokens[0]) {
        Ok(v) => record.family = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::non_empty("given", name_tokens[1]) {
        Ok(v) => record.given = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::non_empty("patronymic", name_tokens[2]) {
        Ok(v) => record.patronymic = v,
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::date(trim_field(fields[2])) {
        Ok(v) => record.date = Some(v),
        Err(e) => record.errors.push(e.to_string()),
    }
    match validate::non_empty("number", trim_field(fields[3])) {
        Ok(v) => record.number = v,
        Err(e) => record.errors.push(e.to_string()),
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use encoding_rs::WINDOWS_1251;

    use super::*;

    fn encode(text: &str) -> Vec<u8> {
        WINDOWS_1251.encode(text).0.into_owned()
    }

    const SOCIAL_DOC: &str =
        "Список социальных карт\nИванов Иван Иванович, 11223344595, 01.02.2020, 12345\n";

    #[test]
    fn social_header_classifies_type_one() {
        let doc = parse_document(&encode(SOCIAL_DOC)).unwrap();
        assert_eq!(doc.kind, IssuerDocKind::Social);
        assert_eq!(doc.kind.type_id(), 1);
        assert_eq!(doc.records.len(), 1);
    }

    #[test]
    fn bank_header_classifies_type_two() {
        let doc = parse_document(&encode("СПИСОК БАНКОВСКИХ КАРТ\n")).unwrap();
        assert_eq!(doc.kind, IssuerDocKind::Bank);
        assert_eq!(doc.kind.type_id(), 2);
        assert!(doc.records.is_empty());
    }

    #[test]
    fn unknown_header_rejects_document() {
        let err = parse_document(&encode("накладная №42\nстрока\n")).unwrap_err();
        assert!(matches!(err, IngestError::UnknownDocumentType { .. }));
    }

    #[test]
    fn empty_document_is_unknown() {
        assert!(matches!(
            parse_document(b""),
            Err(IngestError::UnknownDocumentType { .. })
        ));
    }

    #[test]
    fn parses_row_fields() {
        let doc = parse_document(&encode(SOCIAL_DOC)).unwrap();
        let r = &doc.records[0];
        assert!(r.errors.is_empty());
        assert_eq!(r.family, "Иванов");
        assert_eq!(r.given, "Иван");
        assert_eq!(r.patronymic, "Иванович");
        assert_eq!(r.snils, "11223344595");
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2020, 2, 1));
        assert_eq!(r.number, "12345");
    }

    #[test]
    fn quoted_name_is_trimmed() {
        let doc = parse_document(&encode(
            "Список социальных карт\n'Иванов Иван Иванович', 11223344595, 01.02.2020, 12345\n",
        ))
        .unwrap();
        assert_eq!(doc.records[0].family, "Иванов");
    }

    #[test]
    fn wrong_name_token_count_drops_line() {
        let doc = parse_document(&encode(
            "Список социальных карт\nИванов Иван, 11223344595, 01.02.2020, 12345\n",
        ))
        .unwrap();
        assert!(doc.records.is_empty());
    }

    #[test]
    fn wrong_field_count_drops_line() {
        let doc = parse_document(&encode(
            "Список социальных карт\nИванов Иван Иванович, 11223344595, 01.02.2020\n",
        ))
        .unwrap();
        assert!(doc.records.is_empty());
    }

    #[test]
    fn bad_snils_is_collected() {
        let doc = parse_document(&encode(
            "Список социальных карт\nИванов Иван Иванович, 11223344500, 01.02.2020, 12345\n",
        ))
        .unwrap();
        let r = &doc.records[0];
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].contains("checksum"));
    }
}
