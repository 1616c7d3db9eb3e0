//! Spreadsheet rendering and parsing.
//!
//! Two documents live here: the outbound card-ready report and the manual
//! correction sheet. The correction sheet round-trips: we render the rows
//! still carrying validation errors, an operator fixes them by hand, and
//! [`parse_corrections`] reads the fixed sheet back, skipping any row that
//! still fails validation.

use std::io::Cursor;

use calamine::{Data, DataType, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::warn;

use stk_core::validate;
use stk_db::models::{CorrectedRow, IncorrectRow, ReportRow};

use crate::error::ReportError;

const DATE_FORMAT: &str = "%d.%m.%Y";

/// Render the outbound card-ready report.
///
/// One header row, then one line per eligible identity, numbered from 1.
pub fn render_report(rows: &[ReportRow], organization: &str) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    sheet.set_column_width(0, 7)?;
    sheet.set_column_width(1, 35)?;
    sheet.set_column_width(2, 15)?;
    sheet.set_column_width(3, 25)?;

    sheet.write_string_with_format(0, 0, organization, &bold)?;

    sheet.write_string_with_format(1, 0, "№ п/п", &bold)?;
    sheet.write_string_with_format(1, 1, "Фамилия Имя Отчество", &bold)?;
    sheet.write_string_with_format(1, 2, "СНИЛС", &bold)?;
    sheet.write_string_with_format(1, 3, "Дата готовности к выдаче", &bold)?;

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 2) as u32;
        sheet.write_number(r, 0, (i + 1) as f64)?;
        sheet.write_string(r, 1, &row.full_name)?;
        sheet.write_string(r, 2, &row.snils)?;
        let date = row
            .date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        sheet.write_string(r, 3, &date)?;
    }

    workbook.save_to_buffer()
}

/// Render the manual-correction sheet for records with validation errors.
pub fn render_corrections(rows: &[IncorrectRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    sheet.set_column_width(0, 10)?;
    sheet.set_column_width(1, 35)?;
    sheet.set_column_width(2, 15)?;
    sheet.set_column_width(3, 15)?;
    sheet.set_column_width(4, 45)?;

    sheet.write_string_with_format(0, 0, "№", &bold)?;
    sheet.write_string_with_format(0, 1, "Фамилия Имя Отчество", &bold)?;
    sheet.write_string_with_format(0, 2, "Дата рождения", &bold)?;
    sheet.write_string_with_format(0, 3, "СНИЛС", &bold)?;
    sheet.write_string_with_format(0, 4, "Ошибки", &bold)?;

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_number(r, 0, row.id as f64)?;
        sheet.write_string(r, 1, &row.full_name)?;
        let birthdate = row
            .birthdate
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        sheet.write_string(r, 2, &birthdate)?;
        sheet.write_string(r, 3, &row.snils)?;
        sheet.write_string(r, 4, &row.errors.join("; "))?;
    }

    workbook.save_to_buffer()
}

/// Read an operator-corrected sheet back.
///
/// A row is taken only when every field now validates: the id is numeric, the
/// name has exactly three tokens, the birthdate and snils pass the extract
/// validators. Anything else is logged and skipped, leaving the record for
/// another round.
pub fn parse_corrections(bytes: &[u8]) -> Result<Vec<CorrectedRow>, ReportError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec()))?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range?;

    let mut corrected = Vec::new();
    for (i, row) in range.rows().enumerate().skip(1) {
        match parse_correction_row(row) {
            Some(row) => corrected.push(row),
            None => warn!(row = i + 1, "skipping correction row that still fails validation"),
        }
    }
    Ok(corrected)
}

fn parse_correction_row(row: &[Data]) -> Option<CorrectedRow> {
    if row.len() < 4 {
        return None;
    }

    let id = row[0].as_i64()?;
    let name = row[1].as_string()?;
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let [family, given, patronymic] = tokens[..] else {
        return None;
    };
    // Operators sometimes re-enter the birthdate as a native date cell
    // instead of dd.mm.yyyy text; both shapes are accepted.
    let birthdate = if row[2].is_datetime() {
        row[2].as_date()?
    } else {
        validate::date(&row[2].as_string()?).ok()?
    };
    let snils = validate::snils(&row[3].as_string()?).ok()?;

    Some(CorrectedRow {
        id,
        family: family.to_string(),
        given: given.to_string(),
        patronymic: patronymic.to_string(),
        birthdate,
        snils,
    })
}
