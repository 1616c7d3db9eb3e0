//! Text helpers shared by both extract parsers.

use encoding_rs::WINDOWS_1251;

/// Decode a windows-1251 document to UTF-8.
///
/// Undecodable bytes become replacement characters; the affected lines then
/// fail field validation instead of aborting the document.
pub fn decode_windows_1251(raw: &[u8]) -> String {
    let (text, _, _) = WINDOWS_1251.decode(raw);
    text.into_owned()
}

/// Trim surrounding whitespace and single quotes from a field.
pub fn trim_field(raw: &str) -> &str {
    raw.trim().trim_matches('\'').trim()
}
