//! Field validators for the fixed-format extracts.
//!
//! Every validator first strips characters that cannot belong to the field
//! and then checks length/range, so values survive the usual artifacts of the
//! upstream exports (stray spaces, dashes inside identifiers, quoting).

use chrono::NaiveDate;

use crate::error::ValidationError;

/// Length of a normalized SNILS: 9 body digits plus a 2-digit checksum.
const SNILS_LEN: usize = 11;

fn digits_of(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Validate and normalize a SNILS identifier.
///
/// Strips all non-digit characters, requires exactly 11 remaining digits and
/// verifies the positional-weighted checksum carried in the last two digits:
/// each of the first nine digits is multiplied by its weight (9 for the
/// leftmost down to 1), the sum is taken mod 101, and a result of 100 maps to
/// the suffix "00".
pub fn snils(raw: &str) -> Result<String, ValidationError> {
    let normalized = digits_of(raw);
    if normalized.len() != SNILS_LEN {
        return Err(ValidationError::invalid("snils", raw));
    }

    let digits: Vec<u32> = normalized
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    let body_len = SNILS_LEN - 2;
    let sum: u32 = digits[..body_len]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (body_len - i) as u32)
        .sum();

    let candidate = sum % 101;
    let checksum = if candidate == 100 {
        "00".to_string()
    } else {
        format!("{candidate:02}")
    };

    if checksum != normalized[body_len..] {
        return Err(ValidationError::ChecksumMismatch {
            value: raw.to_string(),
        });
    }

    Ok(normalized)
}

/// Validate a date written in day-month-year order.
///
/// Strips non-digits and requires exactly 8 remaining digits (ddmmyyyy), so
/// "01.02.2020", "01-02-2020" and "01022020" are all accepted.
pub fn date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let digits = digits_of(raw);
    if digits.len() != 8 {
        return Err(ValidationError::invalid("date", raw));
    }
    NaiveDate::parse_from_str(&digits, "%d%m%Y")
        .map_err(|_| ValidationError::invalid("date", raw))
}

/// Require a non-empty string; returned verbatim.
pub fn non_empty(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::invalid(field, raw));
    }
    Ok(raw.to_string())
}

/// Validate an integer field, ignoring any non-digit characters.
pub fn integer(field: &'static str, raw: &str) -> Result<i32, ValidationError> {
    let digits = digits_of(raw);
    if digits.is_empty() {
        return Err(ValidationError::invalid(field, raw));
    }
    digits
        .parse()
        .map_err(|_| ValidationError::invalid(field, raw))
}

/// Validate a 4-digit year.
pub fn year(raw: &str) -> Result<i32, ValidationError> {
    let digits = digits_of(raw);
    if digits.len() != 4 {
        return Err(ValidationError::invalid("year", raw));
    }
    digits
        .parse()
        .map_err(|_| ValidationError::invalid("year", raw))
}

/// Validate a semester: a single digit with value 1 or 2.
pub fn semester(raw: &str) -> Result<i32, ValidationError> {
    let digits = digits_of(raw);
    match digits.as_str() {
        "1" => Ok(1),
        "2" => Ok(2),
        _ => Err(ValidationError::invalid("semester", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Body 112233445: 1*9+1*8+2*7+2*6+3*5+3*4+4*3+4*2+5*1 = 95, so "95".
    const VALID_SNILS: &str = "11223344595";

    #[test]
    fn snils_accepts_valid_checksum() {
        assert_eq!(snils(VALID_SNILS).unwrap(), VALID_SNILS);
    }

    #[test]
    fn snils_strips_formatting() {
        assert_eq!(snils("112-233-445 95").unwrap(), VALID_SNILS);
    }

    #[test]
    fn snils_rejects_wrong_length() {
        assert!(matches!(
            snils(""),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            snils("1122334459"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            snils("112233445951"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn snils_rejects_wrong_checksum() {
        assert!(matches!(
            snils("11223344596"),
            Err(ValidationError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn snils_single_digit_mutations_fail() {
        // Mutate each body digit by one; the weighted sum shifts by the
        // digit's weight (1..=9), all below 101, so the checksum must break.
        for pos in 0..9 {
            let mut digits: Vec<u8> = VALID_SNILS.bytes().map(|b| b - b'0').collect();
            digits[pos] = (digits[pos] + 1) % 10;
            let mutated: String = digits.iter().map(|d| (d + b'0') as char).collect();
            assert!(
                snils(&mutated).is_err(),
                "mutation at {pos} unexpectedly passed: {mutated}"
            );
        }
    }

    #[test]
    fn snils_checksum_100_maps_to_00() {
        // Body 222242222: 2*9+2*8+2*7+2*6+4*5+2*4+2*3+2*2+2*1 = 100,
        // 100 % 101 == 100, which the format writes as "00".
        assert_eq!(snils("22224222200").unwrap(), "22224222200");
        assert!(snils("222242222 100").is_err());
    }

    #[test]
    fn date_parses_dotted_and_bare() {
        let expected = NaiveDate::from_ymd_opt(2020, 2, 1).unwrap();
        assert_eq!(date("01.02.2020").unwrap(), expected);
        assert_eq!(date("01022020").unwrap(), expected);
    }

    #[test]
    fn date_rejects_short_and_impossible() {
        assert!(date("1.2.2020").is_err()); // 6 digits after stripping
        assert!(date("32.01.2020").is_err());
        assert!(date("").is_err());
    }

    #[test]
    fn non_empty_passes_through() {
        assert_eq!(non_empty("family", "Иванов").unwrap(), "Иванов");
        assert!(non_empty("family", "").is_err());
    }

    #[test]
    fn integer_strips_noise() {
        assert_eq!(integer("count", " 12 ").unwrap(), 12);
        assert!(integer("count", "abc").is_err());
    }

    #[test]
    fn year_requires_four_digits() {
        assert_eq!(year("2022").unwrap(), 2022);
        assert!(year("22").is_err());
        assert!(year("20225").is_err());
    }

    #[test]
    fn semester_is_one_or_two() {
        assert_eq!(semester("1").unwrap(), 1);
        assert_eq!(semester("2").unwrap(), 2);
        assert!(semester("3").is_err());
        assert!(semester("12").is_err());
        assert!(semester("").is_err());
    }
}
