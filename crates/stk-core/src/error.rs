//! Validation error taxonomy.
//!
//! Field-level failures are collected per record rather than aborting the
//! enclosing document, so every variant carries the offending raw value for
//! the manual-correction views.

use serde::Serialize;
use thiserror::Error;

/// A single field failing its validator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationError {
    /// The raw value does not match the expected format for the field.
    #[error("invalid {field}: {value}")]
    InvalidFormat {
        /// Field name as known to the extract formats (e.g. "snils", "year").
        field: &'static str,
        /// The raw value as read from the document.
        value: String,
    },

    /// An identifier with the right shape but a wrong checksum suffix.
    #[error("invalid snils, incorrect checksum: {value}")]
    ChecksumMismatch {
        /// The raw identifier as read from the document.
        value: String,
    },
}

impl ValidationError {
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field,
            value: value.into(),
        }
    }

    /// Check whether this error concerns the given field.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidFormat { field, .. } => field,
            ValidationError::ChecksumMismatch { .. } => "snils",
        }
    }
}
