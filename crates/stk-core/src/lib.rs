//! Shared building blocks for the social transit card registry.
//!
//! # Modules
//!
//! - [`error`] - The validation-error taxonomy (`ValidationError`)
//! - [`validate`] - Field validators for registry and issuer extracts

pub mod error;
pub mod validate;

pub use error::ValidationError;
