//! # Error Types — Foundational Validation Errors
//!
//! Errors raised while constructing the primitive types of the presale
//! engine. All errors use `thiserror` for derive-based `Display` and
//! `Error` implementations.
//!
//! ## Design
//!
//! - Parse errors carry the offending input verbatim.
//! - Schedule errors name the boundary that broke the ordering invariant.
//! - Nothing in this crate panics on bad input; every constructor that
//!   can reject its input returns `Result<_, CoreError>`.

use thiserror::Error;

/// Top-level error type for presale primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An account address could not be parsed.
    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// An amount or rate is malformed or violates its range constraint.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A timestamp could not be parsed or is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Phase boundaries are not strictly increasing or too few phases.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A configuration field is missing or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
