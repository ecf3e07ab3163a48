//! # Shared Error Types
//!
//! Errors that cross crate boundaries: input validation failures and
//! storage transport failures. Domain-specific errors (gating, assessment
//! lifecycle) live in their own crates and wrap these via `#[from]`.
//!
//! ## Design
//!
//! - Validation errors are caller mistakes — reported back with the
//!   offending field, never logged as system faults.
//! - Storage errors are transport/transaction failures — retried (or not)
//!   by the caller's own policy, never swallowed inside the core.

use thiserror::Error;

/// Bad input shape or values. Maps to a 422-class response at the API edge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty or whitespace-only.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A field failed a minimum-length policy.
    #[error("{field} must be at least {min} characters, got {len}")]
    TooShort {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum accepted length.
        min: usize,
        /// Actual length supplied.
        len: usize,
    },

    /// A field had an invalid value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Storage transport or transaction failure.
///
/// Any failure inside a transactional operation rolls the whole operation
/// back — a `StoreError` never leaves partial state (a config mutation
/// without its audit row, findings without their aggregate) visible.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("storage connection error: {0}")]
    Connection(String),

    /// A query or transaction failed.
    #[error("storage query failed: {0}")]
    Query(String),

    /// A stored record could not be decoded into its domain shape.
    #[error("stored record could not be decoded: {0}")]
    Decode(String),

    /// A uniqueness constraint was violated.
    #[error("storage conflict: {0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_messages() {
        let err = ValidationError::Empty { field: "tenant_id" };
        assert_eq!(err.to_string(), "tenant_id must not be empty");

        let err = ValidationError::TooShort {
            field: "reason",
            min: 10,
            len: 3,
        };
        assert!(err.to_string().contains("at least 10"));
    }

    #[test]
    fn store_error_messages() {
        let err = StoreError::Query("deadlock detected".into());
        assert!(err.to_string().contains("deadlock"));
    }
}
