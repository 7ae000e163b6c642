//! Unified error type for the domain layer.
//!
//! Invalid persisted payloads are a routine condition (the host can hand us
//! anything), so these errors carry enough context for a warning log and are
//! cheap to construct; callers generally substitute a safe default.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Payload does not match the expected shape
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Payload carries a schema version this build does not understand
    #[error("Unsupported schema version {found} (current is {current})")]
    UnsupportedVersion { found: i64, current: u32 },
}

impl DomainError {
    /// Creates a validation error for business rule violations.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a malformed payload error for shape mismatches.
    pub fn malformed_payload(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    /// Create an unsupported version error
    pub fn unsupported_version(found: i64, current: u32) -> Self {
        Self::UnsupportedVersion { found, current }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_formats_message() {
        let err = DomainError::validation("mapping id cannot be empty");
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation failed: mapping id cannot be empty"
        );
    }

    #[test]
    fn unsupported_version_reports_both_versions() {
        let err = DomainError::unsupported_version(2, 1);
        assert_eq!(err.to_string(), "Unsupported schema version 2 (current is 1)");
    }
}
