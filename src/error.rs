//! Error types for azcompute.
//!
//! This module defines the error types used throughout the crate, split
//! between configuration-time failures (malformed identifiers, invalid
//! cross-field constraints) and control-plane failures surfaced by the
//! API boundary.

use thiserror::Error;

use crate::api::ApiError;

/// Result type alias for azcompute operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for azcompute.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A resource identifier string could not be parsed.
    #[error("Failed to parse resource ID '{id}': {message}")]
    ParseId {
        /// The raw identifier string
        id: String,
        /// What went wrong
        message: String,
    },

    /// A required parameter is missing.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A parameter has an invalid value or violates a cross-field constraint.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The desired configuration failed validation before any network call.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// What went wrong
        message: String,
    },

    // ========================================================================
    // Control-plane Errors
    // ========================================================================
    /// An API call against the control plane failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A long-running operation reached a failed terminal state.
    #[error("Operation '{operation}' on '{resource}' failed: {message}")]
    OperationFailed {
        /// The operation that was in flight (e.g. "deallocate")
        operation: String,
        /// The resource the operation targeted
        resource: String,
        /// Failure detail from the control plane
        message: String,
    },

    /// A long-running operation did not reach a terminal state in time.
    #[error("Operation '{operation}' on '{resource}' timed out after {timeout_secs} seconds")]
    OperationTimeout {
        /// The operation that was in flight
        operation: String,
        /// The resource the operation targeted
        resource: String,
        /// Timeout in seconds
        timeout_secs: u64,
    },

    /// A resource expected to exist was not found.
    #[error("Resource '{0}' was not found")]
    NotFound(String),

    /// A resource expected to be absent already exists.
    #[error("Resource '{0}' already exists")]
    AlreadyExists(String),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new parse error for a resource identifier.
    pub fn parse_id(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseId {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates a new validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new operation failure error.
    pub fn operation_failed(
        operation: impl Into<String>,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Returns true if the underlying cause was a not-found response from
    /// the control plane.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Api(e) => e.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_display() {
        let err = Error::parse_id("/bogus", "expected `subscriptions`");
        assert_eq!(
            err.to_string(),
            "Failed to parse resource ID '/bogus': expected `subscriptions`"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("vm1".to_string()).is_not_found());
        assert!(Error::Api(ApiError::NotFound {
            resource: "vm1".to_string()
        })
        .is_not_found());
        assert!(!Error::MissingParameter("name".to_string()).is_not_found());
    }
}
