//! Common error types for doctor.

use thiserror::Error;

/// Top-level error type for sync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or contradictory configuration (CLI options, environments,
    /// unsupported path combinations). Fatal before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A local record has the wrong shape.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure or unexpected HTTP status.
    #[error("Network error: {0}")]
    Network(String),

    /// Remote rejected the credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::Configuration("accountId is required".into());
        assert_eq!(err.to_string(), "Configuration error: accountId is required");
    }
}
