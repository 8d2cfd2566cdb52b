//! Error types for Selkie
//!
//! TigerStyle: Explicit error types with context, using thiserror.

use thiserror::Error;

/// Result type alias for Selkie core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Selkie core error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration detected at construction
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Telemetry subsystem failed to initialize
    #[error("Telemetry initialization failed: {reason}")]
    TelemetryInit { reason: String },

    /// Internal error
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_configuration("sync_interval_ms", "must be nonzero");
        assert!(err.to_string().contains("sync_interval_ms"));
        assert!(err.to_string().contains("must be nonzero"));
    }
}
