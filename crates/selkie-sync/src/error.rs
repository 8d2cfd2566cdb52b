//! Syncer error types
//!
//! TigerStyle: Explicit error variants with context.
//!
//! The taxonomy drives retry behavior: recoverable failures are retried
//! on the next reconciliation pass, non-recoverable failures park the
//! offending service until its definition changes, and a pass reports
//! every per-item failure in one aggregate instead of stopping early.

use std::fmt;
use thiserror::Error;

/// Syncer-specific errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// Discovery agent could not be reached (recoverable)
    #[error("agent unreachable: {reason}")]
    AgentUnreachable { reason: String },

    /// Agent request timed out (recoverable)
    #[error("agent request timed out: {reason}")]
    AgentTimeout { reason: String },

    /// Agent failed the request on its side (recoverable, 5xx-equivalent)
    #[error("agent error for {id}: {reason}")]
    AgentFailed { id: String, reason: String },

    /// Agent rejected a definition as malformed (non-recoverable)
    #[error("definition rejected for {id}: {reason}")]
    DefinitionRejected { id: String, reason: String },

    /// Port label did not resolve to an address (non-recoverable)
    #[error("no address for service {service}: port label {label} not found")]
    AddressNotFound { service: String, label: String },

    /// No address resolver installed before syncing
    #[error("no address resolver installed")]
    NoAddrFinder,

    /// Namespace prefix not set before syncing
    #[error("service registration prefix not set")]
    NoPrefix,

    /// Syncer has been shut down; no further operations are accepted
    #[error("syncer is shut down")]
    ShutDown,

    /// Invalid configuration at construction
    #[error(transparent)]
    Config(#[from] selkie_core::Error),

    /// Composite of all per-item failures from one reconciliation pass
    #[error("{0}")]
    Aggregate(AggregateError),
}

impl SyncError {
    /// Create an agent unreachable error
    pub fn agent_unreachable(reason: impl Into<String>) -> Self {
        Self::AgentUnreachable {
            reason: reason.into(),
        }
    }

    /// Create a definition rejected error
    pub fn definition_rejected(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DefinitionRejected {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an address resolution error
    pub fn address_not_found(service: impl Into<String>, label: impl Into<String>) -> Self {
        Self::AddressNotFound {
            service: service.into(),
            label: label.into(),
        }
    }

    /// Check if this error is transient and eligible for retry on the
    /// next pass without operator intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::AgentUnreachable { .. } | Self::AgentTimeout { .. } | Self::AgentFailed { .. } => {
                true
            }
            Self::Aggregate(agg) => agg.errors.iter().all(SyncError::is_recoverable),
            _ => false,
        }
    }

    /// Fold per-item errors into a single pass result
    ///
    /// Returns `Ok(())` for an empty list and unwraps singletons so
    /// callers never see a one-element aggregate.
    pub fn aggregate(mut errors: Vec<SyncError>) -> Result<(), SyncError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(SyncError::Aggregate(AggregateError { errors })),
        }
    }
}

/// Composite error carrying every per-item failure from one pass
#[derive(Debug)]
pub struct AggregateError {
    /// Individual failures, in the order they occurred
    pub errors: Vec<SyncError>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sync errors occurred: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Result type for syncer operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;
