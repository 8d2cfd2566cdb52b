//! Registration identity generation
//!
//! TigerStyle: Validated identifiers, deterministic derivation.
//!
//! IDs are pure functions of (prefix, group, name): re-synchronizing
//! after a crash recovers the same identities instead of creating
//! duplicates. Names are kept verbatim rather than hashed, so two
//! distinct services colliding in one group is a visible configuration
//! error, never a silent one.

use serde::{Deserialize, Serialize};
use std::fmt;

use selkie_core::constants::SERVICE_ID_LENGTH_BYTES_MAX;

use crate::service::{CheckDefinition, ServiceDefinition};

/// Registration ID of a service in the discovery agent
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ServiceId(String);

/// Registration ID of a check in the discovery agent
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CheckId(String);

/// Derive the registration ID for a service
///
/// Format: `{prefix}-{group}:{service_name}`. Stable across process
/// restarts for identical inputs.
pub fn generate_service_id(prefix: &str, group: &str, def: &ServiceDefinition) -> ServiceId {
    debug_assert!(!prefix.is_empty());
    debug_assert!(!group.is_empty());

    let id = format!(
        "{}-{}:{}",
        sanitize(prefix),
        sanitize(group),
        sanitize(&def.name)
    );
    debug_assert!(id.len() <= SERVICE_ID_LENGTH_BYTES_MAX);
    ServiceId(id)
}

/// Derive the registration ID for a check of the given service
///
/// Format: `{service_id}:{check_name}`.
pub fn generate_check_id(service_id: &ServiceId, check: &CheckDefinition) -> CheckId {
    let id = format!("{}:{}", service_id.0, sanitize(&check.name));
    debug_assert!(id.len() <= SERVICE_ID_LENGTH_BYTES_MAX);
    CheckId(id)
}

/// Replace characters the agent rejects in IDs with `-`
///
/// Keeps alphanumerics, dash, underscore, and dot.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

impl ServiceId {
    /// Create a service ID from a raw agent listing entry
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this ID belongs to the given namespace prefix
    ///
    /// The syncer only ever deregisters IDs in its own namespace.
    pub fn in_namespace(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.0.starts_with(&format!("{}-", sanitize(prefix)))
    }
}

impl CheckId {
    /// Create a check ID from a raw agent listing entry
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this ID belongs to the given namespace prefix
    pub fn in_namespace(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.0.starts_with(&format!("{}-", sanitize(prefix)))
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CheckId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
