//! Desired-state store
//!
//! TigerStyle: Single mutex, snapshot reads.
//!
//! The in-memory source of truth for "what should be registered,"
//! organized by named group. Groups are replaced wholesale; the
//! reconciler reads a point-in-time snapshot and releases the lock
//! before any network I/O.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::service::ServiceDefinition;

/// Mutex-guarded map from group name to its declared services
#[derive(Debug, Default)]
pub struct DesiredState {
    groups: Mutex<HashMap<String, Vec<ServiceDefinition>>>,
}

impl DesiredState {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entries for a group atomically
    ///
    /// Last write wins per group; an empty definition list keeps the
    /// group present with zero desired services (its registrations are
    /// removed on the next pass).
    pub fn set_group(&self, group: impl Into<String>, defs: Vec<ServiceDefinition>) {
        let mut groups = self.groups.lock().expect("desired-state lock poisoned");
        groups.insert(group.into(), defs);
    }

    /// Delete a group's entries entirely
    pub fn remove_group(&self, group: &str) {
        let mut groups = self.groups.lock().expect("desired-state lock poisoned");
        groups.remove(group);
    }

    /// Consistent point-in-time copy of all groups
    pub fn snapshot(&self) -> HashMap<String, Vec<ServiceDefinition>> {
        let groups = self.groups.lock().expect("desired-state lock poisoned");
        groups.clone()
    }

    /// Number of groups currently declared
    pub fn group_count(&self) -> usize {
        let groups = self.groups.lock().expect("desired-state lock poisoned");
        groups.len()
    }
}
