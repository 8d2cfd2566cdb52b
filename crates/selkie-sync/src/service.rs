//! Service and check declarations
//!
//! TigerStyle: Plain data types with explicit constructors.
//!
//! Definitions are what callers declare: the port is a symbolic label
//! because the task runtime assigns concrete ports at placement time.
//! Descriptors are what actually gets registered with the agent, built
//! during a reconciliation pass once the label has resolved.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ids::ServiceId;

/// Resolves a symbolic port label to a concrete (host, port)
///
/// Injected by the caller; typically closes over the task's network
/// allocation. Returning `None` marks the owning service as
/// misconfigured for the current pass without affecting other services.
pub type AddrFinder = Arc<dyn Fn(&str) -> Option<(String, u16)> + Send + Sync>;

/// A declared network service a task exposes
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Service name, kept verbatim in the generated registration ID
    pub name: String,
    /// Unordered tag set
    #[serde(default)]
    pub tags: Vec<String>,
    /// Symbolic port label, resolved at sync time
    pub port_label: String,
    /// Health checks registered atomically with this service
    #[serde(default)]
    pub checks: Vec<CheckDefinition>,
}

impl ServiceDefinition {
    /// Create a service definition with no checks
    pub fn new(name: impl Into<String>, port_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            port_label: port_label.into(),
            checks: Vec::new(),
        }
    }

    /// Set the tag set
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Append a health check
    pub fn with_check(mut self, check: CheckDefinition) -> Self {
        self.checks.push(check);
        self
    }
}

/// A declared health probe belonging to one service
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDefinition {
    /// Check name, kept verbatim in the generated check ID
    pub name: String,
    /// Probe kind and kind-specific parameters
    pub kind: CheckKind,
    /// Probe interval (milliseconds)
    pub interval_ms: u64,
    /// Probe timeout (milliseconds)
    pub timeout_ms: u64,
}

/// Probe kind with mutually exclusive payload
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// TCP connect probe against the service address
    Tcp,
    /// HTTP GET probe against the service address at `path`
    Http { path: String },
    /// Script probe run by the agent or an external runner
    Script { command: String, args: Vec<String> },
}

/// A service as registered with the agent: address resolved, tags
/// normalized
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service name
    pub name: String,
    /// Tags, sorted so fingerprints are order-insensitive
    pub tags: Vec<String>,
    /// Resolved host
    pub address: String,
    /// Resolved port
    pub port: u16,
}

impl ServiceDescriptor {
    /// Build a descriptor from a definition and its resolved address
    pub fn resolve(def: &ServiceDefinition, address: impl Into<String>, port: u16) -> Self {
        let mut tags = def.tags.clone();
        tags.sort();
        Self {
            name: def.name.clone(),
            tags,
            address: address.into(),
            port,
        }
    }
}

/// A check as registered with the agent
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDescriptor {
    /// Check name
    pub name: String,
    /// Owning service registration ID
    pub service_id: ServiceId,
    /// Probe kind
    pub kind: CheckKind,
    /// Probe interval (milliseconds)
    pub interval_ms: u64,
    /// Probe timeout (milliseconds)
    pub timeout_ms: u64,
}

impl CheckDescriptor {
    /// Build a descriptor from a definition and its owning service ID
    pub fn resolve(def: &CheckDefinition, service_id: ServiceId) -> Self {
        Self {
            name: def.name.clone(),
            service_id,
            kind: def.kind.clone(),
            interval_ms: def.interval_ms,
            timeout_ms: def.timeout_ms,
        }
    }
}

/// A task's network allocation: host IP plus labeled dynamic ports
///
/// Convenience for callers wiring the syncer to the task runtime's
/// placement output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNetwork {
    /// Host IP the task's ports are bound on
    pub ip: String,
    /// Labeled dynamic port assignments
    pub ports: Vec<PortMapping>,
}

/// One labeled port assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortMapping {
    /// Symbolic label referenced by service definitions
    pub label: String,
    /// Concrete port assigned at placement time
    pub value: u16,
}

impl TaskNetwork {
    /// Create a network allocation
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ports: Vec::new(),
        }
    }

    /// Add a labeled port
    pub fn with_port(mut self, label: impl Into<String>, value: u16) -> Self {
        self.ports.push(PortMapping {
            label: label.into(),
            value,
        });
        self
    }

    /// Look up the concrete (host, port) for a label
    pub fn find_host_and_port(&self, label: &str) -> Option<(String, u16)> {
        self.ports
            .iter()
            .find(|p| p.label == label)
            .map(|p| (self.ip.clone(), p.value))
    }

    /// Produce an `AddrFinder` closing over this allocation
    pub fn addr_finder(&self) -> AddrFinder {
        let network = self.clone();
        Arc::new(move |label| network.find_host_and_port(label))
    }
}
