//! Selkie Sync: service-registration reconciliation
//!
//! TigerStyle: Explicit state, bounded operations, deterministic identity.
//!
//! Keeps a task's declared services and health checks synchronized with
//! a Consul-compatible discovery agent. Callers declare desired state
//! per group; the [`Syncer`] diffs it against the agent's actual state
//! every pass and issues the minimal set of register and deregister
//! calls, touching only registrations inside its own namespace prefix.
//!
//! ```no_run
//! use std::sync::Arc;
//! use selkie_core::config::SyncerConfig;
//! use selkie_sync::{ConsulAgent, ServiceDefinition, Syncer, TaskNetwork};
//!
//! # async fn run() -> Result<(), selkie_sync::SyncError> {
//! let config = SyncerConfig::default();
//! let agent = ConsulAgent::new(&config.agent)?;
//! let syncer = Arc::new(Syncer::new(config, agent).await?);
//!
//! syncer.set_service_reg_prefix("selkie");
//! let network = TaskNetwork::new("10.0.0.1").with_port("http", 8080);
//! syncer.set_addr_finder(network.addr_finder());
//!
//! syncer.set_services("web", vec![ServiceDefinition::new("api", "http")]);
//! syncer.start();
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod consul;
pub mod error;
pub mod ids;
pub mod service;
pub mod store;
pub mod syncer;

pub use agent::{MemoryAgent, ServiceAgent};
pub use consul::ConsulAgent;
pub use error::{AggregateError, SyncError, SyncResult};
pub use ids::{generate_check_id, generate_service_id, CheckId, ServiceId};
pub use service::{
    AddrFinder, CheckDefinition, CheckDescriptor, CheckKind, PortMapping, ServiceDefinition,
    ServiceDescriptor, TaskNetwork,
};
pub use store::DesiredState;
pub use syncer::{Syncer, SyncerState};
