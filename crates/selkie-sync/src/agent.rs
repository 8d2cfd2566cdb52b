//! Agent facade trait and in-memory implementation
//!
//! TigerStyle: Explicit trait, injected dependencies.
//!
//! The remote discovery agent only offers coarse primitives: list
//! everything, register one service (with its checks), deregister one
//! service by ID. The reconciler is written against this trait so tests
//! run against `MemoryAgent` without a live agent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::error::{SyncError, SyncResult};
use crate::ids::{CheckId, ServiceId};
use crate::service::{CheckDescriptor, ServiceDescriptor};

/// Capability the syncer needs from the discovery agent
///
/// # Guarantees expected of implementations
/// - Safe for concurrent use
/// - `register` is an upsert for the given ID
/// - `deregister` removes the service and every check registered with it
#[async_trait]
pub trait ServiceAgent: Send + Sync {
    /// List all registered services, keyed by registration ID
    async fn list_services(&self) -> SyncResult<HashMap<ServiceId, ServiceDescriptor>>;

    /// List all registered checks, keyed by registration ID
    async fn list_checks(&self) -> SyncResult<HashMap<CheckId, CheckDescriptor>>;

    /// Register a service together with its checks
    async fn register(
        &self,
        id: &ServiceId,
        service: &ServiceDescriptor,
        checks: &[(CheckId, CheckDescriptor)],
    ) -> SyncResult<()>;

    /// Deregister a service (and its checks) by ID
    async fn deregister(&self, id: &ServiceId) -> SyncResult<()>;
}

/// In-memory agent implementation
///
/// Test double for the reconciler: counts mutating calls and can be
/// scripted to fail upcoming calls with a transient error.
#[derive(Debug, Default)]
pub struct MemoryAgent {
    services: RwLock<HashMap<ServiceId, ServiceDescriptor>>,
    checks: RwLock<HashMap<CheckId, CheckDescriptor>>,
    register_count: AtomicU64,
    deregister_count: AtomicU64,
    fail_next: AtomicU32,
}

impl MemoryAgent {
    /// Create an empty in-memory agent
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-existing registration, bypassing counters
    ///
    /// Models state left behind by a crashed engine or another tenant.
    pub async fn seed(
        &self,
        id: ServiceId,
        service: ServiceDescriptor,
        checks: Vec<(CheckId, CheckDescriptor)>,
    ) {
        self.services.write().await.insert(id, service);
        let mut all_checks = self.checks.write().await;
        for (check_id, check) in checks {
            all_checks.insert(check_id, check);
        }
    }

    /// Fail the next `count` mutating calls with a transient error
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of successful `register` calls so far
    pub fn register_count(&self) -> u64 {
        self.register_count.load(Ordering::SeqCst)
    }

    /// Number of successful `deregister` calls so far
    pub fn deregister_count(&self) -> u64 {
        self.deregister_count.load(Ordering::SeqCst)
    }

    fn take_fault(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ServiceAgent for MemoryAgent {
    async fn list_services(&self) -> SyncResult<HashMap<ServiceId, ServiceDescriptor>> {
        Ok(self.services.read().await.clone())
    }

    async fn list_checks(&self) -> SyncResult<HashMap<CheckId, CheckDescriptor>> {
        Ok(self.checks.read().await.clone())
    }

    async fn register(
        &self,
        id: &ServiceId,
        service: &ServiceDescriptor,
        checks: &[(CheckId, CheckDescriptor)],
    ) -> SyncResult<()> {
        if self.take_fault() {
            return Err(SyncError::agent_unreachable("injected fault"));
        }

        let mut services = self.services.write().await;
        let mut all_checks = self.checks.write().await;

        // Upsert: replace the service's checks wholesale
        all_checks.retain(|_, c| &c.service_id != id);
        services.insert(id.clone(), service.clone());
        for (check_id, check) in checks {
            debug_assert_eq!(&check.service_id, id);
            all_checks.insert(check_id.clone(), check.clone());
        }

        self.register_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deregister(&self, id: &ServiceId) -> SyncResult<()> {
        if self.take_fault() {
            return Err(SyncError::agent_unreachable("injected fault"));
        }

        let mut services = self.services.write().await;
        let mut all_checks = self.checks.write().await;

        services.remove(id);
        all_checks.retain(|_, c| &c.service_id != id);

        self.deregister_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
