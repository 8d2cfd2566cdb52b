//! Reconciliation engine and sync loop
//!
//! TigerStyle: Single entry point, explicit lifecycle, bounded retries.
//!
//! The syncer owns desired state and converges the discovery agent
//! toward it: snapshot desired state, list actual state, diff, apply
//! removals before creations. Desired state in memory is the source of
//! truth; the agent is a cache to be corrected. The agent offers no
//! partial update, so a changed definition is deregistered and
//! re-registered, with a locally cached fingerprint per ID preventing
//! churn on unchanged entries.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{debug, info, warn};

use selkie_core::config::SyncerConfig;
use selkie_core::constants::{SHUTDOWN_RETRY_BACKOFF_MS, SHUTDOWN_RETRY_COUNT_MAX};
use selkie_core::io::{TimeProvider, WallClockTime};

use crate::agent::ServiceAgent;
use crate::error::{SyncError, SyncResult};
use crate::ids::{generate_check_id, generate_service_id, CheckId, ServiceId};
use crate::service::{AddrFinder, CheckDescriptor, ServiceDefinition, ServiceDescriptor};
use crate::store::DesiredState;

/// Syncer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncerState {
    /// Waiting for the next pass
    Idle,
    /// A reconciliation pass is in flight
    Running,
    /// Shutdown observed, final cleanup pending or in flight
    ShuttingDown,
    /// Final cleanup done; all further calls are rejected
    Stopped,
}

/// One fully resolved desired registration
struct DesiredEntry {
    service: ServiceDescriptor,
    checks: Vec<(CheckId, CheckDescriptor)>,
    fingerprint: u64,
}

/// The service-registration reconciliation engine
///
/// One instance per task allocation. Callers declare desired state via
/// [`set_services`](Self::set_services); the background loop (or an
/// explicit [`sync_services`](Self::sync_services) call) converges the
/// agent toward it. [`shutdown`](Self::shutdown) deregisters everything
/// this instance owns.
pub struct Syncer<A: ServiceAgent + 'static> {
    config: SyncerConfig,
    agent: Arc<A>,
    time: Arc<dyn TimeProvider>,
    /// Namespace prefix carried by every generated ID
    prefix: RwLock<String>,
    /// Injected port-label resolver
    addr_finder: RwLock<Option<AddrFinder>>,
    /// Desired state, the source of truth between passes
    desired: DesiredState,
    /// Fingerprint of the last definition applied per registered ID
    applied: Mutex<HashMap<ServiceId, u64>>,
    /// Fingerprint of definitions the agent rejected, skipped until changed
    rejected: Mutex<HashMap<ServiceId, u64>>,
    state: Mutex<SyncerState>,
    /// Serializes passes; two passes never overlap
    pass_lock: AsyncMutex<()>,
    shutdown: Notify,
    shutdown_requested: AtomicBool,
    sync_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<A: ServiceAgent + 'static> Syncer<A> {
    /// Create a syncer with the production wall clock
    ///
    /// Fails on invalid configuration, or if `config.agent.require_agent`
    /// is set and the agent does not answer a listing probe. Otherwise
    /// succeeds optimistically.
    pub async fn new(config: SyncerConfig, agent: A) -> SyncResult<Self> {
        Self::with_time(config, agent, Arc::new(WallClockTime::new())).await
    }

    /// Create a syncer with an injected clock (for tests)
    pub async fn with_time(
        config: SyncerConfig,
        agent: A,
        time: Arc<dyn TimeProvider>,
    ) -> SyncResult<Self> {
        config.validate()?;

        let agent = Arc::new(agent);
        if config.agent.require_agent {
            agent.list_services().await?;
        }

        Ok(Self {
            config,
            agent,
            time,
            prefix: RwLock::new(String::new()),
            addr_finder: RwLock::new(None),
            desired: DesiredState::new(),
            applied: Mutex::new(HashMap::new()),
            rejected: Mutex::new(HashMap::new()),
            state: Mutex::new(SyncerState::Idle),
            pass_lock: AsyncMutex::new(()),
            shutdown: Notify::new(),
            shutdown_requested: AtomicBool::new(false),
            sync_task: Mutex::new(None),
        })
    }

    /// Get the injected agent
    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> SyncerState {
        *self.state.lock().expect("state lock poisoned")
    }

    fn set_state(&self, state: SyncerState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// Set the namespace prefix used by identity generation
    ///
    /// Must be set before the first pass; the syncer only ever touches
    /// agent entries carrying this prefix.
    pub fn set_service_reg_prefix(&self, prefix: impl Into<String>) {
        *self.prefix.write().expect("prefix lock poisoned") = prefix.into();
    }

    /// Install the address resolver mapping port labels to (host, port)
    pub fn set_addr_finder(&self, finder: AddrFinder) {
        *self.addr_finder.write().expect("addr finder lock poisoned") = Some(finder);
    }

    /// Replace the desired services for a group
    ///
    /// The next pass (background or explicit) observes this snapshot.
    pub fn set_services(&self, group: impl Into<String>, defs: Vec<ServiceDefinition>) {
        self.desired.set_group(group, defs);
    }

    /// Drop a group's desired services entirely
    ///
    /// Its registrations are removed on the next pass.
    pub fn remove_services(&self, group: &str) {
        self.desired.remove_group(group);
    }

    /// Start the background sync loop
    ///
    /// One pass per `sync_interval_ms` until shutdown. Pass-level errors
    /// are logged and never abort the loop.
    pub fn start(self: &Arc<Self>) {
        if self.shutdown_requested.load(Ordering::SeqCst) {
            warn!("syncer already shut down, not starting sync loop");
            return;
        }

        let mut task = self.sync_task.lock().expect("task lock poisoned");
        if task.is_some() {
            warn!("sync loop already started");
            return;
        }

        let syncer = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            loop {
                if syncer.shutdown_requested.load(Ordering::SeqCst) {
                    break;
                }
                tokio::select! {
                    _ = syncer.time.sleep_ms(syncer.config.sync_interval_ms) => {
                        if syncer.shutdown_requested.load(Ordering::SeqCst) {
                            break;
                        }
                        if let Err(e) = syncer.sync_services().await {
                            warn!(error = %e, "periodic sync pass failed");
                        }
                    }
                    _ = syncer.shutdown.notified() => {
                        debug!("sync loop shutting down");
                        break;
                    }
                }
            }
        }));
    }

    /// Run one reconciliation pass synchronously
    ///
    /// Returns the aggregate of all per-item failures; one failing
    /// service never blocks reconciliation of the others. Passes are
    /// serialized: a call arriving while a pass is in flight waits for
    /// it and then runs against the newest desired snapshot.
    pub async fn sync_services(&self) -> SyncResult<()> {
        if self.shutdown_requested.load(Ordering::SeqCst) {
            return Err(SyncError::ShutDown);
        }

        let _pass = self.pass_lock.lock().await;
        if self.shutdown_requested.load(Ordering::SeqCst) {
            return Err(SyncError::ShutDown);
        }

        self.set_state(SyncerState::Running);
        let result = self.reconcile().await;
        self.set_state(SyncerState::Idle);
        result
    }

    /// Begin shutdown and block until final cleanup completes
    ///
    /// Idempotent: the first caller stops the loop and deregisters every
    /// prefixed entry (bounded retries); later callers return
    /// immediately.
    pub async fn shutdown(&self) -> SyncResult<()> {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.set_state(SyncerState::ShuttingDown);
        // notify_one stores a permit, so the signal is not lost when the
        // loop is mid-pass rather than parked in select
        self.shutdown.notify_one();

        let task = self.sync_task.lock().expect("task lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }

        // Wait out any in-flight pass, then clean up
        let _pass = self.pass_lock.lock().await;

        let mut attempt: u32 = 0;
        let result = loop {
            match self.cleanup().await {
                Ok(()) => break Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= SHUTDOWN_RETRY_COUNT_MAX || !e.is_recoverable() {
                        warn!(error = %e, attempt, "shutdown cleanup gave up");
                        break Err(e);
                    }
                    warn!(error = %e, attempt, "shutdown cleanup failed, retrying");
                    self.time.sleep_ms(SHUTDOWN_RETRY_BACKOFF_MS).await;
                }
            }
        };

        self.set_state(SyncerState::Stopped);
        info!("syncer stopped");
        result
    }

    /// One diff-and-converge pass
    async fn reconcile(&self) -> SyncResult<()> {
        let prefix = self.prefix.read().expect("prefix lock poisoned").clone();
        if prefix.is_empty() {
            return Err(SyncError::NoPrefix);
        }
        let finder = self
            .addr_finder
            .read()
            .expect("addr finder lock poisoned")
            .clone()
            .ok_or(SyncError::NoAddrFinder)?;

        // Snapshot desired state; the store lock is released before any
        // agent I/O begins.
        let snapshot = self.desired.snapshot();

        let mut errors: Vec<SyncError> = Vec::new();
        let mut desired: HashMap<ServiceId, DesiredEntry> = HashMap::new();

        for (group, defs) in &snapshot {
            for def in defs {
                let Some((host, port)) = finder(&def.port_label) else {
                    // Per-service error: skip it, keep reconciling the rest
                    warn!(
                        service = %def.name,
                        label = %def.port_label,
                        "address resolution failed, skipping service this pass"
                    );
                    errors.push(SyncError::address_not_found(&def.name, &def.port_label));
                    continue;
                };

                let id = generate_service_id(&prefix, group, def);
                let service = ServiceDescriptor::resolve(def, host, port);
                let checks: Vec<(CheckId, CheckDescriptor)> = def
                    .checks
                    .iter()
                    .map(|c| {
                        (
                            generate_check_id(&id, c),
                            CheckDescriptor::resolve(c, id.clone()),
                        )
                    })
                    .collect();
                let fingerprint = fingerprint(&service, &checks);

                let entry = DesiredEntry {
                    service,
                    checks,
                    fingerprint,
                };
                if desired.insert(id.clone(), entry).is_some() {
                    errors.push(SyncError::definition_rejected(
                        id.as_str(),
                        format!("duplicate service name {:?} in group {:?}", def.name, group),
                    ));
                }
            }
        }

        // Fresh actual-state listing every pass; the agent may have been
        // mutated from outside. A listing failure aborts the pass:
        // diffing against a partial snapshot could remove live entries.
        let actual_services = self.agent.list_services().await?;
        let actual_checks = self.agent.list_checks().await?;

        let actual_ids: HashSet<ServiceId> = actual_services
            .keys()
            .filter(|id| id.in_namespace(&prefix))
            .cloned()
            .collect();
        let mut actual_check_ids: HashMap<ServiceId, HashSet<CheckId>> = HashMap::new();
        for (check_id, check) in &actual_checks {
            if check_id.in_namespace(&prefix) {
                actual_check_ids
                    .entry(check.service_id.clone())
                    .or_default()
                    .insert(check_id.clone());
            }
        }

        // Diff. Only IDs in our own namespace are ever candidates for
        // removal.
        let mut to_remove: Vec<ServiceId> = actual_ids
            .iter()
            .filter(|id| !desired.contains_key(id))
            .cloned()
            .collect();
        to_remove.sort();

        let applied = self.applied.lock().expect("applied lock poisoned").clone();
        let rejected = self.rejected.lock().expect("rejected lock poisoned").clone();

        let mut to_create: Vec<ServiceId> = Vec::new();
        let mut to_replace: Vec<ServiceId> = Vec::new();
        for (id, entry) in &desired {
            if rejected.get(id) == Some(&entry.fingerprint) {
                debug!(id = %id, "definition previously rejected and unchanged, skipping");
                continue;
            }
            if !actual_ids.contains(id) {
                to_create.push(id.clone());
                continue;
            }

            let desired_check_ids: HashSet<CheckId> =
                entry.checks.iter().map(|(c, _)| c.clone()).collect();
            let checks_in_sync = actual_check_ids
                .get(id)
                .map(|have| have == &desired_check_ids)
                .unwrap_or(desired_check_ids.is_empty());

            match applied.get(id) {
                Some(fp) if *fp == entry.fingerprint && checks_in_sync => {
                    // Unchanged since last applied: leave it alone
                }
                // Changed, or unknown fingerprint (e.g. recovered after a
                // crash): the agent has no partial update, so replace it
                _ => to_replace.push(id.clone()),
            }
        }
        to_create.sort();
        to_replace.sort();

        // Removals strictly before creations: a renamed service must not
        // transiently occupy two IDs.
        for id in &to_remove {
            match self.agent.deregister(id).await {
                Ok(()) => {
                    self.applied.lock().expect("applied lock poisoned").remove(id);
                    self.rejected.lock().expect("rejected lock poisoned").remove(id);
                    info!(id = %id, "deregistered stale service");
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "deregister failed");
                    errors.push(e);
                }
            }
        }

        for id in to_replace {
            match self.agent.deregister(&id).await {
                Ok(()) => {
                    self.applied.lock().expect("applied lock poisoned").remove(&id);
                    to_create.push(id);
                }
                Err(e) => {
                    // Retried next pass; the cached fingerprint still
                    // marks the entry as out of date
                    warn!(id = %id, error = %e, "deregister before replace failed");
                    errors.push(e);
                }
            }
        }

        for id in &to_create {
            let entry = &desired[id];
            match self.agent.register(id, &entry.service, &entry.checks).await {
                Ok(()) => {
                    self.applied
                        .lock()
                        .expect("applied lock poisoned")
                        .insert(id.clone(), entry.fingerprint);
                    self.rejected.lock().expect("rejected lock poisoned").remove(id);
                    info!(
                        id = %id,
                        address = %entry.service.address,
                        port = entry.service.port,
                        checks = entry.checks.len(),
                        "registered service"
                    );
                }
                Err(e @ SyncError::DefinitionRejected { .. }) => {
                    // Park until the definition changes
                    self.rejected
                        .lock()
                        .expect("rejected lock poisoned")
                        .insert(id.clone(), entry.fingerprint);
                    warn!(id = %id, error = %e, "agent rejected definition");
                    errors.push(e);
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "register failed");
                    errors.push(e);
                }
            }
        }

        SyncError::aggregate(errors)
    }

    /// Final deregistration pass: remove every entry this engine owns
    async fn cleanup(&self) -> SyncResult<()> {
        let prefix = self.prefix.read().expect("prefix lock poisoned").clone();
        let mut errors: Vec<SyncError> = Vec::new();

        let mut ids: HashSet<ServiceId> = self
            .applied
            .lock()
            .expect("applied lock poisoned")
            .keys()
            .cloned()
            .collect();

        // Also sweep prefixed entries we never saw applied (left over
        // from a previous incarnation of this engine)
        if !prefix.is_empty() {
            match self.agent.list_services().await {
                Ok(listing) => {
                    ids.extend(listing.into_keys().filter(|id| id.in_namespace(&prefix)));
                }
                Err(e) => errors.push(e),
            }
        }

        let mut ids: Vec<ServiceId> = ids.into_iter().collect();
        ids.sort();

        for id in &ids {
            match self.agent.deregister(id).await {
                Ok(()) => {
                    self.applied.lock().expect("applied lock poisoned").remove(id);
                    debug!(id = %id, "deregistered on shutdown");
                }
                Err(e) => errors.push(e),
            }
        }

        SyncError::aggregate(errors)
    }
}

/// Fingerprint of a resolved registration
///
/// Process-local cache key only; never compared across restarts.
fn fingerprint(service: &ServiceDescriptor, checks: &[(CheckId, CheckDescriptor)]) -> u64 {
    let mut hasher = DefaultHasher::new();
    service.hash(&mut hasher);
    for (id, check) in checks {
        id.hash(&mut hasher);
        check.hash(&mut hasher);
    }
    hasher.finish()
}
