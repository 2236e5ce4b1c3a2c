//! Connection registry: the live table of MCP client handles.
//!
//! Writers (`register`, `deregister`, retry firings, `shutdown`) are serialised
//! by an async gate held across the handshake. The table itself sits behind a
//! short-lived `RwLock` that is never held across an `.await`, so readers only
//! ever wait for in-memory bookkeeping.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::{
    client::ClientHandle,
    config::{ClientMode, ClientSettings, RegistryConfig},
    descriptor::{ConnectionDescriptor, ConnectionId},
    discovery,
    factory::{ClientFactory, StreamableHttpClientFactory},
    metrics::RegistryMetrics,
    retry::{RetryDecision, RetryPolicy, RetryState},
    scheduler::RetryScheduler,
    status::{ConnectionState, ConnectionStatus, RegistrationResult},
};
use crate::error::{McpError, McpResult};

/// Registry of dynamic MCP connections. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    settings: ClientSettings,
    policy: RetryPolicy,
    factory: Arc<dyn ClientFactory>,
    write_gate: tokio::sync::Mutex<()>,
    state: RwLock<RegistryState>,
    scheduler: RetryScheduler,
    next_ticket: AtomicU64,
    metrics: RegistryMetrics,
}

#[derive(Default)]
struct RegistryState {
    handles: HashMap<ConnectionId, Arc<ClientHandle>>,
    retries: HashMap<ConnectionId, RetryState>,
    statuses: HashMap<ConnectionId, ConnectionStatus>,
}

/// What happened to a retryable failure.
enum RetryOutcome {
    Scheduled,
    Exhausted,
    Unavailable,
}

impl ConnectionRegistry {
    /// Registry that connects over streamable HTTP.
    pub fn new(config: &RegistryConfig) -> Self {
        let factory = Arc::new(StreamableHttpClientFactory::new(config.client.clone()));
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: &RegistryConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                settings: config.client.clone(),
                policy: RetryPolicy::from(&config.retry),
                factory,
                write_gate: tokio::sync::Mutex::new(()),
                state: RwLock::new(RegistryState::default()),
                scheduler: RetryScheduler::new(config.scheduler.workers),
                next_ticket: AtomicU64::new(1),
                metrics: RegistryMetrics::new(),
            }),
        }
    }

    /// Client mode configured for this process.
    pub fn mode(&self) -> ClientMode {
        self.inner.settings.mode
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.settings.request_timeout()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    pub fn metrics(&self) -> &RegistryMetrics {
        &self.inner.metrics
    }

    /// Replace whatever the registry holds for this identity and try to connect.
    ///
    /// Retryable failures return [`RegistrationResult::RetryScheduled`]; invalid
    /// descriptors and fatal failures return an error.
    pub async fn register(&self, descriptor: ConnectionDescriptor) -> McpResult<RegistrationResult> {
        descriptor.validate()?;
        self.inner.metrics.record_registration();

        let _gate = self.inner.write_gate.lock().await;
        self.inner.release(descriptor.id).await;
        if let Some(status) = self.inner.state.write().statuses.get_mut(&descriptor.id) {
            status.refresh(&descriptor);
        }

        if !descriptor.enabled {
            self.inner.state.write().statuses.insert(
                descriptor.id,
                ConnectionStatus::new(&descriptor, ConnectionState::Disabled),
            );
            self.inner.metrics.record_disabled();
            info!(connection = %descriptor.name, "MCP connection disabled");
            return Ok(RegistrationResult::Disabled {
                name: descriptor.name,
            });
        }

        self.inner
            .attempt(&descriptor)
            .await
            .map_err(|e| McpError::RegistrationFailed {
                name: descriptor.name.clone(),
                source: Box::new(e),
            })
    }

    /// Remove a connection: close its handle and cancel any pending retry.
    ///
    /// No-op for unknown identities.
    pub async fn deregister(&self, id: ConnectionId) {
        let _gate = self.inner.write_gate.lock().await;
        self.inner.release(id).await;
        if let Some(status) = self.inner.state.write().statuses.remove(&id) {
            info!(connection = %status.name, "MCP connection deregistered");
        }
    }

    /// Build a throwaway client, run the handshake, and close it.
    ///
    /// Never touches the registry's table or retry state; every failure is an error.
    pub async fn test_connection(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> McpResult<RegistrationResult> {
        descriptor.validate()?;

        let handle = self
            .inner
            .factory
            .create_client(descriptor, true)
            .await
            .map_err(|e| {
                warn!(connection = %descriptor.name, error = %e, "MCP connection test failed");
                McpError::ConnectionTestFailed {
                    name: descriptor.name.clone(),
                    source: Box::new(e),
                }
            })?;
        self.inner.metrics.record_handle_opened();

        let result = RegistrationResult::Connected {
            name: descriptor.name.clone(),
            transport_description: handle.transport_description().to_string(),
        };
        self.inner.close_handle(&handle).await;
        info!(connection = %descriptor.name, "MCP connection test succeeded");
        Ok(result)
    }

    /// Live handles whose client runs in `mode`.
    pub fn active_clients(&self, mode: ClientMode) -> Vec<Arc<ClientHandle>> {
        self.inner
            .state
            .read()
            .handles
            .values()
            .filter(|handle| handle.mode() == mode)
            .cloned()
            .collect()
    }

    /// Tool names exposed by a connection; empty when it has no live handle or
    /// the server call fails.
    pub async fn available_tools(&self, id: ConnectionId) -> Vec<String> {
        let handle = self.inner.state.read().handles.get(&id).cloned();
        let Some(handle) = handle else {
            return Vec::new();
        };

        match discovery::discover_tool_names(&handle, self.request_timeout()).await {
            Ok(names) => names,
            Err(e) => {
                self.inner.metrics.record_discovery_failure();
                warn!(connection = %handle.name(), error = %e, "Failed to list tools");
                Vec::new()
            }
        }
    }

    pub fn handle(&self, id: ConnectionId) -> Option<Arc<ClientHandle>> {
        self.inner.state.read().handles.get(&id).cloned()
    }

    /// Copy of the identity to handle table.
    pub fn snapshot(&self) -> HashMap<ConnectionId, Arc<ClientHandle>> {
        self.inner.state.read().handles.clone()
    }

    pub fn is_active(&self, id: ConnectionId) -> bool {
        self.inner.state.read().handles.contains_key(&id)
    }

    pub fn retry_state(&self, id: ConnectionId) -> Option<RetryState> {
        self.inner.state.read().retries.get(&id).cloned()
    }

    pub fn status(&self, id: ConnectionId) -> Option<ConnectionStatus> {
        self.inner.state.read().statuses.get(&id).cloned()
    }

    /// Statuses of every known connection, ordered by name.
    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        let mut statuses: Vec<_> = self.inner.state.read().statuses.values().cloned().collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        statuses
    }

    /// Stop all retries and close every live handle.
    ///
    /// Registrations after shutdown still connect but can no longer schedule retries.
    pub async fn shutdown(&self) {
        let _gate = self.inner.write_gate.lock().await;
        self.inner.scheduler.shutdown();

        let (handles, retries) = {
            let mut state = self.inner.state.write();
            state.statuses.clear();
            let handles: Vec<_> = state.handles.drain().map(|(_, handle)| handle).collect();
            let retries: Vec<_> = state.retries.drain().map(|(_, retry)| retry).collect();
            (handles, retries)
        };

        for retry in &retries {
            retry.cancel.cancel();
        }
        join_all(handles.iter().map(|handle| self.inner.close_handle(handle))).await;

        info!(
            "MCP connection registry shut down ({} connections closed, {} retries cancelled)",
            handles.len(),
            retries.len()
        );
    }
}

impl RegistryInner {
    /// Drop the handle and retry state of `id`, closing and cancelling them.
    ///
    /// Caller holds the write gate.
    async fn release(&self, id: ConnectionId) {
        let (handle, retry) = {
            let mut state = self.state.write();
            (state.handles.remove(&id), state.retries.remove(&id))
        };

        if let Some(retry) = retry {
            retry.cancel.cancel();
            debug!(connection = %retry.connection_name(), "Cancelled pending retry");
        }
        if let Some(handle) = handle {
            self.close_handle(&handle).await;
        }
    }

    async fn close_handle(&self, handle: &ClientHandle) {
        if handle.close().await {
            self.metrics.record_handle_closed();
        }
    }

    /// One registration attempt. Caller holds the write gate.
    async fn attempt(
        self: &Arc<Self>,
        descriptor: &ConnectionDescriptor,
    ) -> McpResult<RegistrationResult> {
        match self
            .factory
            .create_client(descriptor, self.settings.initialize)
            .await
        {
            Ok(handle) => {
                self.metrics.record_handle_opened();
                Ok(self.install(descriptor, handle).await)
            }
            Err(e) if e.is_retryable() => {
                let message = e.to_string();
                warn!(
                    connection = %descriptor.name,
                    error = %message,
                    "Failed to connect MCP client"
                );
                match self.schedule_retry(descriptor, &message) {
                    RetryOutcome::Scheduled => Ok(RegistrationResult::RetryScheduled {
                        name: descriptor.name.clone(),
                        last_error: message,
                    }),
                    RetryOutcome::Exhausted | RetryOutcome::Unavailable => Err(e),
                }
            }
            Err(e) => {
                self.metrics.record_fatal_failure();
                warn!(
                    connection = %descriptor.name,
                    error = %e,
                    "MCP connection failed with non-retryable error"
                );
                {
                    let mut state = self.state.write();
                    state.retries.remove(&descriptor.id);
                    state
                        .statuses
                        .entry(descriptor.id)
                        .or_insert_with(|| ConnectionStatus::new(descriptor, ConnectionState::Error))
                        .mark_error(&e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn install(
        &self,
        descriptor: &ConnectionDescriptor,
        handle: ClientHandle,
    ) -> RegistrationResult {
        let transport_description = handle.transport_description().to_string();
        let previous = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            if let Some(retry) = state.retries.remove(&descriptor.id) {
                retry.cancel.cancel();
            }
            state
                .statuses
                .entry(descriptor.id)
                .or_insert_with(|| ConnectionStatus::new(descriptor, ConnectionState::Active))
                .mark_active(&transport_description);
            state.handles.insert(descriptor.id, Arc::new(handle))
        };

        if let Some(previous) = previous {
            self.close_handle(&previous).await;
        }

        self.metrics.record_connected();
        info!(
            connection = %descriptor.name,
            transport = %transport_description,
            "Connected to MCP server"
        );
        RegistrationResult::Connected {
            name: descriptor.name.clone(),
            transport_description,
        }
    }

    /// Record a retryable failure and schedule the next attempt if one is left.
    fn schedule_retry(self: &Arc<Self>, descriptor: &ConnectionDescriptor, error: &str) -> RetryOutcome {
        let id = descriptor.id;
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let cancel = self.scheduler.job_token();

        let decision = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let retry = state
                .retries
                .entry(id)
                .or_insert_with(|| RetryState::new(&descriptor.name, self.policy.max_attempts));
            let decision = retry.record_failure(&self.policy, error);
            let status = state
                .statuses
                .entry(id)
                .or_insert_with(|| ConnectionStatus::new(descriptor, ConnectionState::RetryPending));

            match decision {
                RetryDecision::Retry { attempt, delay } => {
                    retry.arm(ticket, cancel.clone());
                    status.mark_retry_pending(attempt, delay, error);
                }
                RetryDecision::Exhausted { .. } => {
                    state.retries.remove(&id);
                    status.mark_error(error);
                }
            }
            decision
        };

        let (attempt, delay) = match decision {
            RetryDecision::Retry { attempt, delay } => (attempt, delay),
            RetryDecision::Exhausted { attempts } => {
                self.metrics.record_retry_exhausted();
                error!(
                    connection = %descriptor.name,
                    attempts,
                    "Max retry attempts exceeded for MCP connection. Last error: {}",
                    error
                );
                return RetryOutcome::Exhausted;
            }
        };

        let weak = Arc::downgrade(self);
        let target = descriptor.clone();
        let scheduled = self.scheduler.schedule(delay, cancel, move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.run_retry(target, ticket).await;
            }
        });

        if let Err(e) = scheduled {
            warn!(
                connection = %descriptor.name,
                error = %e,
                "Could not schedule retry for MCP connection"
            );
            let mut state = self.state.write();
            state.retries.remove(&id);
            if let Some(status) = state.statuses.get_mut(&id) {
                status.mark_error(error);
            }
            return RetryOutcome::Unavailable;
        }

        self.metrics.record_retry_scheduled();
        info!(
            connection = %descriptor.name,
            attempt,
            delay_secs = delay.as_secs(),
            "Scheduled retry for MCP connection"
        );
        RetryOutcome::Scheduled
    }

    /// Fired by the scheduler. Acts only if this retry is still the current one.
    async fn run_retry(self: &Arc<Self>, descriptor: ConnectionDescriptor, ticket: u64) {
        let _gate = self.write_gate.lock().await;

        let attempt = {
            let state = self.state.read();
            let current = state
                .retries
                .get(&descriptor.id)
                .filter(|retry| retry.ticket == ticket)
                .map(RetryState::attempt);
            match current {
                Some(attempt) if descriptor.enabled && !state.handles.contains_key(&descriptor.id) => {
                    attempt
                }
                _ => {
                    debug!(connection = %descriptor.name, "Skipping superseded retry");
                    return;
                }
            }
        };

        self.metrics.record_retry_executed();
        info!(
            connection = %descriptor.name,
            attempt,
            "Executing retry for MCP connection"
        );

        match self.attempt(&descriptor).await {
            Err(e) if !e.is_retryable() => error!(
                connection = %descriptor.name,
                error = %e,
                "Retries stopped for MCP connection after non-retryable error"
            ),
            // exhaustion is reported where it is decided
            Err(e) => debug!(
                connection = %descriptor.name,
                error = %e,
                "Retries stopped for MCP connection"
            ),
            Ok(_) => {}
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}
