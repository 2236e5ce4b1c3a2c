//! Live protocol clients and the handles the registry owns.
//!
//! A client runs in exactly one execution mode, modelled as [`McpClient`]:
//! - [`AsyncMcpClient`] is driven by the caller's tokio runtime.
//! - [`SyncMcpClient`] owns a single-worker runtime and offers blocking calls.
//!
//! Either way the handshake is bounded by the request timeout, and closing is
//! idempotent: only the first `close()` releases the client.

use std::{error::Error as StdError, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rmcp::{
    model::Tool,
    service::{serve_directly, Peer, RunningService},
    transport::IntoTransport,
    RoleClient, ServiceExt,
};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, warn};

use super::{
    config::ClientMode,
    descriptor::{ConnectionDescriptor, ConnectionId},
    handler::ConnectionClientHandler,
};
use crate::error::{render_error_chain, McpError, McpResult};

type RunningClient = RunningService<RoleClient, ConnectionClientHandler>;

/// Start the protocol service over `transport`, optionally performing the handshake.
///
/// Must run inside the runtime that will drive the client.
async fn establish<T, E, A>(
    handler: ConnectionClientHandler,
    transport: T,
    initialize: bool,
) -> McpResult<RunningClient>
where
    T: IntoTransport<RoleClient, E, A>,
    E: StdError + Send + Sync + 'static,
{
    if initialize {
        handler
            .serve(transport)
            .await
            .map_err(|e| McpError::Handshake(render_error_chain(&e)))
    } else {
        let service: RunningClient = serve_directly(handler, transport, None);
        Ok(service)
    }
}

fn list_failure(err: &(dyn StdError + 'static)) -> McpError {
    McpError::ConnectionFailed(format!("list tools: {}", render_error_chain(err)))
}

/// Protocol client driven by the caller's runtime.
pub struct AsyncMcpClient {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningClient>>,
}

impl AsyncMcpClient {
    pub(crate) async fn connect<T, E, A>(
        handler: ConnectionClientHandler,
        transport: T,
        initialize: bool,
        timeout: Duration,
    ) -> McpResult<Self>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: StdError + Send + Sync + 'static,
    {
        let service = tokio::time::timeout(timeout, establish(handler, transport, initialize))
            .await
            .map_err(|_| McpError::Timeout(timeout, "initialize handshake"))??;

        Ok(Self {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        })
    }

    pub fn peer(&self) -> &Peer<RoleClient> {
        &self.peer
    }

    pub async fn list_tools(&self, timeout: Duration) -> McpResult<Vec<Tool>> {
        if self.is_closed() {
            return Err(McpError::ServerDisconnected("client is closed".to_string()));
        }
        tokio::time::timeout(timeout, self.peer.list_all_tools())
            .await
            .map_err(|_| McpError::Timeout(timeout, "tools/list"))?
            .map_err(|e| list_failure(&e))
    }

    pub fn is_closed(&self) -> bool {
        self.service.lock().is_none()
    }

    async fn close(&self) -> bool {
        let service = self.service.lock().take();
        let Some(service) = service else {
            return false;
        };
        if let Err(e) = service.cancel().await {
            warn!("Error closing MCP client: {}", e);
        }
        true
    }
}

/// Protocol client with a blocking API.
///
/// The client lives on its own single-worker runtime, so the blocking methods
/// work from plain threads. They must not be called from inside an async
/// context; async callers go through [`McpClient`] instead.
pub struct SyncMcpClient {
    peer: Peer<RoleClient>,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    service: Mutex<Option<RunningClient>>,
}

impl SyncMcpClient {
    pub(crate) async fn connect<F, T, E, A>(
        handler: ConnectionClientHandler,
        make_transport: F,
        initialize: bool,
        timeout: Duration,
    ) -> McpResult<Self>
    where
        F: FnOnce() -> T + Send + 'static,
        T: IntoTransport<RoleClient, E, A>,
        E: StdError + Send + Sync + 'static,
        A: Send + 'static,
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("mcp-sync-{}", handler.connection()))
            .enable_all()
            .build()
            .map_err(|e| McpError::Transport(format!("start client runtime: {}", e)))?;

        let task = runtime.spawn(async move {
            let transport = make_transport();
            establish(handler, transport, initialize).await
        });
        let abort = task.abort_handle();

        let service = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(service))) => service,
            Ok(Ok(Err(e))) => {
                runtime.shutdown_background();
                return Err(e);
            }
            Ok(Err(join_err)) => {
                runtime.shutdown_background();
                return Err(McpError::ConnectionFailed(format!(
                    "client task failed: {}",
                    join_err
                )));
            }
            Err(_) => {
                abort.abort();
                runtime.shutdown_background();
                return Err(McpError::Timeout(timeout, "initialize handshake"));
            }
        };

        Ok(Self {
            peer: service.peer().clone(),
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            service: Mutex::new(Some(service)),
        })
    }

    pub fn peer(&self) -> &Peer<RoleClient> {
        &self.peer
    }

    /// Handle of the runtime driving this client, for running further requests.
    pub fn runtime_handle(&self) -> &Handle {
        &self.handle
    }

    /// List tools, blocking the calling thread for at most `timeout`.
    ///
    /// Panics if called from within an async runtime.
    pub fn list_tools_blocking(&self, timeout: Duration) -> McpResult<Vec<Tool>> {
        if self.is_closed() {
            return Err(McpError::ServerDisconnected("client is closed".to_string()));
        }
        let peer = self.peer.clone();
        self.handle.block_on(async move {
            tokio::time::timeout(timeout, peer.list_all_tools())
                .await
                .map_err(|_| McpError::Timeout(timeout, "tools/list"))?
                .map_err(|e| list_failure(&e))
        })
    }

    /// List tools from async code by running the request on the client's runtime.
    async fn list_tools(&self, timeout: Duration) -> McpResult<Vec<Tool>> {
        if self.is_closed() {
            return Err(McpError::ServerDisconnected("client is closed".to_string()));
        }
        let peer = self.peer.clone();
        let task = self.handle.spawn(async move { peer.list_all_tools().await });
        let abort = task.abort_handle();

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result.map_err(|e| list_failure(&e)),
            Ok(Err(join_err)) => Err(McpError::ServerDisconnected(format!(
                "client task failed: {}",
                join_err
            ))),
            Err(_) => {
                abort.abort();
                Err(McpError::Timeout(timeout, "tools/list"))
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.service.lock().is_none()
    }

    async fn close(&self) -> bool {
        let service = self.service.lock().take();
        let Some(service) = service else {
            return false;
        };

        let task = self.handle.spawn(async move { service.cancel().await });
        match task.await {
            Ok(Err(e)) => warn!("Error closing MCP client: {}", e),
            Err(e) => warn!("MCP client shutdown task failed: {}", e),
            Ok(Ok(_)) => {}
        }

        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
        true
    }
}

impl Drop for SyncMcpClient {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which is not allowed inside async code.
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

/// A protocol client in exactly one execution mode.
pub enum McpClient {
    Async(AsyncMcpClient),
    Sync(SyncMcpClient),
}

impl McpClient {
    /// Build a client in `mode` over the transport produced by `make_transport`.
    ///
    /// The transport is created inside the runtime that drives the client.
    pub async fn connect<F, T, E, A>(
        mode: ClientMode,
        handler: ConnectionClientHandler,
        make_transport: F,
        initialize: bool,
        timeout: Duration,
    ) -> McpResult<Self>
    where
        F: FnOnce() -> T + Send + 'static,
        T: IntoTransport<RoleClient, E, A>,
        E: StdError + Send + Sync + 'static,
        A: Send + 'static,
    {
        match mode {
            ClientMode::Async => {
                AsyncMcpClient::connect(handler, make_transport(), initialize, timeout)
                    .await
                    .map(McpClient::Async)
            }
            ClientMode::Sync => {
                SyncMcpClient::connect(handler, make_transport, initialize, timeout)
                    .await
                    .map(McpClient::Sync)
            }
        }
    }

    pub fn mode(&self) -> ClientMode {
        match self {
            McpClient::Async(_) => ClientMode::Async,
            McpClient::Sync(_) => ClientMode::Sync,
        }
    }

    pub fn peer(&self) -> &Peer<RoleClient> {
        match self {
            McpClient::Async(client) => client.peer(),
            McpClient::Sync(client) => client.peer(),
        }
    }

    pub fn as_async(&self) -> Option<&AsyncMcpClient> {
        match self {
            McpClient::Async(client) => Some(client),
            McpClient::Sync(_) => None,
        }
    }

    pub fn as_sync(&self) -> Option<&SyncMcpClient> {
        match self {
            McpClient::Sync(client) => Some(client),
            McpClient::Async(_) => None,
        }
    }

    /// List tools from async code, whatever the mode.
    pub async fn list_tools(&self, timeout: Duration) -> McpResult<Vec<Tool>> {
        match self {
            McpClient::Async(client) => client.list_tools(timeout).await,
            McpClient::Sync(client) => client.list_tools(timeout).await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            McpClient::Async(client) => client.is_closed(),
            McpClient::Sync(client) => client.is_closed(),
        }
    }

    async fn close(&self) -> bool {
        match self {
            McpClient::Async(client) => client.close().await,
            McpClient::Sync(client) => client.close().await,
        }
    }
}

/// A live client plus the descriptor it was built from.
pub struct ClientHandle {
    descriptor: ConnectionDescriptor,
    transport_description: String,
    client: McpClient,
    connected_at: DateTime<Utc>,
}

impl ClientHandle {
    pub fn new(
        descriptor: ConnectionDescriptor,
        transport_description: impl Into<String>,
        client: McpClient,
    ) -> Self {
        Self {
            descriptor,
            transport_description: transport_description.into(),
            client,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn transport_description(&self) -> &str {
        &self.transport_description
    }

    pub fn mode(&self) -> ClientMode {
        self.client.mode()
    }

    pub fn client(&self) -> &McpClient {
        &self.client
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub async fn list_tools(&self, timeout: Duration) -> McpResult<Vec<Tool>> {
        self.client.list_tools(timeout).await
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Close the client. Returns `true` only for the call that actually closed it.
    pub async fn close(&self) -> bool {
        let closed = self.client.close().await;
        if closed {
            debug!(
                connection = %self.descriptor.name,
                transport = %self.transport_description,
                "Closed MCP client"
            );
        }
        closed
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.descriptor.id)
            .field("name", &self.descriptor.name)
            .field("transport", &self.transport_description)
            .field("mode", &self.client.mode())
            .field("closed", &self.client.is_closed())
            .finish()
    }
}
