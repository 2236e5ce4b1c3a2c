//! Shared fixtures: an in-process MCP server and a factory that connects to it.

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use mcp_connect::{
    ClientFactory, ClientHandle, ClientMode, ClientSettings, ConnectionClientHandler,
    ConnectionDescriptor, McpClient, McpError, McpResult, Tool,
};
use rmcp::{
    model::{ErrorData, ListToolsResult, PaginatedRequestParam, ServerCapabilities, ServerInfo},
    service::RequestContext,
    RoleServer, ServerHandler, ServiceExt,
};
use tokio::sync::watch;

/// Minimal MCP server exposing a fixed tool list.
#[derive(Clone)]
pub struct CatalogServer {
    tools: Vec<Tool>,
    fail_listing: bool,
}

impl CatalogServer {
    pub fn new(tool_names: &[&str]) -> Self {
        let tools = tool_names
            .iter()
            .map(|name| {
                Tool::new(
                    name.to_string(),
                    format!("{} tool", name),
                    Arc::new(serde_json::Map::new()),
                )
            })
            .collect();
        Self {
            tools,
            fail_listing: false,
        }
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

impl ServerHandler for CatalogServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        if self.fail_listing {
            return Err(ErrorData::internal_error("catalog index unavailable", None));
        }
        Ok(ListToolsResult::with_all_items(self.tools.clone()))
    }
}

/// Factory that serves [`CatalogServer`] over an in-memory duplex pipe, or
/// fails with "connection refused" while unreachable.
///
/// Handshakes can be held open with [`InProcessFactory::hold_handshakes`] to
/// observe the registry while a connection is in flight.
pub struct InProcessFactory {
    settings: ClientSettings,
    server: CatalogServer,
    reachable: AtomicBool,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    held: watch::Sender<bool>,
}

impl InProcessFactory {
    pub fn new(settings: ClientSettings, server: CatalogServer) -> Arc<Self> {
        Arc::new(Self {
            settings,
            server,
            reachable: AtomicBool::new(true),
            attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            held: watch::Sender::new(false),
        })
    }

    pub fn hold_handshakes(&self) {
        self.held.send_replace(true);
    }

    pub fn release_handshakes(&self) {
        self.held.send_replace(false);
    }

    /// Handshakes currently parked by [`Self::hold_handshakes`].
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for InProcessFactory {
    async fn create_client(
        &self,
        descriptor: &ConnectionDescriptor,
        initialize: bool,
    ) -> McpResult<ClientHandle> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let mut held = self.held.subscribe();
        if *held.borrow() {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let _ = held.wait_for(|held| !*held).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        if !self.reachable.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionFailed(
                "tcp connect error: Connection refused (os error 111)".to_string(),
            ));
        }

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let server = self.server.clone();
        tokio::spawn(async move {
            if let Ok(running) = server.serve(server_io).await {
                let _ = running.waiting().await;
            }
        });

        let handler = ConnectionClientHandler::new(&self.settings, &descriptor.name);
        let client = McpClient::connect(
            self.settings.mode,
            handler,
            move || client_io,
            initialize,
            self.settings.request_timeout(),
        )
        .await?;

        Ok(ClientHandle::new(
            descriptor.clone(),
            descriptor.transport_description(),
            client,
        ))
    }

    fn mode(&self) -> ClientMode {
        self.settings.mode
    }
}

pub fn catalog_descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor::new("catalog", "http://catalog.local").with_endpoint("/api/mcp")
}

/// Let spawned tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Yield until `condition` holds; gives up after a bounded number of polls.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..1000 {
        if condition() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    condition()
}
