//! Tool discovery over live client handles.
//!
//! Discovery is best-effort: a failing server contributes no tools and never
//! changes its connection status.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use rmcp::model::Tool;
use tracing::{info, warn};

use super::{client::ClientHandle, descriptor::ConnectionId, registry::ConnectionRegistry};
use crate::error::McpResult;

/// List tool names exposed by one handle.
pub async fn discover_tool_names(handle: &ClientHandle, timeout: Duration) -> McpResult<Vec<String>> {
    let tools = handle.list_tools(timeout).await?;
    Ok(tools.into_iter().map(|tool| tool.name.to_string()).collect())
}

/// List tool names exposed by one handle, degrading to an empty list on failure.
pub async fn list_tool_names(handle: &ClientHandle, timeout: Duration) -> Vec<String> {
    match discover_tool_names(handle, timeout).await {
        Ok(names) => names,
        Err(e) => {
            warn!(
                connection = %handle.name(),
                error = %e,
                "Failed to list tools"
            );
            Vec::new()
        }
    }
}

/// A tool definition together with the connection that serves it.
#[derive(Debug, Clone)]
pub struct DiscoveredTool {
    pub connection_id: ConnectionId,
    pub connection_name: String,
    pub tool: Tool,
}

/// Aggregates tool definitions across statically configured clients and the
/// registry's active connections, for the tool-calling layer.
#[derive(Clone)]
pub struct DynamicToolProvider {
    registry: ConnectionRegistry,
    base_clients: Vec<Arc<ClientHandle>>,
}

impl DynamicToolProvider {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            registry,
            base_clients: Vec::new(),
        }
    }

    /// Clients managed outside the registry that should also contribute tools.
    #[must_use]
    pub fn with_base_clients(mut self, clients: Vec<Arc<ClientHandle>>) -> Self {
        self.base_clients = clients;
        self
    }

    /// Clients queried by [`tools`](Self::tools): base clients first, then active connections.
    pub fn clients(&self) -> Vec<Arc<ClientHandle>> {
        let dynamic = self.registry.active_clients(self.registry.mode());
        let mut clients = Vec::with_capacity(self.base_clients.len() + dynamic.len());
        clients.extend(self.base_clients.iter().cloned());
        clients.extend(dynamic);
        clients
    }

    /// Collect every tool from every client; failing clients are skipped.
    pub async fn tools(&self) -> Vec<DiscoveredTool> {
        let clients = self.clients();
        info!(
            "MCP tool discovery: {} total clients ({} base + {} dynamic)",
            clients.len(),
            self.base_clients.len(),
            clients.len() - self.base_clients.len()
        );

        if clients.is_empty() {
            warn!("No MCP clients available for tool discovery");
            return Vec::new();
        }

        let timeout = self.registry.request_timeout();
        let results = join_all(clients.iter().map(|handle| async move {
            (handle, handle.list_tools(timeout).await)
        }))
        .await;

        let mut tools = Vec::new();
        for (handle, result) in results {
            match result {
                Ok(list) => tools.extend(list.into_iter().map(|tool| DiscoveredTool {
                    connection_id: handle.id(),
                    connection_name: handle.name().to_string(),
                    tool,
                })),
                Err(e) => {
                    self.registry.metrics().record_discovery_failure();
                    warn!(
                        connection = %handle.name(),
                        error = %e,
                        "Skipping MCP client during tool discovery"
                    );
                }
            }
        }

        if tools.is_empty() {
            warn!("No tools discovered from {} MCP clients", clients.len());
        } else {
            info!("Discovered {} MCP tools from {} clients", tools.len(), clients.len());
        }
        tools
    }
}
