//! Dynamic registry of Model Context Protocol (MCP) client connections.
//!
//! ## Modules
//!
//! - [`core`]: descriptors, transports, clients, the connection registry and
//!   its retry engine, tool discovery
//! - [`error`]: error types and retryable/fatal classification
//!
//! The entry point is [`ConnectionRegistry`]: hand it [`ConnectionDescriptor`]s
//! and it keeps one live client per connection, retrying unreachable servers
//! in the background.

pub mod core;
pub mod error;

// Re-export from core
pub use core::{
    AsyncMcpClient, ClientFactory, ClientHandle, ClientMode, ClientSettings,
    ConnectionClientHandler, ConnectionDescriptor, ConnectionId, ConnectionRegistry,
    ConnectionState, ConnectionStatus, DiscoveredTool, DynamicToolProvider, McpClient,
    McpProxyConfig, MetricsSnapshot, RegistrationResult, RegistryConfig, RegistryMetrics,
    RetryConfig, RetryPolicy, RetryState, SchedulerConfig, StreamableHttpClientFactory,
    SyncMcpClient, DEFAULT_ENDPOINT,
};
pub use error::{McpError, McpResult};
// Protocol types that appear in this crate's public API
pub use rmcp::model::Tool;
