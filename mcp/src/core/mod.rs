//! Core connection-management infrastructure.

pub mod client;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod factory;
pub mod handler;
pub mod metrics;
pub mod proxy;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod transport;

pub use client::{AsyncMcpClient, ClientHandle, McpClient, SyncMcpClient};
pub use config::{
    ClientMode, ClientSettings, McpProxyConfig, RegistryConfig, RetryConfig, SchedulerConfig,
};
pub use descriptor::{normalize_endpoint, ConnectionDescriptor, ConnectionId, DEFAULT_ENDPOINT};
pub use discovery::{discover_tool_names, list_tool_names, DiscoveredTool, DynamicToolProvider};
pub use factory::{ClientFactory, StreamableHttpClientFactory};
pub use handler::ConnectionClientHandler;
pub use metrics::{MetricsSnapshot, RegistryMetrics};
pub use registry::ConnectionRegistry;
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use scheduler::RetryScheduler;
pub use status::{ConnectionState, ConnectionStatus, RegistrationResult};
pub use transport::BoundTransport;
