//! Client factory: builds live client handles from descriptors.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    client::{ClientHandle, McpClient},
    config::{ClientMode, ClientSettings},
    descriptor::ConnectionDescriptor,
    handler::ConnectionClientHandler,
    transport::BoundTransport,
};
use crate::error::McpResult;

/// Builds a protocol client for a descriptor, optionally performing the handshake.
///
/// The registry depends on this seam only, so alternative transports (or
/// in-process servers in tests) can stand in for streamable HTTP.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create_client(
        &self,
        descriptor: &ConnectionDescriptor,
        initialize: bool,
    ) -> McpResult<ClientHandle>;

    /// Execution mode of the clients this factory builds.
    fn mode(&self) -> ClientMode;
}

/// Factory for streamable HTTP connections.
#[derive(Debug, Clone, Default)]
pub struct StreamableHttpClientFactory {
    settings: ClientSettings,
}

impl StreamableHttpClientFactory {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }
}

#[async_trait]
impl ClientFactory for StreamableHttpClientFactory {
    async fn create_client(
        &self,
        descriptor: &ConnectionDescriptor,
        initialize: bool,
    ) -> McpResult<ClientHandle> {
        let transport = BoundTransport::from_descriptor(descriptor, &self.settings)?;
        let description = transport.description().to_string();
        let handler = ConnectionClientHandler::new(&self.settings, &descriptor.name);

        if transport.rebases_base_path() {
            info!(
                connection = %descriptor.name,
                uri = %transport.uri(),
                transport = %description,
                "Endpoint path replaces the base URL path; connecting to uri"
            );
        }
        debug!(
            connection = %descriptor.name,
            uri = %transport.uri(),
            transport = %description,
            mode = %self.settings.mode,
            initialize,
            "Creating MCP client"
        );

        let client = McpClient::connect(
            self.settings.mode,
            handler,
            move || transport.into_streamable(),
            initialize,
            self.settings.request_timeout(),
        )
        .await?;

        Ok(ClientHandle::new(descriptor.clone(), description, client))
    }

    fn mode(&self) -> ClientMode {
        self.settings.mode
    }
}
