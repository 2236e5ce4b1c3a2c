//! Client handler for MCP server notifications.
//!
//! Implements RMCP's `ClientHandler` trait to:
//! - announce the client identity during the handshake
//! - forward server logging notifications into `tracing`
//! - report list-change and progress notifications

use std::sync::Arc;

use rmcp::{
    model::{ClientInfo, LoggingLevel, LoggingMessageNotificationParam, ProgressNotificationParam},
    service::NotificationContext,
    ClientHandler, RoleClient,
};
use tracing::{debug, error, info, warn};

use super::config::ClientSettings;

#[derive(Clone)]
pub struct ConnectionClientHandler {
    connection: Arc<str>,
    client_info: ClientInfo,
}

impl ConnectionClientHandler {
    pub fn new(settings: &ClientSettings, connection_name: &str) -> Self {
        let mut client_info = ClientInfo::default();
        client_info.client_info.name = settings.client_name_for(connection_name);
        client_info.client_info.version = settings.version.clone();

        Self {
            connection: Arc::from(connection_name),
            client_info,
        }
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }
}

impl ClientHandler for ConnectionClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.client_info.clone()
    }

    async fn on_progress(
        &self,
        params: ProgressNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        debug!(
            connection = %self.connection,
            token = ?params.progress_token,
            progress = %params.progress,
            total = ?params.total,
            "MCP server progress"
        );
    }

    async fn on_tool_list_changed(&self, _context: NotificationContext<RoleClient>) {
        info!(connection = %self.connection, "MCP server tool list changed");
    }

    async fn on_resource_list_changed(&self, _context: NotificationContext<RoleClient>) {
        debug!(connection = %self.connection, "MCP server resource list changed");
    }

    async fn on_prompt_list_changed(&self, _context: NotificationContext<RoleClient>) {
        debug!(connection = %self.connection, "MCP server prompt list changed");
    }

    async fn on_logging_message(
        &self,
        params: LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        let logger = params.logger.as_deref().unwrap_or("unknown");

        match params.level {
            LoggingLevel::Emergency
            | LoggingLevel::Alert
            | LoggingLevel::Critical
            | LoggingLevel::Error => {
                error!(
                    connection = %self.connection,
                    logger = %logger,
                    level = ?params.level,
                    "MCP server: {}",
                    params.data
                );
            }
            LoggingLevel::Warning => {
                warn!(
                    connection = %self.connection,
                    logger = %logger,
                    "MCP server: {}",
                    params.data
                );
            }
            LoggingLevel::Notice | LoggingLevel::Info => {
                info!(
                    connection = %self.connection,
                    logger = %logger,
                    "MCP server: {}",
                    params.data
                );
            }
            LoggingLevel::Debug => {
                debug!(
                    connection = %self.connection,
                    logger = %logger,
                    "MCP server: {}",
                    params.data
                );
            }
        }
    }
}
