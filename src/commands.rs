//! Subcommand implementations.

use std::path::Path;

use anyhow::Context;
use mcp_connect::{
    ConnectionDescriptor, ConnectionRegistry, ConnectionStatus, RegistrationResult,
    RegistryConfig,
};
use tracing::{error, info, warn};

async fn load_config(path: &Path) -> anyhow::Result<RegistryConfig> {
    let config = RegistryConfig::from_yaml_file(path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(config.with_env_proxy())
}

/// Startup reconciliation: register everything, report, wait for Ctrl-C.
pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path).await?;
    let registry = ConnectionRegistry::new(&config);
    info!(
        "Registering {} MCP connections (mode: {})",
        config.connections.len(),
        config.client.mode
    );

    for descriptor in config.connections.iter().cloned() {
        let name = descriptor.name.clone();
        match registry.register(descriptor).await {
            Ok(RegistrationResult::RetryScheduled { .. }) => {}
            Ok(result) => info!("{}", result),
            Err(e) => error!(connection = %name, "{:#}", anyhow::Error::new(e)),
        }
    }

    for status in registry.statuses() {
        print_status(&status);
        if registry.is_active(status.id) {
            let tools = registry.available_tools(status.id).await;
            println!("    tools: {}", tools.join(", "));
        }
    }

    info!("Press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    registry.shutdown().await;
    let metrics = registry.metrics().snapshot();
    info!(
        registrations = metrics.registrations,
        retries = metrics.retries_executed,
        handles_closed = metrics.handles_closed,
        "Stopped"
    );
    Ok(())
}

/// One-off handshake against a single server.
pub async fn test(
    name: String,
    url: String,
    endpoint: Option<String>,
    headers: Vec<(String, String)>,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => load_config(path).await?,
        None => RegistryConfig::default().with_env_proxy(),
    };
    let registry = ConnectionRegistry::new(&config);

    let mut descriptor = ConnectionDescriptor::new(name, url);
    if let Some(endpoint) = endpoint {
        descriptor = descriptor.with_endpoint(endpoint);
    }
    for (key, value) in headers {
        descriptor = descriptor.with_header(key, value);
    }

    match registry.test_connection(&descriptor).await {
        Ok(result) => {
            println!("{}", result);
            Ok(())
        }
        Err(e) => {
            if e.is_retryable() {
                warn!("Server looks unreachable; it may come up later");
            }
            Err(anyhow::Error::new(e))
        }
    }
}

fn print_status(status: &ConnectionStatus) {
    let mut line = format!(
        "{:<14} {} ({})",
        status.state.to_string(),
        status.name,
        status.transport_description
    );
    if let Some(attempt) = status.retry_attempt {
        line.push_str(&format!(" retry #{}", attempt));
    }
    if let Some(delay) = status.next_retry_in_secs {
        line.push_str(&format!(" in {}s", delay));
    }
    if let Some(err) = &status.last_error {
        line.push_str(&format!(" last error: {}", err));
    }
    println!("{}", line);
}
