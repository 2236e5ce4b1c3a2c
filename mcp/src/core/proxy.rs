//! HTTP proxy support for MCP connections.
//!
//! Applies the process-wide proxy settings to the HTTP client builder used by
//! every transport.

use super::config::McpProxyConfig;
use crate::error::{McpError, McpResult};

/// Apply proxy configuration to a ClientBuilder.
///
/// Applies proxy settings without building the client, so default headers
/// and timeouts can still be added afterwards.
pub(crate) fn apply_proxy_to_builder(
    mut builder: reqwest::ClientBuilder,
    proxy_cfg: &McpProxyConfig,
) -> McpResult<reqwest::ClientBuilder> {
    if let Some(ref http_proxy) = proxy_cfg.http {
        let proxy = reqwest::Proxy::http(http_proxy)
            .map_err(|e| McpError::Config(format!("Invalid HTTP proxy: {}", e)))?;
        builder = builder.proxy(decorate(proxy, proxy_cfg));
    }

    if let Some(ref https_proxy) = proxy_cfg.https {
        let proxy = reqwest::Proxy::https(https_proxy)
            .map_err(|e| McpError::Config(format!("Invalid HTTPS proxy: {}", e)))?;
        builder = builder.proxy(decorate(proxy, proxy_cfg));
    }

    Ok(builder)
}

/// Attach no_proxy exclusions and basic auth shared by both schemes.
fn decorate(mut proxy: reqwest::Proxy, proxy_cfg: &McpProxyConfig) -> reqwest::Proxy {
    if let Some(ref no_proxy) = proxy_cfg.no_proxy {
        proxy = proxy.no_proxy(reqwest::NoProxy::from_string(no_proxy));
    }

    if let (Some(ref username), Some(ref password)) = (&proxy_cfg.username, &proxy_cfg.password) {
        proxy = proxy.basic_auth(username, password);
    }

    proxy
}
