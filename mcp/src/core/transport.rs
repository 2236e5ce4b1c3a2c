//! Transport builder: turns a connection descriptor into a bound HTTP transport.
//!
//! Stateless; every call builds a fresh HTTP client carrying the descriptor's
//! headers as defaults, so they accompany the handshake and all later requests.

use std::collections::HashMap;

use rmcp::transport::{
    streamable_http_client::StreamableHttpClientTransportConfig, StreamableHttpClientTransport,
};
use url::Url;

use super::{config::ClientSettings, descriptor::ConnectionDescriptor, proxy};
use crate::error::{McpError, McpResult};

/// A descriptor resolved to an endpoint URI plus a configured HTTP client.
#[derive(Debug, Clone)]
pub struct BoundTransport {
    uri: Url,
    description: String,
    http_client: reqwest::Client,
}

impl BoundTransport {
    pub fn from_descriptor(
        descriptor: &ConnectionDescriptor,
        settings: &ClientSettings,
    ) -> McpResult<Self> {
        let uri = resolve_uri(descriptor)?;
        let http_client = build_http_client(settings, &descriptor.headers)?;

        Ok(Self {
            uri,
            description: descriptor.transport_description(),
            http_client,
        })
    }

    /// Endpoint the protocol client talks to.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// `base_url + endpoint`, for logs and registration results.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when an absolute endpoint replaced a path on the base URL, so the
    /// bound URI differs from [`Self::description`].
    pub fn rebases_base_path(&self) -> bool {
        self.uri.as_str() != self.description
    }

    /// Streamable HTTP transport bound to this endpoint.
    ///
    /// Must be called inside the runtime that will drive the client.
    pub(crate) fn into_streamable(self) -> StreamableHttpClientTransport<reqwest::Client> {
        let cfg = StreamableHttpClientTransportConfig::with_uri(self.uri.as_str());
        StreamableHttpClientTransport::with_client(self.http_client, cfg)
    }
}

/// Resolve the normalized endpoint against the base URL.
///
/// An absolute endpoint path replaces any path on the base URL.
fn resolve_uri(descriptor: &ConnectionDescriptor) -> McpResult<Url> {
    let base = Url::parse(descriptor.base_url.trim()).map_err(|e| {
        McpError::InvalidDescriptor(format!(
            "Connection '{}' has invalid baseUrl '{}': {}",
            descriptor.name, descriptor.base_url, e
        ))
    })?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(McpError::InvalidDescriptor(format!(
            "Connection '{}' uses unsupported scheme '{}'",
            descriptor.name,
            base.scheme()
        )));
    }

    base.join(&descriptor.normalized_endpoint()).map_err(|e| {
        McpError::InvalidDescriptor(format!(
            "Connection '{}' has invalid endpoint: {}",
            descriptor.name, e
        ))
    })
}

/// Build request headers from descriptor headers.
fn build_request_headers(
    custom_headers: &HashMap<String, String>,
) -> McpResult<reqwest::header::HeaderMap> {
    let mut headers = reqwest::header::HeaderMap::new();

    for (key, value) in custom_headers {
        headers.insert(
            reqwest::header::HeaderName::from_bytes(key.trim().as_bytes())
                .map_err(|e| McpError::Transport(format!("header name: {}", e)))?,
            value
                .parse()
                .map_err(|e| McpError::Transport(format!("header value: {}", e)))?,
        );
    }

    Ok(headers)
}

/// Build HTTP client with default headers.
fn build_http_client(
    settings: &ClientSettings,
    custom_headers: &HashMap<String, String>,
) -> McpResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(settings.connect_timeout());

    // No configured proxy forces a direct connection; environment proxies
    // apply only through `RegistryConfig::with_env_proxy`.
    builder = match settings.proxy.as_ref() {
        Some(proxy_cfg) => proxy::apply_proxy_to_builder(builder, proxy_cfg)?,
        None => builder.no_proxy(),
    };

    let req_headers = build_request_headers(custom_headers)?;
    if !req_headers.is_empty() {
        builder = builder.default_headers(req_headers);
    }

    builder
        .build()
        .map_err(|e| McpError::Transport(format!("build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_default_endpoint() {
        let descriptor = ConnectionDescriptor::new("catalog", "http://catalog.local");
        let transport =
            BoundTransport::from_descriptor(&descriptor, &ClientSettings::default()).unwrap();

        assert_eq!(transport.uri().as_str(), "http://catalog.local/api/mcp");
        assert_eq!(transport.description(), "http://catalog.local/api/mcp");
        assert!(!transport.rebases_base_path());
    }

    #[test]
    fn test_absolute_endpoint_replaces_base_path() {
        let descriptor = ConnectionDescriptor::new("catalog", "https://host:8443/ignored")
            .with_endpoint("/v2/mcp");
        let transport =
            BoundTransport::from_descriptor(&descriptor, &ClientSettings::default()).unwrap();

        assert_eq!(transport.uri().as_str(), "https://host:8443/v2/mcp");
        assert_eq!(transport.description(), "https://host:8443/ignored/v2/mcp");
        assert!(transport.rebases_base_path());
    }

    #[test]
    fn test_invalid_base_url_is_fatal() {
        let descriptor = ConnectionDescriptor::new("catalog", "not a url");
        let err = BoundTransport::from_descriptor(&descriptor, &ClientSettings::default())
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidDescriptor(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unsupported_scheme_is_fatal() {
        let descriptor = ConnectionDescriptor::new("catalog", "ftp://catalog.local");
        let err = BoundTransport::from_descriptor(&descriptor, &ClientSettings::default())
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_invalid_header_is_transport_error() {
        let descriptor = ConnectionDescriptor::new("catalog", "http://catalog.local")
            .with_header("bad header", "value");
        let err = BoundTransport::from_descriptor(&descriptor, &ClientSettings::default())
            .unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_headers_are_accepted() {
        let headers = HashMap::from([
            ("Authorization".to_string(), "Bearer abc".to_string()),
            ("X-Tenant".to_string(), "music".to_string()),
        ]);
        let map = build_request_headers(&headers).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("x-tenant").unwrap(), "music");
    }
}
