//! Registry configuration types and utilities.
//!
//! Defines process-wide client settings, retry and scheduler tuning, proxy
//! settings, and the YAML document used to seed the registry at startup.

use std::{fmt, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use super::descriptor::ConnectionDescriptor;
use crate::error::{McpError, McpResult};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Protocol client settings shared by every connection
    #[serde(default)]
    pub client: ClientSettings,

    /// Automatic retry of failed registrations
    #[serde(default)]
    pub retry: RetryConfig,

    /// Background retry scheduler
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Connections registered at startup
    #[serde(default)]
    pub connections: Vec<ConnectionDescriptor>,
}

/// Execution mode of the protocol clients built by the registry.
///
/// This is a process-wide setting, never per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    /// Blocking facade over a client driven by its own runtime.
    Sync,
    /// Client driven by the caller's tokio runtime.
    #[default]
    Async,
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMode::Sync => f.write_str("sync"),
            ClientMode::Async => f.write_str("async"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientSettings {
    /// Client implementation name announced in the handshake
    /// (sent as "<name> - <connection name>")
    #[serde(default = "default_client_name")]
    pub name: String,

    #[serde(default = "default_client_version")]
    pub version: String,

    #[serde(default)]
    pub mode: ClientMode,

    /// Bound on the handshake and every request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout of the underlying HTTP client, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Perform the initialize handshake when registering
    #[serde(default = "default_true")]
    pub initialize: bool,

    /// MCP-specific proxy (does NOT affect other HTTP traffic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<McpProxyConfig>,
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Client name announced for one connection.
    pub fn client_name_for(&self, connection_name: &str) -> String {
        format!("{} - {}", self.name, connection_name)
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ClientMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            version: default_client_version(),
            mode: ClientMode::default(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            initialize: true,
            proxy: None,
        }
    }
}

/// Retry tuning: `delay(n) = min(initial_delay * 2^(n-1), max_delay)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Retry attempts allowed to run concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// MCP-specific proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct McpProxyConfig {
    /// HTTP proxy URL (e.g., "http://proxy.internal:8080")
    pub http: Option<String>,

    /// HTTPS proxy URL
    pub https: Option<String>,

    /// Comma-separated hosts to exclude from proxying
    /// Example: "localhost,127.0.0.1,*.internal,10.*"
    pub no_proxy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// Default value functions
fn default_client_name() -> String {
    "mcp-connect".to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_request_timeout() -> u64 {
    20
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> u64 {
    5
}

fn default_max_delay() -> u64 {
    300 // 5 minutes
}

fn default_workers() -> usize {
    2
}

impl McpProxyConfig {
    /// Load proxy config from standard environment variables
    pub fn from_env() -> Option<Self> {
        let http = std::env::var("MCP_HTTP_PROXY")
            .ok()
            .or_else(|| std::env::var("HTTP_PROXY").ok());

        let https = std::env::var("MCP_HTTPS_PROXY")
            .ok()
            .or_else(|| std::env::var("HTTPS_PROXY").ok());

        let no_proxy = std::env::var("MCP_NO_PROXY")
            .ok()
            .or_else(|| std::env::var("NO_PROXY").ok());

        if http.is_some() || https.is_some() {
            Some(Self {
                http,
                https,
                no_proxy,
                username: None,
                password: None,
            })
        } else {
            None
        }
    }
}

impl RegistryConfig {
    pub fn from_yaml_str(yaml: &str) -> McpResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub async fn from_yaml_file(path: impl AsRef<Path>) -> McpResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml_str(&content)
    }

    /// Fill in the proxy from the environment when none is configured
    pub fn with_env_proxy(mut self) -> Self {
        if self.client.proxy.is_none() {
            self.client.proxy = McpProxyConfig::from_env();
        }
        self
    }

    pub fn validate(&self) -> McpResult<()> {
        if self.scheduler.workers == 0 {
            return Err(McpError::Config(
                "scheduler.workers must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(McpError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.initial_delay_secs == 0 || self.retry.max_delay_secs == 0 {
            return Err(McpError::Config(
                "retry delays must be positive".to_string(),
            ));
        }
        if self.client.request_timeout_secs == 0 || self.client.connect_timeout_secs == 0 {
            return Err(McpError::Config(
                "client timeouts must be positive".to_string(),
            ));
        }
        for connection in &self.connections {
            connection.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ClientSettings::default();
        assert_eq!(settings.mode, ClientMode::Async);
        assert_eq!(settings.request_timeout(), Duration::from_secs(20));
        assert!(settings.initialize);
        assert_eq!(settings.client_name_for("catalog"), "mcp-connect - catalog");

        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay_secs, 5);
        assert_eq!(retry.max_delay_secs, 300);

        assert_eq!(SchedulerConfig::default().workers, 2);
    }

    #[test]
    #[serial]
    fn test_proxy_from_env_empty() {
        std::env::remove_var("MCP_HTTP_PROXY");
        std::env::remove_var("MCP_HTTPS_PROXY");
        std::env::remove_var("HTTP_PROXY");
        std::env::remove_var("HTTPS_PROXY");

        let proxy = McpProxyConfig::from_env();
        assert!(proxy.is_none(), "Should return None when no env vars set");
    }

    #[test]
    #[serial]
    fn test_proxy_from_env_with_vars() {
        std::env::set_var("MCP_HTTP_PROXY", "http://test-proxy:8080");
        std::env::set_var("MCP_NO_PROXY", "localhost,127.0.0.1");

        let proxy = McpProxyConfig::from_env();
        assert!(proxy.is_some(), "Should return Some when env vars set");

        let proxy = proxy.unwrap();
        assert_eq!(proxy.http.as_deref(), Some("http://test-proxy:8080"));
        assert_eq!(proxy.no_proxy.as_deref(), Some("localhost,127.0.0.1"));

        std::env::remove_var("MCP_HTTP_PROXY");
        std::env::remove_var("MCP_NO_PROXY");
    }

    #[test]
    fn test_yaml_minimal_config() {
        let yaml = r#"
connections:
  - name: "catalog"
    base_url: "http://catalog.local"
"#;

        let config = RegistryConfig::from_yaml_str(yaml).expect("Failed to parse YAML");
        assert_eq!(config.connections.len(), 1);
        assert_eq!(config.connections[0].name, "catalog");
        assert!(config.connections[0].enabled);
        assert_eq!(config.client.mode, ClientMode::Async);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.scheduler.workers, 2);
    }

    #[test]
    fn test_yaml_full_config() {
        let yaml = r#"
client:
  name: "music-app"
  mode: sync
  request_timeout_secs: 30
  initialize: false
  proxy:
    http: "http://proxy:8080"
    https: null
    no_proxy: "localhost"

retry:
  max_attempts: 3
  initial_delay_secs: 1
  max_delay_secs: 10

scheduler:
  workers: 4

connections:
  - id: "6f1c1e1e-2a51-4b0e-9d43-3c6c2b1f9a10"
    name: "catalog"
    base_url: "http://catalog.local"
    endpoint: "mcp"
    headers:
      X-Api-Key: "abc"
    enabled: false
"#;

        let config = RegistryConfig::from_yaml_str(yaml).expect("Failed to parse YAML");
        assert_eq!(config.client.name, "music-app");
        assert_eq!(config.client.mode, ClientMode::Sync);
        assert_eq!(config.client.request_timeout(), Duration::from_secs(30));
        assert!(!config.client.initialize);
        assert_eq!(
            config.client.proxy.as_ref().and_then(|p| p.http.as_deref()),
            Some("http://proxy:8080")
        );
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.scheduler.workers, 4);

        let connection = &config.connections[0];
        assert_eq!(
            connection.id.to_string(),
            "6f1c1e1e-2a51-4b0e-9d43-3c6c2b1f9a10"
        );
        assert_eq!(connection.normalized_endpoint(), "/mcp");
        assert_eq!(
            connection.headers.get("X-Api-Key").map(String::as_str),
            Some("abc")
        );
        assert!(!connection.enabled);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_workers = "scheduler:\n  workers: 0\n";
        assert!(matches!(
            RegistryConfig::from_yaml_str(zero_workers),
            Err(McpError::Config(_))
        ));

        let blank_connection = "connections:\n  - name: \"\"\n    base_url: \"http://x\"\n";
        assert!(matches!(
            RegistryConfig::from_yaml_str(blank_connection),
            Err(McpError::InvalidDescriptor(_))
        ));

        let malformed = "client: [not, a, map]";
        assert!(matches!(
            RegistryConfig::from_yaml_str(malformed),
            Err(McpError::Yaml(_))
        ));
    }
}
