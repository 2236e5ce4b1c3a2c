//! Connection descriptors: declarative configuration for one remote MCP server.
//!
//! Descriptors are produced outside the registry (user input, persisted rows,
//! platform service bindings) and handed in as immutable snapshots.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{McpError, McpResult};

/// Sub-path used when a descriptor leaves its endpoint blank.
pub const DEFAULT_ENDPOINT: &str = "/api/mcp";

/// Stable identity of a connection, independent of its mutable name and URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    #[serde(default)]
    pub id: ConnectionId,

    /// Display name; unique (case-insensitive) among persisted connections.
    pub name: String,

    pub base_url: String,

    /// Request sub-path. Blank or absent means [`DEFAULT_ENDPOINT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Headers sent with every request, including the handshake.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ConnectionDescriptor {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            name: name.into(),
            base_url: base_url.into(),
            endpoint: None,
            headers: HashMap::new(),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: ConnectionId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach an `Authorization: Bearer <token>` header.
    ///
    /// Producers that receive an API key (e.g. from a service binding) use this
    /// to turn the credential into a default header.
    #[must_use]
    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_header("Authorization", value)
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Reject descriptors the registry cannot act on.
    pub fn validate(&self) -> McpResult<()> {
        if self.name.trim().is_empty() {
            return Err(McpError::InvalidDescriptor(
                "Connection name must not be empty".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(McpError::InvalidDescriptor(format!(
                "Connection '{}' baseUrl must not be empty",
                self.name.trim()
            )));
        }
        Ok(())
    }

    /// The sub-path with whitespace trimmed and a leading `/`, or [`DEFAULT_ENDPOINT`].
    pub fn normalized_endpoint(&self) -> String {
        normalize_endpoint(self.endpoint.as_deref())
    }

    /// Human-readable `base_url + endpoint`, e.g. `http://catalog.local/api/mcp`.
    pub fn transport_description(&self) -> String {
        format!("{}{}", self.base_url.trim(), self.normalized_endpoint())
    }
}

pub fn normalize_endpoint(endpoint: Option<&str>) -> String {
    match endpoint.map(str::trim) {
        None | Some("") => DEFAULT_ENDPOINT.to_string(),
        Some(path) if path.starts_with('/') => path.to_string(),
        Some(path) => format!("/{}", path),
    }
}
