//! Registration outcomes and per-connection status records.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::descriptor::{ConnectionDescriptor, ConnectionId};

/// Outcome of a registration or a connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RegistrationResult {
    /// A live client is installed (or, for a test, the handshake succeeded).
    Connected {
        name: String,
        transport_description: String,
    },
    /// The descriptor is disabled; nothing was connected.
    Disabled { name: String },
    /// Connecting failed with a network-class error; a retry is pending.
    RetryScheduled { name: String, last_error: String },
}

impl RegistrationResult {
    pub fn name(&self) -> &str {
        match self {
            RegistrationResult::Connected { name, .. }
            | RegistrationResult::Disabled { name }
            | RegistrationResult::RetryScheduled { name, .. } => name,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, RegistrationResult::Connected { .. })
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RegistrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationResult::Connected {
                name,
                transport_description,
            } => write!(f, "Connected to {} via {}", name, transport_description),
            RegistrationResult::Disabled { name } => write!(f, "Connection '{}' disabled", name),
            RegistrationResult::RetryScheduled { name, last_error } => write!(
                f,
                "Connection '{}' failed, retry scheduled: {}",
                name, last_error
            ),
        }
    }
}

/// Lifecycle state reported for a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Active,
    RetryPending,
    Error,
    Disabled,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Active => "ACTIVE",
            ConnectionState::RetryPending => "RETRY_PENDING",
            ConnectionState::Error => "ERROR",
            ConnectionState::Disabled => "DISABLED",
        };
        f.write_str(s)
    }
}

/// Point-in-time status of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub id: ConnectionId,
    pub name: String,
    pub state: ConnectionState,
    pub transport_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_in_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    pub(crate) fn new(descriptor: &ConnectionDescriptor, state: ConnectionState) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name.clone(),
            state,
            transport_description: descriptor.transport_description(),
            retry_attempt: None,
            next_retry_in_secs: None,
            last_error: None,
            last_success_at: None,
            last_failure_at: None,
        }
    }

    /// Take the name and transport of the latest descriptor for this identity.
    pub(crate) fn refresh(&mut self, descriptor: &ConnectionDescriptor) {
        self.name = descriptor.name.clone();
        self.transport_description = descriptor.transport_description();
    }

    pub(crate) fn mark_active(&mut self, transport_description: &str) {
        self.state = ConnectionState::Active;
        self.transport_description = transport_description.to_string();
        self.retry_attempt = None;
        self.next_retry_in_secs = None;
        self.last_error = None;
        self.last_success_at = Some(Utc::now());
    }

    pub(crate) fn mark_retry_pending(&mut self, attempt: u32, delay: Duration, error: &str) {
        self.state = ConnectionState::RetryPending;
        self.retry_attempt = Some(attempt);
        self.next_retry_in_secs = Some(delay.as_secs());
        self.record_failure(error);
    }

    pub(crate) fn mark_error(&mut self, error: &str) {
        self.state = ConnectionState::Error;
        self.next_retry_in_secs = None;
        self.record_failure(error);
    }

    fn record_failure(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
        self.last_failure_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_messages() {
        let connected = RegistrationResult::Connected {
            name: "catalog".to_string(),
            transport_description: "http://catalog.local/api/mcp".to_string(),
        };
        assert_eq!(
            connected.message(),
            "Connected to catalog via http://catalog.local/api/mcp"
        );
        assert!(connected.is_connected());

        let disabled = RegistrationResult::Disabled {
            name: "catalog".to_string(),
        };
        assert_eq!(disabled.to_string(), "Connection 'catalog' disabled");
        assert_eq!(disabled.name(), "catalog");

        let pending = RegistrationResult::RetryScheduled {
            name: "catalog".to_string(),
            last_error: "Connection refused".to_string(),
        };
        assert_eq!(
            pending.to_string(),
            "Connection 'catalog' failed, retry scheduled: Connection refused"
        );
        assert!(!pending.is_connected());
    }

    #[test]
    fn test_status_transitions() {
        let descriptor = ConnectionDescriptor::new("catalog", "http://catalog.local");
        let mut status = ConnectionStatus::new(&descriptor, ConnectionState::Error);

        status.mark_retry_pending(2, Duration::from_secs(10), "timed out");
        assert_eq!(status.state, ConnectionState::RetryPending);
        assert_eq!(status.retry_attempt, Some(2));
        assert_eq!(status.next_retry_in_secs, Some(10));
        assert!(status.last_failure_at.is_some());

        status.mark_active("http://catalog.local/api/mcp");
        assert_eq!(status.state, ConnectionState::Active);
        assert!(status.last_error.is_none());
        assert!(status.retry_attempt.is_none());
        assert!(status.last_success_at.is_some());

        status.mark_error("unauthorized");
        assert_eq!(status.state, ConnectionState::Error);
        assert_eq!(status.last_error.as_deref(), Some("unauthorized"));
    }

    #[test]
    fn test_status_serializes_state_upper_case() {
        let descriptor = ConnectionDescriptor::new("catalog", "http://catalog.local");
        let status = ConnectionStatus::new(&descriptor, ConnectionState::RetryPending);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "RETRY_PENDING");
        assert!(json.get("last_error").is_none());
    }
}
