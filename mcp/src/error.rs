//! MCP connection error types.
//!
//! Defines error variants for descriptor validation, transport construction,
//! handshakes and registry operations, plus the retryable/fatal classification
//! used by the retry engine.

use std::error::Error as StdError;

use thiserror::Error;

pub type McpResult<T> = Result<T, McpError>;

/// Lowercased fragments that identify a network-level failure in a rendered error chain.
const NETWORK_FAILURE_MARKERS: &[&str] = &[
    "connection refused",
    "connect error",
    "connectexception",
    "tcp connect",
    "error sending request",
    "timed out",
    "timeout",
    "connection reset",
    "connection closed",
    "connection aborted",
    "channel closed",
    "closed channel",
    "broken pipe",
    "no route to host",
    "network unreachable",
    "network is unreachable",
    "host unreachable",
    "dns error",
];

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Invalid connection descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, &'static str),

    #[error("Server disconnected: {0}")]
    ServerDisconnected(String),

    #[error("Failed to register MCP connection '{name}': {source}")]
    RegistrationFailed {
        name: String,
        #[source]
        source: Box<McpError>,
    },

    #[error("Failed to validate MCP connection '{name}': {source}")]
    ConnectionTestFailed {
        name: String,
        #[source]
        source: Box<McpError>,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl McpError {
    /// Whether a failed registration attempt should be retried later.
    ///
    /// Network-level conditions are retryable; configuration and protocol
    /// rejections are fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            McpError::Io(_) | McpError::Timeout(..) => true,
            McpError::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.is_request()
                    || mentions_network_failure(&render_error_chain(e))
            }
            McpError::ConnectionFailed(msg)
            | McpError::Handshake(msg)
            | McpError::ServerDisconnected(msg) => mentions_network_failure(msg),
            McpError::RegistrationFailed { source, .. }
            | McpError::ConnectionTestFailed { source, .. } => source.is_retryable(),
            McpError::InvalidDescriptor(_)
            | McpError::Config(_)
            | McpError::Transport(_)
            | McpError::Scheduler(_)
            | McpError::Yaml(_) => false,
        }
    }
}

/// Render an error and every `source()` below it, joined with `": "`.
///
/// SDK errors often keep the interesting cause (e.g. the OS-level
/// "Connection refused") several levels down.
pub fn render_error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let cause_text = cause.to_string();
        if !rendered.contains(&cause_text) {
            rendered.push_str(": ");
            rendered.push_str(&cause_text);
        }
        current = cause.source();
    }
    rendered
}

fn mentions_network_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    NETWORK_FAILURE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use std::{fmt, io, time::Duration};

    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("transport failed")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_network_failures_are_retryable() {
        let cases = [
            McpError::ConnectionFailed("Connection refused (os error 111)".to_string()),
            McpError::Handshake("send initialize: error sending request for url".to_string()),
            McpError::Handshake("connection reset by peer".to_string()),
            McpError::ConnectionFailed("No route to host".to_string()),
            McpError::Timeout(Duration::from_secs(20), "handshake"),
            McpError::Io(io::Error::new(io::ErrorKind::Other, "disk on fire")),
        ];
        for err in cases {
            assert!(err.is_retryable(), "expected retryable: {}", err);
        }
    }

    #[test]
    fn test_configuration_failures_are_fatal() {
        let cases = [
            McpError::InvalidDescriptor("Connection name must not be empty".to_string()),
            McpError::Config("relative URL without a base".to_string()),
            McpError::Transport("header name: invalid HTTP header name".to_string()),
            McpError::Handshake("unexpected server response: 404 Not Found".to_string()),
        ];
        for err in cases {
            assert!(!err.is_retryable(), "expected fatal: {}", err);
        }
    }

    #[test]
    fn test_wrapped_errors_keep_classification() {
        let err = McpError::RegistrationFailed {
            name: "catalog".to_string(),
            source: Box::new(McpError::ConnectionFailed("connection refused".to_string())),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("catalog"));
    }

    #[test]
    fn test_render_error_chain_includes_sources() {
        let err = Wrapper(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "Connection refused",
        ));
        let rendered = render_error_chain(&err);
        assert_eq!(rendered, "transport failed: Connection refused");
        assert!(McpError::Handshake(rendered).is_retryable());
    }
}
