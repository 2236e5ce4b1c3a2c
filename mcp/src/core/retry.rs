//! Retry bookkeeping for connections that failed to register.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::config::RetryConfig;

/// Exponential backoff used between registration retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// delay = min(initial_delay * 2^(attempt-1), max_delay)
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = 2u64.saturating_pow(exponent);
        let delay = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay.as_millis() as u64))
    }
}

/// Outcome of recording a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule retry number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Every allowed retry has been used.
    Exhausted { attempts: u32 },
}

/// Per-connection retry progress.
///
/// `attempt` counts retries scheduled so far; a fresh registration starts at
/// zero. `ticket` identifies the currently scheduled retry so a superseded
/// firing can recognise itself.
#[derive(Debug, Clone)]
pub struct RetryState {
    connection_name: String,
    attempt: u32,
    max_attempts: u32,
    next_delay: Duration,
    last_error: Option<String>,
    last_failure_at: Option<DateTime<Utc>>,
    pub(crate) ticket: u64,
    pub(crate) cancel: CancellationToken,
}

impl RetryState {
    pub fn new(connection_name: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            connection_name: connection_name.into(),
            attempt: 0,
            max_attempts,
            next_delay: Duration::ZERO,
            last_error: None,
            last_failure_at: None,
            ticket: 0,
            cancel: CancellationToken::new(),
        }
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_failure_at(&self) -> Option<DateTime<Utc>> {
        self.last_failure_at
    }

    pub fn should_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Record a retryable failure and decide whether another retry is allowed.
    pub fn record_failure(&mut self, policy: &RetryPolicy, error: &str) -> RetryDecision {
        self.last_error = Some(error.to_string());
        self.last_failure_at = Some(Utc::now());

        if !self.should_retry() {
            return RetryDecision::Exhausted {
                attempts: self.attempt,
            };
        }

        self.attempt += 1;
        self.next_delay = policy.calculate_backoff(self.attempt);
        RetryDecision::Retry {
            attempt: self.attempt,
            delay: self.next_delay,
        }
    }

    /// Bind the state to a newly scheduled retry, cancelling the previous one.
    pub(crate) fn arm(&mut self, ticket: u64, cancel: CancellationToken) {
        self.cancel.cancel();
        self.ticket = ticket;
        self.cancel = cancel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.calculate_backoff(0), Duration::ZERO);
        assert_eq!(policy.calculate_backoff(1), Duration::from_secs(5));
        assert_eq!(policy.calculate_backoff(2), Duration::from_secs(10));
        assert_eq!(policy.calculate_backoff(5), Duration::from_secs(80));
        assert_eq!(policy.calculate_backoff(7), Duration::from_secs(300));
        assert_eq!(policy.calculate_backoff(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_default_schedule_then_exhaustion() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::new("catalog", policy.max_attempts);

        let delays: Vec<u64> = (0..5)
            .map(|_| match state.record_failure(&policy, "Connection refused") {
                RetryDecision::Retry { delay, .. } => delay.as_secs(),
                RetryDecision::Exhausted { .. } => panic!("exhausted too early"),
            })
            .collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80]);
        assert!(!state.should_retry());

        assert_eq!(
            state.record_failure(&policy, "Connection refused"),
            RetryDecision::Exhausted { attempts: 5 }
        );
        assert_eq!(state.last_error(), Some("Connection refused"));
        assert!(state.last_failure_at().is_some());
    }

    #[test]
    fn test_zero_attempts_exhausts_immediately() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        let mut state = RetryState::new("catalog", 0);
        assert_eq!(
            state.record_failure(&policy, "timeout"),
            RetryDecision::Exhausted { attempts: 0 }
        );
    }

    #[test]
    fn test_arm_cancels_previous_token() {
        let mut state = RetryState::new("catalog", 5);
        let first = CancellationToken::new();
        state.arm(1, first.clone());
        state.arm(2, CancellationToken::new());

        assert!(first.is_cancelled());
        assert_eq!(state.ticket, 2);
        assert!(!state.cancel.is_cancelled());
    }
}
