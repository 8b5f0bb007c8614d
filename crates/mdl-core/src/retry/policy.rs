use std::time::Duration;

use crate::config::{RetryConfig, TimeoutConfig};

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Server answered with a status we cannot use (bounded retry).
    Status(u16),
    /// Network unreachable, timeout, reset, DNS (unbounded, reachability-gated).
    Connectivity,
    /// Anything retrying cannot fix (malformed URL, unsupported protocol).
    Fatal,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop retrying; the job fails.
    GiveUp,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed-countdown policy over a bounded number of attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before each retry; shown to the user as a countdown.
    pub countdown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            countdown: Duration::from_secs(cfg.countdown_secs),
        }
    }

    /// Delay before the next status retry, given `attempt` attempts already made (1-based).
    pub fn next_delay(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.countdown)
        }
    }

    /// Decide for a classified failure. Connectivity loss is never given up on
    /// here; the caller waits for reachability instead of sleeping.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        match kind {
            ErrorKind::Status(_) => self.next_delay(attempt),
            ErrorKind::Connectivity => RetryDecision::RetryAfter(Duration::ZERO),
            ErrorKind::Fatal => RetryDecision::GiveUp,
        }
    }
}

/// Attempt counter for one negotiation chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_kind: Option<ErrorKind>,
}

impl RetryState {
    /// Record a failed attempt and return the new attempt count.
    pub fn record(&mut self, kind: ErrorKind) -> u32 {
        self.attempt += 1;
        self.last_kind = Some(kind);
        self.attempt
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Request timeout that grows by a fixed step after every connectivity loss,
/// up to a ceiling. Never shrinks during a job.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutEscalation {
    base: Duration,
    step: Duration,
    max: Duration,
    losses: u32,
}

impl TimeoutEscalation {
    pub fn from_config(cfg: &TimeoutConfig) -> Self {
        Self::new(
            Duration::from_secs(cfg.base_secs),
            Duration::from_secs(cfg.step_secs),
            Duration::from_secs(cfg.max_secs),
        )
    }

    pub fn new(base: Duration, step: Duration, max: Duration) -> Self {
        Self {
            base,
            step,
            max: max.max(base),
            losses: 0,
        }
    }

    pub fn current(&self) -> Duration {
        self.base
            .saturating_add(self.step.saturating_mul(self.losses))
            .min(self.max)
    }

    /// Record a connectivity loss and return the escalated timeout.
    pub fn escalate(&mut self) -> Duration {
        if self.current() < self.max {
            self.losses = self.losses.saturating_add(1);
        }
        self.current()
    }

    pub fn losses(&self) -> u32 {
        self.losses
    }
}
