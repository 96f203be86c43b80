//! Retry model: what the retry policy sees and what it answers.
//!
//! The policy is a pure function of [`RetryContext`]; the engine executes the
//! returned [`RetryDecision`] (including any backoff delay).

use std::time::Duration;

use http::StatusCode;

use super::descriptor::RequestDescriptor;
use super::errors::{EngineError, TransportError};

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    /// No reply was obtained.
    Transport(TransportError),
    /// A reply was obtained but the success predicate rejected its status.
    Application { status: StatusCode },
}

impl FailureCause {
    pub fn is_transport(&self) -> bool {
        matches!(self, FailureCause::Transport(_))
    }

    pub fn to_error(&self) -> EngineError {
        match self {
            FailureCause::Transport(e) => EngineError::Transport(e.clone()),
            FailureCause::Application { status } => EngineError::application(*status),
        }
    }
}

/// Input to a retry decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryContext {
    /// Zero-based index of the attempt that just failed.
    pub attempt: u32,
    pub cause: FailureCause,
    /// Retries the descriptor allows after the first attempt.
    pub retry_limit: u32,
    /// Upper bound for any backoff delay; zero means "do not wait".
    pub max_retry_interval: Duration,
}

impl RetryContext {
    pub fn new(descriptor: &RequestDescriptor, attempt: u32, cause: FailureCause) -> Self {
        Self {
            attempt,
            cause,
            retry_limit: descriptor.retry_count(),
            max_retry_interval: descriptor.max_retry_interval(),
        }
    }

    /// Retries still available after this attempt.
    pub fn remaining(&self) -> u32 {
        self.retry_limit.saturating_sub(self.attempt)
    }
}

/// What the engine should do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Run another attempt after `delay`.
    Retry { delay: Duration, reason: String },

    /// Stop; the failure becomes terminal.
    GiveUp { reason: String },
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            RetryDecision::Retry { reason, .. } | RetryDecision::GiveUp { reason } => reason,
        }
    }
}
