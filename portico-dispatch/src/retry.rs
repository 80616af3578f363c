//! Retry policy for transient store failures.
//!
//! A request whose transaction fails with a transient code (serialization
//! conflict, deadlock, connection reset) is replayed from scratch in a fresh
//! transaction, up to a bounded number of attempts. Every other failure is
//! final on the first attempt.

use std::sync::Arc;

use crate::error::DispatchError;
use crate::request::Response;

/// Default attempt bound, the first attempt included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts allowed per request, the first one included.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryConfig {
    /// Create the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt bound. Clamped to at least one attempt.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Observer invoked with the attempt number (1-based) before each attempt.
pub type AttemptObserver = Arc<dyn Fn(u32) + Send + Sync>;

/// Tagged outcome of one dispatch attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The attempt committed; the request is done.
    Success(Response),
    /// The attempt failed with a transient error; a fresh transaction may
    /// succeed.
    Retry(DispatchError),
    /// The attempt failed for good.
    Fatal(DispatchError),
}

impl AttemptOutcome {
    /// Classify an attempt result by the error's transience.
    pub fn from_result(result: Result<Response, DispatchError>) -> Self {
        match result {
            Ok(response) => Self::Success(response),
            Err(err) if err.is_transient() => Self::Retry(err),
            Err(err) => Self::Fatal(err),
        }
    }
}
