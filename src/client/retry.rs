//! Fixed-Delay Retry
//!
//! Runs a single-attempt operation up to `max_attempts` times, sleeping a
//! constant interval between failures.

use crate::error::{ChatError, Result};
use crate::logging::LogSink;
use backoff::backoff::{Backoff, Constant};
use std::future::Future;
use std::time::Duration;
use tracing::Level;

/// Attempt count and inter-attempt delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// 10 attempts, 1s apart
    pub fn completion() -> Self {
        Self::new(10, Duration::from_millis(1000))
    }

    /// 5 attempts, 1s apart
    pub fn streaming() -> Self {
        Self::new(5, Duration::from_millis(1000))
    }

    /// Run `attempt` until it succeeds or attempts run out.
    ///
    /// `attempt` receives the 1-based attempt number. Each failure is passed to
    /// `on_failure` with that number before the delay; no delay follows the
    /// final attempt. Exhaustion returns [`ChatError::Exhausted`] carrying the
    /// last failure.
    pub async fn run<T, F, Fut, L>(&self, mut attempt: F, mut on_failure: L) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        L: FnMut(u32, &ChatError),
    {
        let mut interval = Constant::new(self.delay);
        let mut last = None;

        for n in 1..=self.max_attempts {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    on_failure(n, &err);
                    last = Some(Box::new(err));
                }
            }

            if n < self.max_attempts {
                if let Some(wait) = interval.next_backoff() {
                    tokio::time::sleep(wait).await;
                }
            }
        }

        Err(ChatError::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::completion()
    }
}

/// Log a failed completion attempt with timeout-specific wording
pub(crate) fn log_completion_failure(sink: &dyn LogSink, n: u32, max: u32, err: &ChatError) {
    let message = if err.is_timeout() {
        format!("Timeout occurred. Retry {}/{}...", n, max)
    } else {
        format!("Error during request. Retry {}/{}. Exception: {}", n, max, err)
    };
    sink.log(Level::ERROR, &message);
}

/// Log a failed stream connection attempt
pub(crate) fn log_stream_failure(sink: &dyn LogSink, n: u32, max: u32, err: &ChatError) {
    let message = if err.is_timeout() {
        format!(
            "Timeout error occurred. Retry attempt {} of {}...",
            n, max
        )
    } else {
        format!("Error during streaming. Retry attempt {}. Exception: {}", n, err)
    };
    sink.log(Level::WARN, &message);
}
