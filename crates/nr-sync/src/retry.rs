//! Bounded retry with exponential backoff for collaborator calls.

use std::fmt;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use nr_core::CollabError;
use nr_graph::GraphError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::CancelToken;

/// Errors that may succeed on a later attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for CollabError {
    fn is_retryable(&self) -> bool {
        CollabError::is_retryable(self)
    }
}

impl Retryable for GraphError {
    fn is_retryable(&self) -> bool {
        GraphError::is_retryable(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Deadline for one read attempt. A read still running past it fails
    /// with a timeout, which is retried like any transient error.
    pub call_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 2000,
            call_timeout_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err("retry.initial_backoff_ms exceeds retry.max_backoff_ms".to_string());
        }
        if self.call_timeout_ms == 0 {
            return Err("retry.call_timeout_ms must be positive".to_string());
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Waits between attempts: doubling from the initial backoff, capped,
    /// without jitter. The attempt count bounds the run, not elapsed time.
    pub fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.initial_backoff_ms))
            .with_randomization_factor(0.0)
            .with_multiplier(2.0)
            .with_max_interval(Duration::from_millis(self.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Cancellation is honoured only between attempts.
    pub fn run<T, E, F>(&self, what: &str, cancel: &CancelToken, mut op: F) -> Result<T, E>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0;
        let result = backoff::retry_notify(
            self.policy(),
            || {
                attempt += 1;
                op().map_err(|err| {
                    if err.is_retryable() && attempt < self.max_attempts && !cancel.is_cancelled() {
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            },
            |err: E, wait: Duration| {
                warn!(what, error = %err, wait_ms = wait.as_millis() as u64, "retrying");
            },
        );
        result.map_err(|e| match e {
            backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
        })
    }

    /// [`run`](Self::run) with every attempt held to `call_timeout_ms`.
    pub fn run_bounded<T, E, F>(&self, what: &str, cancel: &CancelToken, op: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: Retryable + fmt::Display + From<CollabError> + Send + 'static,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let timeout = self.call_timeout();
        let op = Arc::new(op);
        self.run(what, cancel, || {
            let op = Arc::clone(&op);
            with_deadline(what, timeout, move || op())
        })
    }
}

/// Run `call` on a worker thread and give up on it after `timeout`.
///
/// A call past its deadline is abandoned, not interrupted: the worker runs
/// to completion and its result is dropped. Only use this for reads.
pub fn with_deadline<T, E, F>(what: &str, timeout: Duration, call: F) -> Result<T, E>
where
    T: Send + 'static,
    E: From<CollabError> + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("nr-call:{what}"))
        .spawn(move || {
            // The receiver is gone once the deadline has passed.
            let _ = tx.send(call());
        })
        .map_err(|e| CollabError::unavailable(what, e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(what, timeout_ms = timeout.as_millis() as u64, "call abandoned at its deadline");
            Err(CollabError::Timeout {
                what: what.to_string(),
                after_ms: timeout.as_millis() as u64,
            }
            .into())
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(CollabError::unavailable(what, "call ended without a result").into())
        }
    }
}
