//! Runs workflow verbs on the blocking pool, retrying conflicts.
//!
//! ```text
//! spawn_blocking(verb) ──► Ok ───────────────────────────► response
//!        ▲                 Err(Conflict) ──► next_backoff ─┐
//!        └──────────────── sleep ◄─────────────────────────┘
//!                          Err(other) / backoff exhausted ──► error
//! ```

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use broker_core::CoreResult;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            initial_interval: settings.initial_interval(),
            max_elapsed: settings.max_elapsed(),
        }
    }

    /// The builder seeds `current_interval` from `initial_interval`; a struct
    /// literal would leave it at the crate default.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_multiplier(2.0)
            .with_max_interval(self.max_elapsed)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetrySettings::default())
    }
}

/// Runs `op` on the blocking pool. Only `Conflict` is retried.
pub async fn run_blocking<T, F>(policy: RetryPolicy, op: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: Fn() -> CoreResult<T> + Clone + Send + 'static,
{
    let mut backoff = policy.backoff();
    let mut attempt = 1u32;
    loop {
        let result = tokio::task::spawn_blocking(op.clone())
            .await
            .map_err(|e| ApiError::internal(format!("worker failed: {}", e)))?;

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => match backoff.next_backoff() {
                Some(wait) => {
                    debug!(attempt, ?wait, error = %e, "Conflict, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                None => {
                    warn!(attempt, error = %e, "Conflict persisted, giving up");
                    return Err(e.into());
                }
            },
            Err(e) => return Err(e.into()),
        }
    }
}
