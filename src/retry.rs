//! Retry logic for transport failures.
//!
//! Failed attempts are retried immediately: the policy is a fixed attempt
//! count with no inter-attempt delay. Only transient (transport-level)
//! failures are retried; any other failure propagates on first occurrence,
//! and after the last attempt the most recent transport failure is the one
//! surfaced to the caller.

use std::future::Future;

use crate::config::RetryConfig;
use crate::error::Result;

/// Execute an async operation with immediate-retry semantics.
///
/// `operation` is invoked up to `config.max_attempts` times in total. Each
/// failed attempt is reported via `tracing::warn!` before the next one
/// starts.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    "transport failure, retrying immediately"
                );
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "operation failed after all attempts"
                    );
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
