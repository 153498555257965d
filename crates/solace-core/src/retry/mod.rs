//! Retry loop for upstream calls.
//!
//! `with_retry` runs an operation, classifies each failure, and waits an
//! exponentially growing, jittered delay before trying again. The preset
//! (rate-limit or transient) is chosen from the category of the error that
//! just occurred.

pub mod backoff;
pub mod classifier;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use solace_types::llm::UpstreamError;
use solace_types::retry::{Classification, RetryPolicy};

pub use classifier::classify;

/// Why `with_retry` gave up, with the last error unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure {
    pub error: UpstreamError,
    /// Total invocations of the operation, including the first.
    pub attempts: u32,
    pub classification: Classification,
    /// The wait before the next attempt was cancelled.
    pub cancelled: bool,
}

/// Run `op` until it succeeds, fails fatally, exhausts its retries, or is cancelled.
///
/// `op` receives the 1-based attempt number. A non-retryable error returns
/// after one invocation; a retryable one is retried while the number of
/// retries so far is below `max_attempts` of the preset for its category.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt: u32 = 1;
    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let classification = classify(&error);
        let config = policy.config_for(classification.category);
        let retries = attempt - 1;

        if !classification.retryable || retries >= config.max_attempts {
            if classification.retryable {
                tracing::warn!(
                    attempts = attempt,
                    category = %classification.category,
                    error = %error,
                    "Retries exhausted"
                );
            }
            return Err(RetryFailure {
                error,
                attempts: attempt,
                classification,
                cancelled: false,
            });
        }

        let delay = {
            let mut rng = rand::thread_rng();
            backoff::delay_for(retries + 1, config, &error, &mut rng)
        };
        tracing::warn!(
            attempt,
            category = %classification.category,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Upstream call failed, retrying"
        );

        if !backoff::sleep_cancellable(delay, cancel).await {
            tracing::debug!(attempt, "Retry wait cancelled");
            return Err(RetryFailure {
                error,
                attempts: attempt,
                classification,
                cancelled: true,
            });
        }

        attempt += 1;
    }
}
