//! Exponential backoff delays.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use solace_types::llm::UpstreamError;
use solace_types::retry::RetryConfig;

/// Un-jittered delay before retry number `attempt` (1-based).
///
/// `min(max_delay, initial_delay * multiplier^(attempt - 1))`.
pub fn base_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let raw = config.initial_delay_ms as f64 * config.backoff_multiplier.powi(exponent);
    let capped = if raw.is_finite() {
        raw.min(config.max_delay_ms as f64)
    } else {
        config.max_delay_ms as f64
    };
    Duration::from_millis(capped as u64)
}

/// Delay for retry `attempt` with jitter applied when configured.
///
/// Jitter scales the base delay by a uniform factor in `[0.5, 1.0]`.
pub fn next_delay<R: Rng + ?Sized>(attempt: u32, config: &RetryConfig, rng: &mut R) -> Duration {
    let base = base_delay(attempt, config);
    if config.jitter {
        base.mul_f64(rng.gen_range(0.5..=1.0))
    } else {
        base
    }
}

/// Delay before retrying after `error`, honoring a provider retry-after hint.
///
/// A hint replaces the computed delay but is still capped at `max_delay_ms`.
pub fn delay_for<R: Rng + ?Sized>(
    attempt: u32,
    config: &RetryConfig,
    error: &UpstreamError,
    rng: &mut R,
) -> Duration {
    match error.retry_after_ms {
        Some(hint) => Duration::from_millis(hint.min(config.max_delay_ms)),
        None => next_delay(attempt, config, rng),
    }
}

/// Sleep for `delay` unless `cancel` fires first. Returns `false` when cancelled.
pub async fn sleep_cancellable(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
