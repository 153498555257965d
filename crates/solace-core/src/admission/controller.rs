//! Sliding-window rate limiting plus an in-flight concurrency cap.
//!
//! Two independent gates, both of which must pass:
//! - Concurrency: at most `max_concurrent` admitted-but-unreleased requests
//!   per identity. Checked first; a deny here never touches the window.
//! - Window: at most `max_requests` per bucket window. The window resets
//!   fully once its reset time has passed.
//!
//! Counters live in two `DashMap`s. Every check-and-increment happens while
//! the entry guard is held, so no update is split across tasks. When both
//! maps are locked the in-flight map is always taken first.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use solace_types::admission::{
    AdmissionConfig, AdmissionDecision, AdmissionStats, Bucket, DenyReason,
};
use solace_types::identity::ClientIdentity;

/// Request count for one (identity, bucket) window.
#[derive(Debug)]
struct WindowCounter {
    count: u32,
    window_reset_at: Instant,
}

/// Admitted-but-unreleased requests for one identity.
#[derive(Debug)]
struct InFlightCounter {
    count: u32,
    last_updated: Instant,
}

/// Owns all rate and concurrency state for the process.
///
/// Constructed once and shared behind an `Arc`; tests build isolated
/// instances with their own configuration.
pub struct AdmissionController {
    config: AdmissionConfig,
    windows: DashMap<(ClientIdentity, Bucket), WindowCounter>,
    in_flight: DashMap<ClientIdentity, InFlightCounter>,
    last_sweep: Mutex<Instant>,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
            in_flight: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Check both gates for `identity` and, if they pass, take an in-flight slot.
    pub fn try_admit(&self, identity: &ClientIdentity, bucket: Bucket) -> AdmissionDecision {
        self.try_admit_at(identity, bucket, Instant::now())
    }

    /// [`try_admit`](Self::try_admit) against an explicit clock reading.
    pub fn try_admit_at(
        &self,
        identity: &ClientIdentity,
        bucket: Bucket,
        now: Instant,
    ) -> AdmissionDecision {
        self.sweep_if_stale(now);

        let mut in_flight = self
            .in_flight
            .entry(identity.clone())
            .or_insert_with(|| InFlightCounter {
                count: 0,
                last_updated: now,
            });

        if in_flight.count >= self.config.max_concurrent {
            tracing::debug!(
                identity = %identity,
                bucket = %bucket,
                in_flight = in_flight.count,
                "Concurrency cap reached, denying"
            );
            return AdmissionDecision::Denied {
                retry_after_secs: self.config.concurrency_retry_after_secs.max(1),
                reason: DenyReason::ConcurrencyExceeded,
            };
        }

        let limit = self.config.buckets.get(bucket);
        let window = Duration::from_millis(limit.window_ms);

        let mut counter = self
            .windows
            .entry((identity.clone(), bucket))
            .or_insert_with(|| WindowCounter {
                count: 0,
                window_reset_at: now + window,
            });

        if now >= counter.window_reset_at {
            *counter = WindowCounter {
                count: 1,
                window_reset_at: now + window,
            };
        } else if counter.count < limit.max_requests {
            counter.count += 1;
        } else {
            let remaining = counter.window_reset_at.saturating_duration_since(now);
            let retry_after_secs = ceil_secs(remaining).max(1);
            tracing::debug!(
                identity = %identity,
                bucket = %bucket,
                count = counter.count,
                retry_after_secs,
                "Request window exhausted, denying"
            );
            return AdmissionDecision::Denied {
                retry_after_secs,
                reason: DenyReason::WindowExceeded,
            };
        }
        drop(counter);

        in_flight.count += 1;
        in_flight.last_updated = now;

        AdmissionDecision::Allowed
    }

    /// Return one in-flight slot for `identity`.
    ///
    /// Releasing without a matching admit clamps at zero and logs; the
    /// counter never goes negative.
    pub fn release(&self, identity: &ClientIdentity) {
        let now = Instant::now();
        match self.in_flight.get_mut(identity) {
            Some(mut entry) => {
                if entry.count == 0 {
                    tracing::warn!(
                        identity = %identity,
                        "Release without matching admission, ignoring"
                    );
                } else {
                    entry.count -= 1;
                }
                entry.last_updated = now;
            }
            None => {
                tracing::warn!(
                    identity = %identity,
                    "Release for untracked identity, ignoring"
                );
            }
        }
    }

    /// Evict expired windows and idle, zero-count in-flight entries.
    pub fn sweep(&self, now: Instant) {
        let idle = Duration::from_millis(self.config.in_flight_idle_ms);

        let windows_before = self.windows.len();
        self.windows.retain(|_, counter| counter.window_reset_at > now);

        let identities_before = self.in_flight.len();
        self.in_flight.retain(|_, counter| {
            counter.count > 0 || now.saturating_duration_since(counter.last_updated) < idle
        });

        let evicted_windows = windows_before.saturating_sub(self.windows.len());
        let evicted_identities = identities_before.saturating_sub(self.in_flight.len());
        if evicted_windows > 0 || evicted_identities > 0 {
            tracing::debug!(evicted_windows, evicted_identities, "Admission sweep");
        }

        *self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Current in-flight count for `identity` (0 when untracked).
    pub fn in_flight(&self, identity: &ClientIdentity) -> u32 {
        self.in_flight.get(identity).map(|e| e.count).unwrap_or(0)
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            tracked_windows: self.windows.len(),
            tracked_identities: self.in_flight.len(),
            total_in_flight: self.in_flight.iter().map(|e| e.count as u64).sum(),
        }
    }

    /// Sweep inline when the background sweeper has fallen behind.
    fn sweep_if_stale(&self, now: Instant) {
        let interval = Duration::from_millis(self.config.sweep_interval_ms);
        let stale = {
            let last = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            now.saturating_duration_since(*last) >= interval
        };
        if stale {
            self.sweep(now);
        }
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("max_concurrent", &self.config.max_concurrent)
            .field("tracked_windows", &self.windows.len())
            .field("tracked_identities", &self.in_flight.len())
            .finish()
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let millis = duration.as_millis() as u64;
    millis.div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_types::admission::WindowLimit;

    fn chat_config(max_requests: u32, window_ms: u64, max_concurrent: u32) -> AdmissionConfig {
        let mut config = AdmissionConfig {
            max_concurrent,
            ..Default::default()
        };
        config
            .buckets
            .set(Bucket::Chat, WindowLimit::new(max_requests, window_ms));
        config
    }

    fn id(key: &str) -> ClientIdentity {
        ClientIdentity::new(key)
    }

    #[test]
    fn window_admits_limit_then_denies() {
        let controller = AdmissionController::new(chat_config(5, 60_000, 100));
        let client = id("10.0.0.1");
        let now = Instant::now();

        for _ in 0..5 {
            assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        }

        let denied = controller.try_admit_at(&client, Bucket::Chat, now + Duration::from_secs(1));
        match denied {
            AdmissionDecision::Denied {
                retry_after_secs,
                reason,
            } => {
                assert_eq!(reason, DenyReason::WindowExceeded);
                assert!(retry_after_secs > 0 && retry_after_secs <= 60);
                assert_eq!(retry_after_secs, 59);
            }
            AdmissionDecision::Allowed => panic!("sixth request should be denied"),
        }
    }

    #[test]
    fn window_resets_after_expiry() {
        let controller = AdmissionController::new(chat_config(2, 1_000, 100));
        let client = id("10.0.0.2");
        let now = Instant::now();

        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        assert!(!controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());

        let later = now + Duration::from_millis(1_000);
        assert!(controller.try_admit_at(&client, Bucket::Chat, later).is_allowed());
        assert!(controller.try_admit_at(&client, Bucket::Chat, later).is_allowed());
        assert!(!controller.try_admit_at(&client, Bucket::Chat, later).is_allowed());
    }

    #[test]
    fn retry_after_rounds_up() {
        let controller = AdmissionController::new(chat_config(1, 10_000, 100));
        let client = id("10.0.0.3");
        let now = Instant::now();

        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        let decision =
            controller.try_admit_at(&client, Bucket::Chat, now + Duration::from_millis(8_500));
        assert_eq!(decision.retry_after_secs(), Some(2));
    }

    #[test]
    fn buckets_are_independent() {
        let mut config = chat_config(1, 60_000, 100);
        config.buckets.set(Bucket::Api, WindowLimit::new(1, 60_000));
        let controller = AdmissionController::new(config);
        let client = id("10.0.0.4");
        let now = Instant::now();

        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        assert!(!controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        assert!(controller.try_admit_at(&client, Bucket::Api, now).is_allowed());
    }

    #[test]
    fn identities_are_independent() {
        let controller = AdmissionController::new(chat_config(1, 60_000, 100));
        let now = Instant::now();

        assert!(controller.try_admit_at(&id("a"), Bucket::Chat, now).is_allowed());
        assert!(!controller.try_admit_at(&id("a"), Bucket::Chat, now).is_allowed());
        assert!(controller.try_admit_at(&id("b"), Bucket::Chat, now).is_allowed());
    }

    #[test]
    fn concurrency_cap_denies_until_release() {
        let controller = AdmissionController::new(chat_config(100, 60_000, 2));
        let client = id("10.0.0.5");
        let now = Instant::now();

        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());

        let denied = controller.try_admit_at(&client, Bucket::Chat, now);
        assert_eq!(
            denied,
            AdmissionDecision::Denied {
                retry_after_secs: 1,
                reason: DenyReason::ConcurrencyExceeded,
            }
        );

        controller.release(&client);
        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        assert!(!controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
    }

    #[test]
    fn concurrency_deny_does_not_consume_window() {
        let controller = AdmissionController::new(chat_config(3, 60_000, 1));
        let client = id("10.0.0.6");
        let now = Instant::now();

        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        for _ in 0..5 {
            assert!(!controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        }
        controller.release(&client);

        // Two window slots remain despite the five concurrency denials.
        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        controller.release(&client);
        assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
        controller.release(&client);
        assert!(!controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
    }

    #[test]
    fn double_release_never_goes_negative() {
        let controller = AdmissionController::new(chat_config(100, 60_000, 2));
        let client = id("10.0.0.7");

        assert!(controller.try_admit(&client, Bucket::Chat).is_allowed());
        controller.release(&client);
        controller.release(&client);
        controller.release(&id("never-admitted"));

        assert_eq!(controller.in_flight(&client), 0);
        assert_eq!(controller.in_flight(&id("never-admitted")), 0);

        // The cap still holds at exactly two after the stray releases.
        assert!(controller.try_admit(&client, Bucket::Chat).is_allowed());
        assert!(controller.try_admit(&client, Bucket::Chat).is_allowed());
        assert!(!controller.try_admit(&client, Bucket::Chat).is_allowed());
    }

    #[test]
    fn chat_scenario_window_and_concurrency() {
        let controller = AdmissionController::new(chat_config(5, 60_000, 2));
        let client = id("journal-user");
        let now = Instant::now();

        for _ in 0..5 {
            assert!(controller.try_admit_at(&client, Bucket::Chat, now).is_allowed());
            controller.release(&client);
        }
        let sixth = controller.try_admit_at(&client, Bucket::Chat, now + Duration::from_secs(5));
        let retry = sixth.retry_after_secs().unwrap();
        assert!(retry <= 60);

        // Fresh window: two concurrent admits pass, the third is denied with budget left.
        let fresh = now + Duration::from_secs(60);
        assert!(controller.try_admit_at(&client, Bucket::Chat, fresh).is_allowed());
        assert!(controller.try_admit_at(&client, Bucket::Chat, fresh).is_allowed());
        assert_eq!(
            controller.try_admit_at(&client, Bucket::Chat, fresh),
            AdmissionDecision::Denied {
                retry_after_secs: 1,
                reason: DenyReason::ConcurrencyExceeded,
            }
        );
    }

    #[test]
    fn sweep_evicts_expired_windows_and_idle_entries() {
        let mut config = chat_config(5, 1_000, 2);
        config.in_flight_idle_ms = 5_000;
        config.sweep_interval_ms = 1_000_000;
        let controller = AdmissionController::new(config);
        let now = Instant::now();

        assert!(controller.try_admit_at(&id("busy"), Bucket::Chat, now).is_allowed());
        assert!(controller.try_admit_at(&id("idle"), Bucket::Chat, now).is_allowed());
        controller.release(&id("idle"));
        assert_eq!(controller.stats().tracked_windows, 2);
        assert_eq!(controller.stats().tracked_identities, 2);

        // Windows expired, but the idle entry is still inside its grace period.
        controller.sweep(now + Duration::from_secs(2));
        let stats = controller.stats();
        assert_eq!(stats.tracked_windows, 0);
        assert_eq!(stats.tracked_identities, 2);

        // Past the grace period only the zero-count entry goes.
        controller.sweep(now + Duration::from_secs(60));
        let stats = controller.stats();
        assert_eq!(stats.tracked_identities, 1);
        assert_eq!(stats.total_in_flight, 1);
        assert_eq!(controller.in_flight(&id("busy")), 1);
    }

    #[test]
    fn stale_sweep_runs_inline_on_admit() {
        let mut config = chat_config(5, 1_000, 2);
        config.sweep_interval_ms = 2_000;
        let controller = AdmissionController::new(config);
        let now = Instant::now();

        assert!(controller.try_admit_at(&id("a"), Bucket::Chat, now).is_allowed());
        assert_eq!(controller.stats().tracked_windows, 1);

        // A later admit for another identity triggers the overdue sweep first.
        let later = now + Duration::from_secs(10);
        assert!(controller.try_admit_at(&id("b"), Bucket::Chat, later).is_allowed());
        assert_eq!(controller.stats().tracked_windows, 1);
    }

    #[test]
    fn concurrent_admits_respect_cap() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let controller = Arc::new(AdmissionController::new(chat_config(1_000, 60_000, 4)));
        let admitted = Arc::new(AtomicU32::new(0));
        let client = id("shared");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let controller = controller.clone();
                let admitted = admitted.clone();
                let client = client.clone();
                std::thread::spawn(move || {
                    if controller.try_admit(&client, Bucket::Chat).is_allowed() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 4);
        assert_eq!(controller.in_flight(&client), 4);
    }
}
