//! Background sweep of expired admission state.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::AdmissionController;

/// Runs `AdmissionController::sweep` on a fixed interval.
///
/// Not started on construction. The binary calls `start()` after building
/// state and `stop()` in its shutdown sequence.
pub struct SweepScheduler {
    controller: Arc<AdmissionController>,
    interval: Duration,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SweepScheduler {
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        let interval = Duration::from_millis(controller.config().sweep_interval_ms.max(1));
        Self {
            controller,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Spawn the sweep loop. Calling `start` on a running scheduler is a no-op.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = Arc::clone(&self.controller);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => controller.sweep(Instant::now()),
                }
            }
        });

        *running = Some((cancel, handle));
        tracing::info!(interval_ms = period.as_millis() as u64, "admission sweeper started");
    }

    /// Stop the sweep loop and wait for it to exit.
    pub async fn stop(&self) {
        let taken = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((cancel, handle)) = taken {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "admission sweeper exited abnormally");
            }
            tracing::info!("admission sweeper stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_types::admission::{AdmissionConfig, Bucket, WindowLimit};
    use solace_types::identity::ClientIdentity;

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval_until_stopped() {
        let mut config = AdmissionConfig {
            sweep_interval_ms: 1_000,
            ..Default::default()
        };
        config.buckets.set(Bucket::Chat, WindowLimit::new(5, 500));
        let controller = Arc::new(AdmissionController::new(config));
        let scheduler = SweepScheduler::new(controller.clone());

        assert!(controller
            .try_admit(&ClientIdentity::new("a"), Bucket::Chat)
            .is_allowed());
        assert_eq!(controller.stats().tracked_windows, 1);

        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(controller.stats().tracked_windows, 0);

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let controller = Arc::new(AdmissionController::new(AdmissionConfig::default()));
        let scheduler = SweepScheduler::new(controller);
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }
}
