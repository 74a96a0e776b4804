use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::services::staging::StagingRegistry;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Evicts sessions nobody touched for longer than the idle timeout.
pub struct BackgroundWorker {
    registry: StagingRegistry,
    idle_timeout: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        registry: StagingRegistry,
        idle_timeout: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            idle_timeout,
            interval: interval.max(MIN_SWEEP_INTERVAL),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Staging sweeper started (idle timeout {:?}, every {:?})",
            self.idle_timeout,
            self.interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Staging sweeper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.perform_cleanup();
                }
            }
        }
    }

    pub fn perform_cleanup(&self) -> usize {
        let evicted = self.registry.purge_idle(self.idle_timeout);
        if evicted > 0 {
            tracing::info!(
                "🧹 Evicted {} idle staging session(s), {} remaining",
                evicted,
                self.registry.len()
            );
        } else {
            tracing::debug!("No idle staging sessions to evict");
        }
        evicted
    }
}
