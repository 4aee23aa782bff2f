//! Sweep Worker
//!
//! Background worker that runs both deadline sweeps on a fixed interval.
//! The same sweeps are also exposed over the internal HTTP surface for
//! manual or externally-scheduled runs; both paths share the CAS-guarded
//! sweeper, so overlapping runs are safe.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::sweeper::DeadlineSweeper;

/// Configuration for the sweep worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to run both sweeps
    pub scan_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(300),
        }
    }
}

/// Sweep Worker
///
/// Periodically runs the seller-deadline and buyer-deadline sweeps.
pub struct SweepWorker {
    sweeper: Arc<DeadlineSweeper>,
    config: WorkerConfig,
}

impl SweepWorker {
    pub fn new(sweeper: Arc<DeadlineSweeper>, config: WorkerConfig) -> Self {
        Self { sweeper, config }
    }

    pub fn with_defaults(sweeper: Arc<DeadlineSweeper>) -> Self {
        Self::new(sweeper, WorkerConfig::default())
    }

    /// Run the sweep loop forever
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            "Starting sweep worker"
        );

        loop {
            if let Err(e) = self.sweeper.sweep_seller_deadline().await {
                error!(error = %e, "Seller-deadline sweep failed");
            }
            if let Err(e) = self.sweeper.sweep_buyer_deadline().await {
                error!(error = %e, "Buyer-deadline sweep failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(300));
    }
}
