//! Scheduler background worker.
//!
//! Runs one reconciliation cycle per interval until shutdown is signaled.

use std::sync::Arc;
use std::time::Duration;

use convoy_id::CycleId;
use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::error::SchedulingResult;
use crate::invoke::StageHandler;
use crate::stages::ReconcileOutput;

/// Drives the Reconciler on a fixed interval.
pub struct SchedulerWorker {
    reconciler: Arc<dyn StageHandler<CycleId, ReconcileOutput>>,
    interval: Duration,
}

impl SchedulerWorker {
    pub fn new(reconciler: Arc<dyn StageHandler<CycleId, ReconcileOutput>>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run until `shutdown` flips to true.
    ///
    /// The first cycle starts one interval after startup. A cycle that
    /// fails is logged and the next one runs on schedule.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting scheduler worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "Reconciliation cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scheduler worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single cycle.
    pub async fn run_cycle(&self) -> SchedulingResult<ReconcileOutput> {
        let output = self.reconciler.handle(CycleId::new()).await?;

        if !output.clusters.is_empty() {
            info!(
                cycle_id = %output.cycle_id,
                clusters = output.clusters.len(),
                "Reconciliation cycle started"
            );
        }

        Ok(output)
    }
}
