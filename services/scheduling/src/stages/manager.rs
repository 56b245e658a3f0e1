//! Manager stage: schedule every environment of one cluster.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convoy_id::{ClusterId, CycleId, EnvironmentId};
use convoy_reconcile::{ActionTally, ConvergenceStatus};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{SchedulerInput, SchedulerOutput};
use crate::clients::EnvironmentService;
use crate::deadline::deadline;
use crate::error::SchedulingResult;
use crate::invoke::{StageHandler, StageInvoker};
use crate::state::StateCollector;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerInput {
    pub cycle_id: CycleId,
    pub cluster_id: ClusterId,
}

/// How one environment's Scheduler invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnvironmentResult {
    Scheduled {
        succeeded: u64,
        failed: u64,
        status: ConvergenceStatus,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentOutcome {
    pub environment_id: EnvironmentId,
    #[serde(flatten)]
    pub result: EnvironmentResult,
}

/// Per-environment results for one cluster, in environment listing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerOutput {
    pub cluster_id: ClusterId,
    pub environments: Vec<EnvironmentOutcome>,
}

impl ManagerOutput {
    /// Action counts summed over every scheduled environment.
    pub fn tally(&self) -> ActionTally {
        let mut tally = ActionTally::default();
        for outcome in &self.environments {
            if let EnvironmentResult::Scheduled {
                succeeded, failed, ..
            } = outcome.result
            {
                tally += ActionTally { succeeded, failed };
            }
        }
        tally
    }

    /// Environments whose Scheduler invocation failed.
    pub fn failures(&self) -> impl Iterator<Item = &EnvironmentOutcome> {
        self.environments
            .iter()
            .filter(|o| matches!(o.result, EnvironmentResult::Failed { .. }))
    }
}

/// Handler for the Manager stage.
pub struct ManagerHandler {
    environments: Arc<dyn EnvironmentService>,
    collector: StateCollector,
    scheduler: Arc<dyn StageInvoker<SchedulerInput, SchedulerOutput>>,
    call_timeout: Duration,
}

impl ManagerHandler {
    pub fn new(
        environments: Arc<dyn EnvironmentService>,
        collector: StateCollector,
        scheduler: Arc<dyn StageInvoker<SchedulerInput, SchedulerOutput>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            environments,
            collector,
            scheduler,
            call_timeout,
        }
    }

    /// Snapshot the cluster once and call the Scheduler stage for every
    /// environment concurrently.
    ///
    /// A failing environment is reported in the output next to its
    /// siblings. Listing or snapshot failures fail the whole invocation.
    #[instrument(skip_all, fields(cycle_id = %input.cycle_id, cluster_id = %input.cluster_id))]
    pub async fn manage(&self, input: ManagerInput) -> SchedulingResult<ManagerOutput> {
        let ManagerInput {
            cycle_id,
            cluster_id,
        } = input;

        let environment_ids = deadline(
            "list_environments",
            self.call_timeout,
            self.environments.list_environments(&cluster_id),
        )
        .await??;

        if environment_ids.is_empty() {
            debug!("No environments to schedule");
            return Ok(ManagerOutput {
                cluster_id,
                environments: Vec::new(),
            });
        }

        let snapshot = self.collector.snapshot(&cluster_id).await?;
        debug!(
            environments = environment_ids.len(),
            tasks = snapshot.tasks().len(),
            instances = snapshot.instances().len(),
            "Collected snapshot"
        );

        let calls = environment_ids.into_iter().map(|environment_id| {
            let input = SchedulerInput {
                cycle_id,
                snapshot: snapshot.clone(),
                environment_id: environment_id.clone(),
            };
            async move {
                let result = match self.scheduler.call(input).await {
                    Ok(output) => EnvironmentResult::Scheduled {
                        succeeded: output.succeeded,
                        failed: output.failed,
                        status: output.status,
                    },
                    Err(e) => {
                        warn!(environment_id = %environment_id, error = %e, "Scheduler stage failed");
                        EnvironmentResult::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                EnvironmentOutcome {
                    environment_id,
                    result,
                }
            }
        });

        let output = ManagerOutput {
            cluster_id,
            environments: join_all(calls).await,
        };

        let tally = output.tally();
        info!(
            environments = output.environments.len(),
            failed_environments = output.failures().count(),
            succeeded = tally.succeeded,
            failed = tally.failed,
            "Cluster scheduled"
        );

        Ok(output)
    }
}

#[async_trait]
impl StageHandler<ManagerInput, ManagerOutput> for ManagerHandler {
    async fn handle(&self, input: ManagerInput) -> SchedulingResult<ManagerOutput> {
        self.manage(input).await
    }
}
