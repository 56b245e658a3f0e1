//! Reconciler stage: hand every cluster with environments to the Manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convoy_id::{ClusterId, CycleId};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{ManagerInput, ManagerOutput};
use crate::clients::EnvironmentService;
use crate::deadline::deadline;
use crate::error::{SchedulingError, SchedulingResult};
use crate::invoke::{StageHandler, StageInvoker};

/// Clusters whose Manager invocation was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutput {
    pub cycle_id: CycleId,
    pub clusters: Vec<ClusterId>,
}

/// Entry point of a reconciliation cycle.
///
/// Triggers never wait for the Manager to finish, so one slow cluster
/// cannot hold back the others or the next cycle.
pub struct Reconciler {
    environments: Arc<dyn EnvironmentService>,
    manager: Arc<dyn StageInvoker<ManagerInput, ManagerOutput>>,
    call_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        environments: Arc<dyn EnvironmentService>,
        manager: Arc<dyn StageInvoker<ManagerInput, ManagerOutput>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            environments,
            manager,
            call_timeout,
        }
    }

    /// Trigger one Manager invocation per cluster.
    ///
    /// Every trigger is attempted. If any was not accepted the cycle fails
    /// with [`SchedulingError::TriggersRejected`] after the rest went out.
    #[instrument(skip_all, fields(cycle_id = %cycle_id))]
    pub async fn reconcile(&self, cycle_id: CycleId) -> SchedulingResult<ReconcileOutput> {
        let clusters = deadline(
            "list_clusters_with_environments",
            self.call_timeout,
            self.environments.list_clusters_with_environments(),
        )
        .await??;

        let triggers = clusters.into_iter().map(|cluster_id| async move {
            let input = ManagerInput {
                cycle_id,
                cluster_id: cluster_id.clone(),
            };
            let accepted = match deadline("trigger_manager", self.call_timeout, self.manager.trigger(input)).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    warn!(cluster_id = %cluster_id, error = %e, "Manager trigger rejected");
                    false
                }
                Err(e) => {
                    warn!(cluster_id = %cluster_id, error = %e, "Manager trigger timed out");
                    false
                }
            };
            (cluster_id, accepted)
        });

        let results = join_all(triggers).await;
        let attempted = results.len();
        let clusters: Vec<ClusterId> = results
            .into_iter()
            .filter_map(|(cluster_id, accepted)| accepted.then_some(cluster_id))
            .collect();

        let rejected = attempted - clusters.len();
        if rejected > 0 {
            return Err(SchedulingError::TriggersRejected { attempted, rejected });
        }

        info!(clusters = attempted, "Triggered managers");
        Ok(ReconcileOutput { cycle_id, clusters })
    }
}

#[async_trait]
impl StageHandler<CycleId, ReconcileOutput> for Reconciler {
    async fn handle(&self, cycle_id: CycleId) -> SchedulingResult<ReconcileOutput> {
        self.reconcile(cycle_id).await
    }
}
