//! Single-task placement.

use tracing::debug;

use super::{EnvironmentDescription, Scheduler, SchedulingAction, StartTask};
use crate::error::SchedulingResult;
use crate::state::ClusterSnapshot;

/// Runs one task of the environment on the lexicographically-first
/// instance.
///
/// Deliberately minimal: it never stops tasks and ignores every other
/// instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleTaskScheduler;

impl Scheduler for SingleTaskScheduler {
    fn schedule(
        &self,
        snapshot: &ClusterSnapshot,
        environment: &EnvironmentDescription,
    ) -> SchedulingResult<Vec<SchedulingAction>> {
        let Some(instance) = snapshot.first_instance() else {
            debug!(environment_id = %environment.environment_id, "No instances to place on");
            return Ok(Vec::new());
        };

        let already_placed = snapshot
            .tasks_on(&instance.instance_id)
            .any(|t| t.group == environment.group());
        if already_placed {
            return Ok(Vec::new());
        }

        Ok(vec![StartTask {
            cluster_id: snapshot.cluster_id().clone(),
            container_instance_id: instance.instance_id.clone(),
            task_definition_id: environment.task_definition_id.clone(),
            group: environment.group().to_string(),
        }
        .into()])
    }
}
