use tracing::debug;

use super::{ClusterSummary, DaemonEnvironment, DaemonScheduler};
use crate::engine::SchedulingAction;
use crate::error::SchedulingResult;

/// Starts a task on every instance missing one, and stops outdated or
/// surplus copies.
///
/// Starts and stops are computed independently and may execute in any
/// order, so an instance can briefly run zero or two copies while a new
/// task definition rolls out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceAfterTerminateScheduler;

impl ReplaceAfterTerminateScheduler {
    pub const ID: &'static str = "ReplaceAfterTerminate";
}

impl DaemonScheduler for ReplaceAfterTerminateScheduler {
    fn schedule(
        &self,
        environment: DaemonEnvironment<'_>,
        summary: &ClusterSummary<'_>,
    ) -> SchedulingResult<Vec<SchedulingAction>> {
        let mut starts: Vec<SchedulingAction> = Vec::new();
        let mut stops: Vec<SchedulingAction> = Vec::new();

        for instance in summary.instances() {
            let tasks = summary.tasks_for_instance(&instance.instance_id)?;

            if environment.is_missing_healthy_task(tasks) {
                starts.push(environment.start_task_for(instance).into());
            }
            stops.extend(
                environment
                    .stoppable_tasks(tasks)
                    .into_iter()
                    .map(|t| environment.stop_task_for(&t.task_id).into()),
            );
        }

        debug!(
            environment_id = %environment.description().environment_id,
            starts = starts.len(),
            stops = stops.len(),
            "Computed daemon actions"
        );

        starts.append(&mut stops);
        Ok(starts)
    }
}
