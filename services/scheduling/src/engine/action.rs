//! Remedial actions and their execution against the cluster API.

use std::time::Duration;

use convoy_id::{ClusterId, InstanceId, TaskDefinitionId, TaskId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clients::{bounded, ClusterApi};

/// Place a task of the environment's task definition on one instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StartTask {
    pub cluster_id: ClusterId,
    pub container_instance_id: InstanceId,
    pub task_definition_id: TaskDefinitionId,
    pub group: String,
}

/// Stop one task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopTask {
    pub cluster_id: ClusterId,
    pub task_id: TaskId,
    pub reason: String,
}

/// A single idempotent remedial command.
///
/// Actions from one cycle may run in any order or all at once, and a
/// failed action is simply recomputed next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SchedulingAction {
    StartTask(StartTask),
    StopTask(StopTask),
}

impl From<StartTask> for SchedulingAction {
    fn from(action: StartTask) -> Self {
        Self::StartTask(action)
    }
}

impl From<StopTask> for SchedulingAction {
    fn from(action: StopTask) -> Self {
        Self::StopTask(action)
    }
}

impl SchedulingAction {
    /// Issue the action. Returns whether the cluster API accepted it.
    ///
    /// API errors and timeouts count as failures; they are logged here and
    /// never propagated.
    pub async fn execute(&self, api: &dyn ClusterApi, limit: Duration) -> bool {
        match self {
            Self::StartTask(start) => {
                let result = bounded(
                    "start_task",
                    limit,
                    api.start_task(
                        &start.cluster_id,
                        &start.container_instance_id,
                        &start.task_definition_id,
                        &start.group,
                    ),
                )
                .await;

                match result {
                    Ok(output) if output.succeeded() => {
                        debug!(
                            instance_id = %start.container_instance_id,
                            task_definition_id = %start.task_definition_id,
                            tasks = ?output.tasks,
                            "Started task"
                        );
                        true
                    }
                    Ok(output) => {
                        warn!(
                            instance_id = %start.container_instance_id,
                            failures = ?output.failures,
                            "Start task rejected"
                        );
                        false
                    }
                    Err(e) => {
                        warn!(
                            instance_id = %start.container_instance_id,
                            error = %e,
                            "Start task failed"
                        );
                        false
                    }
                }
            }
            Self::StopTask(stop) => {
                let result = bounded(
                    "stop_task",
                    limit,
                    api.stop_task(&stop.cluster_id, &stop.task_id, &stop.reason),
                )
                .await;

                match result {
                    Ok(output) if output.succeeded() => {
                        debug!(task_id = %stop.task_id, reason = %stop.reason, "Stopped task");
                        true
                    }
                    Ok(_) => {
                        warn!(task_id = %stop.task_id, "Stop task returned no task");
                        false
                    }
                    Err(e) => {
                        warn!(task_id = %stop.task_id, error = %e, "Stop task failed");
                        false
                    }
                }
            }
        }
    }
}
