//! Cluster control API interface.
//!
//! The API must support many concurrent calls through one shared client;
//! describe batches and actions are all issued in parallel.

use std::time::Duration;

use async_trait::async_trait;
use convoy_id::{ClusterId, InstanceId, TaskDefinitionId, TaskId};
use convoy_reconcile::Page;
use thiserror::Error;

use crate::deadline::DeadlineExceeded;
use crate::state::{ContainerInstance, Task};

/// `startedBy` marker on every task this scheduler starts.
pub const STARTED_BY: &str = "convoy";

/// Errors returned by the cluster API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterApiError {
    /// The cluster does not exist.
    #[error("cluster not found: {0}")]
    ClusterNotFound(ClusterId),

    /// The request was rejected as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The call was throttled.
    #[error("request throttled")]
    Throttled,

    /// The API failed internally or could not be reached.
    #[error("cluster api error: {0}")]
    Service(String),

    /// The call did not complete in time.
    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),
}

/// Result of a start-task call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartTaskOutput {
    /// Tasks the API accepted.
    pub tasks: Vec<TaskId>,

    /// Placement failure reasons, one per rejected placement.
    pub failures: Vec<String>,
}

impl StartTaskOutput {
    /// A start succeeded when nothing was rejected.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of a stop-task call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopTaskOutput {
    /// The stopped task, if the API found it.
    pub task: Option<TaskId>,
}

impl StopTaskOutput {
    /// A stop succeeded when the API returned the task.
    pub fn succeeded(&self) -> bool {
        self.task.is_some()
    }
}

/// Container cluster control API.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// One page of task ids.
    async fn list_tasks(
        &self,
        cluster_id: &ClusterId,
        next_token: Option<String>,
    ) -> Result<Page<TaskId>, ClusterApiError>;

    /// Full descriptions of a batch of tasks.
    async fn describe_tasks(
        &self,
        cluster_id: &ClusterId,
        task_ids: Vec<TaskId>,
    ) -> Result<Vec<Task>, ClusterApiError>;

    /// One page of container instance ids.
    async fn list_container_instances(
        &self,
        cluster_id: &ClusterId,
        next_token: Option<String>,
    ) -> Result<Page<InstanceId>, ClusterApiError>;

    /// Full descriptions of a batch of container instances.
    async fn describe_container_instances(
        &self,
        cluster_id: &ClusterId,
        instance_ids: Vec<InstanceId>,
    ) -> Result<Vec<ContainerInstance>, ClusterApiError>;

    /// Place one task of `task_definition_id` on a specific instance,
    /// tagged with [`STARTED_BY`].
    async fn start_task(
        &self,
        cluster_id: &ClusterId,
        instance_id: &InstanceId,
        task_definition_id: &TaskDefinitionId,
        group: &str,
    ) -> Result<StartTaskOutput, ClusterApiError>;

    /// Stop a task.
    async fn stop_task(
        &self,
        cluster_id: &ClusterId,
        task_id: &TaskId,
        reason: &str,
    ) -> Result<StopTaskOutput, ClusterApiError>;
}

/// Bound a cluster API call, folding the elapsed case into the API error.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    after: Duration,
    call: F,
) -> Result<T, ClusterApiError>
where
    F: std::future::Future<Output = Result<T, ClusterApiError>>,
{
    crate::deadline::deadline(operation, after, call).await?
}
