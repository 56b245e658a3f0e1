//! Environment store interface.

use async_trait::async_trait;
use convoy_id::{ClusterId, EnvironmentId, RevisionId, TaskDefinitionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the environment store.
///
/// Stages propagate these unchanged and never retry them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    /// The environment or revision does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed or referenced an inconsistent revision.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The store failed internally.
    #[error("environment service error: {0}")]
    Internal(String),
}

/// The revision an environment should currently be running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRevision {
    pub environment_id: EnvironmentId,
    pub revision_id: RevisionId,
}

/// One revision of an environment as stored.
///
/// `environment_type` is kept as the store's raw string; interpreting it is
/// the strategy factory's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub environment_id: EnvironmentId,
    pub revision_id: RevisionId,
    pub cluster_id: ClusterId,
    pub environment_type: String,
    #[serde(default)]
    pub deployment_method: String,
    pub task_definition_id: TaskDefinitionId,
}

/// Declarative environment store.
#[async_trait]
pub trait EnvironmentService: Send + Sync {
    /// Clusters that have at least one environment.
    async fn list_clusters_with_environments(&self) -> Result<Vec<ClusterId>, EnvironmentError>;

    /// Environments targeting a cluster.
    async fn list_environments(
        &self,
        cluster_id: &ClusterId,
    ) -> Result<Vec<EnvironmentId>, EnvironmentError>;

    /// The revision an environment should be converged to.
    async fn describe_target_revision(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<TargetRevision, EnvironmentError>;

    /// An environment as of a specific revision.
    async fn describe_environment(
        &self,
        environment_id: &EnvironmentId,
        revision_id: &RevisionId,
    ) -> Result<EnvironmentRecord, EnvironmentError>;
}
