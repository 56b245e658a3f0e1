//! Stage-level error taxonomy.
//!
//! Collaborator errors convert with `?` and keep their original meaning.
//! Per-action failures never appear here; they are counted instead.

use convoy_id::{ClusterId, EnvironmentId, InstanceId};
use thiserror::Error;

use crate::clients::{ClusterApiError, EnvironmentError};
use crate::deadline::DeadlineExceeded;
use crate::engine::UnsupportedStrategy;
use crate::state::Resource;

/// Result type for stage operations.
pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Errors that abort a stage invocation.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// The environment store rejected or could not serve a request.
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// Building the cluster snapshot failed; no partial snapshot is used.
    #[error("failed to collect {resource} for cluster {cluster_id}: {source}")]
    Collection {
        cluster_id: ClusterId,
        resource: Resource,
        #[source]
        source: ClusterApiError,
    },

    /// No strategy exists for the environment's type and deployment method.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedStrategy),

    /// A container instance was looked up that is not in the snapshot.
    #[error("container instance {0} not found in snapshot")]
    InstanceNotFound(InstanceId),

    /// The environment targets a different cluster than the snapshot.
    #[error("environment {environment_id} targets cluster {expected}, snapshot is of {actual}")]
    ClusterMismatch {
        environment_id: EnvironmentId,
        expected: ClusterId,
        actual: ClusterId,
    },

    /// A collaborator call or stage invocation exceeded its limit.
    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),

    /// The inter-stage transport failed.
    #[error("stage invocation failed: {0}")]
    Invoke(String),

    /// Some manager triggers were not accepted; the rest were.
    #[error("{rejected} of {attempted} manager triggers were not accepted")]
    TriggersRejected { attempted: usize, rejected: usize },
}

impl SchedulingError {
    /// Returns true if the error came from the environment store.
    pub fn is_environment_error(&self) -> bool {
        matches!(self, Self::Environment(_))
    }

    /// Returns true if the snapshot could not be built.
    pub fn is_collection_error(&self) -> bool {
        matches!(self, Self::Collection { .. })
    }
}
