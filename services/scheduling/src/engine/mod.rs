//! Scheduling strategies.
//!
//! A strategy is a pure function from an observed [`ClusterSnapshot`] and a
//! desired [`EnvironmentDescription`] to the actions that move one toward
//! the other. Strategies never call out; executing the actions is the
//! scheduler stage's job.

mod action;
pub mod daemon;
mod factory;
mod single_task;

use convoy_id::{ClusterId, EnvironmentId, RevisionId, TaskDefinitionId};
use serde::{Deserialize, Serialize};

use crate::clients::EnvironmentRecord;
use crate::error::SchedulingResult;
use crate::state::ClusterSnapshot;

pub use action::{SchedulingAction, StartTask, StopTask};
pub use factory::{SchedulerFactory, Strategy, StrategyResolver, UnsupportedStrategy};
pub use single_task::SingleTaskScheduler;

/// How an environment wants its tasks placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentType {
    /// One task somewhere in the cluster.
    SingleTask,

    /// One healthy task on every instance.
    Daemon,
}

impl std::fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleTask => f.write_str("SingleTask"),
            Self::Daemon => f.write_str("Daemon"),
        }
    }
}

impl std::str::FromStr for EnvironmentType {
    type Err = UnsupportedStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SingleTask" => Ok(Self::SingleTask),
            "Daemon" => Ok(Self::Daemon),
            other => Err(UnsupportedStrategy::EnvironmentType(other.to_string())),
        }
    }
}

/// The desired state needed to schedule one environment.
///
/// Rebuilt from the environment store on every scheduler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescription {
    pub cluster_id: ClusterId,
    pub environment_id: EnvironmentId,
    pub active_revision_id: RevisionId,
    pub environment_type: EnvironmentType,
    pub deployment_method: String,
    pub task_definition_id: TaskDefinitionId,
}

impl EnvironmentDescription {
    /// Project a stored environment revision.
    pub fn from_record(record: EnvironmentRecord) -> Result<Self, UnsupportedStrategy> {
        Ok(Self {
            environment_type: record.environment_type.parse()?,
            cluster_id: record.cluster_id,
            environment_id: record.environment_id,
            active_revision_id: record.revision_id,
            deployment_method: record.deployment_method,
            task_definition_id: record.task_definition_id,
        })
    }

    /// Placement group that binds tasks to this environment.
    pub fn group(&self) -> &str {
        self.environment_id.as_str()
    }
}

/// A placement strategy.
pub trait Scheduler: Send + Sync {
    /// Compute the actions for one environment. Deterministic for equal
    /// inputs.
    fn schedule(
        &self,
        snapshot: &ClusterSnapshot,
        environment: &EnvironmentDescription,
    ) -> SchedulingResult<Vec<SchedulingAction>>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders shared by strategy tests.

    use convoy_id::{InstanceId, TaskId};

    use super::*;
    use crate::state::{ContainerInstance, Task};

    pub fn daemon_env(name: &str, task_definition: &str) -> EnvironmentDescription {
        EnvironmentDescription {
            cluster_id: ClusterId::parse("cluster1").unwrap(),
            environment_id: EnvironmentId::parse(name).unwrap(),
            active_revision_id: RevisionId::parse("1").unwrap(),
            environment_type: EnvironmentType::Daemon,
            deployment_method: "ReplaceAfterTerminate".to_string(),
            task_definition_id: TaskDefinitionId::parse(task_definition).unwrap(),
        }
    }

    /// `desc` is `task:taskdef:STATUS[:group]`; group defaults to `env`.
    pub fn task(instance: &str, desc: &str, env: &str) -> Task {
        let parts: Vec<&str> = desc.split(':').collect();
        Task {
            task_id: TaskId::parse(parts[0]).unwrap(),
            container_instance_id: InstanceId::parse(instance).unwrap(),
            task_definition_id: TaskDefinitionId::parse(parts[1]).unwrap(),
            status: parts[2].to_string(),
            group: parts.get(3).copied().unwrap_or(env).to_string(),
            started_by: Some("convoy".to_string()),
        }
    }

    /// One row per instance: `(instance, "task:def:STATUS,...")`.
    pub fn snapshot(rows: &[(&str, &str)], env: &str) -> ClusterSnapshot {
        let mut tasks = Vec::new();
        let mut instances = Vec::new();
        for (instance, descs) in rows {
            instances.push(ContainerInstance::new(InstanceId::parse(*instance).unwrap()));
            tasks.extend(
                descs
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| task(instance, s, env)),
            );
        }
        ClusterSnapshot::new(ClusterId::parse("cluster1").unwrap(), tasks, instances)
    }
}
