//! Cluster snapshot value model.

use chrono::{DateTime, Utc};
use convoy_id::{ClusterId, InstanceId, TaskDefinitionId, TaskId};
use serde::{Deserialize, Serialize};

/// Resource kinds drained into a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Tasks,
    ContainerInstances,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tasks => f.write_str("tasks"),
            Self::ContainerInstances => f.write_str("container instances"),
        }
    }
}

/// A task as reported by the cluster API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,

    /// Host the task was placed on. May reference an instance that has
    /// since been deregistered and is missing from the snapshot.
    pub container_instance_id: InstanceId,

    pub task_definition_id: TaskDefinitionId,

    /// Free-form status from the API (RUNNING, PENDING, STOPPED, ...).
    pub status: String,

    /// Placement group; binds a task to an environment.
    #[serde(default)]
    pub group: String,

    /// Marker set by whoever started the task.
    #[serde(default)]
    pub started_by: Option<String>,
}

/// A registered container instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerInstance {
    pub instance_id: InstanceId,
}

impl ContainerInstance {
    pub fn new(instance_id: InstanceId) -> Self {
        Self { instance_id }
    }
}

/// Everything observed about one cluster at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    cluster_id: ClusterId,
    tasks: Vec<Task>,
    instances: Vec<ContainerInstance>,
    observed_at: DateTime<Utc>,
}

impl ClusterSnapshot {
    /// Create a snapshot observed now.
    pub fn new(cluster_id: ClusterId, tasks: Vec<Task>, instances: Vec<ContainerInstance>) -> Self {
        Self {
            cluster_id,
            tasks,
            instances,
            observed_at: Utc::now(),
        }
    }

    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn instances(&self) -> &[ContainerInstance] {
        &self.instances
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// The lexicographically-first container instance, if any.
    pub fn first_instance(&self) -> Option<&ContainerInstance> {
        self.instances.iter().min_by(|a, b| a.instance_id.cmp(&b.instance_id))
    }

    /// Tasks placed on `instance_id`. Empty for unknown instances.
    pub fn tasks_on<'s>(&'s self, instance_id: &InstanceId) -> impl Iterator<Item = &'s Task> + 's {
        let instance_id = instance_id.clone();
        self.tasks
            .iter()
            .filter(move |t| t.container_instance_id == instance_id)
    }
}
