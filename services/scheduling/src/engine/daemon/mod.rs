//! One-healthy-task-per-instance placement.
//!
//! [`Daemon`] adapts any [`DaemonScheduler`] to the generic [`Scheduler`]
//! seam: it indexes the snapshot into a [`ClusterSummary`], wraps the
//! environment in a [`DaemonEnvironment`] and hands both to the concrete
//! strategy.

mod replace_after_terminate;

use std::collections::BTreeMap;

use convoy_id::{InstanceId, TaskId};

use super::{EnvironmentDescription, Scheduler, SchedulingAction, StartTask, StopTask};
use crate::error::{SchedulingError, SchedulingResult};
use crate::state::{ClusterSnapshot, ContainerInstance, Task};

pub use replace_after_terminate::ReplaceAfterTerminateScheduler;

/// Task statuses that count as healthy.
pub const HEALTHY_STATUSES: [&str; 2] = ["RUNNING", "PENDING"];

/// Returns true if `status` is in [`HEALTHY_STATUSES`].
pub fn is_healthy(status: &str) -> bool {
    HEALTHY_STATUSES.contains(&status)
}

/// Task statuses of a task that is already shutting down or gone.
pub const STOPPING_STATUSES: [&str; 4] = ["DEACTIVATING", "STOPPING", "DEPROVISIONING", "STOPPED"];

/// Returns true if `status` is in [`STOPPING_STATUSES`].
pub fn is_stopping(status: &str) -> bool {
    STOPPING_STATUSES.contains(&status)
}

/// A snapshot indexed by instance.
#[derive(Debug)]
pub struct ClusterSummary<'a> {
    instances: BTreeMap<&'a InstanceId, &'a ContainerInstance>,
    tasks: BTreeMap<&'a InstanceId, Vec<&'a Task>>,
}

impl<'a> ClusterSummary<'a> {
    pub fn new(snapshot: &'a ClusterSnapshot) -> Self {
        let instances = snapshot
            .instances()
            .iter()
            .map(|i| (&i.instance_id, i))
            .collect();

        let mut tasks: BTreeMap<&InstanceId, Vec<&Task>> = BTreeMap::new();
        for task in snapshot.tasks() {
            tasks.entry(&task.container_instance_id).or_default().push(task);
        }

        Self {
            instances,
            tasks,
        }
    }

    /// Instances in id order.
    pub fn instances(&self) -> impl Iterator<Item = &'a ContainerInstance> + '_ {
        self.instances.values().copied()
    }

    /// Tasks on a known instance.
    ///
    /// Fails with [`SchedulingError::InstanceNotFound`] if the instance is
    /// not part of the snapshot, even when tasks still reference it.
    pub fn tasks_for_instance(&self, instance_id: &InstanceId) -> SchedulingResult<&[&'a Task]> {
        if !self.instances.contains_key(instance_id) {
            return Err(SchedulingError::InstanceNotFound(instance_id.clone()));
        }
        Ok(self.tasks.get(instance_id).map(Vec::as_slice).unwrap_or_default())
    }
}

/// Daemon-placement rules for one environment.
#[derive(Debug, Clone, Copy)]
pub struct DaemonEnvironment<'a> {
    environment: &'a EnvironmentDescription,
}

impl<'a> DaemonEnvironment<'a> {
    pub fn new(environment: &'a EnvironmentDescription) -> Self {
        Self { environment }
    }

    pub fn description(&self) -> &'a EnvironmentDescription {
        self.environment
    }

    fn owns(&self, task: &Task) -> bool {
        task.group == self.environment.group()
    }

    /// Same group, same task definition, healthy.
    pub fn matches_task(&self, task: &Task) -> bool {
        self.owns(task)
            && task.task_definition_id == self.environment.task_definition_id
            && is_healthy(&task.status)
    }

    pub fn is_missing_healthy_task(&self, tasks: &[&Task]) -> bool {
        !tasks.iter().any(|t| self.matches_task(t))
    }

    /// A task of this environment running an outdated definition that is
    /// not already on its way out. Unhealthy copies such as ACTIVATING
    /// count too.
    pub fn is_task_stoppable(&self, task: &Task) -> bool {
        self.owns(task)
            && !is_stopping(&task.status)
            && task.task_definition_id != self.environment.task_definition_id
    }

    /// Stoppable tasks on one instance, plus every matching copy except
    /// the one kept. A RUNNING copy is kept over a PENDING one, then the
    /// lowest task id wins. Ordered by task id.
    pub fn stoppable_tasks<'t>(&self, tasks: &[&'t Task]) -> Vec<&'t Task> {
        let mut matching: Vec<&Task> = tasks.iter().copied().filter(|t| self.matches_task(t)).collect();
        matching.sort_by(|a, b| {
            (a.status != "RUNNING", &a.task_id).cmp(&(b.status != "RUNNING", &b.task_id))
        });

        let mut stoppable: Vec<&Task> = tasks
            .iter()
            .copied()
            .filter(|t| self.is_task_stoppable(t))
            .chain(matching.into_iter().skip(1))
            .collect();
        stoppable.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        stoppable.dedup_by(|a, b| a.task_id == b.task_id);
        stoppable
    }

    pub fn start_task_for(&self, instance: &ContainerInstance) -> StartTask {
        StartTask {
            cluster_id: self.environment.cluster_id.clone(),
            container_instance_id: instance.instance_id.clone(),
            task_definition_id: self.environment.task_definition_id.clone(),
            group: self.environment.group().to_string(),
        }
    }

    pub fn stop_task_for(&self, task_id: &TaskId) -> StopTask {
        StopTask {
            cluster_id: self.environment.cluster_id.clone(),
            task_id: task_id.clone(),
            reason: format!(
                "Stopped by deployment to {}@{}",
                self.environment.environment_id, self.environment.task_definition_id
            ),
        }
    }
}

/// A concrete daemon deployment method.
pub trait DaemonScheduler: Send + Sync {
    fn schedule(
        &self,
        environment: DaemonEnvironment<'_>,
        summary: &ClusterSummary<'_>,
    ) -> SchedulingResult<Vec<SchedulingAction>>;
}

/// Adapts a [`DaemonScheduler`] to [`Scheduler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Daemon<S> {
    inner: S,
}

impl<S: DaemonScheduler> Daemon<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: DaemonScheduler> Scheduler for Daemon<S> {
    fn schedule(
        &self,
        snapshot: &ClusterSnapshot,
        environment: &EnvironmentDescription,
    ) -> SchedulingResult<Vec<SchedulingAction>> {
        if snapshot.cluster_id() != &environment.cluster_id {
            return Err(SchedulingError::ClusterMismatch {
                environment_id: environment.environment_id.clone(),
                expected: environment.cluster_id.clone(),
                actual: snapshot.cluster_id().clone(),
            });
        }

        let summary = ClusterSummary::new(snapshot);
        self.inner.schedule(DaemonEnvironment::new(environment), &summary)
    }
}
