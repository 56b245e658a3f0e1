//! Scheduler stage: converge one environment against a snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convoy_id::{ClusterId, CycleId, EnvironmentId};
use convoy_reconcile::{ActionTally, ConvergenceStatus};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::clients::{ClusterApi, EnvironmentService};
use crate::deadline::deadline;
use crate::engine::{EnvironmentDescription, StrategyResolver};
use crate::error::{SchedulingError, SchedulingResult};
use crate::invoke::StageHandler;
use crate::state::ClusterSnapshot;

/// One environment to converge against an already collected snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerInput {
    pub cycle_id: CycleId,
    pub snapshot: ClusterSnapshot,
    pub environment_id: EnvironmentId,
}

/// What one scheduler invocation achieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerOutput {
    pub cluster_id: ClusterId,
    pub environment_id: EnvironmentId,
    pub succeeded: u64,
    pub failed: u64,
    pub status: ConvergenceStatus,
}

impl SchedulerOutput {
    fn new(cluster_id: ClusterId, environment_id: EnvironmentId, tally: ActionTally) -> Self {
        Self {
            cluster_id,
            environment_id,
            succeeded: tally.succeeded,
            failed: tally.failed,
            status: tally.status(),
        }
    }
}

/// Handler for the Scheduler stage.
pub struct SchedulerHandler {
    environments: Arc<dyn EnvironmentService>,
    api: Arc<dyn ClusterApi>,
    resolver: Arc<dyn StrategyResolver>,
    call_timeout: Duration,
}

impl SchedulerHandler {
    pub fn new(
        environments: Arc<dyn EnvironmentService>,
        api: Arc<dyn ClusterApi>,
        resolver: Arc<dyn StrategyResolver>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            environments,
            api,
            resolver,
            call_timeout,
        }
    }

    /// Fetch the environment's current desired state.
    async fn describe(&self, environment_id: &EnvironmentId) -> SchedulingResult<EnvironmentDescription> {
        let target = deadline(
            "describe_target_revision",
            self.call_timeout,
            self.environments.describe_target_revision(environment_id),
        )
        .await??;

        let record = deadline(
            "describe_environment",
            self.call_timeout,
            self.environments
                .describe_environment(environment_id, &target.revision_id),
        )
        .await??;

        Ok(EnvironmentDescription::from_record(record)?)
    }

    /// Converge one environment.
    ///
    /// Environment, strategy and cluster-mismatch failures abort the
    /// invocation. Individual actions never do: each is counted as
    /// succeeded or failed.
    #[instrument(
        skip_all,
        fields(
            cycle_id = %input.cycle_id,
            cluster_id = %input.snapshot.cluster_id(),
            environment_id = %input.environment_id
        )
    )]
    pub async fn schedule(&self, input: SchedulerInput) -> SchedulingResult<SchedulerOutput> {
        let SchedulerInput {
            snapshot,
            environment_id,
            ..
        } = input;

        let environment = self.describe(&environment_id).await?;
        if &environment.cluster_id != snapshot.cluster_id() {
            return Err(SchedulingError::ClusterMismatch {
                environment_id,
                expected: environment.cluster_id,
                actual: snapshot.cluster_id().clone(),
            });
        }

        let scheduler = self.resolver.resolve(&environment)?;
        let actions = scheduler.schedule(&snapshot, &environment)?;
        debug!(
            revision_id = %environment.active_revision_id,
            actions = actions.len(),
            "Computed actions"
        );

        let api = self.api.as_ref();
        let tally: ActionTally = join_all(actions.iter().map(|a| a.execute(api, self.call_timeout)))
            .await
            .into_iter()
            .collect();

        let output = SchedulerOutput::new(snapshot.cluster_id().clone(), environment_id, tally);
        if output.failed > 0 {
            warn!(
                succeeded = output.succeeded,
                failed = output.failed,
                status = ?output.status,
                "Environment diverged"
            );
        } else {
            info!(
                succeeded = output.succeeded,
                status = ?output.status,
                "Environment scheduled"
            );
        }

        Ok(output)
    }
}

#[async_trait]
impl StageHandler<SchedulerInput, SchedulerOutput> for SchedulerHandler {
    async fn handle(&self, input: SchedulerInput) -> SchedulingResult<SchedulerOutput> {
        self.schedule(input).await
    }
}

#[cfg(test)]
mod tests {
    use convoy_id::{InstanceId, RevisionId, TaskDefinitionId};

    use super::*;
    use crate::clients::memory::{ClusterCall, InMemoryCluster, InMemoryEnvironments};
    use crate::clients::EnvironmentRecord;
    use crate::engine::{
        Scheduler, SchedulerFactory, SchedulingAction, StartTask, StopTask, UnsupportedStrategy,
    };
    use crate::state::{ContainerInstance, Task};

    fn cluster_id() -> ClusterId {
        ClusterId::parse("cluster1").unwrap()
    }

    fn env_id() -> EnvironmentId {
        EnvironmentId::parse("env1").unwrap()
    }

    fn record(environment_type: &str, cluster: &str) -> EnvironmentRecord {
        EnvironmentRecord {
            environment_id: env_id(),
            revision_id: RevisionId::parse("1").unwrap(),
            cluster_id: ClusterId::parse(cluster).unwrap(),
            environment_type: environment_type.to_string(),
            deployment_method: "ReplaceAfterTerminate".to_string(),
            task_definition_id: TaskDefinitionId::parse("taskdefA").unwrap(),
        }
    }

    fn running(task: &str, instance: &str) -> Task {
        Task {
            task_id: task.parse().unwrap(),
            container_instance_id: instance.parse().unwrap(),
            task_definition_id: "taskdefA".parse().unwrap(),
            status: "RUNNING".to_string(),
            group: "env1".to_string(),
            started_by: None,
        }
    }

    fn input(tasks: Vec<Task>) -> SchedulerInput {
        SchedulerInput {
            cycle_id: CycleId::new(),
            snapshot: ClusterSnapshot::new(
                cluster_id(),
                tasks,
                vec![ContainerInstance::new(InstanceId::parse("instance1").unwrap())],
            ),
            environment_id: env_id(),
        }
    }

    fn handler(
        environments: InMemoryEnvironments,
        api: Arc<InMemoryCluster>,
        resolver: Arc<dyn StrategyResolver>,
    ) -> SchedulerHandler {
        SchedulerHandler::new(Arc::new(environments), api, resolver, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_starts_missing_daemon_task() {
        let api = Arc::new(
            InMemoryCluster::default().with_cluster(cluster_id(), [InstanceId::parse("instance1").unwrap()], []),
        );
        let handler = handler(
            InMemoryEnvironments::from_records([record("Daemon", "cluster1")]),
            api.clone(),
            Arc::new(SchedulerFactory),
        );

        let output = handler.schedule(input(vec![])).await.unwrap();

        assert_eq!((output.succeeded, output.failed), (1, 0));
        assert_eq!(output.status, ConvergenceStatus::Converging);
        assert_eq!(
            api.actions().await,
            vec![ClusterCall::Start(StartTask {
                cluster_id: cluster_id(),
                container_instance_id: InstanceId::parse("instance1").unwrap(),
                task_definition_id: TaskDefinitionId::parse("taskdefA").unwrap(),
                group: "env1".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn test_converged_environment_issues_nothing() {
        let api = Arc::new(InMemoryCluster::default().with_cluster(
            cluster_id(),
            [InstanceId::parse("instance1").unwrap()],
            [running("t1", "instance1")],
        ));
        let handler = handler(
            InMemoryEnvironments::from_records([record("Daemon", "cluster1")]),
            api.clone(),
            Arc::new(SchedulerFactory),
        );

        let output = handler
            .schedule(input(vec![running("t1", "instance1")]))
            .await
            .unwrap();

        assert_eq!(output.status, ConvergenceStatus::Converged);
        assert!(api.actions().await.is_empty());
    }

    /// Returns one start that the cluster accepts and one stop of a task it
    /// does not know.
    struct HalfFailing;

    impl Scheduler for HalfFailing {
        fn schedule(
            &self,
            snapshot: &ClusterSnapshot,
            environment: &EnvironmentDescription,
        ) -> SchedulingResult<Vec<SchedulingAction>> {
            Ok(vec![
                StartTask {
                    cluster_id: snapshot.cluster_id().clone(),
                    container_instance_id: InstanceId::parse("instance1").unwrap(),
                    task_definition_id: environment.task_definition_id.clone(),
                    group: environment.group().to_string(),
                }
                .into(),
                StopTask {
                    cluster_id: snapshot.cluster_id().clone(),
                    task_id: "ghost".parse().unwrap(),
                    reason: "test".to_string(),
                }
                .into(),
            ])
        }
    }

    impl StrategyResolver for HalfFailing {
        fn resolve(
            &self,
            _environment: &EnvironmentDescription,
        ) -> Result<Box<dyn Scheduler>, UnsupportedStrategy> {
            Ok(Box::new(HalfFailing))
        }
    }

    #[tokio::test]
    async fn test_partial_failure_is_counted() {
        let api = Arc::new(
            InMemoryCluster::default().with_cluster(cluster_id(), [InstanceId::parse("instance1").unwrap()], []),
        );
        let handler = handler(
            InMemoryEnvironments::from_records([record("Daemon", "cluster1")]),
            api,
            Arc::new(HalfFailing),
        );

        let output = handler.schedule(input(vec![])).await.unwrap();

        assert_eq!((output.succeeded, output.failed), (1, 1));
        assert_eq!(output.status, ConvergenceStatus::Diverged);
    }

    #[tokio::test]
    async fn test_unknown_environment_propagates() {
        let handler = handler(
            InMemoryEnvironments::new(),
            Arc::new(InMemoryCluster::default()),
            Arc::new(SchedulerFactory),
        );

        let err = handler.schedule(input(vec![])).await.unwrap_err();

        assert!(err.is_environment_error());
    }

    #[tokio::test]
    async fn test_unsupported_type_propagates() {
        let handler = handler(
            InMemoryEnvironments::from_records([record("Batch", "cluster1")]),
            Arc::new(InMemoryCluster::default()),
            Arc::new(SchedulerFactory),
        );

        let err = handler.schedule(input(vec![])).await.unwrap_err();

        assert!(matches!(err, SchedulingError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_rejects_snapshot_of_other_cluster() {
        let handler = handler(
            InMemoryEnvironments::from_records([record("SingleTask", "cluster2")]),
            Arc::new(InMemoryCluster::default()),
            Arc::new(SchedulerFactory),
        );

        let err = handler.schedule(input(vec![])).await.unwrap_err();

        assert!(matches!(err, SchedulingError::ClusterMismatch { .. }));
    }
}
