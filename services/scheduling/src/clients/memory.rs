//! In-memory collaborators for tests and local development.
//!
//! Both keep their state behind a `tokio::sync::RwLock` so a test can
//! change desired or observed state between cycles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use convoy_id::{ClusterId, EnvironmentId, InstanceId, RevisionId, TaskDefinitionId, TaskId};
use convoy_reconcile::Page;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    ClusterApi, ClusterApiError, EnvironmentError, EnvironmentRecord, EnvironmentService,
    StartTaskOutput, StopTaskOutput, TargetRevision, STARTED_BY,
};
use crate::engine::{StartTask, StopTask};
use crate::state::{ContainerInstance, Task};

/// Status given to newly started tasks.
pub const STARTED_STATUS: &str = "PENDING";

/// Status given to stopped tasks.
pub const STOPPED_STATUS: &str = "STOPPED";

/// Seed data for both in-memory collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// Listing page size; unset means [`InMemoryCluster::DEFAULT_PAGE_SIZE`].
    #[serde(default)]
    pub page_size: Option<usize>,

    #[serde(default)]
    pub environments: Vec<EnvironmentRecord>,

    #[serde(default)]
    pub clusters: Vec<ClusterFixture>,
}

/// Observed state of one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterFixture {
    pub cluster_id: ClusterId,

    #[serde(default)]
    pub instances: Vec<InstanceId>,

    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Fixture {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// =============================================================================
// Environments
// =============================================================================

#[derive(Debug, Default)]
struct EnvironmentState {
    revisions: BTreeMap<EnvironmentId, BTreeMap<RevisionId, EnvironmentRecord>>,
    targets: BTreeMap<EnvironmentId, RevisionId>,
}

/// Environment store backed by a map.
///
/// The latest record put for an environment becomes its target revision.
#[derive(Debug, Default)]
pub struct InMemoryEnvironments {
    state: RwLock<EnvironmentState>,
}

impl InMemoryEnvironments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = EnvironmentRecord>) -> Self {
        let mut state = EnvironmentState::default();
        for record in records {
            state.insert(record);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn from_fixture(fixture: &Fixture) -> Self {
        Self::from_records(fixture.environments.iter().cloned())
    }

    /// Store a revision and make it the environment's target.
    pub async fn put(&self, record: EnvironmentRecord) {
        self.state.write().await.insert(record);
    }

    /// Forget an environment entirely.
    pub async fn remove(&self, environment_id: &EnvironmentId) {
        let mut state = self.state.write().await;
        state.revisions.remove(environment_id);
        state.targets.remove(environment_id);
    }
}

impl EnvironmentState {
    fn insert(&mut self, record: EnvironmentRecord) {
        self.targets
            .insert(record.environment_id.clone(), record.revision_id.clone());
        self.revisions
            .entry(record.environment_id.clone())
            .or_default()
            .insert(record.revision_id.clone(), record);
    }

    fn target(&self, environment_id: &EnvironmentId) -> Option<&EnvironmentRecord> {
        let revision = self.targets.get(environment_id)?;
        self.revisions.get(environment_id)?.get(revision)
    }
}

#[async_trait]
impl EnvironmentService for InMemoryEnvironments {
    async fn list_clusters_with_environments(&self) -> Result<Vec<ClusterId>, EnvironmentError> {
        let state = self.state.read().await;
        let clusters: BTreeSet<ClusterId> = state
            .targets
            .keys()
            .filter_map(|id| state.target(id))
            .map(|r| r.cluster_id.clone())
            .collect();
        Ok(clusters.into_iter().collect())
    }

    async fn list_environments(
        &self,
        cluster_id: &ClusterId,
    ) -> Result<Vec<EnvironmentId>, EnvironmentError> {
        let state = self.state.read().await;
        Ok(state
            .targets
            .keys()
            .filter(|id| state.target(id).is_some_and(|r| &r.cluster_id == cluster_id))
            .cloned()
            .collect())
    }

    async fn describe_target_revision(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<TargetRevision, EnvironmentError> {
        let state = self.state.read().await;
        let revision_id = state
            .targets
            .get(environment_id)
            .ok_or_else(|| EnvironmentError::NotFound(format!("environment {environment_id}")))?;

        Ok(TargetRevision {
            environment_id: environment_id.clone(),
            revision_id: revision_id.clone(),
        })
    }

    async fn describe_environment(
        &self,
        environment_id: &EnvironmentId,
        revision_id: &RevisionId,
    ) -> Result<EnvironmentRecord, EnvironmentError> {
        let state = self.state.read().await;
        let revisions = state
            .revisions
            .get(environment_id)
            .ok_or_else(|| EnvironmentError::NotFound(format!("environment {environment_id}")))?;

        revisions.get(revision_id).cloned().ok_or_else(|| {
            EnvironmentError::InvalidParameter(format!(
                "environment {environment_id} has no revision {revision_id}"
            ))
        })
    }
}

// =============================================================================
// Cluster
// =============================================================================

/// A call observed by [`InMemoryCluster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    DescribeTasks(Vec<TaskId>),
    DescribeInstances(Vec<InstanceId>),
    Start(StartTask),
    Stop(StopTask),
}

#[derive(Debug, Default)]
struct ClusterRecord {
    instances: BTreeMap<InstanceId, ContainerInstance>,
    tasks: BTreeMap<TaskId, Task>,
}

#[derive(Debug, Default)]
struct ClusterState {
    clusters: BTreeMap<ClusterId, ClusterRecord>,
    rejected: BTreeSet<InstanceId>,
    failing: BTreeSet<ClusterId>,
}

impl ClusterState {
    fn cluster(&self, cluster_id: &ClusterId) -> Result<&ClusterRecord, ClusterApiError> {
        self.clusters
            .get(cluster_id)
            .ok_or_else(|| ClusterApiError::ClusterNotFound(cluster_id.clone()))
    }

    fn listable(&self, cluster_id: &ClusterId) -> Result<&ClusterRecord, ClusterApiError> {
        if self.failing.contains(cluster_id) {
            return Err(ClusterApiError::Service(format!(
                "listing unavailable for cluster {cluster_id}"
            )));
        }
        self.cluster(cluster_id)
    }
}

/// Cluster API backed by a map.
///
/// Listings are paginated with offset tokens. Started tasks appear as
/// [`STARTED_STATUS`] and stopped tasks stay listed as [`STOPPED_STATUS`].
#[derive(Debug)]
pub struct InMemoryCluster {
    page_size: usize,
    state: RwLock<ClusterState>,
    calls: RwLock<Vec<ClusterCall>>,
    task_counter: AtomicU64,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE_SIZE)
    }
}

impl InMemoryCluster {
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            state: RwLock::new(ClusterState::default()),
            calls: RwLock::new(Vec::new()),
            task_counter: AtomicU64::new(0),
        }
    }

    pub fn from_fixture(fixture: &Fixture) -> Self {
        fixture.clusters.iter().fold(
            Self::new(fixture.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE)),
            |cluster, c| cluster.with_cluster(c.cluster_id.clone(), c.instances.clone(), c.tasks.clone()),
        )
    }

    /// Add a cluster with its instances and tasks.
    pub fn with_cluster(
        mut self,
        cluster_id: ClusterId,
        instances: impl IntoIterator<Item = InstanceId>,
        tasks: impl IntoIterator<Item = Task>,
    ) -> Self {
        let record = self.state.get_mut().clusters.entry(cluster_id).or_default();
        record.instances.extend(
            instances
                .into_iter()
                .map(|id| (id.clone(), ContainerInstance::new(id))),
        );
        record
            .tasks
            .extend(tasks.into_iter().map(|t| (t.task_id.clone(), t)));
        self
    }

    /// Reject every start placed on `instance_id`.
    pub fn rejecting(mut self, instance_id: InstanceId) -> Self {
        self.state.get_mut().rejected.insert(instance_id);
        self
    }

    /// Fail every listing call against `cluster_id`.
    pub fn failing(mut self, cluster_id: ClusterId) -> Self {
        self.state.get_mut().failing.insert(cluster_id);
        self
    }

    /// Register an instance on an existing or new cluster.
    pub async fn add_instance(&self, cluster_id: &ClusterId, instance_id: InstanceId) {
        let mut state = self.state.write().await;
        state
            .clusters
            .entry(cluster_id.clone())
            .or_default()
            .instances
            .insert(instance_id.clone(), ContainerInstance::new(instance_id));
    }

    /// Current tasks of a cluster, stopped ones included.
    pub async fn tasks(&self, cluster_id: &ClusterId) -> Vec<Task> {
        let state = self.state.read().await;
        state
            .clusters
            .get(cluster_id)
            .map(|c| c.tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every call observed so far, in order.
    pub async fn calls(&self) -> Vec<ClusterCall> {
        self.calls.read().await.clone()
    }

    /// Start and stop calls observed so far.
    pub async fn actions(&self) -> Vec<ClusterCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, ClusterCall::Start(_) | ClusterCall::Stop(_)))
            .cloned()
            .collect()
    }

    async fn record(&self, call: ClusterCall) {
        self.calls.write().await.push(call);
    }

    fn page<T: Clone>(&self, ids: Vec<T>, token: Option<String>) -> Result<Page<T>, ClusterApiError> {
        let start = match token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ClusterApiError::InvalidRequest(format!("bad next token '{token}'")))?,
        };
        let end = start.saturating_add(self.page_size).min(ids.len());
        let items = ids.get(start..end).map(<[T]>::to_vec).unwrap_or_default();

        Ok(if end < ids.len() {
            Page::with_next(items, end.to_string())
        } else {
            Page::last(items)
        })
    }

    fn next_task_id(&self) -> Result<TaskId, ClusterApiError> {
        let n = self.task_counter.fetch_add(1, Ordering::SeqCst);
        TaskId::parse(format!("task-{n:06}")).map_err(|e| ClusterApiError::Service(e.to_string()))
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn list_tasks(
        &self,
        cluster_id: &ClusterId,
        next_token: Option<String>,
    ) -> Result<Page<TaskId>, ClusterApiError> {
        let ids: Vec<TaskId> = {
            let state = self.state.read().await;
            state.listable(cluster_id)?.tasks.keys().cloned().collect()
        };
        self.page(ids, next_token)
    }

    async fn describe_tasks(
        &self,
        cluster_id: &ClusterId,
        task_ids: Vec<TaskId>,
    ) -> Result<Vec<Task>, ClusterApiError> {
        let tasks: Vec<Task> = {
            let state = self.state.read().await;
            let cluster = state.cluster(cluster_id)?;
            task_ids
                .iter()
                .filter_map(|id| cluster.tasks.get(id).cloned())
                .collect()
        };
        self.record(ClusterCall::DescribeTasks(task_ids)).await;
        Ok(tasks)
    }

    async fn list_container_instances(
        &self,
        cluster_id: &ClusterId,
        next_token: Option<String>,
    ) -> Result<Page<InstanceId>, ClusterApiError> {
        let ids: Vec<InstanceId> = {
            let state = self.state.read().await;
            state.listable(cluster_id)?.instances.keys().cloned().collect()
        };
        self.page(ids, next_token)
    }

    async fn describe_container_instances(
        &self,
        cluster_id: &ClusterId,
        instance_ids: Vec<InstanceId>,
    ) -> Result<Vec<ContainerInstance>, ClusterApiError> {
        let instances: Vec<ContainerInstance> = {
            let state = self.state.read().await;
            let cluster = state.cluster(cluster_id)?;
            instance_ids
                .iter()
                .filter_map(|id| cluster.instances.get(id).cloned())
                .collect()
        };
        self.record(ClusterCall::DescribeInstances(instance_ids)).await;
        Ok(instances)
    }

    async fn start_task(
        &self,
        cluster_id: &ClusterId,
        instance_id: &InstanceId,
        task_definition_id: &TaskDefinitionId,
        group: &str,
    ) -> Result<StartTaskOutput, ClusterApiError> {
        self.record(ClusterCall::Start(StartTask {
            cluster_id: cluster_id.clone(),
            container_instance_id: instance_id.clone(),
            task_definition_id: task_definition_id.clone(),
            group: group.to_string(),
        }))
        .await;

        let mut state = self.state.write().await;
        if state.rejected.contains(instance_id) {
            debug!(instance_id = %instance_id, "[MOCK] Rejecting start");
            return Ok(StartTaskOutput {
                tasks: Vec::new(),
                failures: vec![format!("RESOURCE:MEMORY on {instance_id}")],
            });
        }

        let task_id = self.next_task_id()?;
        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| ClusterApiError::ClusterNotFound(cluster_id.clone()))?;
        if !cluster.instances.contains_key(instance_id) {
            return Ok(StartTaskOutput {
                tasks: Vec::new(),
                failures: vec![format!("MISSING {instance_id}")],
            });
        }

        info!(
            cluster_id = %cluster_id,
            instance_id = %instance_id,
            task_id = %task_id,
            task_definition_id = %task_definition_id,
            "[MOCK] Starting task"
        );
        cluster.tasks.insert(
            task_id.clone(),
            Task {
                task_id: task_id.clone(),
                container_instance_id: instance_id.clone(),
                task_definition_id: task_definition_id.clone(),
                status: STARTED_STATUS.to_string(),
                group: group.to_string(),
                started_by: Some(STARTED_BY.to_string()),
            },
        );

        Ok(StartTaskOutput {
            tasks: vec![task_id],
            failures: Vec::new(),
        })
    }

    async fn stop_task(
        &self,
        cluster_id: &ClusterId,
        task_id: &TaskId,
        reason: &str,
    ) -> Result<StopTaskOutput, ClusterApiError> {
        self.record(ClusterCall::Stop(StopTask {
            cluster_id: cluster_id.clone(),
            task_id: task_id.clone(),
            reason: reason.to_string(),
        }))
        .await;

        let mut state = self.state.write().await;
        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| ClusterApiError::ClusterNotFound(cluster_id.clone()))?;

        let Some(task) = cluster.tasks.get_mut(task_id) else {
            return Ok(StopTaskOutput { task: None });
        };
        info!(cluster_id = %cluster_id, task_id = %task_id, reason, "[MOCK] Stopping task");
        task.status = STOPPED_STATUS.to_string();

        Ok(StopTaskOutput {
            task: Some(task_id.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_id() -> ClusterId {
        ClusterId::parse("cluster1").unwrap()
    }

    fn instance(id: &str) -> InstanceId {
        InstanceId::parse(id).unwrap()
    }

    fn record(env: &str, revision: &str, cluster: &str) -> EnvironmentRecord {
        EnvironmentRecord {
            environment_id: EnvironmentId::parse(env).unwrap(),
            revision_id: RevisionId::parse(revision).unwrap(),
            cluster_id: ClusterId::parse(cluster).unwrap(),
            environment_type: "Daemon".to_string(),
            deployment_method: "ReplaceAfterTerminate".to_string(),
            task_definition_id: TaskDefinitionId::parse("taskdefA").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_environments_follow_latest_revision() {
        let store = InMemoryEnvironments::from_records([
            record("env1", "1", "cluster1"),
            record("env2", "1", "cluster2"),
        ]);
        store.put(record("env1", "2", "cluster2")).await;

        let env1 = EnvironmentId::parse("env1").unwrap();
        let target = store.describe_target_revision(&env1).await.unwrap();
        assert_eq!(target.revision_id.as_str(), "2");

        let clusters = store.list_clusters_with_environments().await.unwrap();
        assert_eq!(clusters, vec![ClusterId::parse("cluster2").unwrap()]);
        assert!(store.list_environments(&cluster_id()).await.unwrap().is_empty());

        // Older revisions stay describable.
        let old = store
            .describe_environment(&env1, &RevisionId::parse("1").unwrap())
            .await
            .unwrap();
        assert_eq!(old.cluster_id, cluster_id());
    }

    #[tokio::test]
    async fn test_environments_errors() {
        let store = InMemoryEnvironments::from_records([record("env1", "1", "cluster1")]);
        let env1 = EnvironmentId::parse("env1").unwrap();
        let missing = EnvironmentId::parse("nope").unwrap();

        assert!(matches!(
            store.describe_target_revision(&missing).await,
            Err(EnvironmentError::NotFound(_))
        ));
        assert!(matches!(
            store
                .describe_environment(&env1, &RevisionId::parse("9").unwrap())
                .await,
            Err(EnvironmentError::InvalidParameter(_))
        ));

        store.remove(&env1).await;
        assert!(store.list_clusters_with_environments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cluster_paginates_with_offset_tokens() {
        let api = InMemoryCluster::new(2).with_cluster(
            cluster_id(),
            ["i-1", "i-2", "i-3", "i-4", "i-5"].map(instance),
            [],
        );

        let first = api.list_container_instances(&cluster_id(), None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let last = api
            .list_container_instances(&cluster_id(), Some("4".to_string()))
            .await
            .unwrap();
        assert_eq!(last.items, vec![instance("i-5")]);
        assert_eq!(last.next_token, None);

        let err = api
            .list_container_instances(&cluster_id(), Some("x".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterApiError::InvalidRequest(_)));

        let past_end = api
            .list_container_instances(&cluster_id(), Some(usize::MAX.to_string()))
            .await
            .unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.next_token, None);
    }

    #[tokio::test]
    async fn test_cluster_start_and_stop() {
        let api = InMemoryCluster::default()
            .with_cluster(cluster_id(), [instance("i-1"), instance("i-2")], [])
            .rejecting(instance("i-2"));
        let taskdef = TaskDefinitionId::parse("taskdefA").unwrap();

        let started = api
            .start_task(&cluster_id(), &instance("i-1"), &taskdef, "env1")
            .await
            .unwrap();
        assert!(started.succeeded());

        let rejected = api
            .start_task(&cluster_id(), &instance("i-2"), &taskdef, "env1")
            .await
            .unwrap();
        assert!(!rejected.succeeded());

        let tasks = api.tasks(&cluster_id()).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, STARTED_STATUS);
        assert_eq!(tasks[0].started_by.as_deref(), Some(STARTED_BY));

        let stopped = api
            .stop_task(&cluster_id(), &tasks[0].task_id, "done")
            .await
            .unwrap();
        assert!(stopped.succeeded());
        assert_eq!(api.tasks(&cluster_id()).await[0].status, STOPPED_STATUS);

        let unknown = api
            .stop_task(&cluster_id(), &TaskId::parse("ghost").unwrap(), "done")
            .await
            .unwrap();
        assert!(!unknown.succeeded());
        assert_eq!(api.actions().await.len(), 4);
    }

    #[tokio::test]
    async fn test_cluster_failing_listing() {
        let api = InMemoryCluster::default()
            .with_cluster(cluster_id(), [instance("i-1")], [])
            .failing(cluster_id());

        assert!(matches!(
            api.list_tasks(&cluster_id(), None).await,
            Err(ClusterApiError::Service(_))
        ));
        assert!(matches!(
            api.list_tasks(&ClusterId::parse("other").unwrap(), None).await,
            Err(ClusterApiError::ClusterNotFound(_))
        ));
    }

    #[test]
    fn test_fixture_from_json() {
        let fixture = Fixture::from_json(
            r#"{
                "page_size": 2,
                "environments": [{
                    "environment_id": "env1",
                    "revision_id": "1",
                    "cluster_id": "cluster1",
                    "environment_type": "Daemon",
                    "deployment_method": "ReplaceAfterTerminate",
                    "task_definition_id": "taskdefA"
                }],
                "clusters": [{
                    "cluster_id": "cluster1",
                    "instances": ["i-1"],
                    "tasks": [{
                        "task_id": "t1",
                        "container_instance_id": "i-1",
                        "task_definition_id": "taskdefA",
                        "status": "RUNNING",
                        "group": "env1"
                    }]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(fixture.page_size, Some(2));
        assert_eq!(fixture.environments.len(), 1);
        assert_eq!(fixture.clusters[0].tasks[0].started_by, None);

        let api = InMemoryCluster::from_fixture(&fixture);
        assert_eq!(api.page_size, 2);
    }

    #[tokio::test]
    async fn test_sample_fixture_loads() {
        let fixture = Fixture::from_json(include_str!("../../fixtures/local.json")).unwrap();
        let environments = InMemoryEnvironments::from_fixture(&fixture);
        let api = InMemoryCluster::from_fixture(&fixture);

        assert_eq!(
            environments.list_clusters_with_environments().await.unwrap(),
            vec![cluster_id()]
        );
        assert_eq!(api.tasks(&cluster_id()).await.len(), 1);
    }
}
