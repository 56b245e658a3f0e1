//! Builds cluster snapshots by draining the cluster API.
//!
//! Tasks and container instances are collected independently and
//! concurrently. For each, list pages are drained lazily and every
//! non-empty page is described as soon as it arrives, with up to
//! `describe_concurrency` describe calls in flight.

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use convoy_id::ClusterId;
use convoy_reconcile::{chunked, paginate, Page, MAX_DESCRIBE_BATCH};
use futures_util::{stream, TryStreamExt};
use tracing::{debug, instrument};

use super::{ClusterSnapshot, Resource};
use crate::clients::{bounded, ClusterApi, ClusterApiError};
use crate::error::{SchedulingError, SchedulingResult};

/// Snapshot builder over a shared cluster API client.
#[derive(Clone)]
pub struct StateCollector {
    api: Arc<dyn ClusterApi>,
    call_timeout: Duration,
    describe_concurrency: usize,
}

impl StateCollector {
    /// Create a collector.
    pub fn new(api: Arc<dyn ClusterApi>, call_timeout: Duration, describe_concurrency: usize) -> Self {
        Self {
            api,
            call_timeout,
            describe_concurrency: describe_concurrency.max(1),
        }
    }

    /// Drain tasks and container instances into one snapshot.
    ///
    /// Any failed page fetch or describe call fails the whole snapshot.
    #[instrument(skip_all, fields(cluster_id = %cluster_id))]
    pub async fn snapshot(&self, cluster_id: &ClusterId) -> SchedulingResult<ClusterSnapshot> {
        let api = self.api.as_ref();
        let limit = self.call_timeout;

        let tasks = async {
            drain_and_describe(
                move |token| bounded("list_tasks", limit, api.list_tasks(cluster_id, token)),
                move |ids| bounded("describe_tasks", limit, api.describe_tasks(cluster_id, ids)),
                self.describe_concurrency,
            )
            .await
            .map_err(|source| collection_error(cluster_id, Resource::Tasks, source))
        };

        let instances = async {
            drain_and_describe(
                move |token| {
                    bounded(
                        "list_container_instances",
                        limit,
                        api.list_container_instances(cluster_id, token),
                    )
                },
                move |ids| {
                    bounded(
                        "describe_container_instances",
                        limit,
                        api.describe_container_instances(cluster_id, ids),
                    )
                },
                self.describe_concurrency,
            )
            .await
            .map_err(|source| collection_error(cluster_id, Resource::ContainerInstances, source))
        };

        let (tasks, instances) = tokio::try_join!(tasks, instances)?;

        debug!(
            tasks = tasks.len(),
            instances = instances.len(),
            "Collected cluster snapshot"
        );

        Ok(ClusterSnapshot::new(cluster_id.clone(), tasks, instances))
    }
}

fn collection_error(
    cluster_id: &ClusterId,
    resource: Resource,
    source: ClusterApiError,
) -> SchedulingError {
    SchedulingError::Collection {
        cluster_id: cluster_id.clone(),
        resource,
        source,
    }
}

/// Drain a paginated listing, describing each non-empty page.
///
/// Pages larger than the API's describe limit are split first. Results keep
/// listing order.
async fn drain_and_describe<Id, T, L, LFut, D, DFut>(
    list: L,
    describe: D,
    concurrency: usize,
) -> Result<Vec<T>, ClusterApiError>
where
    Id: Clone,
    L: FnMut(Option<String>) -> LFut,
    LFut: Future<Output = Result<Page<Id>, ClusterApiError>>,
    D: FnMut(Vec<Id>) -> DFut,
    DFut: Future<Output = Result<Vec<T>, ClusterApiError>>,
{
    let described: Vec<Vec<T>> = paginate(list)
        .try_filter(|ids| future::ready(!ids.is_empty()))
        .map_ok(|ids| {
            let batches = chunked(&ids, MAX_DESCRIBE_BATCH);
            stream::iter(batches.into_iter().map(Ok::<_, ClusterApiError>))
        })
        .try_flatten()
        .map_ok(describe)
        .try_buffered(concurrency)
        .try_collect()
        .await?;

    Ok(described.into_iter().flatten().collect())
}
