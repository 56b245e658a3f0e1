//! In-process wiring of the three stages.

use std::sync::Arc;

use crate::clients::{ClusterApi, EnvironmentService};
use crate::config::Config;
use crate::engine::{SchedulerFactory, StrategyResolver};
use crate::invoke::LocalStage;
use crate::stages::{ManagerHandler, Reconciler, SchedulerHandler};
use crate::state::StateCollector;

/// Reconciler, Manager and Scheduler running in one process.
pub struct LocalPipeline {
    pub reconciler: Arc<Reconciler>,
    pub manager: Arc<LocalStage<ManagerHandler>>,
    pub scheduler: Arc<LocalStage<SchedulerHandler>>,
}

impl LocalPipeline {
    /// Wire the stages with the production strategy factory.
    pub fn new(environments: Arc<dyn EnvironmentService>, api: Arc<dyn ClusterApi>, config: &Config) -> Self {
        Self::with_resolver(environments, api, Arc::new(SchedulerFactory), config)
    }

    pub fn with_resolver(
        environments: Arc<dyn EnvironmentService>,
        api: Arc<dyn ClusterApi>,
        resolver: Arc<dyn StrategyResolver>,
        config: &Config,
    ) -> Self {
        let scheduler = Arc::new(LocalStage::new(
            "scheduler",
            SchedulerHandler::new(environments.clone(), api.clone(), resolver, config.call_timeout),
            config.stage_timeout,
        ));

        let manager = Arc::new(LocalStage::new(
            "manager",
            ManagerHandler::new(
                environments.clone(),
                StateCollector::new(api, config.call_timeout, config.describe_concurrency),
                scheduler.clone(),
                config.call_timeout,
            ),
            config.stage_timeout,
        ));

        let reconciler = Arc::new(Reconciler::new(environments, manager.clone(), config.call_timeout));

        Self {
            reconciler,
            manager,
            scheduler,
        }
    }

    /// Wait for every triggered Manager invocation to finish.
    pub async fn wait_idle(&self) {
        self.manager.wait_idle().await;
    }
}
