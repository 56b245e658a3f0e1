//! Strategy selection.

use thiserror::Error;

use super::daemon::{Daemon, ReplaceAfterTerminateScheduler};
use super::{EnvironmentDescription, EnvironmentType, Scheduler, SchedulingAction, SingleTaskScheduler};
use crate::error::SchedulingResult;
use crate::state::ClusterSnapshot;

/// No strategy is registered for an environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedStrategy {
    #[error("unsupported deployment method '{deployment_method}' for environment type {environment_type}")]
    DeploymentMethod {
        environment_type: EnvironmentType,
        deployment_method: String,
    },

    #[error("deployment method not supported for environment type '{0}'")]
    EnvironmentType(String),
}

/// Every known strategy, selected by environment type and deployment method.
#[derive(Debug, Clone)]
pub enum Strategy {
    SingleTask(SingleTaskScheduler),
    ReplaceAfterTerminate(Daemon<ReplaceAfterTerminateScheduler>),
}

impl Strategy {
    /// Select the strategy for an environment.
    ///
    /// Single-task environments ignore the deployment method. Daemon
    /// environments must name a known one.
    pub fn for_environment(environment: &EnvironmentDescription) -> Result<Self, UnsupportedStrategy> {
        match environment.environment_type {
            EnvironmentType::SingleTask => Ok(Self::SingleTask(SingleTaskScheduler)),
            EnvironmentType::Daemon => match environment.deployment_method.as_str() {
                ReplaceAfterTerminateScheduler::ID => {
                    Ok(Self::ReplaceAfterTerminate(Daemon::new(ReplaceAfterTerminateScheduler)))
                }
                other => Err(UnsupportedStrategy::DeploymentMethod {
                    environment_type: environment.environment_type,
                    deployment_method: other.to_string(),
                }),
            },
        }
    }
}

impl Scheduler for Strategy {
    fn schedule(
        &self,
        snapshot: &ClusterSnapshot,
        environment: &EnvironmentDescription,
    ) -> SchedulingResult<Vec<SchedulingAction>> {
        match self {
            Self::SingleTask(s) => s.schedule(snapshot, environment),
            Self::ReplaceAfterTerminate(s) => s.schedule(snapshot, environment),
        }
    }
}

/// Seam for swapping strategy selection in tests.
pub trait StrategyResolver: Send + Sync {
    fn resolve(&self, environment: &EnvironmentDescription) -> Result<Box<dyn Scheduler>, UnsupportedStrategy>;
}

/// The production resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerFactory;

impl SchedulerFactory {
    pub fn scheduler_for(&self, environment: &EnvironmentDescription) -> Result<Strategy, UnsupportedStrategy> {
        Strategy::for_environment(environment)
    }
}

impl StrategyResolver for SchedulerFactory {
    fn resolve(&self, environment: &EnvironmentDescription) -> Result<Box<dyn Scheduler>, UnsupportedStrategy> {
        Ok(Box::new(self.scheduler_for(environment)?))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::engine::fixtures::daemon_env;

    fn env(environment_type: EnvironmentType, method: &str) -> EnvironmentDescription {
        EnvironmentDescription {
            environment_type,
            deployment_method: method.to_string(),
            ..daemon_env("env", "taskdefA")
        }
    }

    #[rstest]
    #[case(EnvironmentType::SingleTask, "")]
    #[case(EnvironmentType::SingleTask, "ReplaceAfterTerminate")]
    #[case(EnvironmentType::SingleTask, "Whatever")]
    fn test_single_task_ignores_method(#[case] ty: EnvironmentType, #[case] method: &str) {
        let strategy = SchedulerFactory.scheduler_for(&env(ty, method)).unwrap();
        assert!(matches!(strategy, Strategy::SingleTask(_)));
    }

    #[test]
    fn test_daemon_replace_after_terminate() {
        let strategy = SchedulerFactory
            .scheduler_for(&env(EnvironmentType::Daemon, "ReplaceAfterTerminate"))
            .unwrap();
        assert!(matches!(strategy, Strategy::ReplaceAfterTerminate(_)));
    }

    #[rstest]
    #[case("")]
    #[case("BlueGreen")]
    #[case("replaceafterterminate")]
    fn test_daemon_unknown_method(#[case] method: &str) {
        let err = SchedulerFactory
            .scheduler_for(&env(EnvironmentType::Daemon, method))
            .unwrap_err();

        assert_eq!(
            err,
            UnsupportedStrategy::DeploymentMethod {
                environment_type: EnvironmentType::Daemon,
                deployment_method: method.to_string(),
            }
        );
        assert!(err.to_string().contains("Daemon"));
    }

    #[test]
    fn test_resolver_boxes_strategy() {
        let resolved = SchedulerFactory.resolve(&env(EnvironmentType::SingleTask, ""));
        assert!(resolved.is_ok());
    }
}
