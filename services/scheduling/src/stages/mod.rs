//! The three reconciliation stages.
//!
//! - [`Reconciler`]: fans out one Manager trigger per cluster
//! - [`ManagerHandler`]: snapshots one cluster and calls the Scheduler
//!   stage once per environment
//! - [`SchedulerHandler`]: converges one environment

mod manager;
mod reconciler;
mod scheduler;

pub use manager::{EnvironmentOutcome, EnvironmentResult, ManagerHandler, ManagerInput, ManagerOutput};
pub use reconciler::{ReconcileOutput, Reconciler};
pub use scheduler::{SchedulerHandler, SchedulerInput, SchedulerOutput};
