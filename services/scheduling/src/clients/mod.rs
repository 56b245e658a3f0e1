//! Collaborators consumed by the stages.
//!
//! - `EnvironmentService`: the declarative environment store
//! - `ClusterApi`: the container cluster control API
//!
//! Both are traits so stages can be wired to real clients, to the
//! in-memory implementations in [`memory`], or to test doubles.

mod cluster;
mod environment;
pub mod memory;

pub(crate) use cluster::bounded;
pub use cluster::{ClusterApi, ClusterApiError, StartTaskOutput, StopTaskOutput, STARTED_BY};
pub use environment::{EnvironmentError, EnvironmentRecord, EnvironmentService, TargetRevision};
