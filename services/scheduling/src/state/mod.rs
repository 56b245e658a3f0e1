//! Observed cluster state.
//!
//! A [`ClusterSnapshot`] is built once per manager invocation by the
//! [`StateCollector`], shared read-only by every scheduler invocation in
//! that cycle, and then dropped. Snapshots are never persisted.

mod collector;
mod snapshot;

pub use collector::StateCollector;
pub use snapshot::{ClusterSnapshot, ContainerInstance, Resource, Task};
