//! convoy scheduling library.
//!
//! This crate ships the `scheduling-manager` binary, and exposes the three
//! reconciliation stages as a library so they can be driven by other
//! invokers and exercised in integration tests.
//!
//! ```text
//! Reconciler ──trigger──▶ Manager (per cluster) ──call──▶ Scheduler (per environment)
//!                              │                                │
//!                        StateCollector                   SchedulingAction
//!                              │                                │
//!                              └──────────── ClusterApi ◀───────┘
//! ```

pub mod clients;
pub mod config;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod invoke;
pub mod pipeline;
pub mod stages;
pub mod state;
pub mod worker;

pub use error::{SchedulingError, SchedulingResult};
