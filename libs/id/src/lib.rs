//! # convoy-id
//!
//! Typed identifiers for the convoy scheduler.
//!
//! ## Two kinds of ID
//!
//! - **Names** are assigned by systems we do not own (the cluster API and the
//!   environment store). They are opaque strings, often ARNs, and we never
//!   generate them. See [`define_name!`].
//! - **Generated IDs** are minted by the scheduler itself and use the
//!   prefixed format `{prefix}_{ulid}`. See [`define_id!`].
//!
//! Both are typed so a task id can never be passed where a container
//! instance id is expected.
//!
//! Examples:
//! - `arn:aws:ecs:us-east-1:123456789012:cluster/default` (a [`ClusterId`])
//! - `cyc_01HV4Z2WQXKJNM8GPQY6VBKC3D` (a [`CycleId`])

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

pub use ulid::Ulid;
