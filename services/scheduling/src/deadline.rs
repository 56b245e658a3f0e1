//! Per-call time limits.
//!
//! Every collaborator call and stage invocation can suspend indefinitely.
//! Callers wrap them with [`deadline`] and convert the elapsed case into
//! their own error type.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// A bounded operation did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{operation} timed out after {after:?}")]
pub struct DeadlineExceeded {
    pub operation: &'static str,
    pub after: Duration,
}

/// Run `fut`, giving up after `after`.
///
/// The inner output is returned untouched, so a fallible call reads as
/// `deadline("describe_environment", limit, call).await??`.
pub async fn deadline<F: Future>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| DeadlineExceeded { operation, after })
}
