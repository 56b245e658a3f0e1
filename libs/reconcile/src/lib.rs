//! Reconciliation loop primitives.
//!
//! This library provides helpers for implementing reconciliation loops
//! that converge observed cluster state to declared desired state. Key
//! concepts:
//!
//! - **Observation**: draining paginated list APIs into a complete view.
//! - **Remediation**: independent, idempotent actions issued concurrently.
//! - **Convergence**: classifying a pass by what its actions achieved.
//!
//! # Invariants
//!
//! - Page sequences are lazy and single-pass; a page is only fetched when
//!   the consumer asks for it
//! - The first failed fetch ends a page sequence
//! - Tallies never drop an outcome

use std::future::Future;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};

/// One page of a paginated list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page. May be empty even when more pages follow.
    pub items: Vec<T>,

    /// Continuation token for the next page, if any.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// A page followed by the page at `token`.
    pub fn with_next(items: Vec<T>, token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(token.into()),
        }
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Drain a paginated list call as a lazy stream of item batches.
///
/// `fetch` receives `None` on the first call and the previous page's
/// continuation token afterwards. The stream ends after a page without a
/// token (an empty token counts as none) or after the first error, which is
/// yielded as the final item.
pub fn paginate<T, E, F, Fut>(fetch: F) -> impl Stream<Item = Result<Vec<T>, E>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    stream::try_unfold((fetch, Cursor::Start), |(mut fetch, cursor)| async move {
        let token = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let page = fetch(token).await?;
        let next = match page.next_token.filter(|t| !t.is_empty()) {
            Some(token) => Cursor::Next(token),
            None => Cursor::Done,
        };

        Ok(Some((page.items, (fetch, next))))
    })
}

/// Split a batch into chunks no larger than `max`.
///
/// A `max` of zero is treated as one.
pub fn chunked<T: Clone>(items: &[T], max: usize) -> Vec<Vec<T>> {
    items.chunks(max.max(1)).map(<[T]>::to_vec).collect()
}

/// Convergence status for one reconciliation pass over a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// Nothing needed doing (observed matches desired).
    Converged,

    /// Every remedial action was accepted.
    Converging,

    /// At least one remedial action failed and will be retried next pass.
    Diverged,
}

impl ConvergenceStatus {
    /// Returns true if the resource has converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Returns true if the resource is still converging.
    pub fn is_converging(&self) -> bool {
        matches!(self, Self::Converging)
    }
}

/// Success and failure counts for a set of remedial actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTally {
    pub succeeded: u64,
    pub failed: u64,
}

impl ActionTally {
    /// Record one outcome.
    pub fn record(&mut self, succeeded: bool) {
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Total number of outcomes recorded.
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Classify the pass that produced this tally.
    pub fn status(&self) -> ConvergenceStatus {
        if self.total() == 0 {
            ConvergenceStatus::Converged
        } else if self.failed == 0 {
            ConvergenceStatus::Converging
        } else {
            ConvergenceStatus::Diverged
        }
    }
}

impl FromIterator<bool> for ActionTally {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut tally = Self::default();
        for outcome in iter {
            tally.record(outcome);
        }
        tally
    }
}

impl std::ops::AddAssign for ActionTally {
    fn add_assign(&mut self, rhs: Self) {
        self.succeeded += rhs.succeeded;
        self.failed += rhs.failed;
    }
}

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Default limit for a single collaborator call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit for one awaited stage invocation, covering every call the
/// stage makes.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of describe batches in flight per resource type.
pub const DEFAULT_DESCRIBE_CONCURRENCY: usize = 8;

/// Largest id batch the cluster API accepts in one describe call.
pub const MAX_DESCRIBE_BATCH: usize = 100;
