//! Wall-clock deadlines for units and runs.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// An optional point in time after which no more work may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self { at: None }
    }

    /// A deadline `budget` from now, or none.
    pub fn after(budget: Option<Duration>) -> Self {
        Self {
            at: budget.map(|b| Instant::now() + b),
        }
    }

    /// The earlier of two deadlines.
    pub fn min(self, other: Deadline) -> Deadline {
        let at = match (self.at, other.at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Deadline { at }
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Run `future` until it completes or the deadline passes.
    ///
    /// Returns `None` if the deadline passed first; the future is dropped.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        match self.at {
            Some(at) => tokio::time::timeout_at(at, future).await.ok(),
            None => Some(future.await),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
