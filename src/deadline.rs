use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, timeout_at};

// Budgets beyond this are treated as "no practical limit".
const MAX_BUDGET: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("deadline exceeded")]
pub struct Elapsed;

/// Deadline
///
/// A call-scoped time budget. Use cases create one per operation and pass it
/// down to every repository call; whoever awaits storage work bounds it with
/// [`Deadline::run`], which drops the in-flight future once the instant passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `budget` from now, saturating at one year.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget.min(MAX_BUDGET),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Drives `fut` to completion unless the deadline fires first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Elapsed>
    where
        F: IntoFuture,
    {
        timeout_at(self.at, fut.into_future())
            .await
            .map_err(|_| Elapsed)
    }
}
