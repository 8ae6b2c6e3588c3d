//! Per-request deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use wattcast_core::{DomainError, DomainResult};

/// Time budget for one request, measured on the tokio clock.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    fn timeout(&self) -> DomainError {
        DomainError::Timeout(self.budget.as_millis() as u64)
    }

    /// Fail with `Timeout` if the budget is spent.
    pub fn check(&self) -> DomainResult<()> {
        if self.is_expired() {
            return Err(self.timeout());
        }
        Ok(())
    }

    /// Drive `fut` within the remaining budget.
    ///
    /// The future is dropped when the budget runs out. A result that
    /// completes after the deadline is discarded in favor of `Timeout`.
    pub async fn run<T, F>(&self, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        match tokio::time::timeout(self.remaining(), fut).await {
            Ok(result) => {
                self.check()?;
                result
            }
            Err(_) => Err(self.timeout()),
        }
    }
}
