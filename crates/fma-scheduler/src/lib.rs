//! Bounded task scheduler
//!
//! Runs a set of independent async work units with at most K in flight,
//! delivering results in completion order over a channel. Failures are
//! contained at the unit boundary: a unit that returns an error, or
//! panics, becomes a [`UnitError`] value in the stream and never aborts
//! sibling units or the scheduler itself.
//!
//! Both pipeline stages (node analysis, batch classification) are
//! instances of this one primitive with different limits and work
//! closures. Cancellation is out of scope: once submitted, every unit
//! runs to completion or to its own caught failure.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Failure of a single work unit, contained at the unit boundary
#[derive(Debug, Clone, thiserror::Error)]
pub enum UnitError {
    /// The unit's future resolved to an error
    #[error("{0}")]
    Failed(String),

    /// The unit panicked; the panic was caught at the join boundary
    #[error("work unit panicked: {0}")]
    Panicked(String),
}

/// Tagged per-unit outcome delivered to the consumer
pub type UnitResult<T> = Result<T, UnitError>;

/// Scheduler running work units with a fixed concurrency limit
#[derive(Debug, Clone, Copy)]
pub struct BoundedScheduler {
    limit: usize,
}

impl BoundedScheduler {
    /// Create a scheduler with the given concurrency limit.
    ///
    /// A limit of zero is clamped to one so the scheduler always makes
    /// progress.
    #[inline]
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Concurrency limit in effect
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Submit all `items` and return a receiver of completion-order results.
    ///
    /// The worker closure is invoked once per item, but only after a
    /// semaphore permit is held, so at most `limit` unit futures exist
    /// concurrently. Exactly one [`UnitResult`] is delivered per item;
    /// the channel closes after the last one.
    pub fn run<I, T, E, F, Fut>(&self, items: Vec<I>, worker: F) -> mpsc::Receiver<UnitResult<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let capacity = items.len().max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let worker = Arc::new(worker);

        for item in items {
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let worker = Arc::clone(&worker);

            tokio::spawn(async move {
                // The semaphore is never closed, so acquire cannot fail
                let permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };

                // Run the unit in its own task so a panic is caught at the
                // join boundary instead of tearing down this supervisor.
                let handle = tokio::spawn((*worker)(item));
                let outcome = match handle.await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(UnitError::Failed(e.to_string())),
                    Err(join_err) => {
                        tracing::warn!(error = %join_err, "work unit panicked");
                        Err(UnitError::Panicked(join_err.to_string()))
                    }
                };
                drop(permit);

                // Receiver dropped early means the consumer no longer wants
                // results; nothing to do with the outcome then.
                let _ = tx.send(outcome).await;
            });
        }

        rx
    }

    /// Submit all `items` and gather every result into a vector.
    ///
    /// Order is completion order, not submission order.
    pub async fn run_to_vec<I, T, E, F, Fut>(&self, items: Vec<I>, worker: F) -> Vec<UnitResult<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let expected = items.len();
        let mut rx = self.run(items, worker);
        let mut results = Vec::with_capacity(expected);
        while let Some(outcome) = rx.recv().await {
            results.push(outcome);
        }
        results
    }
}
