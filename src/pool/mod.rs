//! Bounded worker pool.
//!
//! `WorkerPool::run` pulls items from a stream and runs an async handler for
//! each one as a spawned Tokio task, with at most `concurrency` handlers in
//! flight. The next item is only pulled once a slot is free, so a fast
//! producer is held back by the stream rather than buffered here.
//!
//! Every dispatched item yields exactly one `TaskOutcome`: `Completed` with
//! the handler's output, or `Failed` if the handler panicked. On cancellation
//! no new item is pulled; handlers already running finish and their outcomes
//! are still delivered.

use std::future::Future;

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use log::{debug, warn};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Outcome of one dispatched item.
#[derive(Debug)]
pub enum TaskOutcome<I, T> {
    /// The handler returned
    Completed {
        /// Item that was handled
        item: I,
        /// Handler result
        output: T,
    },
    /// The handler panicked or was aborted
    Failed {
        /// Item that was handled
        item: I,
        /// Panic message or abort reason
        error: String,
    },
}

/// Summary of a pool run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolReport {
    /// Items handed to a handler
    pub dispatched: usize,
    /// Handlers that returned
    pub completed: usize,
    /// Handlers that panicked or were aborted
    pub failed: usize,
    /// Highest number of handlers in flight at once
    pub peak_in_flight: usize,
    /// Dispatch stopped because the token was cancelled
    pub cancelled: bool,
}

/// Clamps an operator-supplied worker count.
///
/// Values `<= 0` mean "use the default"; anything above `max` is capped.
pub fn clamp_concurrency(requested: i64, default: usize, max: usize) -> usize {
    let max = max.max(1);
    if requested <= 0 {
        return default.clamp(1, max);
    }
    let requested = usize::try_from(requested).unwrap_or(max);
    if requested > max {
        warn!(
            "Requested concurrency {} exceeds the maximum of {}; using {}",
            requested, max, max
        );
    }
    requested.min(max)
}

/// Bounded-parallelism executor.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Creates a pool running at most `concurrency` handlers (minimum 1).
    pub fn new(concurrency: usize, cancel: CancellationToken) -> Self {
        WorkerPool {
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Maximum handlers in flight.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Token that stops dispatch.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs `handler` over every item of `items`.
    ///
    /// # Arguments
    ///
    /// * `items` - Work items, pulled lazily
    /// * `handler` - Async handler spawned once per item
    /// * `on_outcome` - Called in completion order with each outcome
    ///
    /// # Returns
    ///
    /// A `PoolReport` once the stream is exhausted (or the pool was cancelled)
    /// and every dispatched handler has finished.
    pub async fn run<I, T, S, F, Fut, O>(&self, items: S, handler: F, mut on_outcome: O) -> PoolReport
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        S: Stream<Item = I>,
        F: Fn(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        O: FnMut(TaskOutcome<I, T>),
    {
        let mut items = std::pin::pin!(items);
        let mut in_flight = FuturesUnordered::new();
        let mut report = PoolReport::default();
        let mut exhausted = false;

        loop {
            let dispatching = !exhausted && !report.cancelled;
            if !dispatching && in_flight.is_empty() {
                break;
            }
            let has_slot = in_flight.len() < self.concurrency;

            tokio::select! {
                biased;

                _ = self.cancel.cancelled(), if !report.cancelled => {
                    debug!("Worker pool cancelled with {} handlers in flight", in_flight.len());
                    report.cancelled = true;
                }

                Some((item, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    on_outcome(settle(item, result, &mut report));
                }

                next = items.next(), if dispatching && has_slot => {
                    match next {
                        Some(item) => {
                            let handle = tokio::spawn(handler(item.clone()));
                            in_flight.push(async move { (item, handle.await) });
                            report.dispatched += 1;
                            report.peak_in_flight = report.peak_in_flight.max(in_flight.len());
                        }
                        None => exhausted = true,
                    }
                }

                else => break,
            }
        }

        report
    }
}

fn settle<I, T>(item: I, result: Result<T, JoinError>, report: &mut PoolReport) -> TaskOutcome<I, T> {
    match result {
        Ok(output) => {
            report.completed += 1;
            TaskOutcome::Completed { item, output }
        }
        Err(join_error) => {
            report.failed += 1;
            let error = if join_error.is_panic() {
                let panic = join_error.into_panic();
                panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string())
            } else {
                "handler cancelled".to_string()
            };
            warn!("Worker task failed: {}", error);
            TaskOutcome::Failed { item, error }
        }
    }
}
