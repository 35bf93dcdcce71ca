//! Batch Executor Implementation
//!
//! Bounded concurrent batch processing with:
//! - Worker-pool and semaphore-per-item strategies behind one contract
//! - Failure isolation per unit (errors and panics)
//! - A single result collector that owns all counters
//! - Caller cancellation threaded into every unit
//! - Progress tracking, metrics and structured logging

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::batch::aggregation::ResultCollector;
use crate::batch::dispatch::{ActiveUnits, UnitDispatch};
use crate::batch::types::{
    BatchConfig, BatchProgress, BatchSummary, ConcurrencyStrategy, ProgressCallback,
};
use crate::batch::work::UnitOfWork;
use crate::batch::{semaphore, worker_pool};
use crate::metrics::BatchMetrics;
use crate::Result;

/// Upper bound on buffered unit events between tasks and the collector
const EVENT_BUFFER: usize = 1024;

/// Runs batches of independent units with bounded concurrency
#[derive(Clone)]
pub struct BatchExecutor {
    config: BatchConfig,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("config", &self.config)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl BatchExecutor {
    /// Create an executor from a configuration
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            progress_callback: None,
        }
    }

    /// Set concurrency limit (number of units running at once)
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Set the scheduling strategy
    pub fn with_strategy(mut self, strategy: ConcurrencyStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set progress callback, called after every finished unit
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BatchProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Current configuration
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Execute a batch, returning once every unit has finished
    pub async fn execute<I, W>(&self, items: Vec<I>, work: W) -> Result<BatchSummary<W::Output>>
    where
        I: Send + 'static,
        W: UnitOfWork<I>,
    {
        self.execute_with_cancellation(items, work, &CancellationToken::new())
            .await
    }

    /// Execute a batch under the caller's cancellation token.
    ///
    /// Units see the token through their [`UnitContext`](crate::batch::UnitContext);
    /// units not yet started when it fires are failed without running. The
    /// call still waits for every spawned task before returning.
    #[instrument(
        skip_all,
        fields(
            units = items.len(),
            strategy = %self.config.strategy,
            concurrency_limit = self.config.concurrency_limit
        )
    )]
    pub async fn execute_with_cancellation<I, W>(
        &self,
        items: Vec<I>,
        work: W,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary<W::Output>>
    where
        I: Send + 'static,
        W: UnitOfWork<I>,
    {
        let batch_start = Instant::now();
        self.config.validate()?;

        let strategy = self.config.strategy;
        let limit = self.config.concurrency_limit;
        let total = items.len();

        if total == 0 {
            info!("No units to execute in batch");
            return Ok(BatchSummary::empty(strategy));
        }

        info!(
            total_units = total,
            effective_concurrency = limit.min(total),
            "Starting batch execution"
        );

        let metrics = BatchMetrics::new(strategy);
        let active = Arc::new(ActiveUnits::default());
        let (events_tx, mut events_rx) = mpsc::channel(total.saturating_mul(2).min(EVENT_BUFFER));
        // Cancels units that have not started yet if this future is dropped
        let batch_cancel = cancel.child_token();
        let _cancel_on_drop = batch_cancel.clone().drop_guard();
        let dispatch = UnitDispatch::new(Arc::new(work), events_tx, batch_cancel, active.clone(), metrics);

        // Dropping the set aborts every task still running
        let tasks = match strategy {
            ConcurrencyStrategy::WorkerPool => worker_pool::spawn(items, limit, dispatch).await,
            ConcurrencyStrategy::SemaphorePerItem => Ok(semaphore::spawn(items, limit, dispatch)),
        };
        let tasks = match tasks {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "Batch setup failed");
                metrics.record_batch("failed", batch_start.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        // The channel closes once every task has dropped its dispatch
        let mut collector =
            ResultCollector::new(total).with_progress_callback(self.progress_callback.clone());
        let mut collect_error = None;
        while let Some(event) = events_rx.recv().await {
            if collect_error.is_some() {
                continue;
            }
            if let Err(e) = collector.record(event) {
                error!(error = %e, "Rejected unit event");
                collect_error = Some(e);
            }
        }
        let elapsed = batch_start.elapsed();

        let task_error = join_all(tasks).await;

        let summary = match task_error.or(collect_error) {
            Some(e) => Err(e),
            None => collector.finish(elapsed, active.peak(), strategy),
        };
        let summary = match summary {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "Batch execution failed");
                metrics.record_batch("failed", elapsed.as_secs_f64());
                return Err(e);
            }
        };

        for result in &summary.results {
            metrics.record_unit(result.is_success(), result.duration().as_secs_f64());
        }
        metrics.record_batch("completed", elapsed.as_secs_f64());

        let success_rate = summary.success_count as f64 / total as f64 * 100.0;
        info!(
            succeeded = summary.success_count,
            failed = summary.failure_count,
            success_rate = format!("{:.2}%", success_rate),
            peak_concurrency = summary.peak_concurrency,
            batch_duration_ms = elapsed.as_millis(),
            "Batch execution completed"
        );

        if success_rate < 80.0 && total > 5 {
            warn!(
                success_rate = format!("{:.2}%", success_rate),
                failed = summary.failure_count,
                "High failure rate detected in batch execution"
            );
        }

        Ok(summary)
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

/// Wait for every task; report the first failure after all have finished
async fn join_all(mut tasks: JoinSet<Result<usize>>) -> Option<crate::BatchError> {
    let mut first_error = None;
    let mut processed = 0;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(units)) => processed += units,
            Ok(Err(e)) => {
                error!(error = %e, "Task failed outside its unit of work");
                first_error.get_or_insert(e);
            }
            Err(e) => {
                error!(error = %e, "Task join error");
                first_error.get_or_insert(e.into());
            }
        }
    }

    debug!(processed, "All batch tasks joined");
    first_error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::UnitContext;
    use crate::BatchError;

    #[test]
    fn test_batch_executor_configuration() {
        let executor = BatchExecutor::default()
            .with_concurrency_limit(4)
            .with_strategy(ConcurrencyStrategy::SemaphorePerItem);

        assert_eq!(executor.config().concurrency_limit, 4);
        assert_eq!(executor.config().strategy, ConcurrencyStrategy::SemaphorePerItem);
        assert!(BatchExecutor::default().config().concurrency_limit > 0);
    }

    #[tokio::test]
    async fn test_zero_limit_rejected_before_any_work() {
        let executor = BatchExecutor::default().with_concurrency_limit(0);
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result = executor
            .execute(vec![1, 2, 3], move |_ctx: UnitContext, n: i32| {
                calls_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move { Ok::<_, String>(n) }
            })
            .await;

        assert!(matches!(result, Err(BatchError::InvalidConcurrencyLimit(0))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_returns_empty_summary() {
        for strategy in [ConcurrencyStrategy::WorkerPool, ConcurrencyStrategy::SemaphorePerItem] {
            let executor = BatchExecutor::default().with_strategy(strategy);
            let summary = executor
                .execute(Vec::<u8>::new(), |_ctx: UnitContext, n: u8| async move {
                    Ok::<_, String>(n)
                })
                .await
                .unwrap();

            assert_eq!(summary.total(), 0);
            assert!(summary.results.is_empty());
            assert_eq!(summary.peak_concurrency, 0);
            assert_eq!(summary.strategy, strategy);
        }
    }
}
