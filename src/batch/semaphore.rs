//! Per-item-task strategy.
//!
//! One task per item; a task holds one of `k` permits for exactly as long as
//! its unit runs.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::batch::dispatch::UnitDispatch;
use crate::batch::work::UnitOfWork;
use crate::{BatchError, Result};

/// Spawn one task per item.
///
/// Each task resolves to `1` once its unit has been reported.
pub(crate) fn spawn<I, W>(
    items: Vec<I>,
    concurrency_limit: usize,
    dispatch: UnitDispatch<I, W>,
) -> JoinSet<Result<usize>>
where
    I: Send + 'static,
    W: UnitOfWork<I>,
{
    let semaphore = Arc::new(Semaphore::new(concurrency_limit.min(Semaphore::MAX_PERMITS)));
    debug!(tasks = items.len(), permits = concurrency_limit, "Spawning per-item tasks");

    let mut tasks = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let sem = semaphore.clone();
        let dispatch = dispatch.clone();

        tasks.spawn(async move {
            // Permit is released on drop, whatever the unit's outcome
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| BatchError::PermitUnavailable(e.to_string()))?;
            dispatch.run(index, item).await;
            Ok(1)
        });
    }
    tasks
}
