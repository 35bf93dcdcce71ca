//! Fixed worker-pool strategy.
//!
//! Items are enqueued in input order on a queue that is closed before any
//! worker starts; `min(k, n)` workers pull from it until it is drained.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::batch::dispatch::UnitDispatch;
use crate::batch::work::UnitOfWork;
use crate::{BatchError, Result};

type WorkQueue<I> = Arc<Mutex<mpsc::Receiver<(usize, I)>>>;

/// Enqueue every item and spawn the workers.
///
/// Each task resolves to the number of units its worker ran.
pub(crate) async fn spawn<I, W>(
    items: Vec<I>,
    concurrency_limit: usize,
    dispatch: UnitDispatch<I, W>,
) -> Result<JoinSet<Result<usize>>>
where
    I: Send + 'static,
    W: UnitOfWork<I>,
{
    let total = items.len();
    let (queue_tx, queue_rx) = mpsc::channel(total.max(1));

    for (index, item) in items.into_iter().enumerate() {
        queue_tx
            .send((index, item))
            .await
            .map_err(|_| BatchError::QueueClosed)?;
    }
    // Closing the queue is the "no more work" signal
    drop(queue_tx);

    let queue: WorkQueue<I> = Arc::new(Mutex::new(queue_rx));
    let worker_count = concurrency_limit.min(total);
    debug!(workers = worker_count, queued = total, "Spawning worker pool");

    let mut workers = JoinSet::new();
    for worker_id in 0..worker_count {
        let queue = queue.clone();
        let dispatch = dispatch.clone();
        workers.spawn(async move { Ok(worker(worker_id, queue, dispatch).await) });
    }

    Ok(workers)
}

async fn worker<I, W>(worker_id: usize, queue: WorkQueue<I>, dispatch: UnitDispatch<I, W>) -> usize
where
    I: Send + 'static,
    W: UnitOfWork<I>,
{
    let mut processed = 0;

    loop {
        let next = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };

        match next {
            Some((index, item)) => {
                trace!(worker_id, unit = index, "Worker picked up unit");
                dispatch.run(index, item).await;
                processed += 1;
            }
            None => break,
        }
    }

    debug!(worker_id, processed, "Worker drained queue");
    processed
}
