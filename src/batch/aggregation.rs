//! Result collection for a running batch.
//!
//! Every worker or task reports through one channel of [`UnitEvent`]s, and a
//! single [`ResultCollector`] owns all counters. Nothing else ever writes to
//! them, so they need no lock.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::batch::types::{
    BatchPhase, BatchProgress, BatchSummary, ConcurrencyStrategy, ProgressCallback, UnitResult,
    UnitState,
};
use crate::{BatchError, Result};

/// Event emitted by a worker or task for one unit
#[derive(Debug)]
pub enum UnitEvent<O> {
    /// The unit was admitted and is about to run
    Started {
        /// Index of the unit
        index: usize,
    },
    /// The unit reached a terminal state
    Finished(UnitResult<O>),
}

/// Single owner of a batch's per-unit states, results and counters
pub struct ResultCollector<O> {
    states: Vec<UnitState>,
    slots: Vec<Option<UnitResult<O>>>,
    running: usize,
    succeeded: usize,
    failed: usize,
    phase: BatchPhase,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl<O> ResultCollector<O> {
    /// Create a collector for `total` queued units
    pub fn new(total: usize) -> Self {
        Self {
            states: vec![UnitState::Queued; total],
            slots: (0..total).map(|_| None).collect(),
            running: 0,
            succeeded: 0,
            failed: 0,
            phase: BatchPhase::from_progress(0, total),
            progress_callback: None,
        }
    }

    /// Call `callback` after every terminal result
    pub fn with_progress_callback(mut self, callback: Option<Arc<ProgressCallback>>) -> Self {
        self.progress_callback = callback;
        self
    }

    /// Number of units in the batch
    pub fn total(&self) -> usize {
        self.states.len()
    }

    /// Units in a terminal state
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Current batch phase
    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    /// State of the unit at `index`
    pub fn state(&self, index: usize) -> Option<UnitState> {
        self.states.get(index).copied()
    }

    /// Current progress snapshot
    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            total: self.total(),
            completed: self.completed(),
            running: self.running,
            succeeded: self.succeeded,
            failed: self.failed,
            phase: self.phase,
        }
    }

    /// Apply one event
    pub fn record(&mut self, event: UnitEvent<O>) -> Result<()> {
        match event {
            UnitEvent::Started { index } => {
                let state = self
                    .states
                    .get_mut(index)
                    .ok_or(BatchError::UnknownUnit(index))?;
                *state = state.transition(index, UnitState::Running)?;
                self.running += 1;
                Ok(())
            }
            UnitEvent::Finished(result) => {
                let index = result.index();
                let state = self
                    .states
                    .get_mut(index)
                    .ok_or(BatchError::UnknownUnit(index))?;
                if state.is_terminal() {
                    return Err(BatchError::DuplicateResult(index));
                }
                *state = state.transition(index, result.state())?;

                self.running -= 1;
                if result.is_success() {
                    self.succeeded += 1;
                } else {
                    self.failed += 1;
                }
                self.slots[index] = Some(result);

                let phase = BatchPhase::from_progress(self.completed(), self.total());
                if phase != self.phase {
                    debug!(from = ?self.phase, to = ?phase, "Batch phase changed");
                    self.phase = phase;
                }

                if let Some(ref callback) = self.progress_callback {
                    callback(&self.progress());
                }
                Ok(())
            }
        }
    }

    /// Build the summary, failing if any unit has no result
    pub fn finish(
        self,
        elapsed: Duration,
        peak_concurrency: usize,
        strategy: ConcurrencyStrategy,
    ) -> Result<BatchSummary<O>> {
        let expected = self.total();
        let collected = self.completed();
        if collected != expected {
            return Err(BatchError::IncompleteBatch {
                expected,
                collected,
            });
        }

        Ok(BatchSummary {
            success_count: self.succeeded,
            failure_count: self.failed,
            results: self.slots.into_iter().flatten().collect(),
            elapsed,
            peak_concurrency,
            strategy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::UnitError;
    use std::sync::Mutex;

    fn finished_ok(index: usize) -> UnitEvent<usize> {
        UnitEvent::Finished(UnitResult::succeeded(index, index * 2, Duration::ZERO))
    }

    fn finished_err(index: usize) -> UnitEvent<usize> {
        UnitEvent::Finished(UnitResult::failed(
            index,
            UnitError::new("failed"),
            Duration::ZERO,
        ))
    }

    #[test]
    fn test_collects_in_index_order() {
        let mut collector = ResultCollector::new(3);
        assert_eq!(collector.phase(), BatchPhase::Accepting);

        for index in [2, 0, 1] {
            collector.record(UnitEvent::Started { index }).unwrap();
        }
        assert_eq!(collector.progress().running, 3);

        collector.record(finished_ok(2)).unwrap();
        assert_eq!(collector.phase(), BatchPhase::InFlight);
        collector.record(finished_err(0)).unwrap();
        collector.record(finished_ok(1)).unwrap();
        assert_eq!(collector.phase(), BatchPhase::Complete);

        let summary = collector
            .finish(Duration::from_millis(5), 3, ConcurrencyStrategy::WorkerPool)
            .unwrap();
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        let indices: Vec<_> = summary.results.iter().map(|r| r.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_rejects_finish_without_start() {
        let mut collector = ResultCollector::new(1);
        let err = collector.record(finished_ok(0)).unwrap_err();
        assert!(matches!(err, BatchError::InvalidTransition { index: 0, .. }));
    }

    #[test]
    fn test_rejects_duplicate_result() {
        let mut collector = ResultCollector::new(1);
        collector.record(UnitEvent::Started { index: 0 }).unwrap();
        collector.record(finished_ok(0)).unwrap();

        let err = collector.record(finished_err(0)).unwrap_err();
        assert!(matches!(err, BatchError::DuplicateResult(0)));
    }

    #[test]
    fn test_rejects_unknown_index() {
        let mut collector: ResultCollector<usize> = ResultCollector::new(2);
        let err = collector.record(UnitEvent::Started { index: 7 }).unwrap_err();
        assert!(matches!(err, BatchError::UnknownUnit(7)));
    }

    #[test]
    fn test_incomplete_batch_is_an_error() {
        let mut collector = ResultCollector::new(2);
        collector.record(UnitEvent::Started { index: 0 }).unwrap();
        collector.record(finished_ok(0)).unwrap();

        let err = collector
            .finish(Duration::ZERO, 1, ConcurrencyStrategy::SemaphorePerItem)
            .unwrap_err();
        assert!(matches!(
            err,
            BatchError::IncompleteBatch {
                expected: 2,
                collected: 1
            }
        ));
    }

    #[test]
    fn test_progress_callback_sees_every_result() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback: ProgressCallback = Box::new(move |progress: &BatchProgress| {
            seen_clone.lock().unwrap().push(progress.completed);
        });

        let mut collector = ResultCollector::new(2).with_progress_callback(Some(Arc::new(callback)));
        for index in 0..2 {
            collector.record(UnitEvent::Started { index }).unwrap();
            collector.record(finished_ok(index)).unwrap();
        }

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
