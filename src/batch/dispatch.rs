//! Plumbing shared by both strategies: running an admitted unit, reporting
//! it to the collector and tracking how many units run at once.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::batch::aggregation::UnitEvent;
use crate::batch::types::UnitContext;
use crate::batch::work::{run_unit, UnitOfWork};
use crate::metrics::BatchMetrics;

/// Running-unit counter with a high-water mark
#[derive(Debug, Default)]
pub struct ActiveUnits {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ActiveUnits {
    /// Mark a unit as running until the guard is dropped
    pub fn enter(&self) -> ActiveGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ActiveGuard { units: self }
    }

    /// Units running right now
    pub fn current(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Most units ever running at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Guard returned by [`ActiveUnits::enter`]
pub struct ActiveGuard<'a> {
    units: &'a ActiveUnits,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.units.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Holds the global running-units gauge up for one unit
struct RunningGauge(BatchMetrics);

impl RunningGauge {
    fn enter(metrics: BatchMetrics) -> Self {
        metrics.unit_started();
        Self(metrics)
    }
}

impl Drop for RunningGauge {
    fn drop(&mut self) {
        self.0.unit_finished();
    }
}

/// Everything a worker or task needs to run one admitted unit
pub(crate) struct UnitDispatch<I, W: UnitOfWork<I>>
where
    I: Send + 'static,
{
    work: Arc<W>,
    events: mpsc::Sender<UnitEvent<W::Output>>,
    cancel: CancellationToken,
    active: Arc<ActiveUnits>,
    metrics: BatchMetrics,
    _item: PhantomData<fn(I)>,
}

impl<I, W> Clone for UnitDispatch<I, W>
where
    I: Send + 'static,
    W: UnitOfWork<I>,
{
    fn clone(&self) -> Self {
        Self {
            work: self.work.clone(),
            events: self.events.clone(),
            cancel: self.cancel.clone(),
            active: self.active.clone(),
            metrics: self.metrics,
            _item: PhantomData,
        }
    }
}

impl<I, W> UnitDispatch<I, W>
where
    I: Send + 'static,
    W: UnitOfWork<I>,
{
    pub(crate) fn new(
        work: Arc<W>,
        events: mpsc::Sender<UnitEvent<W::Output>>,
        cancel: CancellationToken,
        active: Arc<ActiveUnits>,
        metrics: BatchMetrics,
    ) -> Self {
        Self {
            work,
            events,
            cancel,
            active,
            metrics,
            _item: PhantomData,
        }
    }

    /// Run an admitted unit and report `Started` then `Finished`
    pub(crate) async fn run(&self, index: usize, item: I) {
        self.send(UnitEvent::Started { index }).await;

        let result = {
            // Both guards also release if the task is aborted mid-unit
            let _active = self.active.enter();
            let _gauge = RunningGauge::enter(self.metrics);
            run_unit(self.work.as_ref(), UnitContext::new(index, self.cancel.clone()), item).await
        };

        self.send(UnitEvent::Finished(result)).await;
    }

    async fn send(&self, event: UnitEvent<W::Output>) {
        if self.events.send(event).await.is_err() {
            warn!("Result collector dropped before unit event was delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_units_tracks_peak() {
        let units = ActiveUnits::default();
        {
            let _a = units.enter();
            let _b = units.enter();
            assert_eq!(units.current(), 2);
        }
        let _c = units.enter();

        assert_eq!(units.current(), 1);
        assert_eq!(units.peak(), 2);
    }
}
