//! The unit of work a batch runs once per item

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::batch::types::{UnitContext, UnitError, UnitResult};

/// Processes a single work item.
///
/// Implemented for any `Fn(UnitContext, I) -> impl Future<Output = Result<O, E>>`
/// where `E: Display`, so most callers pass a closure.
#[async_trait]
pub trait UnitOfWork<I: Send + 'static>: Send + Sync + 'static {
    /// Value produced by a successful unit
    type Output: Send + 'static;

    /// Process one item
    async fn process(&self, ctx: UnitContext, item: I) -> Result<Self::Output, UnitError>;
}

#[async_trait]
impl<I, O, E, F, Fut> UnitOfWork<I> for F
where
    I: Send + 'static,
    O: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(UnitContext, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
{
    type Output = O;

    async fn process(&self, ctx: UnitContext, item: I) -> Result<O, UnitError> {
        (self)(ctx, item)
            .await
            .map_err(|e| UnitError::new(e.to_string()))
    }
}

/// Run one unit and turn every way it can end into a [`UnitResult`].
///
/// Errors and panics from the unit of work are both captured. Units whose
/// batch was cancelled before they started are failed without being run.
pub(crate) async fn run_unit<I, W>(work: &W, ctx: UnitContext, item: I) -> UnitResult<W::Output>
where
    I: Send + 'static,
    W: UnitOfWork<I> + ?Sized,
{
    let index = ctx.index;
    let start = Instant::now();

    if ctx.is_cancelled() {
        debug!(unit = index, "Batch cancelled before unit started");
        return UnitResult::failed(
            index,
            UnitError::new("cancelled before start"),
            start.elapsed(),
        );
    }

    let outcome = AssertUnwindSafe(work.process(ctx, item))
        .catch_unwind()
        .await;
    let duration = start.elapsed();

    match outcome {
        Ok(Ok(output)) => UnitResult::succeeded(index, output, duration),
        Ok(Err(e)) => {
            debug!(unit = index, error = %e, "Unit failed");
            UnitResult::failed(index, e, duration)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(unit = index, panic = %message, "Unit panicked");
            UnitResult::failed(index, UnitError::new(format!("unit panicked: {}", message)), duration)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn ctx(index: usize) -> UnitContext {
        UnitContext::new(index, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_closure_success() {
        let work = |_ctx: UnitContext, n: u32| async move { Ok::<_, String>(n + 1) };
        let result = run_unit(&work, ctx(4), 41).await;

        assert!(result.is_success());
        assert_eq!(result.index(), 4);
        assert_eq!(result.output(), Some(&42));
        assert!(result.error_message().is_none());
    }

    #[tokio::test]
    async fn test_closure_error_is_captured() {
        let work = |_ctx: UnitContext, _n: u32| async move { Err::<u32, _>("storage offline") };
        let result = run_unit(&work, ctx(1), 0).await;

        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("storage offline"));
        assert!(result.output().is_none());
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let work = |_ctx: UnitContext, n: u32| async move {
            if n == 0 {
                panic!("division by zero");
            }
            Ok::<_, String>(100 / n)
        };
        let result = run_unit(&work, ctx(0), 0).await;

        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_cancelled_unit_is_not_run() {
        let token = CancellationToken::new();
        token.cancel();

        let work = |_ctx: UnitContext, _n: u32| async move { Err::<u32, _>("unit ran") };
        let result = run_unit(&work, UnitContext::new(2, token), 0).await;

        assert_eq!(result.error_message(), Some("cancelled before start"));
    }
}
