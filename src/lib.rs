//! # batchpool
//!
//! Bounded concurrent batch execution for Tokio applications.
//!
//! ## Overview
//!
//! A [`batch::BatchExecutor`] takes a sequence of independent work items and a
//! unit of work, runs at most `k` units at a time, and returns a complete
//! [`batch::BatchSummary`] once every unit has either succeeded or failed.
//! A failing (or panicking) unit never aborts its siblings.
//!
//! Two strategies share the same contract:
//!
//! - [`batch::ConcurrencyStrategy::WorkerPool`]: `k` long-lived workers drain a
//!   shared queue.
//! - [`batch::ConcurrencyStrategy::SemaphorePerItem`]: one task per item, each
//!   admitted by one of `k` semaphore permits.
//!
//! ## Quick Start
//!
//! ```rust
//! use batchpool::batch::{BatchExecutor, ConcurrencyStrategy, UnitContext};
//!
//! # async fn example() -> batchpool::Result<()> {
//! let executor = BatchExecutor::default()
//!     .with_concurrency_limit(3)
//!     .with_strategy(ConcurrencyStrategy::WorkerPool);
//!
//! let summary = executor
//!     .execute(vec![1u64, 2, 3, 4, 5], |_ctx: UnitContext, n: u64| async move {
//!         if n % 2 == 0 {
//!             Err(format!("{} is even", n))
//!         } else {
//!             Ok(n * 10)
//!         }
//!     })
//!     .await?;
//!
//! assert_eq!(summary.success_count, 3);
//! assert_eq!(summary.failure_count, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`batch`]: executor, strategies, result collection and summary types
//! - [`todo`]: to-do records, storage capabilities and the batch-creating service
//! - [`metrics`]: Prometheus metrics for batch execution
//! - [`telemetry`]: tracing subscriber setup

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for batchpool operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Main error type for batch-level failures.
///
/// Per-unit failures never surface here; they are recorded in the
/// [`batch::UnitResult`] of the unit that produced them.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The configured concurrency limit cannot admit any unit
    #[error("Invalid concurrency limit: {0} (must be at least 1)")]
    InvalidConcurrencyLimit(usize),

    /// Caller submitted a batch with no items where one was required
    #[error("Batch contains no items")]
    EmptyBatch,

    /// The work queue closed before every item was enqueued
    #[error("Work queue closed before all items were enqueued")]
    QueueClosed,

    /// An admission permit could not be acquired
    #[error("Admission permit unavailable: {0}")]
    PermitUnavailable(String),

    /// Join error from a spawned worker or task
    #[error("Async join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Fewer results than units were collected
    #[error("Incomplete batch: expected {expected} results, collected {collected}")]
    IncompleteBatch {
        /// Number of submitted units
        expected: usize,
        /// Number of terminal results received
        collected: usize,
    },

    /// A unit reported a second terminal result
    #[error("Duplicate result for unit {0}")]
    DuplicateResult(usize),

    /// An event referenced an index outside the batch
    #[error("Unknown unit index {0}")]
    UnknownUnit(usize),

    /// A unit event arrived that its current state does not allow
    #[error("Invalid transition for unit {index}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Index of the offending unit
        index: usize,
        /// State the unit was in
        from: batch::UnitState,
        /// State the event asked for
        to: batch::UnitState,
    },

    /// Storage error from a to-do repository
    #[error("Repository error: {0}")]
    Repository(#[from] todo::RepositoryError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Bounded concurrent batch execution
pub mod batch;

/// Prometheus metrics for batch execution
pub mod metrics;

/// Tracing subscriber setup
pub mod telemetry;

/// To-do records, storage capabilities and the batch-creating service
pub mod todo;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BatchError::InvalidConcurrencyLimit(0);
        assert!(err.to_string().contains("at least 1"));

        let err = BatchError::IncompleteBatch {
            expected: 5,
            collected: 4,
        };
        assert_eq!(
            err.to_string(),
            "Incomplete batch: expected 5 results, collected 4"
        );
    }

    #[test]
    fn test_repository_error_conversion() {
        let id = uuid::Uuid::new_v4();
        let err: BatchError = todo::RepositoryError::NotFound(id).into();
        assert!(matches!(err, BatchError::Repository(_)));
    }
}
