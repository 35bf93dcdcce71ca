//! Configuration, unit and batch state, and result types
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::{BatchError, Result};

/// How units are scheduled onto Tokio tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyStrategy {
    /// `k` long-lived workers pull items from a shared queue
    WorkerPool,
    /// One task per item, admitted by one of `k` semaphore permits
    SemaphorePerItem,
}

impl ConcurrencyStrategy {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyStrategy::WorkerPool => "worker_pool",
            ConcurrencyStrategy::SemaphorePerItem => "semaphore_per_item",
        }
    }
}

impl fmt::Display for ConcurrencyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of units running at once
    pub concurrency_limit: usize,
    /// Scheduling strategy
    pub strategy: ConcurrencyStrategy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: num_cpus::get().max(1),
            strategy: ConcurrencyStrategy::WorkerPool,
        }
    }
}

impl BatchConfig {
    /// Reject configurations that cannot run a single unit
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(BatchError::InvalidConcurrencyLimit(self.concurrency_limit));
        }
        Ok(())
    }
}

/// Lifecycle of a single unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    /// Waiting for a worker or an admission permit
    Queued,
    /// The unit of work is executing
    Running,
    /// Finished with an output
    Succeeded,
    /// Finished with an error
    Failed,
}

impl UnitState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Succeeded | UnitState::Failed)
    }

    /// Move to `next`, rejecting anything but `Queued -> Running -> terminal`
    pub fn transition(self, index: usize, next: UnitState) -> Result<UnitState> {
        match (self, next) {
            (UnitState::Queued, UnitState::Running)
            | (UnitState::Running, UnitState::Succeeded)
            | (UnitState::Running, UnitState::Failed) => Ok(next),
            (from, to) => Err(BatchError::InvalidTransition { index, from, to }),
        }
    }
}

/// Lifecycle of a whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchPhase {
    /// No unit has finished yet
    Accepting,
    /// Some, but not all, units have finished
    InFlight,
    /// Every unit has finished
    Complete,
}

impl BatchPhase {
    /// Derive the phase from the number of terminal results
    pub fn from_progress(completed: usize, total: usize) -> Self {
        if completed >= total {
            BatchPhase::Complete
        } else if completed == 0 {
            BatchPhase::Accepting
        } else {
            BatchPhase::InFlight
        }
    }
}

/// Per-unit context handed to the unit of work
#[derive(Debug, Clone)]
pub struct UnitContext {
    /// Position of the item in the submitted sequence
    pub index: usize,
    cancel: tokio_util::sync::CancellationToken,
}

impl UnitContext {
    pub(crate) fn new(index: usize, cancel: tokio_util::sync::CancellationToken) -> Self {
        Self { index, cancel }
    }

    /// Whether the caller has cancelled the batch
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once the caller cancels the batch
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// The caller's cancellation token
    pub fn cancellation_token(&self) -> &tokio_util::sync::CancellationToken {
        &self.cancel
    }
}

/// Error reported by a single unit of work
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UnitError {
    message: String,
}

impl UnitError {
    /// Create a unit error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.is_empty() {
                "unit failed without a message".to_string()
            } else {
                message
            },
        }
    }

    /// The error message, never empty
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome of one unit.
///
/// Exactly one of `output` and `error_message` is set, chosen by `success`;
/// the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitResult<O> {
    index: usize,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<O>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    duration: Duration,
}

impl<O> UnitResult<O> {
    /// A successful unit
    pub fn succeeded(index: usize, output: O, duration: Duration) -> Self {
        Self {
            index,
            success: true,
            output: Some(output),
            error_message: None,
            duration,
        }
    }

    /// A failed unit
    pub fn failed(index: usize, error: UnitError, duration: Duration) -> Self {
        Self {
            index,
            success: false,
            output: None,
            error_message: Some(error.message),
            duration,
        }
    }

    /// Position of the item in the submitted sequence
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the unit succeeded
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Output of a successful unit
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    /// Take the output of a successful unit
    pub fn into_output(self) -> Option<O> {
        self.output
    }

    /// Error message of a failed unit
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Time spent running the unit of work
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Terminal state this result represents
    pub fn state(&self) -> UnitState {
        if self.success {
            UnitState::Succeeded
        } else {
            UnitState::Failed
        }
    }
}

/// Aggregate outcome of a batch, produced once every unit has finished
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary<O> {
    /// Units that produced an output
    pub success_count: usize,
    /// Units that produced an error
    pub failure_count: usize,
    /// One result per submitted item, sorted by index
    pub results: Vec<UnitResult<O>>,
    /// Wall clock from invocation to the last aggregated result
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Highest number of units observed running at once
    pub peak_concurrency: usize,
    /// Strategy the batch ran with
    pub strategy: ConcurrencyStrategy,
}

impl<O> BatchSummary<O> {
    /// Summary of a batch with no items
    pub fn empty(strategy: ConcurrencyStrategy) -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            results: Vec::new(),
            elapsed: Duration::ZERO,
            peak_concurrency: 0,
            strategy,
        }
    }

    /// Number of units in the batch
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// Whether every unit succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }

    /// Result for the item at `index`.
    ///
    /// Summaries built by the executor hold one result per index in order, so
    /// the position is checked first; any other `results` is scanned.
    pub fn result(&self, index: usize) -> Option<&UnitResult<O>> {
        match self.results.get(index) {
            Some(r) if r.index == index => Some(r),
            _ => self.results.iter().find(|r| r.index == index),
        }
    }

    /// Failed results
    pub fn failures(&self) -> impl Iterator<Item = &UnitResult<O>> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Outputs of successful units, in index order
    pub fn outputs(&self) -> impl Iterator<Item = &O> {
        self.results.iter().filter_map(|r| r.output.as_ref())
    }
}

/// Snapshot handed to the progress callback after each finished unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    /// Units in the batch
    pub total: usize,
    /// Units in a terminal state
    pub completed: usize,
    /// Units currently running
    pub running: usize,
    /// Units that succeeded
    pub succeeded: usize,
    /// Units that failed
    pub failed: usize,
    /// Batch phase derived from `completed`
    pub phase: BatchPhase,
}

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(&BatchProgress) + Send + Sync>;

fn serialize_millis<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
}
