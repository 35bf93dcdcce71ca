//! To-do service: single-item operations plus bounded batch creation.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{NewTodo, Todo, TodoPatch};
use super::pagination::{Page, PageRequest};
use super::repository::{RepositoryCapabilities, RepositoryError, TodoFilter, TodoRepository};
use crate::batch::{BatchExecutor, BatchSummary, UnitContext, UnitError, UnitOfWork};
use crate::{BatchError, Result};

/// Validate one item, then persist it
struct CreateTodo {
    repo: Arc<dyn TodoRepository>,
}

#[async_trait]
impl UnitOfWork<NewTodo> for CreateTodo {
    type Output = Todo;

    async fn process(&self, ctx: UnitContext, item: NewTodo) -> std::result::Result<Todo, UnitError> {
        let params = item
            .validate()
            .map_err(|e| UnitError::new(format!("validation failed: {}", e)))?;

        if ctx.is_cancelled() {
            return Err(UnitError::new("cancelled before create"));
        }

        self.repo
            .create(params)
            .await
            .map_err(|e| UnitError::new(e.to_string()))
    }
}

/// Binds a to-do repository to a batch executor configured once at
/// construction.
#[derive(Clone)]
pub struct TodoService {
    repo: Arc<dyn TodoRepository>,
    executor: BatchExecutor,
}

impl TodoService {
    /// Bind `repo` to an executor whose limit applies to every batch
    pub fn new(repo: Arc<dyn TodoRepository>, executor: BatchExecutor) -> Self {
        Self { repo, executor }
    }

    /// Executor used for batches
    pub fn executor(&self) -> &BatchExecutor {
        &self.executor
    }

    /// Optional capabilities of the underlying repository
    pub fn capabilities(&self) -> RepositoryCapabilities {
        self.repo.capabilities()
    }

    /// Create every item with at most `k` creations in flight.
    ///
    /// Invalid items fail individually; valid items are persisted regardless
    /// of their neighbours. An empty batch is rejected.
    pub async fn batch_create(&self, items: Vec<NewTodo>) -> Result<BatchSummary<Todo>> {
        self.batch_create_with_cancellation(items, &CancellationToken::new())
            .await
    }

    /// [`Self::batch_create`] under the caller's cancellation token
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn batch_create_with_cancellation(
        &self,
        items: Vec<NewTodo>,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary<Todo>> {
        if items.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let work = CreateTodo {
            repo: Arc::clone(&self.repo),
        };
        let summary = self
            .executor
            .execute_with_cancellation(items, work, cancel)
            .await?;

        info!(
            created = summary.success_count,
            rejected = summary.failure_count,
            "Batch create finished"
        );
        Ok(summary)
    }

    /// Validate and persist one record
    pub async fn create(&self, item: NewTodo) -> std::result::Result<Todo, RepositoryError> {
        let params = item.validate()?;
        self.repo.create(params).await
    }

    /// Load an active record
    pub async fn get(&self, id: Uuid) -> std::result::Result<Todo, RepositoryError> {
        self.repo.get(id).await
    }

    /// Validate and apply a partial update
    pub async fn update(&self, id: Uuid, patch: TodoPatch) -> std::result::Result<Todo, RepositoryError> {
        let patch = patch.validate()?;
        self.repo.update(id, patch).await
    }

    /// Soft-delete a record
    pub async fn delete(&self, id: Uuid) -> std::result::Result<Todo, RepositoryError> {
        self.repo.delete(id).await
    }

    /// Undo a soft delete, if the backend supports it
    pub async fn restore(&self, id: Uuid) -> std::result::Result<Todo, RepositoryError> {
        let restore = self
            .repo
            .as_restore()
            .ok_or(RepositoryError::Unsupported("restore"))?;
        restore.restore(id).await
    }

    /// List active records, if the backend supports it
    pub async fn list(
        &self,
        filter: TodoFilter,
        page: PageRequest,
    ) -> std::result::Result<Page<Todo>, RepositoryError> {
        let listing = self
            .repo
            .as_listing()
            .ok_or(RepositoryError::Unsupported("listing"))?;
        listing.list(filter, page).await
    }
}

impl std::fmt::Debug for TodoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoService")
            .field("executor", &self.executor)
            .field("capabilities", &self.repo.capabilities())
            .finish()
    }
}
