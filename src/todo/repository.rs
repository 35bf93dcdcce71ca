//! Storage capabilities for to-do records.
//!
//! Every backend implements [`TodoRepository`]. Listing and restoring are
//! optional: a backend that has them returns itself from
//! [`TodoRepository::as_listing`] / [`TodoRepository::as_restore`], and
//! callers check before use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::model::{Priority, Todo, ValidatedPatch, ValidatedTodo, ValidationError};
use super::pagination::{Page, PageRequest};

/// Errors related to to-do storage
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// No active record with this id
    #[error("Todo not found: {0}")]
    NotFound(Uuid),

    /// Delete of a record that is already soft-deleted
    #[error("Todo already deleted: {0}")]
    AlreadyDeleted(Uuid),

    /// Restore of a record that is still active
    #[error("Todo is not deleted: {0}")]
    NotDeleted(Uuid),

    /// Parameters failed validation
    #[error("Invalid todo: {0}")]
    Validation(#[from] ValidationError),

    /// The backend lacks the named optional capability
    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// Reading or writing the backing store failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which optional capabilities a backend offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepositoryCapabilities {
    /// [`TodoListing`] is available
    pub listing: bool,
    /// [`TodoRestore`] is available
    pub restore: bool,
}

/// Filter for listings; `None` fields match everything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoFilter {
    /// Match on completion
    pub completed: Option<bool>,
    /// Match on priority
    pub priority: Option<Priority>,
}

impl TodoFilter {
    /// Whether `todo` passes every set field
    pub fn matches(&self, todo: &Todo) -> bool {
        self.completed.map_or(true, |c| todo.completed == c)
            && self.priority.map_or(true, |p| todo.priority == p)
    }
}

/// Capabilities every backend provides
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// Persist a new record
    async fn create(&self, params: ValidatedTodo) -> Result<Todo, RepositoryError>;

    /// Load an active record; soft-deleted records are `NotFound`
    async fn get(&self, id: Uuid) -> Result<Todo, RepositoryError>;

    /// Apply a partial update to an active record
    async fn update(&self, id: Uuid, patch: ValidatedPatch) -> Result<Todo, RepositoryError>;

    /// Soft-delete an active record
    async fn delete(&self, id: Uuid) -> Result<Todo, RepositoryError>;

    /// Listing capability, if supported
    fn as_listing(&self) -> Option<&dyn TodoListing> {
        None
    }

    /// Restore capability, if supported
    fn as_restore(&self) -> Option<&dyn TodoRestore> {
        None
    }

    /// Summary of the optional capabilities
    fn capabilities(&self) -> RepositoryCapabilities {
        RepositoryCapabilities {
            listing: self.as_listing().is_some(),
            restore: self.as_restore().is_some(),
        }
    }
}

/// Paginated listing of active records
#[async_trait]
pub trait TodoListing: Send + Sync {
    /// Active records matching `filter`, oldest first
    async fn list(&self, filter: TodoFilter, page: PageRequest) -> Result<Page<Todo>, RepositoryError>;
}

/// Undo a soft delete
#[async_trait]
pub trait TodoRestore: Send + Sync {
    /// Bring a soft-deleted record back to active
    async fn restore(&self, id: Uuid) -> Result<Todo, RepositoryError>;
}
