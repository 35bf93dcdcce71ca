//! In-memory storage, the backend that offers every capability

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::model::{Lifecycle, Todo, ValidatedPatch, ValidatedTodo};
use super::pagination::{Page, PageRequest};
use super::repository::{RepositoryError, TodoFilter, TodoListing, TodoRepository, TodoRestore};

/// In-memory to-do storage with listing and restore support
#[derive(Clone, Default)]
pub struct InMemoryTodoRepository {
    records: Arc<DashMap<Uuid, Todo>>,
    insertion_order: Arc<RwLock<Vec<Uuid>>>,
}

impl InMemoryTodoRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, soft-deleted ones included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn with_active<F>(&self, id: Uuid, f: F) -> Result<Todo, RepositoryError>
    where
        F: FnOnce(&mut Todo),
    {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        if !entry.is_active() {
            return Err(RepositoryError::NotFound(id));
        }
        f(entry.value_mut());
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn create(&self, params: ValidatedTodo) -> Result<Todo, RepositoryError> {
        let todo = Todo::from_validated(params, Utc::now());

        // Map first so an id in the order list always resolves
        self.records.insert(todo.id, todo.clone());
        self.insertion_order.write().push(todo.id);

        debug!(id = %todo.id, "Created todo");
        Ok(todo)
    }

    async fn get(&self, id: Uuid) -> Result<Todo, RepositoryError> {
        self.records
            .get(&id)
            .filter(|entry| entry.is_active())
            .map(|entry| entry.value().clone())
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update(&self, id: Uuid, patch: ValidatedPatch) -> Result<Todo, RepositoryError> {
        self.with_active(id, |todo| todo.apply(patch, Utc::now()))
    }

    async fn delete(&self, id: Uuid) -> Result<Todo, RepositoryError> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        if !entry.is_active() {
            return Err(RepositoryError::AlreadyDeleted(id));
        }

        let now = Utc::now();
        entry.lifecycle = Lifecycle::Deleted { at: now };
        entry.updated_at = now;

        debug!(id = %id, "Soft-deleted todo");
        Ok(entry.value().clone())
    }

    fn as_listing(&self) -> Option<&dyn TodoListing> {
        Some(self)
    }

    fn as_restore(&self) -> Option<&dyn TodoRestore> {
        Some(self)
    }
}

#[async_trait]
impl TodoListing for InMemoryTodoRepository {
    async fn list(&self, filter: TodoFilter, page: PageRequest) -> Result<Page<Todo>, RepositoryError> {
        let ids = self.insertion_order.read().clone();

        let mut matching: Vec<Todo> = ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|entry| entry.value().clone()))
            .filter(|todo| todo.is_active() && filter.matches(todo))
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        matching.sort_by_key(|todo| todo.created_at);

        Ok(page.slice(matching))
    }
}

#[async_trait]
impl TodoRestore for InMemoryTodoRepository {
    async fn restore(&self, id: Uuid) -> Result<Todo, RepositoryError> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        if entry.is_active() {
            return Err(RepositoryError::NotDeleted(id));
        }

        entry.lifecycle = Lifecycle::Active;
        entry.updated_at = Utc::now();

        debug!(id = %id, "Restored todo");
        Ok(entry.value().clone())
    }
}
