//! To-do records, storage backends and the service that creates them in
//! bounded batches.
//!
//! [`TodoService::batch_create`] is the executor's main caller: each item is
//! validated and persisted as its own unit of work.

/// JSON file backend
pub mod file;
/// In-memory backend
pub mod memory;
/// Records, creation and update parameters, validation
pub mod model;
/// Page requests and pages
pub mod pagination;
/// Storage capability traits and errors
pub mod repository;
/// Batch-creating service over a repository
pub mod service;

pub use file::JsonFileTodoRepository;
pub use memory::InMemoryTodoRepository;
pub use model::{
    Lifecycle, NewTodo, Priority, Todo, TodoPatch, ValidatedPatch, ValidatedTodo, ValidationError,
    MAX_DESCRIPTION_LEN, MAX_TITLE_LEN,
};
pub use pagination::{Page, PageRequest, MAX_PER_PAGE};
pub use repository::{
    RepositoryCapabilities, RepositoryError, TodoFilter, TodoListing, TodoRepository, TodoRestore,
};
pub use service::TodoService;
