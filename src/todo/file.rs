//! JSON file storage: one document holding every record

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{Lifecycle, Todo, ValidatedPatch, ValidatedTodo};
use super::repository::{RepositoryError, TodoRepository};

/// File-backed to-do storage.
///
/// Offers only the required capabilities; listing and restore are not
/// available. Every mutation rewrites the whole document through a temporary
/// file and a rename, so a crash leaves either the old or the new contents.
pub struct JsonFileTodoRepository {
    path: PathBuf,
    records: Mutex<HashMap<Uuid, Todo>>,
}

impl JsonFileTodoRepository {
    /// Open `path`, loading existing records if the file is present
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();

        let records = match fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => {
                let todos: Vec<Todo> = serde_json::from_str(&contents)?;
                todos.into_iter().map(|todo| (todo.id, todo)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), records = records.len(), "Opened todo file");

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Location of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &HashMap<Uuid, Todo>) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut todos: Vec<&Todo> = records.values().collect();
        todos.sort_by_key(|todo| (todo.created_at, todo.id));
        let json = serde_json::to_vec_pretty(&todos)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Replace one record and persist, rolling back the in-memory copy on failure
    async fn commit(
        &self,
        records: &mut HashMap<Uuid, Todo>,
        todo: Todo,
    ) -> Result<Todo, RepositoryError> {
        let previous = records.insert(todo.id, todo.clone());

        if let Err(e) = self.persist(records).await {
            match previous {
                Some(previous) => records.insert(todo.id, previous),
                None => records.remove(&todo.id),
            };
            return Err(e);
        }
        Ok(todo)
    }
}

#[async_trait]
impl TodoRepository for JsonFileTodoRepository {
    async fn create(&self, params: ValidatedTodo) -> Result<Todo, RepositoryError> {
        let todo = Todo::from_validated(params, Utc::now());
        let mut records = self.records.lock().await;
        let todo = self.commit(&mut records, todo).await?;

        debug!(id = %todo.id, "Created todo");
        Ok(todo)
    }

    async fn get(&self, id: Uuid) -> Result<Todo, RepositoryError> {
        let records = self.records.lock().await;
        records
            .get(&id)
            .filter(|todo| todo.is_active())
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update(&self, id: Uuid, patch: ValidatedPatch) -> Result<Todo, RepositoryError> {
        let mut records = self.records.lock().await;
        let mut todo = records
            .get(&id)
            .filter(|todo| todo.is_active())
            .cloned()
            .ok_or(RepositoryError::NotFound(id))?;

        todo.apply(patch, Utc::now());
        self.commit(&mut records, todo).await
    }

    async fn delete(&self, id: Uuid) -> Result<Todo, RepositoryError> {
        let mut records = self.records.lock().await;
        let mut todo = records.get(&id).cloned().ok_or(RepositoryError::NotFound(id))?;
        if !todo.is_active() {
            return Err(RepositoryError::AlreadyDeleted(id));
        }

        let now = Utc::now();
        todo.lifecycle = Lifecycle::Deleted { at: now };
        todo.updated_at = now;

        let todo = self.commit(&mut records, todo).await?;
        debug!(id = %id, "Soft-deleted todo");
        Ok(todo)
    }
}
