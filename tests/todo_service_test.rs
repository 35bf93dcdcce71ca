//! To-do service tests: batch creation through the executor, CRUD and
//! capability-dependent operations on both backends

use batchpool::batch::{BatchExecutor, ConcurrencyStrategy};
use batchpool::todo::{
    InMemoryTodoRepository, JsonFileTodoRepository, NewTodo, PageRequest, Priority,
    RepositoryError, TodoFilter, TodoPatch, TodoRepository, TodoService, MAX_TITLE_LEN,
};
use batchpool::BatchError;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

fn memory_service(strategy: ConcurrencyStrategy) -> TodoService {
    TodoService::new(
        Arc::new(InMemoryTodoRepository::new()),
        BatchExecutor::default()
            .with_concurrency_limit(3)
            .with_strategy(strategy),
    )
}

fn mixed_batch() -> Vec<NewTodo> {
    vec![
        NewTodo::new("buy milk"),
        NewTodo::new(""),
        NewTodo::new("file taxes").with_priority("high"),
        NewTodo::new("plan trip").with_priority("someday"),
        NewTodo::new("x".repeat(MAX_TITLE_LEN + 1)),
        NewTodo::new("call mum").with_description("about sunday"),
    ]
}

#[tokio::test]
async fn test_batch_create_isolates_invalid_items() {
    for strategy in [
        ConcurrencyStrategy::WorkerPool,
        ConcurrencyStrategy::SemaphorePerItem,
    ] {
        let service = memory_service(strategy);
        let summary = service.batch_create(mixed_batch()).await.unwrap();

        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.failure_count, 3);

        let failed: Vec<usize> = summary.failures().map(|r| r.index()).collect();
        assert_eq!(failed, vec![1, 3, 4]);
        assert!(summary
            .result(3)
            .and_then(|r| r.error_message())
            .unwrap()
            .contains("someday"));

        // Every successful output is persisted
        for todo in summary.outputs() {
            assert_eq!(&service.get(todo.id).await.unwrap(), todo);
        }

        let page = service
            .list(TodoFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 3);

        let high = summary.result(2).and_then(|r| r.output()).unwrap();
        assert_eq!(high.priority, Priority::High);
        assert_eq!(high.title, "file taxes");
    }
}

#[tokio::test]
async fn test_batch_create_rejects_empty_batch() {
    let service = memory_service(ConcurrencyStrategy::WorkerPool);
    let err = service.batch_create(vec![]).await.unwrap_err();
    assert!(matches!(err, BatchError::EmptyBatch));
}

#[tokio::test]
async fn test_batch_create_invalid_limit() {
    let service = TodoService::new(
        Arc::new(InMemoryTodoRepository::new()),
        BatchExecutor::default().with_concurrency_limit(0),
    );
    let err = service
        .batch_create(vec![NewTodo::new("a")])
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidConcurrencyLimit(0)));
}

#[tokio::test]
async fn test_crud_round_trip() {
    let service = memory_service(ConcurrencyStrategy::WorkerPool);

    let todo = service.create(NewTodo::new("write tests")).await.unwrap();
    assert_eq!(todo.priority, Priority::Medium);
    assert!(!todo.completed);

    let updated = service
        .update(
            todo.id,
            TodoPatch {
                completed: Some(true),
                title: Some("write more tests".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.completed);
    assert_eq!(updated.title, "write more tests");
    assert!(updated.updated_at >= todo.updated_at);

    service.delete(todo.id).await.unwrap();
    assert!(matches!(
        service.get(todo.id).await,
        Err(RepositoryError::NotFound(_))
    ));

    let restored = service.restore(todo.id).await.unwrap();
    assert_eq!(restored.title, "write more tests");
    assert!(restored.is_active());
}

#[tokio::test]
async fn test_listing_paginates_and_filters() {
    let service = memory_service(ConcurrencyStrategy::SemaphorePerItem);
    let items: Vec<NewTodo> = (0..25)
        .map(|i| {
            let priority = if i % 5 == 0 { "high" } else { "low" };
            NewTodo::new(format!("task {}", i)).with_priority(priority)
        })
        .collect();
    let summary = service.batch_create(items).await.unwrap();
    assert!(summary.all_succeeded());

    let second = service
        .list(TodoFilter::default(), PageRequest::new(2, 10))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 10);
    assert_eq!(second.total, 25);
    assert_eq!(second.total_pages, 3);
    assert!(second
        .items
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));

    let high = service
        .list(
            TodoFilter {
                priority: Some(Priority::High),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(high.total, 5);
    assert!(high.items.iter().all(|t| t.priority == Priority::High));
}

#[tokio::test]
async fn test_file_backend_lacks_optional_capabilities() {
    let dir = TempDir::new().unwrap();
    let repo = JsonFileTodoRepository::open(dir.path().join("todos.json"))
        .await
        .unwrap();
    let service = TodoService::new(
        Arc::new(repo),
        BatchExecutor::default().with_concurrency_limit(2),
    );

    let caps = service.capabilities();
    assert!(!caps.listing);
    assert!(!caps.restore);

    let todo = service.create(NewTodo::new("persisted")).await.unwrap();
    service.delete(todo.id).await.unwrap();

    assert!(matches!(
        service.restore(todo.id).await,
        Err(RepositoryError::Unsupported("restore"))
    ));
    assert!(matches!(
        service
            .list(TodoFilter::default(), PageRequest::default())
            .await,
        Err(RepositoryError::Unsupported("listing"))
    ));
}

#[tokio::test]
async fn test_file_backend_batch_create_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("todos.json");

    let service = TodoService::new(
        Arc::new(JsonFileTodoRepository::open(&path).await.unwrap()),
        BatchExecutor::default()
            .with_concurrency_limit(4)
            .with_strategy(ConcurrencyStrategy::WorkerPool),
    );
    let summary = service.batch_create(mixed_batch()).await.unwrap();
    assert_eq!(summary.success_count, 3);

    let reopened = JsonFileTodoRepository::open(&path).await.unwrap();
    for todo in summary.outputs() {
        assert_eq!(&reopened.get(todo.id).await.unwrap(), todo);
    }

    let on_disk: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk.len(), 3);
}
