//! Batch creation example
//!
//! Creates a batch of to-dos with bounded concurrency, some of them invalid,
//! then prints the per-item outcome, the listing and the Prometheus metrics.
//!
//! Run with `RUST_LOG=batchpool=debug` for per-unit logs.

use anyhow::Context;
use batchpool::batch::{BatchExecutor, ConcurrencyStrategy};
use batchpool::metrics::export_metrics;
use batchpool::telemetry::init_tracing;
use batchpool::todo::{InMemoryTodoRepository, NewTodo, PageRequest, TodoFilter, TodoService};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("batchpool=info").map_err(|e| anyhow::anyhow!(e))?;

    let service = TodoService::new(
        Arc::new(InMemoryTodoRepository::new()),
        BatchExecutor::default()
            .with_concurrency_limit(3)
            .with_strategy(ConcurrencyStrategy::SemaphorePerItem)
            .with_progress_callback(|progress| {
                println!(
                    "  progress: {}/{} ({} ok, {} failed)",
                    progress.completed, progress.total, progress.succeeded, progress.failed
                );
            }),
    );

    let items = vec![
        NewTodo::new("Write release notes").with_priority("high"),
        NewTodo::new("Review open pull requests"),
        NewTodo::new("   "),
        NewTodo::new("Book venue").with_priority("urgent"),
        NewTodo::new("Update dependencies").with_description("cargo update, then audit"),
    ];

    println!("Creating {} to-dos", items.len());
    let summary = service
        .batch_create(items)
        .await
        .context("batch create failed")?;

    println!(
        "\nDone in {:?}: {} created, {} rejected, peak concurrency {}",
        summary.elapsed, summary.success_count, summary.failure_count, summary.peak_concurrency
    );
    for result in &summary.results {
        match (result.output(), result.error_message()) {
            (Some(todo), _) => println!("  #{} created {} ({})", result.index(), todo.title, todo.priority),
            (None, Some(message)) => println!("  #{} rejected: {}", result.index(), message),
            (None, None) => unreachable!("a result carries an output or an error"),
        }
    }

    let page = service
        .list(TodoFilter::default(), PageRequest::default())
        .await
        .context("listing failed")?;
    println!("\n{} active to-dos on page {}/{}", page.total, page.page, page.total_pages);

    println!("\n{}", serde_json::to_string_pretty(&summary)?);
    println!("\n{}", export_metrics().map_err(|e| anyhow::anyhow!(e))?);

    Ok(())
}
