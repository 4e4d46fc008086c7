use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::EnvFilter;

use writeback_core::{
    EnqueueOutcome, InMemoryIssueSink, Issue, IssueProvider, IssueReceiver, IssueSeverity,
    PendingWriteRegistry, PersistError, Persister, WriteTask,
};

/// Persists write tasks as files under a cache directory.
struct DiskStore {
    root: PathBuf,
    issues: Arc<InMemoryIssueSink>,
}

impl DiskStore {
    async fn write_to_disk(&self, task: &WriteTask) -> Result<(), PersistError> {
        // Keys look like "relative/path|modified-ts"; the path part decides
        // where the bytes land.
        let rel = task.key().split('|').next().unwrap_or(task.key());
        let dest = self.root.join(rel);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, task.buffer()).await?;
        Ok(())
    }
}

#[async_trait]
impl Persister for DiskStore {
    async fn persist(&self, task: &WriteTask) -> Result<(), PersistError> {
        let result = self.write_to_disk(task).await;
        if let Err(e) = &result {
            self.issues.accept_issue(
                Issue::new(IssueSeverity::Error, "cache write failed")
                    .with_details(format!("{}: {e}", task.key())),
            );
        }
        result
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // (A) a temp cache directory, an issue sink, and a deliberately tiny
    // queue bound so the demo can show backpressure.
    let root = std::env::temp_dir().join(format!("writeback-demo-{}", std::process::id()));
    let issues = Arc::new(InMemoryIssueSink::new("disk-cache"));
    let store = Arc::new(DiskStore {
        root: root.clone(),
        issues: Arc::clone(&issues),
    });
    let registry = Arc::new(PendingWriteRegistry::with_max_queue_bytes(64 * 1024));

    // (B) a few distinct targets go straight through.
    let mut handles = Vec::new();
    for i in 0..3 {
        let task = WriteTask::new(format!("thumbs/{i}.jpg|1700000000"), vec![i as u8; 16 * 1024]);
        match registry.enqueue_with(task, store.clone() as Arc<dyn Persister>) {
            EnqueueOutcome::Enqueued { handle } => {
                info!(thumb = i, "enqueued");
                handles.push(handle);
            }
            other => info!(thumb = i, ?other, "not admitted"),
        }
    }

    // (C) a duplicate of an in-flight target is a no-op for the caller.
    let dup = WriteTask::new("thumbs/0.jpg|1700000000", vec![0u8; 16 * 1024]);
    let outcome = registry.enqueue_with(dup, store.clone() as Arc<dyn Persister>);
    info!(?outcome, "duplicate of thumbs/0.jpg");

    // (D) a write past the bound falls back to a synchronous persist.
    let big = WriteTask::new("originals/big.png|1700000000", vec![7u8; 48 * 1024]);
    match registry.enqueue_with(big, store.clone() as Arc<dyn Persister>) {
        EnqueueOutcome::QueueFull => {
            info!("queue full; persisting synchronously");
            let big = WriteTask::new("originals/big.png|1700000000", vec![7u8; 48 * 1024]);
            if let Err(e) = store.persist(&big).await {
                info!(error = %e, "synchronous fallback failed");
            }
        }
        other => info!(?other, "expected QueueFull for the oversized write"),
    }

    let stats = registry.stats();
    info!(depth = stats.depth, buffered_bytes = stats.buffered_bytes, "registry stats");

    for handle in handles {
        let _ = handle.await;
    }

    // (E) drive one write into a failure so the issue sink has something to
    // show: the destination is a file, not a directory.
    let clash = WriteTask::new("thumbs/0.jpg/child|1700000001", vec![1u8; 8]);
    if let EnqueueOutcome::Enqueued { handle } =
        registry.enqueue_with(clash, store.clone() as Arc<dyn Persister>)
    {
        let _ = handle.await;
    }

    println!(
        "issues: {}",
        serde_json::to_string_pretty(&issues.issues()).expect("issues serialize")
    );

    let _ = tokio::fs::remove_dir_all(&root).await;
}
