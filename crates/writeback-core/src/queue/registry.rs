//! Pending-write registry: a bounded, key-deduplicated set of in-flight
//! writes, each executed on a background task and removed on completion.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, warn};

use crate::domain::WriteTask;
use crate::error::PersistError;
use crate::observability::RegistryStats;
use crate::ports::Persister;
use crate::queue::EnqueueOutcome;

/// Default bound on buffered-but-not-yet-persisted bytes: 100 MiB.
pub const DEFAULT_MAX_QUEUE_BYTES: u64 = 100 * 1024 * 1024;

/// Registry of pending writes.
///
/// Design:
/// - One mutex guards the entry map and nothing else. The lock is never
///   held across an await; persistence I/O runs entirely outside it.
/// - At most one entry per key: a second writer for the same target is
///   turned away, not queued behind the first.
/// - Admission is bounded by the sum of buffer lengths. A task whose own
///   size would push the total past the bound is rejected; the entry being
///   admitted may itself overshoot transiently, matching the bound's
///   "checked at admission" contract.
/// - Every admitted entry is removed exactly once when its persistence
///   operation settles, whatever the exit path (success, failure, panic).
///
/// Construct one per cache instance and share it via `Arc`; enqueue must be
/// called from within a tokio runtime.
pub struct PendingWriteRegistry {
    entries: Mutex<HashMap<String, Arc<WriteTask>>>,
    max_queue_bytes: AtomicU64,
}

impl Default for PendingWriteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingWriteRegistry {
    pub fn new() -> Self {
        Self::with_max_queue_bytes(DEFAULT_MAX_QUEUE_BYTES)
    }

    pub fn with_max_queue_bytes(max_queue_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_queue_bytes: AtomicU64::new(max_queue_bytes),
        }
    }

    pub fn max_queue_bytes(&self) -> u64 {
        self.max_queue_bytes.load(Ordering::Relaxed)
    }

    /// Adjust the bound at runtime. Entries already admitted are unaffected;
    /// the new value applies from the next admission decision on.
    pub fn set_max_queue_bytes(&self, max_queue_bytes: u64) {
        self.max_queue_bytes.store(max_queue_bytes, Ordering::Relaxed);
    }

    // A poisoned lock must not leak slots or wedge admission, so recover the
    // guard instead of propagating the poison.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Arc<WriteTask>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn buffered_bytes_locked(entries: &HashMap<String, Arc<WriteTask>>) -> u64 {
        entries.values().map(|task| task.buffer_len()).sum()
    }

    /// Sum of buffer lengths across all pending entries.
    ///
    /// Recomputed by full enumeration under the lock on every call. Queue
    /// depth stays small in practice, so an incremental counter would buy
    /// little and add a second piece of state to keep consistent.
    pub fn queued_buffer_bytes(&self) -> u64 {
        Self::buffered_bytes_locked(&self.lock_entries())
    }

    /// The in-flight task for `key`, if any. Lets callers wait on an ongoing
    /// write instead of re-reading a target that is about to change.
    pub fn get(&self, key: &str) -> Option<Arc<WriteTask>> {
        self.lock_entries().get(key).cloned()
    }

    /// Snapshot of depth and buffered bytes, taken in one pass under the lock.
    pub fn stats(&self) -> RegistryStats {
        let entries = self.lock_entries();
        RegistryStats {
            depth: entries.len(),
            buffered_bytes: Self::buffered_bytes_locked(&entries),
        }
    }

    /// Remove the entry for `task`'s key. Idempotent: removing an absent or
    /// never-admitted task is a no-op.
    pub fn remove(&self, task: &WriteTask) {
        self.lock_entries().remove(task.key());
    }

    /// Offer `task` for background persistence.
    ///
    /// The capacity check, the duplicate-key check, and the insertion happen
    /// as one critical section, so two callers racing on the same key cannot
    /// both be admitted and a burst of callers cannot overshoot the bound.
    ///
    /// On [`EnqueueOutcome::Enqueued`], `persist` runs on a spawned task and
    /// the registry removes the entry when it settles. A failure result is
    /// logged and otherwise dropped: the caller has already returned, there
    /// is no retry, and surfacing the failure further (e.g. into an issue
    /// sink) is the persistence operation's job.
    pub fn enqueue<F, Fut>(self: &Arc<Self>, task: WriteTask, persist: F) -> EnqueueOutcome
    where
        F: FnOnce(Arc<WriteTask>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), PersistError>> + Send + 'static,
    {
        let task = Arc::new(task);

        {
            let mut entries = self.lock_entries();
            let queued = Self::buffered_bytes_locked(&entries);
            if queued + task.buffer_len() > self.max_queue_bytes.load(Ordering::Relaxed) {
                return EnqueueOutcome::QueueFull;
            }
            if entries.contains_key(task.key()) {
                return EnqueueOutcome::AlreadyPresent;
            }
            entries.insert(task.key().to_owned(), Arc::clone(&task));
        }
        // The slot is reserved; spawning outside the lock keeps the critical
        // section down to map accesses.

        let guard = SlotGuard {
            registry: Arc::clone(self),
            task: Arc::clone(&task),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = persist(Arc::clone(&task)).await {
                warn!(
                    key = %task.key(),
                    bytes = task.buffer_len(),
                    error = %e,
                    "background write failed; slot will be released"
                );
            }
        });

        EnqueueOutcome::Enqueued { handle }
    }

    /// [`enqueue`](Self::enqueue) for callers holding a long-lived
    /// [`Persister`] rather than a one-off closure.
    pub fn enqueue_with(
        self: &Arc<Self>,
        task: WriteTask,
        persister: Arc<dyn Persister>,
    ) -> EnqueueOutcome {
        self.enqueue(task, move |task| async move {
            persister.persist(&task).await
        })
    }
}

/// Releases an admitted task's slot when the background execution exits.
///
/// Held across the persist await so that every exit path, including a panic
/// unwinding through the spawned task, runs the removal exactly once.
struct SlotGuard {
    registry: Arc<PendingWriteRegistry>,
    task: Arc<WriteTask>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(key = %self.task.key(), "persistence operation panicked");
        }
        self.registry.remove(&self.task);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    use super::*;

    fn task(key: &str, len: usize) -> WriteTask {
        WriteTask::new(key, vec![0u8; len])
    }

    fn expect_enqueued(outcome: EnqueueOutcome) -> JoinHandle<()> {
        match outcome {
            EnqueueOutcome::Enqueued { handle } => handle,
            other => panic!("expected Enqueued, got {other:?}"),
        }
    }

    /// Enqueue a task whose persist op waits until the returned sender is
    /// dropped or fired, holding the entry in flight.
    fn enqueue_gated(
        registry: &Arc<PendingWriteRegistry>,
        task: WriteTask,
    ) -> (oneshot::Sender<()>, EnqueueOutcome) {
        let (tx, rx) = oneshot::channel();
        let outcome = registry.enqueue(task, move |_| async move {
            let _ = rx.await;
            Ok(())
        });
        (tx, outcome)
    }

    #[tokio::test]
    async fn admitted_task_is_visible_until_completion() {
        let registry = Arc::new(PendingWriteRegistry::new());

        let (release, outcome) = enqueue_gated(&registry, task("k1", 10));
        let handle = expect_enqueued(outcome);

        let in_flight = registry.get("k1").expect("entry should be in flight");
        assert_eq!(in_flight.buffer_len(), 10);
        assert_eq!(registry.queued_buffer_bytes(), 10);

        release.send(()).unwrap();
        handle.await.unwrap();

        assert!(registry.get("k1").is_none());
        assert_eq!(registry.queued_buffer_bytes(), 0);
    }

    #[tokio::test]
    async fn duplicate_key_is_turned_away_then_admitted_after_completion() {
        // Scenario B.
        let registry = Arc::new(PendingWriteRegistry::new());

        let (release, first) = enqueue_gated(&registry, task("k1", 10));
        let handle = expect_enqueued(first);

        let second = registry.enqueue(task("k1", 10), |_| async { Ok(()) });
        assert!(matches!(second, EnqueueOutcome::AlreadyPresent));

        release.send(()).unwrap();
        handle.await.unwrap();

        let third = registry.enqueue(task("k1", 10), |_| async { Ok(()) });
        expect_enqueued(third).await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_rejects_until_space_frees_up() {
        // Scenario A: bound 100, a 60-byte write blocks a 50-byte one.
        let registry = Arc::new(PendingWriteRegistry::with_max_queue_bytes(100));

        let (release, first) = enqueue_gated(&registry, task("k1", 60));
        let handle = expect_enqueued(first);

        let second = registry.enqueue(task("k2", 50), |_| async { Ok(()) });
        assert!(matches!(second, EnqueueOutcome::QueueFull));
        assert!(registry.get("k2").is_none());

        release.send(()).unwrap();
        handle.await.unwrap();

        let retry = registry.enqueue(task("k2", 50), |_| async { Ok(()) });
        expect_enqueued(retry).await.unwrap();
    }

    #[tokio::test]
    async fn task_exactly_at_the_bound_is_admitted() {
        let registry = Arc::new(PendingWriteRegistry::with_max_queue_bytes(100));

        let outcome = registry.enqueue(task("k1", 100), |_| async { Ok(()) });
        expect_enqueued(outcome).await.unwrap();

        let over = registry.enqueue(task("k2", 101), |_| async { Ok(()) });
        assert!(matches!(over, EnqueueOutcome::QueueFull));
    }

    #[tokio::test]
    async fn capacity_check_runs_before_duplicate_check() {
        // A duplicate key that would also overflow reports QueueFull, as the
        // admission sequence checks capacity first.
        let registry = Arc::new(PendingWriteRegistry::with_max_queue_bytes(100));

        let (_release, first) = enqueue_gated(&registry, task("k1", 60));
        expect_enqueued(first);

        let dup_oversized = registry.enqueue(task("k1", 60), |_| async { Ok(()) });
        assert!(matches!(dup_oversized, EnqueueOutcome::QueueFull));
    }

    #[tokio::test]
    async fn failing_persist_still_frees_the_slot() {
        // Scenario C.
        let registry = Arc::new(PendingWriteRegistry::new());

        let outcome = registry.enqueue(task("k1", 10), |_| async {
            Err(PersistError::other("disk on fire"))
        });
        expect_enqueued(outcome).await.unwrap();

        assert!(registry.get("k1").is_none());
        assert_eq!(registry.queued_buffer_bytes(), 0);
    }

    #[tokio::test]
    async fn panicking_persist_still_frees_the_slot() {
        let registry = Arc::new(PendingWriteRegistry::new());

        let outcome = registry.enqueue(task("k1", 10), |_| async {
            panic!("persist blew up");
        });
        let join = expect_enqueued(outcome).await;
        assert!(join.is_err());

        assert!(registry.get("k1").is_none());

        // The registry must stay usable after the panic.
        let again = registry.enqueue(task("k1", 10), |_| async { Ok(()) });
        expect_enqueued(again).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_enqueues_on_one_key_admit_exactly_one() {
        let registry = Arc::new(PendingWriteRegistry::new());
        let admitted = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let (release, rx) = oneshot::channel::<()>();

        // The first admitted write parks on the gate so the rest race
        // against a genuinely in-flight entry.
        let gate = Arc::new(tokio::sync::Mutex::new(Some(rx)));

        let mut joins = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            let admitted = Arc::clone(&admitted);
            let rejected = Arc::clone(&rejected);
            let gate = Arc::clone(&gate);
            joins.push(tokio::spawn(async move {
                let outcome = registry.enqueue(task("hot-key", 8), move |_| async move {
                    let rx = gate.lock().await.take();
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Ok(())
                });
                match outcome {
                    EnqueueOutcome::Enqueued { .. } => admitted.fetch_add(1, Ordering::SeqCst),
                    EnqueueOutcome::AlreadyPresent => rejected.fetch_add(1, Ordering::SeqCst),
                    EnqueueOutcome::QueueFull => panic!("bound is nowhere near reached"),
                };
            }));
        }
        for join in joins {
            join.await.unwrap();
        }
        release.send(()).unwrap();

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 15);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = Arc::new(PendingWriteRegistry::new());

        let never_admitted = task("ghost", 5);
        registry.remove(&never_admitted);
        assert_eq!(registry.stats().depth, 0);

        let (_release, outcome) = enqueue_gated(&registry, task("k1", 10));
        expect_enqueued(outcome);

        let stand_in = task("k1", 10);
        registry.remove(&stand_in);
        registry.remove(&stand_in);
        assert_eq!(registry.stats().depth, 0);
    }

    #[tokio::test]
    async fn stats_snapshot_tracks_depth_and_bytes() {
        let registry = Arc::new(PendingWriteRegistry::new());
        assert_eq!(registry.stats().depth, 0);
        assert_eq!(registry.stats().buffered_bytes, 0);

        let (_r1, o1) = enqueue_gated(&registry, task("a", 30));
        let (_r2, o2) = enqueue_gated(&registry, task("b", 12));
        expect_enqueued(o1);
        expect_enqueued(o2);

        let stats = registry.stats();
        assert_eq!(stats.depth, 2);
        assert_eq!(stats.buffered_bytes, 42);
    }

    #[tokio::test]
    async fn raising_the_bound_admits_previously_rejected_work() {
        let registry = Arc::new(PendingWriteRegistry::with_max_queue_bytes(10));

        let rejected = registry.enqueue(task("big", 50), |_| async { Ok(()) });
        assert!(matches!(rejected, EnqueueOutcome::QueueFull));

        registry.set_max_queue_bytes(64);
        assert_eq!(registry.max_queue_bytes(), 64);

        let outcome = registry.enqueue(task("big", 50), |_| async { Ok(()) });
        expect_enqueued(outcome).await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_with_drives_a_persister() {
        use async_trait::async_trait;

        struct CountingPersister {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Persister for CountingPersister {
            async fn persist(&self, task: &WriteTask) -> Result<(), PersistError> {
                assert_eq!(task.key(), "k1");
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let registry = Arc::new(PendingWriteRegistry::new());
        let persister = Arc::new(CountingPersister {
            calls: AtomicUsize::new(0),
        });

        let outcome = registry.enqueue_with(task("k1", 10), persister.clone());
        expect_enqueued(outcome).await.unwrap();

        assert_eq!(persister.calls.load(Ordering::SeqCst), 1);
        assert!(registry.get("k1").is_none());
    }
}
