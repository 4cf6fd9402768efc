//! Embedding worker: drains batches of PENDING photos through the embedding
//! function.
//!
//! Each photo is processed independently; a decode or inference failure marks
//! that photo FAILED and the batch continues. FAILED is terminal: failed items
//! are excluded from future batches and are never retried automatically.
//!
//! A small fixed-size pool parallelizes the I/O-bound work while capping peak
//! resource usage; model inference is memory and CPU heavy, so unbounded
//! parallelism risks OOM or thermal throttling on-device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::db::{EmbeddingStatus, PhotoRecord, PhotoStore};
use crate::embed::Embedder;
use crate::error::{PipelineError, Result};

/// Result of one batch invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// No PENDING photos existed at call time.
    NoWork,
    /// At least one photo was touched.
    Processed { completed: usize, failed: usize },
}

pub struct EmbeddingWorker {
    store: Arc<PhotoStore>,
    embedder: Arc<dyn Embedder>,
    pool_size: usize,
}

impl EmbeddingWorker {
    pub fn new(store: Arc<PhotoStore>, embedder: Arc<dyn Embedder>, pool_size: usize) -> Self {
        Self {
            store,
            embedder,
            pool_size: pool_size.max(1),
        }
    }

    /// Process up to `batch_size` PENDING photos, newest first.
    ///
    /// The model is loaded lazily on first use; a load failure is fatal for
    /// the cycle since no items can be processed. The cancel flag is checked
    /// before each photo; an embedding call already in flight runs to its
    /// success or failure.
    pub fn process_batch(&self, batch_size: usize, cancel: &AtomicBool) -> Result<BatchOutcome> {
        let batch = self.store.pending_batch(batch_size)?;
        if batch.is_empty() {
            return Ok(BatchOutcome::NoWork);
        }

        self.embedder.ensure_loaded()?;

        let queue: Mutex<VecDeque<PhotoRecord>> = Mutex::new(batch.into());
        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let storage_error: Mutex<Option<PipelineError>> = Mutex::new(None);

        std::thread::scope(|scope| {
            for _ in 0..self.pool_size {
                scope.spawn(|| {
                    loop {
                        if cancel.load(Ordering::SeqCst) {
                            return;
                        }
                        if storage_error.lock().is_ok_and(|e| e.is_some()) {
                            return;
                        }
                        let Some(photo) = queue.lock().ok().and_then(|mut q| q.pop_front())
                        else {
                            return;
                        };
                        match self.process_one(&photo) {
                            Ok(true) => {
                                completed.fetch_add(1, Ordering::SeqCst);
                            }
                            Ok(false) => {
                                failed.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(e) => {
                                // Storage failure: stop the pool and surface it
                                if let Ok(mut slot) = storage_error.lock() {
                                    slot.get_or_insert(e);
                                }
                                return;
                            }
                        }
                    }
                });
            }
        });

        if let Some(e) = storage_error.lock().ok().and_then(|mut slot| slot.take()) {
            return Err(e);
        }

        let completed = completed.load(Ordering::SeqCst);
        let failed = failed.load(Ordering::SeqCst);
        tracing::info!(completed, failed, "embedding batch finished");
        Ok(BatchOutcome::Processed { completed, failed })
    }

    /// Embed one photo. Returns Ok(true) on success, Ok(false) when the item
    /// was recorded FAILED, and Err only for storage failures.
    fn process_one(&self, photo: &PhotoRecord) -> Result<bool> {
        match self.embedder.embed(&photo.uri) {
            Ok(vector) => {
                self.store
                    .store_embedding(&photo.id, &vector, self.embedder.model_version())?;
                self.store.set_status(&photo.id, EmbeddingStatus::Complete)?;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(photo_id = %photo.id, error = %e, "embedding failed");
                self.store.set_status(&photo.id, EmbeddingStatus::Failed)?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embedder that fails for configured ids and counts invocations.
    struct ScriptedEmbedder {
        fail_ids: Vec<String>,
        calls: AtomicUsize,
        loads: AtomicUsize,
    }

    impl ScriptedEmbedder {
        fn new(fail_ids: &[&str]) -> Self {
            Self {
                fail_ids: fail_ids.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
                loads: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for ScriptedEmbedder {
        fn ensure_loaded(&self) -> Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn embed(&self, uri: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.iter().any(|id| uri.contains(id.as_str())) {
                return Err(PipelineError::Embedding("decode error".to_string()));
            }
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn model_version(&self) -> &str {
            "test-model"
        }
    }

    fn seed_photos(store: &PhotoStore, n: usize) {
        for i in 0..n {
            store
                .upsert_photo(&PhotoRecord {
                    id: format!("p{i}"),
                    uri: format!("file:///photos/p{i}.jpg"),
                    created_at: i as i64,
                    width: None,
                    height: None,
                    status: EmbeddingStatus::Pending,
                })
                .unwrap();
        }
    }

    #[test]
    fn test_mixed_batch_records_both_outcomes() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        seed_photos(&store, 10);
        let embedder = Arc::new(ScriptedEmbedder::new(&["p3", "p7"]));
        let worker = EmbeddingWorker::new(Arc::clone(&store), embedder.clone(), 2);

        let cancel = AtomicBool::new(false);
        let outcome = worker.process_batch(25, &cancel).unwrap();
        assert_eq!(outcome, BatchOutcome::Processed { completed: 8, failed: 2 });

        let counts = store.status_counts().unwrap();
        assert_eq!(counts.indexed, 10);
        assert_eq!(store.count_embeddings().unwrap(), 8);

        // Embedding rows exist iff status is COMPLETE
        for i in 0..10 {
            let id = format!("p{i}");
            let status = store.get_photo(&id).unwrap().unwrap().status;
            let has_embedding = store.get_embedding(&id).unwrap().is_some();
            assert_eq!(has_embedding, status == EmbeddingStatus::Complete);
        }
    }

    #[test]
    fn test_empty_batch_makes_no_embed_calls() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        let embedder = Arc::new(ScriptedEmbedder::new(&[]));
        let worker = EmbeddingWorker::new(Arc::clone(&store), embedder.clone(), 2);

        let cancel = AtomicBool::new(false);
        let outcome = worker.process_batch(25, &cancel).unwrap();
        assert_eq!(outcome, BatchOutcome::NoWork);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(embedder.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_items_are_terminal() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        seed_photos(&store, 2);
        let embedder = Arc::new(ScriptedEmbedder::new(&["p0", "p1"]));
        let worker = EmbeddingWorker::new(Arc::clone(&store), embedder.clone(), 1);

        let cancel = AtomicBool::new(false);
        worker.process_batch(10, &cancel).unwrap();
        assert_eq!(store.pending_count().unwrap(), 0);

        // A second batch finds nothing: FAILED items are not re-queued
        let outcome = worker.process_batch(10, &cancel).unwrap();
        assert_eq!(outcome, BatchOutcome::NoWork);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_batch_size_bounds_work() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        seed_photos(&store, 10);
        let embedder = Arc::new(ScriptedEmbedder::new(&[]));
        let worker = EmbeddingWorker::new(Arc::clone(&store), embedder, 2);

        let cancel = AtomicBool::new(false);
        let outcome = worker.process_batch(4, &cancel).unwrap();
        assert_eq!(outcome, BatchOutcome::Processed { completed: 4, failed: 0 });
        assert_eq!(store.pending_count().unwrap(), 6);
    }

    #[test]
    fn test_model_load_failure_is_fatal_for_cycle() {
        struct BrokenEmbedder;
        impl Embedder for BrokenEmbedder {
            fn ensure_loaded(&self) -> Result<()> {
                Err(PipelineError::ModelLoad("missing model file".to_string()))
            }
            fn embed(&self, _uri: &str) -> Result<Vec<f32>> {
                unreachable!("embed must not run when the model failed to load")
            }
            fn model_version(&self) -> &str {
                "broken"
            }
        }

        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        seed_photos(&store, 3);
        let worker = EmbeddingWorker::new(Arc::clone(&store), Arc::new(BrokenEmbedder), 2);

        let cancel = AtomicBool::new(false);
        let result = worker.process_batch(10, &cancel);
        assert!(matches!(result, Err(PipelineError::ModelLoad(_))));
        // Nothing was touched
        assert_eq!(store.pending_count().unwrap(), 3);
    }

    #[test]
    fn test_cancel_stops_pool_promptly() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        seed_photos(&store, 10);
        let embedder = Arc::new(ScriptedEmbedder::new(&[]));
        let worker = EmbeddingWorker::new(Arc::clone(&store), embedder.clone(), 2);

        let cancel = AtomicBool::new(true);
        let outcome = worker.process_batch(10, &cancel).unwrap();
        // Cancelled before any unit of work
        assert_eq!(outcome, BatchOutcome::Processed { completed: 0, failed: 0 });
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.pending_count().unwrap(), 10);
    }
}
