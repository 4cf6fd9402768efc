//! Orchestrator: sequences "scan if not done" and "process one embedding
//! batch", and decides when the pipeline has gone idle.
//!
//! `run_cycle` is the single entry point shared by the foreground CLI loop
//! and the periodic daemon trigger. A reentrancy guard keeps a single cycle
//! in flight; an overlapping call no-ops with `CycleOutcome::Busy` instead of
//! double-processing a batch.

mod jobs;

pub use jobs::{EmbeddingJobPayload, JobBatchOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::db::{PhotoStore, StatusCounts};
use crate::embed::Embedder;
use crate::error::Result;
use crate::scanner::{LibraryScanner, ScanProgress};
use crate::source::MediaSource;
use crate::worker::{BatchOutcome, EmbeddingWorker};

/// Outcome of one pipeline cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No pending work remains; the caller may stop scheduling cycles.
    Idle,
    /// Work was done and more likely remains.
    MoreWork,
    /// Another cycle is already in flight; nothing was done.
    Busy,
}

/// Receives status snapshots after each cycle. Polling the store directly is
/// an equally valid binding; this push interface just decouples consumers
/// from any particular refresh cadence.
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, counts: &StatusCounts);
}

pub struct Orchestrator {
    store: Arc<PhotoStore>,
    scanner: LibraryScanner,
    worker: EmbeddingWorker,
    batch_size: usize,
    cancel: Arc<AtomicBool>,
    cycle_in_flight: AtomicBool,
    observers: Vec<Arc<dyn StatusObserver>>,
    embedder: Arc<dyn Embedder>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<PhotoStore>,
        embedder: Arc<dyn Embedder>,
        scanner: LibraryScanner,
        pool_size: usize,
        batch_size: usize,
    ) -> Self {
        let worker = EmbeddingWorker::new(Arc::clone(&store), Arc::clone(&embedder), pool_size);
        Self {
            store,
            scanner,
            worker,
            batch_size,
            cancel: Arc::new(AtomicBool::new(false)),
            cycle_in_flight: AtomicBool::new(false),
            observers: Vec::new(),
            embedder,
        }
    }

    /// Register an observer notified with fresh status counts after each
    /// cycle.
    pub fn add_observer(&mut self, observer: Arc<dyn StatusObserver>) {
        self.observers.push(observer);
    }

    /// Flag checked by the scan and worker loops before each unit of work.
    /// Setting it stops the current cycle promptly without corrupting state.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn store(&self) -> &Arc<PhotoStore> {
        &self.store
    }

    /// Run one pipeline cycle: complete the initial scan if it has not
    /// finished, then process a single batch of embeddings.
    pub fn run_cycle(
        &self,
        source: &dyn MediaSource,
        on_scan_progress: Option<&dyn Fn(ScanProgress)>,
    ) -> Result<CycleOutcome> {
        if self
            .cycle_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("cycle already in flight");
            return Ok(CycleOutcome::Busy);
        }
        let _guard = CycleGuard(&self.cycle_in_flight);

        if !self.store.is_scan_complete()? {
            let outcome = self.scanner.scan(source, &self.cancel, on_scan_progress)?;
            if !outcome.completed {
                // Cancelled mid-scan; partial progress is durable and a later
                // cycle restarts from page one
                self.notify_observers()?;
                return Ok(CycleOutcome::MoreWork);
            }
        }

        let outcome = self.worker.process_batch(self.batch_size, &self.cancel)?;
        self.notify_observers()?;

        match outcome {
            BatchOutcome::NoWork => Ok(CycleOutcome::Idle),
            BatchOutcome::Processed { .. } => Ok(CycleOutcome::MoreWork),
        }
    }

    fn notify_observers(&self) -> Result<()> {
        if self.observers.is_empty() {
            return Ok(());
        }
        let counts = self.store.status_counts()?;
        for observer in &self.observers {
            observer.on_status(&counts);
        }
        Ok(())
    }
}

/// Clears the in-flight flag when the cycle ends, on every exit path.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
