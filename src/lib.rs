//! Photodex: on-device photo indexing pipeline.
//!
//! Enumerates a photo library through a paginated source, computes a vector
//! embedding per photo with a local ONNX model, and tracks per-photo status
//! in SQLite so the whole pipeline is resumable after interruption.

pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod scanner;
pub mod source;
pub mod worker;

pub use config::Config;
pub use db::{EmbeddingStatus, PhotoRecord, PhotoStore, StatusCounts};
pub use embed::{ClipEmbedder, Embedder};
pub use error::{PipelineError, Result};
pub use pipeline::{CycleOutcome, Orchestrator, StatusObserver};
pub use scanner::{LibraryScanner, ScanProgress};
pub use source::{FsMediaSource, MediaSource};
pub use worker::{BatchOutcome, EmbeddingWorker};
