//! Embedding generation.
//!
//! The pipeline treats the neural network as an opaque function: a photo
//! locator in, a fixed-length vector out. The production implementation runs
//! a CLIP visual encoder under ONNX Runtime.

mod model;

pub use model::ClipEmbedder;

use crate::error::Result;

/// An embedding function with a lazily loaded backing model.
///
/// Implementations must be shareable across the worker pool: `embed` may be
/// called from multiple threads, and `ensure_loaded` must load the model at
/// most once per instance with concurrent callers sharing the in-flight load.
pub trait Embedder: Send + Sync {
    /// Load the backing model if not already loaded. Idempotent.
    fn ensure_loaded(&self) -> Result<()>;

    /// Compute the embedding for one photo. Never returns a partial vector.
    fn embed(&self, uri: &str) -> Result<Vec<f32>>;

    /// Tag identifying which model produced the vectors, stored alongside
    /// every embedding for future re-embedding when the model changes.
    fn model_version(&self) -> &str;
}
