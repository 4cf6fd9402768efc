//! External photo source abstraction.
//!
//! The pipeline consumes the library through an opaque paginated interface:
//! a one-shot count for the progress denominator and bounded pages addressed
//! by a continuation cursor. Pagination must tolerate repeated calls with the
//! same cursor, since an interrupted scan restarts from page one.

mod fs;

pub use fs::FsMediaSource;

use crate::error::Result;

/// One asset as reported by the source.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SourceItem {
    /// Stable identifier, unique within the source.
    pub id: String,
    /// Locator resolvable by the embedding function.
    pub uri: String,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One bounded page of assets.
#[derive(Debug, Clone)]
pub struct SourcePage {
    pub items: Vec<SourceItem>,
    /// Opaque continuation token for the next page, if any.
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// An enumerable, paginated photo library.
pub trait MediaSource {
    /// Total item count. Used only as a progress denominator; may be stale by
    /// the time the scan completes.
    fn count(&self) -> Result<u64>;

    /// Fetch up to `page_size` items starting at `cursor` (None for the first
    /// page).
    fn list_page(&self, page_size: usize, cursor: Option<&str>) -> Result<SourcePage>;
}
