//! Library scanner: paginates the external photo source into store records.
//!
//! The scan is metadata-only and restartable. Upserts are idempotent (keyed
//! by asset id), so an interrupted scan simply restarts from page one on the
//! next invocation; the scan-complete flag is set only after the final page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::db::{EmbeddingStatus, PhotoRecord, PhotoStore};
use crate::error::Result;
use crate::source::{MediaSource, SourceItem};

/// Progress reported after each page. `scanned` is monotonically
/// non-decreasing within one scan; it may exceed `total` if the library grows
/// mid-scan, so consumers must clamp ratios to [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct ScanProgress {
    pub scanned: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOutcome {
    pub scanned: u64,
    pub total: u64,
    /// False when the scan was cancelled before exhausting the source.
    pub completed: bool,
}

pub struct LibraryScanner {
    store: Arc<PhotoStore>,
    page_size: usize,
    /// Cooperative pause between pages so the scan never monopolizes the
    /// thread for more than one page's worth of work.
    page_pause: Duration,
}

impl LibraryScanner {
    pub fn new(store: Arc<PhotoStore>, page_size: usize, page_pause: Duration) -> Self {
        Self { store, page_size, page_pause }
    }

    /// Walk every page of the source, upserting each item. The cancel flag is
    /// checked before each page; partial progress already written stays valid.
    pub fn scan(
        &self,
        source: &dyn MediaSource,
        cancel: &AtomicBool,
        on_progress: Option<&dyn Fn(ScanProgress)>,
    ) -> Result<ScanOutcome> {
        let total = source.count()?;
        tracing::info!(total, "starting library scan");

        let mut scanned: u64 = 0;
        let mut cursor: Option<String> = None;

        if let Some(progress) = on_progress {
            progress(ScanProgress { scanned, total });
        }

        loop {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!(scanned, "scan cancelled");
                return Ok(ScanOutcome { scanned, total, completed: false });
            }

            let page = source.list_page(self.page_size, cursor.as_deref())?;
            for item in &page.items {
                self.store.upsert_photo(&to_record(item))?;
            }
            scanned += page.items.len() as u64;

            if let Some(progress) = on_progress {
                progress(ScanProgress { scanned, total });
            }

            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
            std::thread::sleep(self.page_pause);
        }

        self.store.set_scan_complete()?;
        tracing::info!(scanned, total, "library scan complete");
        Ok(ScanOutcome { scanned, total, completed: true })
    }
}

pub(crate) fn to_record(item: &SourceItem) -> PhotoRecord {
    PhotoRecord {
        id: item.id.clone(),
        uri: item.uri.clone(),
        created_at: item.created_at,
        width: item.width,
        height: item.height,
        status: EmbeddingStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::error::PipelineError;
    use crate::source::SourcePage;

    /// Source backed by a fixed item list, paginated by offset cursors.
    struct FixedSource {
        items: Vec<SourceItem>,
        pages_served: Mutex<usize>,
    }

    impl FixedSource {
        fn with_items(n: usize) -> Self {
            let items = (0..n)
                .map(|i| SourceItem {
                    id: format!("asset-{i}"),
                    uri: format!("file:///photos/{i}.jpg"),
                    created_at: i as i64,
                    width: Some(640),
                    height: Some(480),
                })
                .collect();
            Self { items, pages_served: Mutex::new(0) }
        }
    }

    impl MediaSource for FixedSource {
        fn count(&self) -> crate::error::Result<u64> {
            Ok(self.items.len() as u64)
        }

        fn list_page(
            &self,
            page_size: usize,
            cursor: Option<&str>,
        ) -> crate::error::Result<SourcePage> {
            *self.pages_served.lock().unwrap() += 1;
            let offset: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let end = (offset + page_size).min(self.items.len());
            let has_more = end < self.items.len();
            Ok(SourcePage {
                items: self.items[offset..end].to_vec(),
                next_cursor: has_more.then(|| end.to_string()),
                has_more,
            })
        }
    }

    struct FailingSource;

    impl MediaSource for FailingSource {
        fn count(&self) -> crate::error::Result<u64> {
            Ok(10)
        }

        fn list_page(
            &self,
            _page_size: usize,
            _cursor: Option<&str>,
        ) -> crate::error::Result<SourcePage> {
            Err(PipelineError::SourceUnavailable("gone".to_string()))
        }
    }

    fn scanner(store: &Arc<PhotoStore>, page_size: usize) -> LibraryScanner {
        LibraryScanner::new(Arc::clone(store), page_size, Duration::ZERO)
    }

    #[test]
    fn test_scan_250_items_in_three_pages() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        let source = FixedSource::with_items(250);
        let cancel = AtomicBool::new(false);

        let progress_log: Mutex<Vec<(u64, u64)>> = Mutex::new(Vec::new());
        let on_progress = |p: ScanProgress| {
            progress_log.lock().unwrap().push((p.scanned, p.total));
        };

        let outcome = scanner(&store, 100)
            .scan(&source, &cancel, Some(&on_progress))
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.scanned, 250);
        assert_eq!(*source.pages_served.lock().unwrap(), 3);
        assert_eq!(store.status_counts().unwrap().total, 250);
        assert!(store.is_scan_complete().unwrap());

        // Monotonically non-decreasing scanned counts
        let log = progress_log.lock().unwrap();
        assert!(log.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(log.last(), Some(&(250, 250)));
    }

    #[test]
    fn test_empty_source_completes_immediately() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        let source = FixedSource::with_items(0);
        let cancel = AtomicBool::new(false);

        let progress_log: Mutex<Vec<(u64, u64)>> = Mutex::new(Vec::new());
        let on_progress = |p: ScanProgress| {
            progress_log.lock().unwrap().push((p.scanned, p.total));
        };

        let outcome = scanner(&store, 100)
            .scan(&source, &cancel, Some(&on_progress))
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.scanned, 0);
        assert!(store.is_scan_complete().unwrap());
        assert!(progress_log.lock().unwrap().contains(&(0, 0)));
    }

    #[test]
    fn test_rescan_is_idempotent_and_preserves_status() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        let source = FixedSource::with_items(10);
        let cancel = AtomicBool::new(false);
        let scanner = scanner(&store, 4);

        scanner.scan(&source, &cancel, None).unwrap();
        store.set_status("asset-0", EmbeddingStatus::Complete).unwrap();

        scanner.scan(&source, &cancel, None).unwrap();

        let counts = store.status_counts().unwrap();
        assert_eq!(counts.total, 10);
        assert_eq!(
            store.get_photo("asset-0").unwrap().unwrap().status,
            EmbeddingStatus::Complete
        );
    }

    #[test]
    fn test_cancelled_scan_does_not_set_completion_flag() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        let source = FixedSource::with_items(50);
        let cancel = AtomicBool::new(true);

        let outcome = scanner(&store, 10).scan(&source, &cancel, None).unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.scanned, 0);
        assert!(!store.is_scan_complete().unwrap());
    }

    #[test]
    fn test_source_failure_aborts_without_completion() {
        let store = Arc::new(PhotoStore::open_in_memory().unwrap());
        let cancel = AtomicBool::new(false);

        let result = scanner(&store, 10).scan(&FailingSource, &cancel, None);
        assert!(matches!(result, Err(PipelineError::SourceUnavailable(_))));
        assert!(!store.is_scan_complete().unwrap());
    }
}
