//! Filesystem-backed photo source.
//!
//! Walks a root directory for image files and presents them as a paginated
//! library. Enumeration order is the sorted path list, so a cursor (an offset
//! into that list) stays meaningful across repeated calls even when files are
//! added or removed between pages.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use super::{MediaSource, SourceItem, SourcePage};
use crate::error::{PipelineError, Result};

pub struct FsMediaSource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FsMediaSource {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self { root: root.into(), extensions }
    }

    /// Enumerate matching files under the root, sorted by path.
    fn enumerate(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(PipelineError::SourceUnavailable(format!(
                "source root does not exist: {}",
                self.root.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                if e.io_error().map(|io| io.kind()) == Some(ErrorKind::PermissionDenied) {
                    PipelineError::PermissionDenied
                } else {
                    PipelineError::SourceUnavailable(e.to_string())
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if self.matches_extension(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        self.extensions.iter().any(|allowed| allowed == &ext)
    }

    fn item_for(&self, path: &Path) -> SourceItem {
        let created_at = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        // Header-only dimension probe; unreadable headers leave them unset
        let dims = image::image_dimensions(path).ok();

        let path_str = path.to_string_lossy().to_string();
        SourceItem {
            id: path_str.clone(),
            uri: path_str,
            created_at,
            width: dims.map(|(w, _)| w),
            height: dims.map(|(_, h)| h),
        }
    }
}

impl MediaSource for FsMediaSource {
    fn count(&self) -> Result<u64> {
        Ok(self.enumerate()?.len() as u64)
    }

    fn list_page(&self, page_size: usize, cursor: Option<&str>) -> Result<SourcePage> {
        let paths = self.enumerate()?;
        let offset: usize = match cursor {
            Some(c) => c.parse().map_err(|_| {
                PipelineError::SourceUnavailable(format!("invalid cursor: {c}"))
            })?,
            None => 0,
        };

        let end = (offset + page_size).min(paths.len());
        let items: Vec<SourceItem> = paths
            .get(offset..end)
            .unwrap_or(&[])
            .iter()
            .map(|p| self.item_for(p))
            .collect();

        let has_more = end < paths.len();
        Ok(SourcePage {
            items,
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with_files(names: &[&str]) -> (tempfile::TempDir, FsMediaSource) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"not a real image").unwrap();
        }
        let source = FsMediaSource::new(
            dir.path(),
            vec!["jpg".to_string(), "png".to_string()],
        );
        (dir, source)
    }

    #[test]
    fn test_count_filters_by_extension() {
        let (_dir, source) = source_with_files(&["a.jpg", "b.PNG", "c.txt", "d.jpeg"]);
        assert_eq!(source.count().unwrap(), 2);
    }

    #[test]
    fn test_pagination_walks_all_items() {
        let names: Vec<String> = (0..7).map(|i| format!("p{i}.jpg")).collect();
        let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let (_dir, source) = source_with_files(&name_refs);

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = source.list_page(3, cursor.as_deref()).unwrap();
            seen.extend(page.items.iter().map(|i| i.id.clone()));
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }
        assert_eq!(seen.len(), 7);

        // Repeating a cursor yields the same page
        let again = source.list_page(3, Some("3")).unwrap();
        assert_eq!(again.items.len(), 3);
        assert_eq!(again.items[0].id, seen[3]);
    }

    #[test]
    fn test_missing_root_is_unavailable() {
        let source = FsMediaSource::new("/definitely/not/here", vec!["jpg".to_string()]);
        assert!(matches!(
            source.count(),
            Err(PipelineError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_invalid_cursor_rejected() {
        let (_dir, source) = source_with_files(&["a.jpg"]);
        assert!(source.list_page(10, Some("bogus")).is_err());
    }
}
