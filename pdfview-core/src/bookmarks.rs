use serde::{Deserialize, Serialize};

use crate::error::{NavError, NavResult};
use crate::location::{PageLocation, PointF};

/// One entry of a document outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkEntry {
    pub title: String,
    /// Nesting depth in the outline, 0 for top-level entries.
    pub level: usize,
    pub target_page: usize,
    /// Zoom requested by the destination; 0 keeps the current zoom.
    pub target_zoom: f32,
}

impl BookmarkEntry {
    pub fn new(title: impl Into<String>, level: usize, target_page: usize) -> Self {
        Self {
            title: title.into(),
            level,
            target_page,
            target_zoom: 0.0,
        }
    }
}

/// Turns outline entries of the open document into jump requests.
#[derive(Debug, Clone, Default)]
pub struct BookmarkResolver {
    entries: Vec<BookmarkEntry>,
    page_count: usize,
}

impl BookmarkResolver {
    pub fn new(entries: Vec<BookmarkEntry>, page_count: usize) -> Self {
        Self {
            entries,
            page_count,
        }
    }

    pub fn entries(&self) -> &[BookmarkEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve(&self, entry: &BookmarkEntry) -> NavResult<PageLocation> {
        if entry.target_page >= self.page_count {
            return Err(NavError::InvalidBookmark(format!(
                "{:?} points at page {} of a {}-page document",
                entry.title, entry.target_page, self.page_count
            )));
        }
        if !entry.target_zoom.is_finite() || entry.target_zoom < 0.0 {
            return Err(NavError::InvalidBookmark(format!(
                "{:?} has zoom {}",
                entry.title, entry.target_zoom
            )));
        }
        Ok(PageLocation::new(
            entry.target_page,
            Some(PointF::default()),
            entry.target_zoom,
        ))
    }

    pub fn resolve_index(&self, index: usize) -> NavResult<PageLocation> {
        let entry = self.entries.get(index).ok_or_else(|| {
            NavError::InvalidBookmark(format!(
                "no bookmark #{index} ({} entries)",
                self.entries.len()
            ))
        })?;
        self.resolve(entry)
    }

    /// Index of the last entry starting at or before `page`, i.e. the
    /// section the page belongs to.
    pub fn entry_for_page(&self, page: usize) -> Option<usize> {
        let mut selected = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.target_page <= page {
                selected = Some(idx);
            } else {
                break;
            }
        }
        selected
    }
}
