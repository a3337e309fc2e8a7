use tracing::debug;

use crate::error::{NavError, NavResult};
use crate::location::{PageLocation, PointF};

pub const DEFAULT_ZOOM: f32 = 1.0;

/// Browser-style back/forward list of visited locations.
///
/// A new jump discards everything after the current entry before appending,
/// so walking back and forth never grows the list.
#[derive(Debug, Clone, Default)]
pub struct NavigationHistory {
    entries: Vec<PageLocation>,
    index: usize,
    page_count: usize,
}

impl NavigationHistory {
    pub fn new(page_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            page_count,
        }
    }

    /// Forget every entry and start over for a document with `page_count` pages.
    pub fn reset(&mut self, page_count: usize) {
        self.entries.clear();
        self.index = 0;
        self.page_count = page_count;
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn entries(&self) -> &[PageLocation] {
        &self.entries
    }

    pub fn index(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.index)
        }
    }

    pub fn current(&self) -> Option<PageLocation> {
        self.entries.get(self.index).copied()
    }

    pub fn current_zoom(&self) -> f32 {
        self.current().map_or(DEFAULT_ZOOM, |location| location.zoom)
    }

    pub fn back_available(&self) -> bool {
        self.index > 0
    }

    pub fn forward_available(&self) -> bool {
        !self.entries.is_empty() && self.index < self.entries.len() - 1
    }

    /// Record a new location. A zoom that is not a positive finite number
    /// keeps the zoom currently in effect.
    pub fn jump(
        &mut self,
        page: usize,
        offset: Option<PointF>,
        zoom: f32,
    ) -> NavResult<PageLocation> {
        if page >= self.page_count {
            return Err(NavError::OutOfRange {
                page,
                page_count: self.page_count,
            });
        }

        let zoom = if zoom.is_finite() && zoom > 0.0 {
            zoom
        } else {
            self.current_zoom()
        };
        let location = PageLocation::new(page, offset, zoom);

        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(location);
        self.index = self.entries.len() - 1;
        debug!(page, index = self.index, "history jump");
        Ok(location)
    }

    pub fn back(&mut self) -> NavResult<PageLocation> {
        if !self.back_available() {
            return Err(NavError::NoHistory);
        }
        self.index -= 1;
        Ok(self.entries[self.index])
    }

    pub fn forward(&mut self) -> NavResult<PageLocation> {
        if !self.forward_available() {
            return Err(NavError::NoHistory);
        }
        self.index += 1;
        Ok(self.entries[self.index])
    }
}
