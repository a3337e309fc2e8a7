use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NavError, NavResult};
use crate::location::PointF;
use crate::DocumentBackend;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub page: usize,
    pub location: PointF,
    /// Position of the hit within the full hit sequence.
    pub ordinal: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    QueryActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    pub query: String,
    pub total: usize,
    pub current_index: Option<usize>,
}

/// Owns the active query, its hit sequence and a cursor into it.
///
/// The cursor never outlives the sequence it points into: every query change
/// rebuilds the hits and unsets the cursor.
#[derive(Debug, Clone, Default)]
pub struct SearchCoordinator {
    query: String,
    hits: Vec<SearchHit>,
    cursor: Option<usize>,
}

impl SearchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SearchState {
        if self.query.is_empty() {
            SearchState::Idle
        } else {
            SearchState::QueryActive
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current_hit(&self) -> Option<SearchHit> {
        self.cursor.and_then(|idx| self.hits.get(idx).copied())
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.hits.clear();
        self.cursor = None;
    }

    /// Replace the query and recompute the hit sequence from the document's
    /// search index. On an index failure the query stays active with no hits.
    pub fn set_query(&mut self, text: &str, index: &dyn DocumentBackend) -> Result<SearchState> {
        self.hits.clear();
        self.cursor = None;
        self.query = text.to_owned();
        if text.is_empty() {
            return Ok(SearchState::Idle);
        }

        let matches = index.search(text)?;
        self.hits = matches
            .into_iter()
            .enumerate()
            .map(|(ordinal, m)| SearchHit {
                page: m.page,
                location: m.location,
                ordinal,
            })
            .collect();
        debug!(query = text, hits = self.hits.len(), "search recomputed");
        Ok(SearchState::QueryActive)
    }

    pub fn hit(&self, ordinal: usize) -> NavResult<SearchHit> {
        self.hits
            .get(ordinal)
            .copied()
            .ok_or(NavError::IndexOutOfRange {
                index: ordinal,
                len: self.hits.len(),
            })
    }

    /// Move the cursor to `ordinal`.
    pub fn select(&mut self, ordinal: usize) -> NavResult<SearchHit> {
        let hit = self.hit(ordinal)?;
        self.cursor = Some(ordinal);
        Ok(hit)
    }

    /// Ordinal `next()` would move to; wraps from the last hit to the first.
    pub fn next_ordinal(&self) -> Option<usize> {
        if self.hits.is_empty() {
            return None;
        }
        let next = match self.cursor {
            Some(current) if current + 1 < self.hits.len() => current + 1,
            Some(_) => 0,
            None => 0,
        };
        Some(next)
    }

    /// Ordinal `previous()` would move to; wraps from the first hit to the last.
    pub fn previous_ordinal(&self) -> Option<usize> {
        if self.hits.is_empty() {
            return None;
        }
        let last = self.hits.len() - 1;
        let prev = match self.cursor {
            Some(0) | None => last,
            Some(current) => (current - 1).min(last),
        };
        Some(prev)
    }

    pub fn next(&mut self) -> Option<SearchHit> {
        let ordinal = self.next_ordinal()?;
        self.select(ordinal).ok()
    }

    pub fn previous(&mut self) -> Option<SearchHit> {
        let ordinal = self.previous_ordinal()?;
        self.select(ordinal).ok()
    }

    pub fn hits_on_page(&self, page: usize) -> impl Iterator<Item = &SearchHit> + '_ {
        self.hits.iter().filter(move |hit| hit.page == page)
    }

    pub fn summary(&self) -> Option<SearchSummary> {
        if self.query.is_empty() {
            return None;
        }
        Some(SearchSummary {
            query: self.query.clone(),
            total: self.hits.len(),
            current_index: self.cursor,
        })
    }
}
