use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod bookmarks;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod location;
pub mod search;
pub mod session;
pub mod viewer;

pub use bookmarks::{BookmarkEntry, BookmarkResolver};
pub use config::ViewerConfig;
pub use error::NavError;
pub use events::{EventLog, ViewerEvent, ViewerObserver};
pub use history::NavigationHistory;
pub use location::{PageLocation, PointF};
pub use search::{SearchCoordinator, SearchHit, SearchState};
pub use session::DocumentSession;
pub use viewer::Viewer;

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0d6a52-8c1e-5b7a-9d44-0c2e71a9b6f3").expect("valid namespace UUID")
});

pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: usize,
    pub metadata: DocumentMetadata,
}

/// A single match reported by a document's search index, before it is
/// numbered into a hit sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchMatch {
    pub page: usize,
    pub location: PointF,
}

/// An opened document as seen by the viewer. Rendering is not part of this
/// seam; the viewer only needs the page count, metadata, the bookmark index
/// and the search index.
pub trait DocumentBackend: Send + Sync {
    fn info(&self) -> &DocumentInfo;
    fn bookmarks(&self) -> Result<Vec<BookmarkEntry>>;
    fn search(&self, query: &str) -> Result<Vec<SearchMatch>>;
    fn page_text(&self, page_index: usize) -> Result<String>;
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>>;
}
