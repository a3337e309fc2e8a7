use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{instrument, warn};

use crate::bookmarks::BookmarkResolver;
use crate::{DocumentBackend, DocumentId, DocumentInfo, DocumentProvider};

pub const DEFAULT_WINDOW_TITLE: &str = "PDF Viewer";

/// The currently open document. Replaced wholesale by the next open; never
/// mutated by navigation or search beyond the current page.
pub struct DocumentSession {
    backend: Arc<dyn DocumentBackend>,
    info: DocumentInfo,
    bookmarks: BookmarkResolver,
    current_page: usize,
}

impl DocumentSession {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        let info = backend.info().clone();
        let entries = match backend.bookmarks() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(?err, path = %info.path.display(), "failed to read bookmarks");
                Vec::new()
            }
        };
        let bookmarks = BookmarkResolver::new(entries, info.page_count);
        Self {
            backend,
            info,
            bookmarks,
            current_page: 0,
        }
    }

    #[instrument(skip(provider))]
    pub async fn open_with<P: DocumentProvider + ?Sized>(
        provider: &P,
        path: PathBuf,
    ) -> Result<Self> {
        let backend = provider
            .open(&path)
            .await
            .with_context(|| format!("failed to open {:?}", path))?;
        Ok(Self::new(backend))
    }

    pub fn id(&self) -> DocumentId {
        self.info.id
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn backend(&self) -> &dyn DocumentBackend {
        self.backend.as_ref()
    }

    pub fn page_count(&self) -> usize {
        self.info.page_count
    }

    pub fn title(&self) -> Option<&str> {
        self.info
            .metadata
            .title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
    }

    pub fn bookmarks(&self) -> &BookmarkResolver {
        &self.bookmarks
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub(crate) fn set_current_page(&mut self, page: usize) {
        if page < self.info.page_count {
            self.current_page = page;
        }
    }

    pub fn window_title(&self) -> String {
        let title = self.title().unwrap_or(DEFAULT_WINDOW_TITLE);
        if self.info.page_count == 0 {
            return title.to_owned();
        }
        let page = self.current_page + 1;
        format!(
            "{}: page {} ({} of {})",
            title, page, page, self.info.page_count
        )
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("info", &self.info)
            .field("current_page", &self.current_page)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;

    #[tokio::test]
    async fn window_title_falls_back_to_default() {
        let provider = FakeProvider::new(12);
        let mut session = DocumentSession::open_with(&provider, PathBuf::from("/tmp/a.pdf"))
            .await
            .unwrap();
        assert_eq!(session.window_title(), "PDF Viewer: page 1 (1 of 12)");

        session.set_current_page(4);
        assert_eq!(session.window_title(), "PDF Viewer: page 5 (5 of 12)");
        session.set_current_page(40);
        assert_eq!(session.current_page(), 4);
    }

    #[tokio::test]
    async fn window_title_uses_document_title() {
        let mut provider = FakeProvider::new(3);
        provider.title = Some("Annual Report".into());
        let session = DocumentSession::open_with(&provider, PathBuf::from("/tmp/r.pdf"))
            .await
            .unwrap();
        assert_eq!(session.window_title(), "Annual Report: page 1 (1 of 3)");
    }

    #[tokio::test]
    async fn open_failure_carries_path_context() {
        let provider = FakeProvider::new(3);
        let err = DocumentSession::open_with(&provider, PathBuf::from("/tmp/r.docx"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("r.docx"));
    }
}
