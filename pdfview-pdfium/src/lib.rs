use std::convert::TryFrom;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use pdfview_core::{
    document_id_for_path, BookmarkEntry, DocumentBackend, DocumentInfo, DocumentMetadata,
    DocumentProvider, PointF, SearchMatch, ViewerConfig,
};
use tracing::{debug, instrument, warn};

/// Opens PDF files through the pdfium library.
pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
}

impl PdfiumProvider {
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        let pdfium = bind_pdfium(config.pdfium_library.as_deref())?;
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

#[async_trait]
impl DocumentProvider for PdfiumProvider {
    #[instrument(skip(self))]
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let document = PdfiumDocument::load(Arc::clone(&self.pdfium), absolute)?;
        debug!(pages = document.info.page_count, "pdf loaded");
        Ok(Arc::new(document))
    }
}

struct PdfiumDocument {
    document: Mutex<Option<PdfDocument<'static>>>,
    outline_cache: Mutex<Option<Vec<BookmarkEntry>>>,
    path: PathBuf,
    info: DocumentInfo,
    pdfium: Arc<Pdfium>,
}

impl PdfiumDocument {
    /// Open `path` and read its page count and metadata. The loaded document
    /// stays cached for later bookmark, search and text requests.
    fn load(pdfium: Arc<Pdfium>, path: PathBuf) -> Result<Self> {
        let mut loaded = Self {
            document: Mutex::new(None),
            outline_cache: Mutex::new(None),
            info: DocumentInfo {
                id: document_id_for_path(&path),
                path: path.clone(),
                page_count: 0,
                metadata: DocumentMetadata::default(),
            },
            path,
            pdfium,
        };
        let (page_count, metadata) = loaded.with_document(|document| {
            let page_count = usize::try_from(document.pages().len())
                .map_err(|_| anyhow!("page count of {:?} is out of range", loaded.path))?;
            Ok((page_count, read_metadata(document)))
        })?;
        loaded.info.page_count = page_count;
        loaded.info.metadata = metadata;
        Ok(loaded)
    }

    fn open_document(&self) -> Result<PdfDocument<'static>> {
        let document = self
            .pdfium
            .load_pdf_from_file(&self.path, None)
            .with_context(|| format!("failed to open {:?}", self.path))?;
        // SAFETY: the document borrows the bindings owned by `self.pdfium`.
        // `document` is declared before `pdfium`, so it is dropped first and
        // the borrow never outlives the bindings.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        Ok(document)
    }

    fn with_document<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PdfDocument<'static>) -> Result<R>,
    {
        let mut guard = self.document.lock();
        if guard.is_none() {
            *guard = Some(self.open_document()?);
        }
        match guard.as_ref() {
            Some(document) => f(document),
            None => Err(anyhow!("{:?} is not loaded", self.path)),
        }
    }
}

fn page_at<'a>(document: &PdfDocument<'a>, page_index: usize) -> Result<PdfPage<'a>> {
    let index: PdfPageIndex = page_index
        .try_into()
        .map_err(|_| anyhow!("page {} is out of supported range", page_index))?;
    document
        .pages()
        .get(index)
        .with_context(|| format!("page {} out of range", page_index))
}

impl DocumentBackend for PdfiumDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn bookmarks(&self) -> Result<Vec<BookmarkEntry>> {
        {
            let cache = self.outline_cache.lock();
            if let Some(cached) = cache.as_ref() {
                return Ok(cached.clone());
            }
        }

        let outline = self.with_document(|document| {
            let mut outline = Vec::new();
            if let Some(root) = document.bookmarks().root() {
                collect_outline(root, 0, &mut outline);
            }
            Ok(outline)
        })?;

        *self.outline_cache.lock() = Some(outline.clone());
        Ok(outline)
    }

    #[instrument(skip(self))]
    fn search(&self, query: &str) -> Result<Vec<SearchMatch>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        self.with_document(|document| {
            let options = PdfSearchOptions::new();
            let mut matches = Vec::new();
            for page_index in 0..self.info.page_count {
                let page = page_at(document, page_index)?;
                let text = page
                    .text()
                    .with_context(|| format!("failed to extract text for page {}", page_index))?;
                let search = text
                    .search(query, &options)
                    .with_context(|| format!("failed to perform search on page {}", page_index))?;
                let page_height = page.height().value;

                while let Some(segments) = search.find_next() {
                    let Some(first) = segments.iter().next() else {
                        continue;
                    };
                    let bounds = first.bounds();
                    matches.push(SearchMatch {
                        page: page_index,
                        location: top_left(bounds.left().value, bounds.top().value, page_height),
                    });
                }
            }
            debug!(matches = matches.len(), "search finished");
            Ok(matches)
        })
    }

    fn page_text(&self, page_index: usize) -> Result<String> {
        self.with_document(|document| {
            let page = page_at(document, page_index)?;
            let text = page
                .text()
                .with_context(|| format!("failed to extract text for page {}", page_index))?;
            Ok(text.all())
        })
    }
}

/// Converts a pdfium point (origin bottom-left) into a page offset with the
/// origin at the top-left corner.
fn top_left(left: f32, top: f32, page_height: f32) -> PointF {
    PointF::new(left.max(0.0), (page_height - top).max(0.0))
}

fn collect_outline(mut bookmark: PdfBookmark<'_>, level: usize, out: &mut Vec<BookmarkEntry>) {
    loop {
        if let Some(title) = bookmark.title() {
            match bookmark.destination().map(|destination| destination.page_index()) {
                Some(Ok(page_index)) => {
                    out.push(BookmarkEntry::new(title, level, page_index as usize));
                }
                _ => debug!(%title, "bookmark without a page destination skipped"),
            }
        }

        if let Some(child) = bookmark.first_child() {
            collect_outline(child, level + 1, out);
        }

        match bookmark.next_sibling() {
            Some(next) => bookmark = next,
            None => break,
        }
    }
}

/// Title, author and keywords from the document's info dictionary. Blank
/// entries count as absent.
fn read_metadata(document: &PdfDocument<'_>) -> DocumentMetadata {
    let metadata = document.metadata();
    let tag = |tag: PdfDocumentMetadataTagType| {
        metadata
            .get(tag)
            .map(|entry| entry.value().trim().to_owned())
            .filter(|value| !value.is_empty())
    };

    DocumentMetadata {
        title: tag(PdfDocumentMetadataTagType::Title),
        author: tag(PdfDocumentMetadataTagType::Author),
        keywords: tag(PdfDocumentMetadataTagType::Keywords)
            .map(|raw| split_keywords(&raw))
            .unwrap_or_default(),
    }
}

/// Producers separate keywords with commas or semicolons.
fn split_keywords(raw: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for keyword in raw.split([',', ';']).map(str::trim) {
        if !keyword.is_empty() && !keywords.iter().any(|k| k == keyword) {
            keywords.push(keyword.to_owned());
        }
    }
    keywords
}

/// Bind pdfium from the configured library, then the working directory,
/// then the system library.
fn bind_pdfium(configured: Option<&Path>) -> Result<Pdfium> {
    let mut errors = Vec::new();

    if let Some(path) = configured {
        match Pdfium::bind_to_library(path) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(err) => {
                warn!("failed to load Pdfium from {}: {}", path.display(), err);
                errors.push(format!("{}: {}", path.display(), err));
            }
        }
    }

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_locations_are_measured_from_the_top() {
        assert_eq!(top_left(72.0, 700.0, 792.0), PointF::new(72.0, 92.0));
        assert_eq!(top_left(-1.0, 800.0, 792.0), PointF::new(0.0, 0.0));
    }

    #[test]
    fn keywords_are_split_trimmed_and_deduplicated() {
        assert_eq!(
            split_keywords(" budget, 2024;forecast ,, budget "),
            vec!["budget", "2024", "forecast"]
        );
        assert!(split_keywords(" ; ").is_empty());
    }
}
