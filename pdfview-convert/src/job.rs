use std::path::{Path, PathBuf};

use anyhow::Context;
use pdfview_core::DocumentBackend;
use uuid::Uuid;

use crate::error::ConvertError;
use crate::format::{detect_format, Format};

pub type JobId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed(ConvertError),
}

/// Text of a PDF, one entry per page, used to populate Excel and PowerPoint
/// targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContent {
    pub pages: Vec<String>,
}

impl DocumentContent {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }

    /// Extract the text of every page of an open document.
    pub fn from_backend(backend: &dyn DocumentBackend) -> anyhow::Result<Self> {
        let page_count = backend.info().page_count;
        let pages = (0..page_count)
            .map(|page| {
                backend
                    .page_text(page)
                    .with_context(|| format!("failed to extract text of page {page}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { pages })
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|page| page.trim().is_empty())
    }
}

/// One source-to-target conversion request. The output path travels with
/// the job; nothing about it is shared between jobs.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    pub source: PathBuf,
    pub source_format: Format,
    pub target: PathBuf,
    pub target_format: Format,
    pub status: JobStatus,
    pub content: Option<DocumentContent>,
}

impl ConversionJob {
    pub fn new(source: impl AsRef<Path>, target: impl Into<PathBuf>, target_format: Format) -> Self {
        let source = source.as_ref().to_path_buf();
        Self {
            id: Uuid::new_v4(),
            source_format: detect_format(&source),
            source,
            target: target.into(),
            target_format,
            status: JobStatus::Pending,
            content: None,
        }
    }

    pub fn with_content(mut self, content: DocumentContent) -> Self {
        self.content = Some(content);
        self
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded | JobStatus::Failed(_))
    }
}
