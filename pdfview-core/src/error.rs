use thiserror::Error;

/// Failures of navigation, bookmark and search requests. None of these tear
/// down the open document; the request is simply refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    #[error("page {page} is out of range (document has {page_count} pages)")]
    OutOfRange { page: usize, page_count: usize },

    #[error("no history in that direction")]
    NoHistory,

    #[error("invalid bookmark: {0}")]
    InvalidBookmark(String),

    #[error("search result {index} is out of range ({len} results)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no document is open")]
    NoDocument,
}

pub type NavResult<T> = std::result::Result<T, NavError>;
