//! PDF text extraction
//!
//! Design: PDF libraries sit behind a small typed adapter ([`PdfBackend`]
//! loads bytes into a [`PdfDocument`] that reports its pages' text).
//! [`TextExtractor`] owns the page walk and the error policy, so a new
//! library only needs a new adapter.

mod lopdf_backend;

pub use lopdf_backend::{LopdfBackend, LopdfDocument};

use crate::error::FetchError;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by a PDF backend
#[derive(Debug, Error)]
pub enum PdfError {
    /// Bytes are not a well-formed PDF
    #[error("malformed PDF: {0}")]
    Malformed(String),

    /// Document is encrypted and the empty password did not open it
    #[error("PDF is encrypted")]
    Encrypted,

    /// Document has no pages
    #[error("PDF has no pages")]
    NoPages,

    /// A single page's text could not be decoded
    #[error("page {page}: {message}")]
    Page {
        /// Zero-based page index
        page: usize,
        /// Backend message
        message: String,
    },
}

/// A PDF library adapter
pub trait PdfBackend: Send + Sync {
    /// Document type produced by this backend
    type Document: PdfDocument;

    /// Short backend name (for logging)
    fn name(&self) -> &'static str;

    /// Parse a document from memory
    ///
    /// Encrypted documents are opened with the empty password or rejected
    /// with [`PdfError::Encrypted`].
    fn load(&self, bytes: &[u8]) -> Result<Self::Document, PdfError>;
}

/// A loaded PDF document
///
/// Dropping the document releases everything the backend holds for it.
pub trait PdfDocument {
    /// Number of pages
    fn page_count(&self) -> usize;

    /// Text of the page at zero-based `index`, in reading order
    ///
    /// Adapters may normalize their library's output: [`LopdfBackend`]
    /// strips the newline lopdf appends after each text object, so trailing
    /// line breaks at the end of a page are not preserved.
    fn page_text(&self, index: usize) -> Result<String, PdfError>;
}

/// Extracts linear text from PDF bytes
#[derive(Debug, Clone, Default)]
pub struct TextExtractor<B = LopdfBackend> {
    backend: B,
}

impl TextExtractor<LopdfBackend> {
    /// Create an extractor backed by `lopdf`
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: PdfBackend> TextExtractor<B> {
    /// Create an extractor with a specific backend
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Extract the text of every page, joined with `\n`
    ///
    /// Nothing is trimmed. A page that fails to decode contributes an empty
    /// string; an unreadable, locked or page-less document is
    /// [`FetchError::PdfParseFailed`].
    pub fn extract(&self, bytes: &[u8]) -> Result<String, FetchError> {
        let document = self
            .backend
            .load(bytes)
            .map_err(|e| FetchError::PdfParseFailed(e.to_string()))?;

        let page_count = document.page_count();
        if page_count == 0 {
            return Err(FetchError::PdfParseFailed(PdfError::NoPages.to_string()));
        }
        debug!(backend = self.backend.name(), page_count, "Extracting PDF text");

        let mut pages = Vec::with_capacity(page_count);
        for index in 0..page_count {
            match document.page_text(index) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    warn!(page = index + 1, error = %e, "Skipping unreadable PDF page");
                    pages.push(String::new());
                }
            }
        }

        Ok(pages.join("\n"))
    }
}

#[cfg(test)]
pub(crate) mod fixtures;
