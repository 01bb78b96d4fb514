//! `lopdf` adapter

use super::{PdfBackend, PdfDocument, PdfError};
use lopdf::Document;

/// PDF backend built on `lopdf`
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }
}

/// A document loaded by [`LopdfBackend`]
pub struct LopdfDocument {
    doc: Document,
    /// `lopdf` page numbers (1-based) in page order
    page_numbers: Vec<u32>,
}

impl PdfBackend for LopdfBackend {
    type Document = LopdfDocument;

    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn load(&self, bytes: &[u8]) -> Result<LopdfDocument, PdfError> {
        let mut doc = Document::load_mem(bytes).map_err(|e| PdfError::Malformed(e.to_string()))?;

        if doc.is_encrypted() && doc.decrypt("").is_err() {
            return Err(PdfError::Encrypted);
        }

        let mut page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        page_numbers.sort_unstable();

        Ok(LopdfDocument { doc, page_numbers })
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<String, PdfError> {
        let number = *self.page_numbers.get(index).ok_or_else(|| PdfError::Page {
            page: index,
            message: "page index out of range".to_string(),
        })?;

        let text = self
            .doc
            .extract_text(&[number])
            .map_err(|e| PdfError::Page {
                page: index,
                message: e.to_string(),
            })?;

        // lopdf ends every text object with a newline; the page separator
        // is added by the extractor
        Ok(text.trim_end_matches(['\r', '\n']).to_string())
    }
}
