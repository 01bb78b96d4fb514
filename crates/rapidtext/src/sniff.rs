//! PDF vs plain text classification

use url::Url;

/// Magic bytes at the start of every PDF
const PDF_MAGIC: &[u8] = b"%PDF";

/// What a payload should be treated as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Run through the PDF text extractor
    Pdf,
    /// Decode as text
    PlainText,
}

/// Classify a payload from its hints and, if needed, its first bytes
///
/// Rules in order: a declared content type containing `pdf`, a source path
/// ending in `.pdf` (query and fragment ignored), a body starting with
/// `%PDF`. `prefix` is only called when the first two rules do not decide.
pub fn classify<'a>(
    declared_content_type: Option<&str>,
    source: &str,
    prefix: impl FnOnce() -> &'a [u8],
) -> ContentKind {
    if let Some(kind) = classify_hints(declared_content_type, source) {
        return kind;
    }
    if has_pdf_magic(prefix()) {
        ContentKind::Pdf
    } else {
        ContentKind::PlainText
    }
}

/// Classify from the declared type and source alone
///
/// Returns `None` when the body has to be inspected.
pub fn classify_hints(declared_content_type: Option<&str>, source: &str) -> Option<ContentKind> {
    if declared_content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf")) {
        return Some(ContentKind::Pdf);
    }
    if has_pdf_suffix(source) {
        return Some(ContentKind::Pdf);
    }
    None
}

/// True if the bytes start with `%PDF`
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// True if a URL path or filename ends in `.pdf`, case-insensitively
pub fn has_pdf_suffix(source: &str) -> bool {
    let path = match Url::parse(source) {
        Ok(url) => url.path().to_string(),
        // Plain filenames and relative paths
        Err(_) => source
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.to_ascii_lowercase().ends_with(".pdf")
}
