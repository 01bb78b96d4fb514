//! Error types for RapidText

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failed text acquisition
///
/// Every [`FetchError`] maps to exactly one kind. Kinds are what callers
/// branch on; messages are what they show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input URL is malformed or not http(s)
    InvalidUrl,
    /// The relay refused the target host
    BlockedHost,
    /// The relay's own fetch failed or returned non-2xx
    UpstreamError,
    /// Direct fetch failed and no proxy retry applied
    DownloadFailed,
    /// Bytes sniffed as PDF could not be parsed into pages
    PdfParseFailed,
    /// Extraction or decoding produced only whitespace
    EmptyText,
    /// A text body is not valid in its charset
    DecodeFailed,
    /// A local file's name and content disagree about being a PDF
    InvalidFile,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::BlockedHost => "blocked_host",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::PdfParseFailed => "pdf_parse_failed",
            ErrorKind::EmptyText => "empty_text",
            ErrorKind::DecodeFailed => "decode_failed",
            ErrorKind::InvalidFile => "invalid_file",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while acquiring text
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL does not parse or is not http(s)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Relay refused the target host
    #[error("Blocked host: {0}")]
    BlockedHost(String),

    /// Relay reached the target but the target failed
    #[error("Upstream error: {message}")]
    Upstream {
        /// Status the relay answered with
        status: u16,
        /// Relay response body
        message: String,
    },

    /// Direct download failed
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// PDF could not be loaded or has no pages
    #[error("Failed to parse PDF: {0}")]
    PdfParseFailed(String),

    /// Nothing readable came out
    #[error("{0}")]
    EmptyText(String),

    /// Text body is not valid in its charset
    #[error("Failed to decode text: {0}")]
    DecodeFailed(String),

    /// Local file rejected before extraction
    #[error("{0}")]
    InvalidFile(String),
}

impl FetchError {
    /// The category callers branch on
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            FetchError::BlockedHost(_) => ErrorKind::BlockedHost,
            FetchError::Upstream { .. } => ErrorKind::UpstreamError,
            FetchError::DownloadFailed(_) | FetchError::ClientBuildError(_) => {
                ErrorKind::DownloadFailed
            }
            FetchError::PdfParseFailed(_) => ErrorKind::PdfParseFailed,
            FetchError::EmptyText(_) => ErrorKind::EmptyText,
            FetchError::DecodeFailed(_) => ErrorKind::DecodeFailed,
            FetchError::InvalidFile(_) => ErrorKind::InvalidFile,
        }
    }
}

/// Category of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The response exists but the client may not read it (browser CORS)
    CrossOrigin,
    /// DNS lookup or TCP/TLS connect failed
    Connect,
    /// Connect or read timeout elapsed
    Timeout,
    /// Body exceeded the configured size limit
    BodyTooLarge,
    /// Anything else
    Other,
}

/// A transport failed before producing a complete response
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Failure category
    pub kind: TransportErrorKind,
    /// Human readable cause
    pub message: String,
}

impl TransportError {
    /// Create a transport error
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A failure consistent with cross-origin blocking
    pub fn cross_origin(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::CrossOrigin, message)
    }

    /// True if a relay retry may succeed where the direct fetch failed
    pub fn is_cross_origin(&self) -> bool {
        self.kind == TransportErrorKind::CrossOrigin
    }

    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error_chain(&err))
    }
}

/// Render an error and its sources as one line
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
