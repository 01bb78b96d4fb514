//! Byte transports for the fetch pipeline
//!
//! Design: the pipeline is written once against [`Transport`]. Each runtime
//! supplies one implementation; native builds use [`HttpTransport`]. A
//! transport that cannot read cross-origin responses reports
//! [`TransportErrorKind::CrossOrigin`](crate::TransportErrorKind::CrossOrigin)
//! so the pipeline can retry through the relay.

mod http;

pub use http::HttpTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

/// A complete HTTP response
#[derive(Debug, Clone, Default)]
pub struct HttpPayload {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase for the status
    pub status_text: String,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Content-Disposition header value
    pub content_disposition: Option<String>,
    /// Full response body
    pub body: Bytes,
}

impl HttpPayload {
    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8 with surrounding whitespace removed
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

/// Something that can GET a URL
///
/// Implementations must not keep the URL or body after returning.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Unique identifier for this transport (for logging/debugging)
    fn name(&self) -> &'static str;

    /// GET the URL and read the whole body
    ///
    /// Non-2xx statuses are returned as payloads, not errors.
    async fn get(&self, url: &Url) -> Result<HttpPayload, TransportError>;
}
