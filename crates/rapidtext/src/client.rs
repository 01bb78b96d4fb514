//! Text acquisition pipeline
//!
//! [`ContentFetcher`] drives one acquisition from URL to text: direct GET,
//! a single relay retry when the direct fetch was blocked cross-origin,
//! classification, then PDF extraction or text decoding.

use crate::decode::decode_text;
use crate::error::{FetchError, TransportError};
use crate::pdf::TextExtractor;
use crate::proxy::{BLOCKED_HOST, INVALID_URL, MISSING_URL, UNSUPPORTED_SCHEME};
use crate::sniff::{self, ContentKind};
use crate::transport::{HttpPayload, HttpTransport, Transport};
use crate::types::{FetchOutcome, FetchRequest, FetchState};
use crate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_BODY_BYTES, DEFAULT_READ_TIMEOUT};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Shown when a cross-origin failure has no relay to fall back to
const CORS_MESSAGE: &str = "Failed to fetch. This is usually blocked by CORS on the target site.";

/// Shown when a PDF yields only whitespace
const EMPTY_PDF_MESSAGE: &str = "Downloaded PDF, but no extractable text was found.";

/// Shown when a text body is only whitespace
const EMPTY_TEXT_MESSAGE: &str = "Downloaded file, but it contains no readable text.";

/// Shown for PDF bytes under a non-PDF name
const NOT_PDF_NAME_MESSAGE: &str = "Please pick a .pdf file.";

/// Network policy for a [`ContentFetcher`]
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Custom User-Agent
    pub user_agent: Option<String>,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Maximum gap between body reads
    pub read_timeout: Duration,
    /// Largest body read into memory
    pub max_body_bytes: usize,
    /// Relay endpoint used after a cross-origin failure
    pub proxy_endpoint: Option<Url>,
    /// Send every request through the relay instead of fetching directly
    pub always_relay: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            proxy_endpoint: None,
            always_relay: false,
        }
    }
}

/// Builder for configuring a [`ContentFetcher`]
#[derive(Default)]
pub struct ContentFetcherBuilder {
    options: FetchOptions,
    proxy_endpoint: Option<String>,
    transport: Option<Arc<dyn Transport>>,
}

impl ContentFetcherBuilder {
    /// Create a builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.options.user_agent = Some(ua.into());
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Set read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    /// Set the largest body that will be read
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.options.max_body_bytes = limit;
        self
    }

    /// Set the relay endpoint, e.g. `https://reader.example.com/api/proxy`
    pub fn proxy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.proxy_endpoint = Some(endpoint.into());
        self
    }

    /// Skip the direct fetch and go through the relay for every request
    ///
    /// Requires [`proxy_endpoint`](Self::proxy_endpoint).
    pub fn always_relay(mut self, enable: bool) -> Self {
        self.options.always_relay = enable;
        self
    }

    /// Replace the HTTP transport
    ///
    /// Network options other than the proxy endpoint are ignored when a
    /// transport is supplied.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the fetcher
    pub fn build(self) -> Result<ContentFetcher, FetchError> {
        let mut options = self.options;
        if let Some(endpoint) = self.proxy_endpoint {
            let url = Url::parse(endpoint.trim())
                .map_err(|e| FetchError::InvalidUrl(format!("proxy endpoint {endpoint}: {e}")))?;
            options.proxy_endpoint = Some(url);
        }
        if options.always_relay && options.proxy_endpoint.is_none() {
            return Err(FetchError::InvalidUrl(
                "always_relay needs a proxy endpoint".to_string(),
            ));
        }
        ContentFetcher::with_options(options, self.transport)
    }
}

/// Acquires text from URLs and local files
///
/// Cheap to clone; clones share the transport and its connection pool.
#[derive(Clone)]
pub struct ContentFetcher {
    transport: Arc<dyn Transport>,
    proxy_endpoint: Option<Url>,
    always_relay: bool,
    extractor: TextExtractor,
}

impl std::fmt::Debug for ContentFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentFetcher")
            .field("transport", &self.transport.name())
            .field("proxy_endpoint", &self.proxy_endpoint.as_ref().map(Url::as_str))
            .field("always_relay", &self.always_relay)
            .finish()
    }
}

impl ContentFetcher {
    /// Create a fetcher with default options and no relay
    pub fn new() -> Result<Self, FetchError> {
        Self::with_options(FetchOptions::default(), None)
    }

    /// Create a new builder
    pub fn builder() -> ContentFetcherBuilder {
        ContentFetcherBuilder::new()
    }

    fn with_options(
        options: FetchOptions,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<Self, FetchError> {
        let transport = match transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&options)?),
        };
        Ok(Self {
            transport,
            proxy_endpoint: options.proxy_endpoint,
            always_relay: options.always_relay,
            extractor: TextExtractor::new(),
        })
    }

    /// Fetch a URL and return its text
    pub async fn fetch_text(&self, url: &str) -> FetchOutcome {
        self.fetch_text_with_status(url, |_| {}).await
    }

    /// Fetch a URL, reporting each pipeline state to `status_callback`
    ///
    /// The first state reported is always [`FetchState::Idle`] and the last
    /// is always [`FetchState::Done`] or [`FetchState::Failed`].
    pub async fn fetch_text_with_status<F>(&self, url: &str, mut status_callback: F) -> FetchOutcome
    where
        F: FnMut(FetchState),
    {
        status_callback(FetchState::Idle);
        let result = self.run(url, &mut status_callback).await;
        match &result {
            Ok(text) => {
                debug!(url, chars = text.len(), "Fetched text");
                status_callback(FetchState::Done);
            }
            Err(e) => {
                warn!(url, kind = %e.kind(), error = %e, "Fetch failed");
                status_callback(FetchState::Failed(e.kind()));
            }
        }
        result.into()
    }

    /// Read text from a local file's bytes
    ///
    /// Same classification and extraction as a fetch, without the network.
    /// A `.pdf` name must carry PDF bytes and PDF bytes must carry a `.pdf`
    /// name.
    pub async fn read_local(&self, bytes: impl Into<Bytes>, filename: &str) -> FetchOutcome {
        self.read_local_inner(bytes.into(), filename).await.into()
    }

    async fn read_local_inner(&self, bytes: Bytes, filename: &str) -> Result<String, FetchError> {
        let named_pdf = sniff::has_pdf_suffix(filename);
        let is_pdf = sniff::has_pdf_magic(&bytes);
        match (named_pdf, is_pdf) {
            (true, false) => {
                return Err(FetchError::InvalidFile(format!(
                    "{filename} does not look like a PDF."
                )))
            }
            (false, true) => return Err(FetchError::InvalidFile(NOT_PDF_NAME_MESSAGE.to_string())),
            _ => {}
        }

        let kind = if is_pdf {
            ContentKind::Pdf
        } else {
            ContentKind::PlainText
        };
        debug!(filename, ?kind, bytes = bytes.len(), "Reading local file");
        let text = self.to_text(kind, bytes, None, &mut |_: FetchState| {}).await?;
        ensure_readable(text, kind)
    }

    async fn run<F>(&self, url: &str, status: &mut F) -> Result<String, FetchError>
    where
        F: FnMut(FetchState),
    {
        let request = FetchRequest::parse(url)?;

        let payload = if self.always_relay {
            status(FetchState::ProxyFetching);
            self.fetch_via_proxy(&request, None).await?
        } else {
            self.fetch_direct(&request, status).await?
        };

        status(FetchState::Classifying);
        let kind = sniff::classify(payload.content_type.as_deref(), request.as_str(), || {
            &payload.body[..]
        });
        debug!(url = request.as_str(), ?kind, bytes = payload.body.len(), "Classified");

        let HttpPayload {
            content_type, body, ..
        } = payload;
        let text = self
            .to_text(kind, body, content_type.as_deref(), status)
            .await?;
        ensure_readable(text, kind)
    }

    async fn fetch_direct<F>(
        &self,
        request: &FetchRequest,
        status: &mut F,
    ) -> Result<HttpPayload, FetchError>
    where
        F: FnMut(FetchState),
    {
        status(FetchState::DirectFetching);
        debug!(url = request.as_str(), transport = self.transport.name(), "Direct fetch");
        match self.transport.get(request.url()).await {
            Ok(payload) if payload.is_success() => Ok(payload),
            Ok(payload) => {
                let message = format!("HTTP {} {}", payload.status, payload.status_text);
                Err(FetchError::DownloadFailed(message.trim_end().to_string()))
            }
            Err(e) if e.is_cross_origin() => {
                status(FetchState::ProxyFetching);
                self.fetch_via_proxy(request, Some(&e)).await
            }
            Err(e) => Err(FetchError::DownloadFailed(e.message)),
        }
    }

    async fn fetch_via_proxy(
        &self,
        request: &FetchRequest,
        direct: Option<&TransportError>,
    ) -> Result<HttpPayload, FetchError> {
        let Some(endpoint) = &self.proxy_endpoint else {
            return Err(FetchError::DownloadFailed(CORS_MESSAGE.to_string()));
        };

        let mut proxy_url = endpoint.clone();
        proxy_url
            .query_pairs_mut()
            .append_pair("url", request.as_str());
        debug!(proxy = %proxy_url, direct_error = ?direct.map(|e| &e.message), "Fetching through relay");

        let payload = self.transport.get(&proxy_url).await.map_err(|e| match direct {
            Some(direct) => FetchError::DownloadFailed(format!("{direct}; relay also failed: {e}")),
            None => FetchError::DownloadFailed(format!("relay unreachable: {e}")),
        })?;
        if payload.is_success() {
            return Ok(payload);
        }

        let mut message = payload.body_text();
        if message.is_empty() {
            message = format!("HTTP {} {}", payload.status, payload.status_text)
                .trim_end()
                .to_string();
        }
        Err(relay_failure(payload.status, message))
    }

    async fn to_text<F>(
        &self,
        kind: ContentKind,
        body: Bytes,
        content_type: Option<&str>,
        status: &mut F,
    ) -> Result<String, FetchError>
    where
        F: FnMut(FetchState),
    {
        match kind {
            ContentKind::Pdf => {
                status(FetchState::Extracting);
                let extractor = self.extractor.clone();
                tokio::task::spawn_blocking(move || extractor.extract(&body))
                    .await
                    .map_err(|e| FetchError::PdfParseFailed(format!("extraction task failed: {e}")))?
            }
            ContentKind::PlainText => decode_text(&body, content_type),
        }
    }
}

/// Map a non-2xx relay response to an error
///
/// The relay passes upstream statuses through, so 403 and 400 only mean a
/// relay refusal when the body is one the relay itself writes.
fn relay_failure(status: u16, message: String) -> FetchError {
    if status == 403 && message == BLOCKED_HOST {
        FetchError::BlockedHost(message)
    } else if status == 400 && [MISSING_URL, INVALID_URL, UNSUPPORTED_SCHEME].contains(&message.as_str()) {
        FetchError::InvalidUrl(message)
    } else {
        FetchError::Upstream { status, message }
    }
}

/// Reject whitespace-only results, keeping the text untrimmed otherwise
fn ensure_readable(text: String, kind: ContentKind) -> Result<String, FetchError> {
    if !text.trim().is_empty() {
        return Ok(text);
    }
    let message = match kind {
        ContentKind::Pdf => EMPTY_PDF_MESSAGE,
        ContentKind::PlainText => EMPTY_TEXT_MESSAGE,
    };
    Err(FetchError::EmptyText(message.to_string()))
}
