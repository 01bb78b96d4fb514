//! RapidText - text acquisition for reading apps
//!
//! This crate turns a URL or a local file into plain text, extracting PDFs
//! page by page and decoding everything else as text.
//!
//! ## Components
//!
//! - [`ContentFetcher`] - the fetch pipeline: direct GET, one relay retry on
//!   cross-origin failure, classification, extraction or decoding
//! - [`ProxyGateway`] - an HTTP relay (`GET /api/proxy?url=...`) that
//!   refuses local and private hosts
//! - [`TextExtractor`] - PDF text extraction behind [`PdfBackend`]
//! - [`host::classify`] - the literal-host SSRF guard used by the relay
//!
//! ```no_run
//! # async fn demo() -> Result<(), rapidtext::FetchError> {
//! let fetcher = rapidtext::ContentFetcher::builder()
//!     .proxy_endpoint("https://reader.example.com/api/proxy")
//!     .build()?;
//! match fetcher.fetch_text("https://example.com/paper.pdf").await {
//!     rapidtext::FetchOutcome::Text { content } => println!("{content}"),
//!     rapidtext::FetchOutcome::Failure { kind, message } => eprintln!("{kind}: {message}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
mod decode;
mod error;
pub mod host;
pub mod pdf;
pub mod proxy;
pub mod sniff;
pub mod transport;
mod types;

use std::time::Duration;

pub use client::{ContentFetcher, ContentFetcherBuilder, FetchOptions};
pub use decode::decode_text;
pub use error::{ErrorKind, FetchError, TransportError, TransportErrorKind};
pub use host::{BlockReason, HostVerdict};
pub use pdf::{LopdfBackend, PdfBackend, PdfDocument, PdfError, TextExtractor};
pub use proxy::{ProxyGateway, ProxyGatewayBuilder, PROXY_ROUTE, PROXY_ROUTE_ALIAS};
pub use sniff::ContentKind;
pub use transport::{HttpPayload, HttpTransport, Transport};
pub use types::{FetchOutcome, FetchRequest, FetchState};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = "RapidReader/1.0";

/// Default TCP/TLS connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default gap allowed between body reads
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on a downloaded body (50 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
