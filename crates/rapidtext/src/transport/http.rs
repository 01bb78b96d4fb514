//! `reqwest` transport

use super::{HttpPayload, Transport};
use crate::client::FetchOptions;
use crate::error::{FetchError, TransportError, TransportErrorKind};
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE, USER_AGENT};
use tracing::debug;
use url::Url;

/// HTTP transport for native builds
///
/// Follows redirects, applies the connect and read timeouts from
/// [`FetchOptions`] and refuses bodies above `max_body_bytes`. Never
/// reports cross-origin failures.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpTransport {
    /// Build a transport from fetch options
    pub fn new(options: &FetchOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let user_agent = options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .build()
            .map_err(FetchError::ClientBuildError)?;

        Ok(Self {
            client,
            max_body_bytes: options.max_body_bytes,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn get(&self, url: &Url) -> Result<HttpPayload, TransportError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let headers = response.headers();
        let content_type = header_string(headers, CONTENT_TYPE);
        let content_disposition = header_string(headers, CONTENT_DISPOSITION);
        debug!(url = %url, status = status.as_u16(), ?content_type, "Response received");

        let body = read_body(response, self.max_body_bytes).await?;

        Ok(HttpPayload {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            content_disposition,
            body,
        })
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Read the full body, failing once it grows past `limit`
async fn read_body(response: reqwest::Response, limit: usize) -> Result<Bytes, TransportError> {
    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(too_large(limit));
    }

    let mut body = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::from_reqwest)?;
        if body.len() + chunk.len() > limit {
            return Err(too_large(limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

fn too_large(limit: usize) -> TransportError {
    TransportError::new(
        TransportErrorKind::BodyTooLarge,
        format!("Response body exceeds {limit} bytes"),
    )
}
