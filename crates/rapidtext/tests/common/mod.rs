//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rapidtext::{FetchOptions, HttpPayload, HttpTransport, ProxyGateway, Transport, TransportError};
use std::net::SocketAddr;
use url::Url;

#[path = "../../src/pdf/fixtures.rs"]
mod fixtures;

pub use fixtures::pdf_with_pages;

/// Serve a gateway on an ephemeral local port
pub async fn spawn_gateway(gateway: ProxyGateway) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, gateway.router()).await.unwrap();
    });
    addr
}

/// A port with nothing listening on it
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Behaves like a browser fetch: requests to `blocked_host` fail the way
/// cross-origin reads do, everything else goes over HTTP
pub struct BrowserLikeTransport {
    blocked_host: String,
    inner: HttpTransport,
}

impl BrowserLikeTransport {
    pub fn new(blocked_host: &str) -> Self {
        Self {
            blocked_host: blocked_host.to_string(),
            inner: HttpTransport::new(&FetchOptions::default()).unwrap(),
        }
    }
}

#[async_trait]
impl Transport for BrowserLikeTransport {
    fn name(&self) -> &'static str {
        "browser-like"
    }

    async fn get(&self, url: &Url) -> Result<HttpPayload, TransportError> {
        if url.host_str() == Some(self.blocked_host.as_str()) {
            return Err(TransportError::cross_origin("TypeError: Failed to fetch"));
        }
        self.inner.get(url).await
    }
}
