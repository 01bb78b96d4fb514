//! Download relay for clients that cannot fetch cross-origin
//!
//! `GET /api/proxy?url=<target>` fetches the target server-side and streams
//! it back with a fixed, minimal header set. Targets are screened with
//! [`host::classify_url`](crate::host::classify_url) before the upstream
//! request and again on every redirect hop.
//!
//! The gateway holds only immutable configuration, so one instance can serve
//! any number of concurrent requests and any number of instances can run side
//! by side.

use crate::error::{error_chain, FetchError};
use crate::host::{self, BlockReason, HostVerdict};
use crate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_USER_AGENT};
use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE,
    X_CONTENT_TYPE_OPTIONS,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reqwest::redirect;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Route the relay is mounted at
pub const PROXY_ROUTE: &str = "/api/proxy";

/// Short alias for [`PROXY_ROUTE`]
pub const PROXY_ROUTE_ALIAS: &str = "/proxy";

/// Redirect hops followed before giving up
const MAX_REDIRECTS: usize = 10;

pub(crate) const MISSING_URL: &str = "Missing 'url' query parameter";
pub(crate) const INVALID_URL: &str = "Invalid URL";
pub(crate) const UNSUPPORTED_SCHEME: &str = "Only http(s) URLs are allowed";
pub(crate) const BLOCKED_HOST: &str = "Blocked host";

/// A redirect pointed at a host the relay refuses
#[derive(Debug, Error)]
#[error("redirect to blocked host {host} ({reason})")]
struct BlockedRedirect {
    host: String,
    reason: BlockReason,
}

/// Builder for [`ProxyGateway`]
#[derive(Debug, Clone)]
pub struct ProxyGatewayBuilder {
    user_agent: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    resolve: Vec<(String, SocketAddr)>,
}

impl Default for ProxyGatewayBuilder {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            resolve: Vec::new(),
        }
    }
}

impl ProxyGatewayBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the User-Agent sent upstream
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Set the upstream connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the upstream read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Pin a domain to a socket address instead of resolving it
    ///
    /// The host screen still sees the domain name, not the address.
    pub fn resolve(mut self, domain: impl Into<String>, addr: SocketAddr) -> Self {
        self.resolve.push((domain.into(), addr));
        self
    }

    /// Build the gateway
    pub fn build(self) -> Result<ProxyGateway, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .redirect(redirect_policy());
        for (domain, addr) in &self.resolve {
            builder = builder.resolve(domain, *addr);
        }
        let client = builder.build().map_err(FetchError::ClientBuildError)?;
        Ok(ProxyGateway { client })
    }
}

/// Stateless download relay
#[derive(Debug, Clone)]
pub struct ProxyGateway {
    client: reqwest::Client,
}

impl ProxyGateway {
    /// Create a gateway with default settings
    pub fn new() -> Result<Self, FetchError> {
        ProxyGatewayBuilder::new().build()
    }

    /// Create a new gateway builder
    pub fn builder() -> ProxyGatewayBuilder {
        ProxyGatewayBuilder::new()
    }

    /// Router serving the relay at [`PROXY_ROUTE`] and [`PROXY_ROUTE_ALIAS`]
    ///
    /// Only GET is served. axum hands HEAD to the GET handler, which
    /// refuses it, so HEAD never triggers an upstream fetch. Every method
    /// other than GET gets 405.
    pub fn router(self) -> Router {
        Router::new()
            .route(PROXY_ROUTE, get(handle_proxy))
            .route(PROXY_ROUTE_ALIAS, get(handle_proxy))
            .with_state(self)
    }

    /// Relay one request for `target`, the decoded `url` query parameter
    ///
    /// A non-2xx upstream status is passed through with the body
    /// `Upstream HTTP {status} {reason}`. The reason is the canonical phrase
    /// for the code, not the upstream's own; codes without one (e.g. 599)
    /// get no reason text.
    pub async fn relay(&self, target: Option<&str>) -> Response {
        let target = match target {
            Some(t) if !t.is_empty() => t,
            _ => return plain(StatusCode::BAD_REQUEST, MISSING_URL),
        };

        let url = match Url::parse(target) {
            Ok(url) => url,
            Err(_) => return plain(StatusCode::BAD_REQUEST, INVALID_URL),
        };

        if !matches!(url.scheme(), "http" | "https") {
            return plain(StatusCode::BAD_REQUEST, UNSUPPORTED_SCHEME);
        }

        if let HostVerdict::Blocked(reason) = host::classify_url(&url) {
            warn!(host = url.host_str().unwrap_or_default(), %reason, "Refusing to relay");
            return plain(StatusCode::FORBIDDEN, BLOCKED_HOST);
        }

        debug!(url = %url, "Relaying");
        let upstream = match self.client.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) if is_blocked_redirect(&e) => {
                warn!(url = %url, error = %error_chain(&e), "Refusing redirect");
                return plain(StatusCode::FORBIDDEN, BLOCKED_HOST);
            }
            Err(e) => {
                let message = error_chain(&e);
                warn!(url = %url, error = %message, "Upstream fetch failed");
                return plain(StatusCode::BAD_GATEWAY, message);
            }
        };

        let status = upstream.status();
        if !status.is_success() {
            let message = format!(
                "Upstream HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
            debug!(url = %url, status = status.as_u16(), "Upstream returned non-success");
            return plain(status, message.trim_end().to_string());
        }

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        for name in [CONTENT_TYPE, CONTENT_DISPOSITION] {
            if let Some(value) = upstream.headers().get(&name) {
                headers.insert(name, value.clone());
            }
        }

        (
            StatusCode::OK,
            headers,
            Body::from_stream(upstream.bytes_stream()),
        )
            .into_response()
    }
}

async fn handle_proxy(
    method: Method,
    State(gateway): State<ProxyGateway>,
    RawQuery(query): RawQuery,
) -> Response {
    if method != Method::GET {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(ALLOW, HeaderValue::from_static("GET"))],
        )
            .into_response();
    }
    let target = query.as_deref().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value.into_owned())
    });
    gateway.relay(target.as_deref()).await
}

fn plain(status: StatusCode, body: impl Into<String>) -> Response {
    (status, body.into()).into_response()
}

/// Follow redirects while every hop passes the host screen
fn redirect_policy() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let verdict = host::classify_url(attempt.url());
        match verdict {
            HostVerdict::Allowed => attempt.follow(),
            HostVerdict::Blocked(reason) => {
                let host = attempt.url().host_str().unwrap_or_default().to_string();
                attempt.error(BlockedRedirect { host, reason })
            }
        }
    })
}

fn is_blocked_redirect(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.is::<BlockedRedirect>() {
            return true;
        }
        source = cause.source();
    }
    false
}
