//! Core types for RapidText

use crate::error::{ErrorKind, FetchError};
use serde::{Deserialize, Serialize};
use url::Url;

/// A validated request to fetch text from a URL
///
/// Only absolute `http`/`https` URLs can be constructed, so an invalid
/// request never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: Url,
}

impl FetchRequest {
    /// Parse and validate a URL
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidUrl("URL is empty".to_string()));
        }
        let url = Url::parse(trimmed).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        Self::from_url(url)
    }

    /// Validate an already parsed URL
    pub fn from_url(url: Url) -> Result<Self, FetchError> {
        match url.scheme() {
            "http" | "https" => Ok(Self { url }),
            other => Err(FetchError::InvalidUrl(format!(
                "must start with http:// or https://, got {other}:"
            ))),
        }
    }

    /// The target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The target URL as a string
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Result of one text acquisition
///
/// A `Text` outcome never carries blank content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Extracted or decoded text
    Text {
        /// The text, untrimmed
        content: String,
    },
    /// The acquisition failed
    Failure {
        /// Failure category
        kind: ErrorKind,
        /// Human readable message
        message: String,
    },
}

impl FetchOutcome {
    /// The text, if the acquisition succeeded
    pub fn text(&self) -> Option<&str> {
        match self {
            FetchOutcome::Text { content } => Some(content),
            FetchOutcome::Failure { .. } => None,
        }
    }

    /// The failure kind, if the acquisition failed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            FetchOutcome::Text { .. } => None,
            FetchOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// True for `Text`
    pub fn is_text(&self) -> bool {
        matches!(self, FetchOutcome::Text { .. })
    }

    /// Convert to a `Result` with the message as error
    pub fn into_result(self) -> Result<String, (ErrorKind, String)> {
        match self {
            FetchOutcome::Text { content } => Ok(content),
            FetchOutcome::Failure { kind, message } => Err((kind, message)),
        }
    }
}

impl From<Result<String, FetchError>> for FetchOutcome {
    fn from(result: Result<String, FetchError>) -> Self {
        match result {
            Ok(content) => FetchOutcome::Text { content },
            Err(e) => FetchOutcome::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

/// Pipeline position reported to status callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Nothing started yet
    Idle,
    /// Direct GET in flight
    DirectFetching,
    /// Retrying through the relay
    ProxyFetching,
    /// Deciding between PDF and text
    Classifying,
    /// PDF text extraction running
    Extracting,
    /// Finished with text
    Done,
    /// Finished with a failure
    Failed(ErrorKind),
}

impl std::fmt::Display for FetchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchState::Idle => write!(f, "idle"),
            FetchState::DirectFetching => write!(f, "direct_fetching"),
            FetchState::ProxyFetching => write!(f, "proxy_fetching"),
            FetchState::Classifying => write!(f, "classifying"),
            FetchState::Extracting => write!(f, "extracting"),
            FetchState::Done => write!(f, "done"),
            FetchState::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}
