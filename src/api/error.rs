//! Error types for the vault API client.
//!
//! Every variant carries the URL (or endpoint) it failed on so log lines and
//! CLI output point at the offending request.

use thiserror::Error;

/// Errors that can occur while talking to the vault REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The token endpoint rejected the credentials, or a resource call kept
    /// returning 401 after a token refresh.
    #[error("[AUTH] not authenticated against {endpoint}: {reason}")]
    Unauthenticated {
        /// Token endpoint or resource URL that refused the credentials.
        endpoint: String,
        /// Short reason suitable for display.
        reason: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error calling {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout calling {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response that is not an authentication failure.
    #[error("HTTP {status} calling {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// The vault answered 2xx but reported an error in its response envelope.
    #[error("vault reported status {status} for {url}: {message}")]
    Api {
        /// The URL of the request.
        url: String,
        /// Status code from the envelope `meta` block.
        status: u16,
        /// Status message and any listed errors.
        message: String,
    },

    /// A configured or derived URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl ApiError {
    /// Creates an unauthenticated error.
    pub fn unauthenticated(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unauthenticated {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Maps a reqwest error to [`ApiError::Timeout`] or [`ApiError::Network`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an envelope-level API error.
    pub fn api(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns true when the error means the credentials were not accepted.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }
}
