//! OAuth 2.0 client-credentials token exchange.
//!
//! The vault issues bearer tokens from a dedicated token endpoint. The API key
//! and secret are sent as `client_id` / `client_secret`; token values are
//! never logged.

use std::fmt;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::ApiError;
use crate::config::VaultConfig;

/// Refresh this long before the server-declared expiry.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// A bearer token and the instant it stops being usable.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    /// Wraps a token that expires `lifetime` from now.
    #[must_use]
    pub fn new(value: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Instant::now() + lifetime,
        }
    }

    /// Raw token for the `Authorization: Bearer` header.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// True when the token is expired or within [`EXPIRY_MARGIN`] of expiring.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges the configured API key and secret for an access token.
///
/// # Errors
///
/// - [`ApiError::Unauthenticated`] when the endpoint answers 400/401/403 or
///   the body carries no `access_token`
/// - [`ApiError::Network`] / [`ApiError::Timeout`] for transport failures
/// - [`ApiError::HttpStatus`] for other non-success statuses
#[instrument(skip(client, config), fields(endpoint = %config.oauth_token_endpoint))]
pub async fn request_token(client: &Client, config: &VaultConfig) -> Result<AccessToken, ApiError> {
    let endpoint = config.oauth_token_endpoint.as_str();
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", config.api_key.as_str()),
        ("client_secret", config.api_secret.as_str()),
        ("scope", config.scope.as_str()),
    ];

    let response = client
        .post(endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|e| ApiError::network(endpoint, e))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::network(endpoint, e))?;

    let parsed = serde_json::from_str::<TokenResponse>(&body).ok();

    if matches!(status, 400 | 401 | 403) {
        let reason = parsed
            .as_ref()
            .and_then(|r| r.error_description.clone().or_else(|| r.error.clone()))
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(ApiError::unauthenticated(endpoint, reason));
    }
    if !(200..300).contains(&status) {
        return Err(ApiError::http_status(endpoint, status));
    }

    let Some(parsed) = parsed else {
        return Err(ApiError::decode(endpoint, "token response is not valid JSON"));
    };
    let Some(token) = parsed.access_token.filter(|t| !t.is_empty()) else {
        let reason = parsed
            .error_description
            .or(parsed.error)
            .unwrap_or_else(|| "token response has no access_token".to_string());
        return Err(ApiError::unauthenticated(endpoint, reason));
    };

    if let Some(token_type) = parsed.token_type.as_deref()
        && !token_type.eq_ignore_ascii_case("bearer")
    {
        debug!(token_type, "unexpected token type; using as bearer");
    }

    let lifetime = parsed
        .expires_in
        .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
    debug!(expires_in_secs = lifetime.as_secs(), "access token acquired");

    Ok(AccessToken::new(token, lifetime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_redacts_value() {
        let token = AccessToken::new("very-secret-token", Duration::from_secs(60));
        let debug = format!("{token:?}");
        assert!(!debug.contains("very-secret-token"));
        assert_eq!(token.secret(), "very-secret-token");
    }

    #[test]
    fn test_access_token_refresh_window() {
        assert!(!AccessToken::new("t", Duration::from_secs(3600)).needs_refresh());
        assert!(AccessToken::new("t", Duration::from_secs(10)).needs_refresh());
        assert!(AccessToken::new("t", Duration::ZERO).needs_refresh());
    }
}
