//! Authenticated vault session.
//!
//! A [`VaultSession`] only exists after a successful token exchange, so there
//! is no "absent session" state downstream: a login failure is returned as
//! [`ApiError::Unauthenticated`] from [`VaultSession::login`].

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::auth::{AccessToken, request_token};
use super::documents::{Document, Envelope, RequestOptions};
use super::files::FileStream;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::{ApiError, DocumentSource};
use crate::config::VaultConfig;
use crate::materialize::ByteStream;
use crate::user_agent;

/// Client for the search and file endpoints of one customer database.
pub struct VaultSession {
    client: Client,
    config: VaultConfig,
    resource_base: Url,
    token: Mutex<AccessToken>,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("resource_base", &self.resource_base.as_str())
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl VaultSession {
    /// Builds the HTTP client, exchanges credentials for a token and returns
    /// a ready session.
    ///
    /// # Errors
    ///
    /// - [`ApiError::InvalidUrl`] if `base_url` or the aliases do not form a URL
    /// - [`ApiError::Unauthenticated`] if the token endpoint rejects the credentials
    /// - [`ApiError::Network`] / [`ApiError::Timeout`] on transport failure
    #[instrument(skip(config), fields(base_url = %config.base_url, customer = %config.customer_alias, database = %config.database_alias))]
    pub async fn login(config: VaultConfig) -> Result<Self, ApiError> {
        let resource_base = resource_base_url(&config)?;
        let client = build_client(&config)?;
        let token = request_token(&client, &config).await?;

        info!(resource_base = %resource_base, "vault session established");

        Ok(Self {
            client,
            config,
            resource_base,
            token: Mutex::new(token),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy used for search and file requests.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Base URL all resource paths are resolved against
    /// (`<base>/api/v<version>/<customer>/<database>/`).
    #[must_use]
    pub fn resource_base(&self) -> &Url {
        &self.resource_base
    }

    /// Runs one page of a document search.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Api`] when the envelope reports a non-success
    /// status, [`ApiError::Decode`] for malformed bodies, and transport or
    /// auth errors from the request itself.
    #[instrument(skip(self), fields(query = %options.query))]
    pub async fn search_documents(
        &self,
        options: &RequestOptions,
    ) -> Result<Vec<Document>, ApiError> {
        let url = self.resource_url(&["documents"])?;
        let response = self.send(&url, &options.query_pairs()).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(url.as_str(), e))?;

        let envelope: Envelope<Vec<Document>> = serde_json::from_str(&body)
            .map_err(|e| ApiError::decode(url.as_str(), e.to_string()))?;
        if !envelope.meta.is_success() {
            return Err(ApiError::api(
                url.as_str(),
                envelope.meta.status,
                envelope.meta.describe(),
            ));
        }

        let documents = envelope.data.unwrap_or_default();
        debug!(count = documents.len(), "search page received");
        Ok(documents)
    }

    /// Runs a search and follows `offset`/`limit` paging until a short page.
    ///
    /// Revisions already returned by an earlier page are dropped, and paging
    /// stops at a page with nothing new.
    ///
    /// # Errors
    ///
    /// Same as [`search_documents`](Self::search_documents).
    #[instrument(skip(self), fields(query = %options.query, page_size = self.config.page_size))]
    pub async fn search_all_documents(
        &self,
        options: &RequestOptions,
    ) -> Result<Vec<Document>, ApiError> {
        let page_size = self.config.page_size.max(1);
        let mut documents: Vec<Document> = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut offset: u32 = 0;

        loop {
            let page = self.search_documents(&options.page(offset, page_size)).await?;
            let page_len = page.len();

            // Servers that ignore `offset` or `limit` return overlapping pages.
            let before = documents.len();
            documents.extend(page.into_iter().filter(|doc| seen.insert(doc.id)));
            let added = documents.len() - before;
            if added < page_len {
                debug!(offset, duplicates = page_len - added, "dropped documents already seen");
            }
            if page_len > 0 && added == 0 {
                warn!(offset, "search page contained no new documents; stopping");
                break;
            }

            if page_len < page_size as usize {
                break;
            }
            offset = offset.saturating_add(page_size);
        }

        info!(count = documents.len(), "search complete");
        Ok(documents)
    }

    /// Opens the file attached to a document revision.
    ///
    /// Returns `Ok(None)` when the revision has no file (404 or 204).
    ///
    /// # Errors
    ///
    /// Transport, auth and non-404 HTTP errors.
    #[instrument(skip(self))]
    pub async fn get_file_stream(&self, revision_id: Uuid) -> Result<Option<FileStream>, ApiError> {
        let id = revision_id.to_string();
        let url = self.resource_url(&["files", &id])?;

        let response = match self.send(&url, &[]).await {
            Ok(response) => response,
            Err(ApiError::HttpStatus { status: 404, .. }) => {
                debug!("revision has no attached file");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if response.status() == StatusCode::NO_CONTENT {
            debug!("revision has no attached file");
            return Ok(None);
        }

        Ok(Some(FileStream::new(url.as_str(), response)))
    }

    fn resource_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.resource_base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::invalid_url(self.resource_base.as_str()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends an authorized GET, retrying transient failures per policy.
    async fn send(&self, url: &Url, query: &[(&str, String)]) -> Result<Response, ApiError> {
        let mut attempt: u32 = 1;
        loop {
            match self.send_once(url, query).await {
                Ok(response) => return Ok(response),
                Err(error) => match self.retry_policy.should_retry(classify_error(&error), attempt)
                {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        warn!(url = %url, error = %error, attempt, delay_ms = delay.as_millis(), "request failed; retrying");
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url = %url, %reason, "not retrying");
                        return Err(error);
                    }
                },
            }
        }
    }

    /// One request, with a single token refresh and replay on 401.
    async fn send_once(&self, url: &Url, query: &[(&str, String)]) -> Result<Response, ApiError> {
        let token = self.current_token().await?;
        let response = self.get(url, query, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(url, response);
        }

        debug!(url = %url, "401 from resource; refreshing access token");
        let token = self.refresh_token().await?;
        let response = self.get(url, query, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::unauthenticated(
                url.as_str(),
                "request rejected after token refresh",
            ));
        }
        check_status(url, response)
    }

    async fn get(
        &self,
        url: &Url,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<Response, ApiError> {
        let mut request = self.client.get(url.clone()).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        request
            .send()
            .await
            .map_err(|e| ApiError::network(url.as_str(), e))
    }

    async fn current_token(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        if guard.needs_refresh() {
            debug!("access token near expiry; refreshing");
            *guard = request_token(&self.client, &self.config).await?;
        }
        Ok(guard.secret().to_string())
    }

    async fn refresh_token(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        *guard = request_token(&self.client, &self.config).await?;
        Ok(guard.secret().to_string())
    }
}

#[async_trait]
impl DocumentSource for VaultSession {
    async fn search(&self, options: &RequestOptions) -> Result<Vec<Document>, ApiError> {
        self.search_all_documents(options).await
    }

    async fn open_file(&self, revision_id: Uuid) -> Result<Option<ByteStream>, ApiError> {
        Ok(self
            .get_file_stream(revision_id)
            .await?
            .map(FileStream::into_byte_stream))
    }
}

fn check_status(url: &Url, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::FORBIDDEN {
        return Err(ApiError::unauthenticated(
            url.as_str(),
            "HTTP 403: credentials lack access to this resource",
        ));
    }
    Err(ApiError::http_status(url.as_str(), status.as_u16()))
}

/// `<base_url>/api/v<version>/<customer>/<database>/`
fn resource_base_url(config: &VaultConfig) -> Result<Url, ApiError> {
    let mut url =
        Url::parse(&config.base_url).map_err(|_| ApiError::invalid_url(&config.base_url))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::invalid_url(&config.base_url));
    }
    for part in [&config.customer_alias, &config.database_alias] {
        if part.is_empty() || part.contains('/') {
            return Err(ApiError::invalid_url(format!("{}/{part}", config.base_url)));
        }
    }

    let version = format!("v{}", config.api_version.trim_start_matches(['v', 'V']));
    url.path_segments_mut()
        .map_err(|()| ApiError::invalid_url(&config.base_url))?
        .pop_if_empty()
        .extend([
            "api",
            version.as_str(),
            config.customer_alias.as_str(),
            config.database_alias.as_str(),
            "",
        ]);
    Ok(url)
}

fn build_client(config: &VaultConfig) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
        .map_err(|e| ApiError::network(&config.base_url, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> VaultConfig {
        VaultConfig::new(
            base_url,
            "FLDCF",
            "SAMH",
            "key",
            "secret",
            "https://vault.example.com/oauth/token",
        )
    }

    #[test]
    fn test_resource_base_url_layout() {
        let url = resource_base_url(&config("https://vault.example.com")).unwrap();
        assert_eq!(url.as_str(), "https://vault.example.com/api/v1/FLDCF/SAMH/");
    }

    #[test]
    fn test_resource_base_url_tolerates_trailing_slash_and_v_prefix() {
        let mut cfg = config("https://vault.example.com/");
        cfg.api_version = "v2".to_string();
        let url = resource_base_url(&cfg).unwrap();
        assert_eq!(url.as_str(), "https://vault.example.com/api/v2/FLDCF/SAMH/");
    }

    #[test]
    fn test_resource_base_url_keeps_base_path_prefix() {
        let url = resource_base_url(&config("https://example.com/vault")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/vault/api/v1/FLDCF/SAMH/");
    }

    #[test]
    fn test_resource_base_url_rejects_bad_input() {
        assert!(matches!(
            resource_base_url(&config("not a url")),
            Err(ApiError::InvalidUrl { .. })
        ));
        assert!(matches!(
            resource_base_url(&config("ftp://vault.example.com")),
            Err(ApiError::InvalidUrl { .. })
        ));
        let mut cfg = config("https://vault.example.com");
        cfg.customer_alias = "a/b".to_string();
        assert!(matches!(
            resource_base_url(&cfg),
            Err(ApiError::InvalidUrl { .. })
        ));
    }
}
