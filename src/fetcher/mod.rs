//! Paginated, paced and retrying HTTP GET layer
//!
//! [`PagedFetcher`] owns the single `reqwest::Client` of a run. Every request goes through
//! the shared [`RequestPacer`] and the retry loop in [`crate::retry`]; response bodies are
//! decoded inside the attempt, so a truncated body is retried like a dropped connection.
//!
//! Two pagination modes are supported:
//! - [`PaginationMode::PageNumber`]: plain JSON arrays, walked until an empty or short page
//! - [`PaginationMode::TotalCount`]: search results shaped `{"total_count": N, "items": [..]}`

use crate::config::{ClientConfig, RetryConfig};
use crate::error::{Error, FetchCause, FetchError, Result};
use crate::pacing::RequestPacer;
use crate::retry::with_retry;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Media type requested from the GitHub REST API
pub const GITHUB_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// The search API never returns more than this many results, whatever `total_count` says
pub const SEARCH_RESULT_LIMIT: u64 = 1000;

/// Largest page size the API honours; larger requests are served 100 at a time
pub const MAX_PER_PAGE: u32 = 100;

/// Longest error body kept in a [`FetchCause::HttpStatus`]
const MAX_ERROR_BODY_CHARS: usize = 512;

/// How a listing is split into pages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaginationMode {
    /// Each page is a JSON array; stop on an empty page or one shorter than `per_page`
    PageNumber,
    /// Each page is `{total_count, items}`; stop once `page * per_page >= total_count`
    TotalCount,
}

/// A paginated listing to fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// Endpoint path relative to the API base URL, e.g. `/repos/o/r/pulls`
    pub endpoint: String,
    /// Query parameters sent with every page (`per_page` and `page` are added)
    pub params: Vec<(String, String)>,
    /// Pagination mode
    pub mode: PaginationMode,
    /// Page size, clamped to `1..=MAX_PER_PAGE` when fetching
    pub per_page: u32,
    /// Stop after this many pages
    pub max_pages: Option<u32>,
}

impl PageRequest {
    /// Page-number listing of `endpoint` with 100 items per page and no page limit
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            mode: PaginationMode::PageNumber,
            per_page: 100,
            max_pages: None,
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Switch to total-count-driven pagination
    #[must_use]
    pub fn total_count(mut self) -> Self {
        self.mode = PaginationMode::TotalCount;
        self
    }

    /// Set the page size
    #[must_use]
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Cap the number of pages fetched
    #[must_use]
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

/// Body standing in for a listing page answered with no content (e.g. contributors of an
/// empty repository)
const EMPTY_LISTING: Option<&str> = Some("[]");

/// One page of a search result
#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    total_count: u64,
    items: Vec<T>,
}

/// HTTP GET with pacing, retries and pagination
#[derive(Clone, Debug)]
pub struct PagedFetcher {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
    pacer: RequestPacer,
}

impl PagedFetcher {
    /// Create a fetcher
    ///
    /// Proxies come only from `config`; proxy discovery from the process environment is
    /// disabled on the client itself.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid base URL, proxy URL or token, or if
    /// the HTTP client cannot be built
    pub fn new(config: &ClientConfig, retry: RetryConfig, pacer: RequestPacer) -> Result<Self> {
        let base_url = url::Url::parse(&config.base_url)
            .map_err(|e| Error::config("base_url", format!("'{}': {e}", config.base_url)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::config("token", "token contains invalid header characters"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .no_proxy()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout);

        if let Some(proxy) = &config.http_proxy {
            let proxy = reqwest::Proxy::http(proxy)
                .map_err(|e| Error::config("http_proxy", format!("'{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        if let Some(proxy) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(proxy)
                .map_err(|e| Error::config("https_proxy", format!("'{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for all GitHub requests");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| Error::config("client", format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            retry,
            pacer,
        })
    }

    /// Fetch a single, unpaginated object
    ///
    /// # Errors
    /// Returns the last [`FetchError`] once retries are exhausted, or the first permanent one
    pub async fn fetch_object<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> std::result::Result<T, FetchError> {
        self.get_json_or(endpoint, params, endpoint, None).await
    }

    /// Fetch every page of a listing and concatenate the items in request order
    ///
    /// # Errors
    /// Any page that fails after retries aborts the whole walk; no partial result is returned
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        request: &PageRequest,
    ) -> std::result::Result<Vec<T>, FetchError> {
        let per_page = request.per_page.clamp(1, MAX_PER_PAGE);
        let mut records: Vec<T> = Vec::new();
        let mut page: u32 = 1;

        loop {
            if request.max_pages.is_some_and(|max| page > max) {
                debug!(
                    endpoint = %request.endpoint,
                    pages = page - 1,
                    "Page limit reached"
                );
                break;
            }

            let mut query = request.params.clone();
            query.push(("per_page".to_string(), per_page.to_string()));
            query.push(("page".to_string(), page.to_string()));
            let label = format!("{}?page={page}", request.endpoint);

            let (items, last_page) = match request.mode {
                PaginationMode::PageNumber => {
                    let items: Vec<T> = self
                        .get_json_or(&request.endpoint, &query, &label, EMPTY_LISTING)
                        .await?;
                    let last_page = items.len() < per_page as usize;
                    (items, last_page)
                }
                PaginationMode::TotalCount => {
                    let result: SearchPage<T> = self
                        .get_json_or(&request.endpoint, &query, &label, None)
                        .await?;
                    let reachable = result.total_count.min(SEARCH_RESULT_LIMIT);
                    let last_page = u64::from(page) * u64::from(per_page) >= reachable;
                    (result.items, last_page)
                }
            };

            let received = items.len();
            records.extend(items);
            debug!(
                endpoint = %request.endpoint,
                page,
                received,
                total = records.len(),
                "Fetched page"
            );

            if received == 0 || last_page {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    /// Paced, retried GET decoded as JSON
    ///
    /// `empty` is decoded instead of a `204 No Content` or blank body; without it such a
    /// response is a decode error.
    async fn get_json_or<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(String, String)],
        label: &str,
        empty: Option<&'static str>,
    ) -> std::result::Result<T, FetchError> {
        with_retry(&self.retry, |attempt| async move {
            self.pacer.acquire().await;
            self.attempt(endpoint, query, label, attempt, empty).await
        })
        .await
    }

    /// A single attempt
    async fn attempt<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(String, String)],
        label: &str,
        attempt: u32,
        empty: Option<&'static str>,
    ) -> std::result::Result<T, FetchError> {
        let url = format!("{}{endpoint}", self.base_url);
        debug!(endpoint = label, attempt, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::new(label, attempt, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            // The body only decorates the error; a failed read leaves it empty
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::new(
                label,
                attempt,
                FetchCause::HttpStatus {
                    status: status.as_u16(),
                    body: truncate_body(&body),
                    retry_after,
                },
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(label, attempt, e))?;
        if let Some(empty) = empty
            && (status == StatusCode::NO_CONTENT || bytes.trim_ascii().is_empty())
        {
            debug!(endpoint = label, status = status.as_u16(), "Empty body read as empty page");
            return serde_json::from_str(empty).map_err(|e| FetchError::new(label, attempt, e));
        }
        serde_json::from_slice(&bytes).map_err(|e| FetchError::new(label, attempt, e))
    }
}

/// Parse a `Retry-After` header given in whole seconds
///
/// The HTTP-date form is not used by GitHub and is ignored.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        truncated.push('…');
        truncated
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
