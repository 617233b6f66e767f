//! Throttled GitHub REST client.
//!
//! Every request goes through [`GithubClient::send`], which waits out
//! exhausted rate limits (up to a configured ceiling) and turns every other
//! non-success status into a [`GithubError`]. Nothing else retries.

use std::time::Duration;

use lifecycle::{CollaboratorError, RetryPolicy, Timestamp};
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::ApiErrorBody;

/// Page size for list endpoints; GitHub's maximum.
pub(crate) const PAGE_SIZE: usize = 100;

/// Rate-limit waits allowed for one request before it fails.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Floor on a rate-limit wait. A reset that is already due (clock skew,
/// `retry-after: 0`) still backs off.
const MIN_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);

/// Errors produced by the GitHub and ZenHub adapters.
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limit exhausted until {reset}")]
    RateLimited { reset: Timestamp },

    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

impl GithubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GithubError::Api { status: 404, .. })
    }
}

impl From<GithubError> for CollaboratorError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::Http(e) if e.is_decode() => CollaboratorError::Decode(e.to_string()),
            GithubError::Http(e) => CollaboratorError::Transport(e.to_string()),
            GithubError::Api { status, message } => CollaboratorError::Api { status, message },
            GithubError::RateLimited { reset } => CollaboratorError::RateLimited { reset },
            GithubError::Configuration(message) => CollaboratorError::Api {
                status: 0,
                message,
            },
        }
    }
}

/// Connection settings for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// REST API root, e.g. `https://api.github.com`.
    pub api_url: String,
    pub token: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Longest rate-limit reset the client will sleep through before giving up.
    pub max_rate_limit_wait: Duration,
}

impl GithubConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: token.into(),
            user_agent: "issue-lifecycle-manager".to_string(),
            request_timeout: Duration::from_secs(30),
            max_rate_limit_wait: Duration::from_secs(15 * 60),
        }
    }
}

/// Authenticated, rate-limit-aware GitHub API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    max_rate_limit_wait: Duration,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::Configuration`] if the token or user agent are
    /// not valid header values, and [`GithubError::Http`] if the TLS backend
    /// cannot be initialised.
    pub fn new(config: GithubConfig) -> Result<Self, GithubError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| GithubError::Configuration("invalid GitHub token".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            max_rate_limit_wait: config.max_rate_limit_wait,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Sends the request built by `build`, sleeping through rate-limit resets.
    ///
    /// `build` is called again for every attempt. A request is retried at most
    /// [`MAX_RATE_LIMIT_RETRIES`] times, each wait at least
    /// [`MIN_RATE_LIMIT_WAIT`] and at most the configured ceiling.
    pub(crate) async fn send<F>(&self, operation: &str, build: F) -> Result<Response, GithubError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        loop {
            let response = build().send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if let Some(reset) = rate_limit_reset(status, response.headers(), Timestamp::now()) {
                let err = CollaboratorError::RateLimited { reset };
                match err.retry_policy(Timestamp::now()) {
                    RetryPolicy::Retryable { after: wait }
                        if wait <= self.max_rate_limit_wait
                            && retries < MAX_RATE_LIMIT_RETRIES =>
                    {
                        retries += 1;
                        let wait = wait.max(MIN_RATE_LIMIT_WAIT);
                        debug!(%operation, %reset, retries, ?wait, "Waiting for GitHub rate limit reset");
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    _ => {
                        warn!(%operation, %reset, retries, "GitHub rate limit still exhausted, giving up");
                        return Err(GithubError::RateLimited { reset });
                    }
                }
            }

            let message = match response.json::<ApiErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            return Err(GithubError::Api {
                status: status.as_u16(),
                message: format!("{operation}: {message}"),
            });
        }
    }

    pub(crate) async fn get_json<T>(&self, operation: &str, path: &str) -> Result<T, GithubError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(operation, || self.request(Method::GET, path)).await?;
        Ok(response.json::<T>().await?)
    }

    /// Collects every page of a list endpoint.
    pub(crate) async fn get_paginated<T>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, GithubError>
    where
        T: DeserializeOwned,
    {
        let mut rows = Vec::new();
        let mut page: u32 = 1;
        loop {
            let page_str = page.to_string();
            let per_page = PAGE_SIZE.to_string();
            let response = self
                .send(operation, || {
                    self.request(Method::GET, path)
                        .query(query)
                        .query(&[("per_page", per_page.as_str()), ("page", page_str.as_str())])
                })
                .await?;
            let chunk: Vec<T> = response.json().await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }
}

/// When a response signals an exhausted rate limit, the time it resets.
///
/// GitHub reports the primary limit with `403`/`429` plus
/// `x-ratelimit-remaining: 0` and an epoch-seconds `x-ratelimit-reset`, and
/// secondary limits with a `retry-after` in seconds.
pub(crate) fn rate_limit_reset(
    status: StatusCode,
    headers: &header::HeaderMap,
    now: Timestamp,
) -> Option<Timestamp> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    if let Some(seconds) = header_u64("retry-after") {
        let seconds = u32::try_from(seconds).unwrap_or(u32::MAX);
        return Some(now.plus(lifecycle::Delay::seconds(seconds)));
    }

    if header_u64("x-ratelimit-remaining") == Some(0) {
        let reset = header_u64("x-ratelimit-reset")
            .and_then(|epoch| i64::try_from(epoch).ok())
            .and_then(|epoch| chrono::DateTime::from_timestamp(epoch, 0))
            .map(Timestamp::from_utc)
            .unwrap_or(now);
        return Some(reset);
    }

    // GitHub asks for at least a minute when a 429 names no reset time.
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some(now.plus(lifecycle::Delay::seconds(60)));
    }

    None
}
