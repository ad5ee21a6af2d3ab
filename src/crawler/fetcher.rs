//! HTTP fetching and error classification
//!
//! One shared client per pipeline stage, built with the configured user agent
//! and timeouts. Every failure is classified into an [`ErrorKind`] so the
//! retry machinery and the failed-targets store see a stable taxonomy.

use crate::config::UserAgentConfig;
use crate::storage::ErrorKind;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// A fetch failure, classified
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP 429 Too Many Requests")]
    RateLimited,

    #[error("HTTP {0} server error")]
    Server(u16),

    #[error("HTTP 404 Not Found")]
    NotFound,

    #[error("HTTP {0} client error")]
    Client(u16),

    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Maps the failure onto the stored error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Network(_) => ErrorKind::TransientNetwork,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::Server(_) => ErrorKind::ServerError,
            Self::NotFound => ErrorKind::NotFound,
            Self::Client(_) => ErrorKind::ClientError,
        }
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Page body
    pub body: String,
}

/// Builds the shared HTTP client
///
/// The user agent identifies the crawler and how to reach its operator:
/// `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout_seconds: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.user_agent_string())
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a single page, classifying every failure
///
/// | Condition          | Result                         |
/// |--------------------|--------------------------------|
/// | HTTP 2xx           | `Ok(FetchedPage)`              |
/// | HTTP 404           | `NotFound` (terminal)          |
/// | HTTP 429           | `RateLimited` (retryable)      |
/// | other HTTP 4xx     | `Client` (terminal)            |
/// | HTTP 5xx           | `Server` (retryable)           |
/// | timeout            | `Timeout` (retryable)          |
/// | connection refused | `Connect` (retryable)          |
/// | body read failure  | `Network` (retryable)          |
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchedPage, FetchError> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            return Err(if e.is_timeout() {
                FetchError::Timeout
            } else if e.is_connect() {
                FetchError::Connect(e.to_string())
            } else {
                FetchError::Network(e.to_string())
            });
        }
    };

    let status = response.status();
    let final_url = response.url().to_string();

    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited);
    }
    if status.is_server_error() {
        return Err(FetchError::Server(status.as_u16()));
    }
    if !status.is_success() {
        return Err(FetchError::Client(status.as_u16()));
    }

    match response.text().await {
        Ok(body) => Ok(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            body,
        }),
        Err(e) => Err(FetchError::Network(e.to_string())),
    }
}
