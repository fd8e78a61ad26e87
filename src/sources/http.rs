use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::sources::SourceError;

/// A GET request against a provider's search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub headers: Vec<(&'static str, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    #[cfg(test)]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Transport-level failure, before it is attributed to a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("timed out")]
    Timeout,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Transport(String),
}

impl FetchError {
    pub fn into_source_error(self, provider: &str) -> SourceError {
        let provider = provider.to_string();
        match self {
            FetchError::Timeout => SourceError::Timeout { provider },
            FetchError::Status(code) => SourceError::Request {
                provider,
                status_code: Some(code),
                message: format!("upstream returned HTTP {code}"),
            },
            FetchError::Transport(message) => SourceError::Request {
                provider,
                status_code: None,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Capability to fetch JSON over HTTP. Sources only see this trait, so tests
/// can hand them canned responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_json(&self, request: &FetchRequest) -> Result<Value, FetchError>;
}

/// reqwest-backed fetcher with a fixed per-call timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_json(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        let mut builder = self.client.get(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!("GET {} returned {status}", request.url);
            return Err(FetchError::Status(status.as_u16()));
        }

        let data: Value = resp.json().await?;
        Ok(data)
    }
}
