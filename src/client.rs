//! HTTP client for a running `tagmarks serve` instance.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::entry::Entry;

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport or decoding failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, trimmed.
        body: String,
    },
    /// The configured server address cannot carry a path.
    #[error("invalid server url: {0}")]
    BaseUrl(String),
}

/// Result alias for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Thin wrapper over the server's `/api/v1` endpoints.
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// Client for `base_url` (e.g. `http://localhost:4912`) with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tagmarks/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // Each segment is percent-encoded, so names containing `/` or `?` stay one segment.
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::BaseUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::BaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Queries `/api/v1/find` with one of `name`, `url` or `tag`. `None` when nothing matched.
    pub async fn find(&self, param: &str, value: &str) -> ClientResult<Option<Vec<Entry>>> {
        debug!(param, value, "find");
        let resp = self
            .http
            .get(self.url("/api/v1/find"))
            .query(&[(param, value)])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(resp).await.map(Some)
    }

    /// Creates an entry; `tags` is comma-separated.
    pub async fn create(&self, name: &str, url: &str, tags: &str) -> ClientResult<()> {
        let resp = self
            .http
            .post(self.url("/api/v1/create"))
            .form(&[("name", name), ("url", url), ("tags", tags)])
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    /// Deletes by name. Returns `false` without calling delete when the name is unknown.
    pub async fn delete(&self, name: &str) -> ClientResult<bool> {
        if self.find("name", name).await?.is_none() {
            return Ok(false);
        }
        let resp = self
            .http
            .delete(self.endpoint(&["api", "v1", "delete", name])?)
            .send()
            .await?;
        check(resp).await.map(|_| true)
    }

    /// Every entry on the server.
    pub async fn dump(&self) -> ClientResult<Vec<Entry>> {
        let resp = self.http.get(self.url("/api/v1/dump")).send().await?;
        decode(resp).await
    }

    /// Every known tag.
    pub async fn tags(&self) -> ClientResult<Vec<String>> {
        let resp = self.http.get(self.url("/api/v1/tags")).send().await?;
        decode(resp).await
    }

    /// Triggers a synchronous save and returns the server's message.
    pub async fn save(&self) -> ClientResult<String> {
        let resp = self.http.post(self.url("/api/v1/save")).send().await?;
        check(resp).await
    }
}

async fn check(resp: reqwest::Response) -> ClientResult<String> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        });
    }
    Ok(body.trim().to_string())
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> ClientResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        });
    }
    Ok(resp.json().await?)
}
