//! HTTP seam for page requests.
//!
//! The fetch loop only ever sees [`PageTransport`]: a request goes in, a JSON
//! body or a classified [`PageFailure`] comes out. [`ReqwestTransport`] is the
//! production implementation; tests script one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, header::RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;

use crate::providers::{ClientBuildSnafu, ProviderInitError, errors::PageFailure};

/// Opaque continuation handed back by the provider.
///
/// Lives only inside one fetch loop. It shows up in errors so a caller can see
/// where pagination stopped, never in stored data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One GET, without credentials. The transport attaches the API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl PageRequest {
    /// A continuation request: the cursor already encodes every parameter.
    pub fn resume(cursor: &PageCursor) -> Self {
        Self {
            url: cursor.as_str().to_string(),
            query: Vec::new(),
        }
    }
}

#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn get_page(&self, request: &PageRequest) -> Result<serde_json::Value, PageFailure>;
}

/// `reqwest`-backed transport with a per-request timeout and query-string auth.
pub struct ReqwestTransport {
    client: Client,
    api_key: SecretString,
}

impl ReqwestTransport {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bar_ingestor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self { client, api_key })
    }
}

fn classify_reqwest(err: reqwest::Error) -> PageFailure {
    if err.is_timeout() {
        PageFailure::Timeout(err.to_string())
    } else if err.is_builder() {
        PageFailure::InvalidRequest(err.to_string())
    } else {
        PageFailure::Connection(err.to_string())
    }
}

/// `Retry-After` as delta-seconds or an HTTP-date. A date in the past means
/// "now".
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[async_trait]
impl PageTransport for ReqwestTransport {
    async fn get_page(&self, request: &PageRequest) -> Result<serde_json::Value, PageFailure> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .query(&[("apiKey", self.api_key.expose_secret())])
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(PageFailure::Status {
                status: status.as_u16(),
                retry_after,
                body,
            });
        }

        let bytes = response.bytes().await.map_err(classify_reqwest)?;
        serde_json::from_slice(&bytes).map_err(|e| PageFailure::MalformedBody(e.to_string()))
    }
}
