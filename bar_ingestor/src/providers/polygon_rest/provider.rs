use std::{collections::HashSet, num::NonZeroU32, time::Duration};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use secrecy::SecretString;
use snafu::ensure;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    models::{bar::RawBarRecord, window::FetchWindow},
    providers::{
        BarSource, InvalidBaseUrlSnafu, ProviderInitError,
        errors::{FetchError, PageFailure},
        polygon_rest::{
            params::first_page_request,
            response::{AggregatesPage, AggregatesResponse},
        },
        transport::{PageCursor, PageRequest, PageTransport, ReqwestTransport},
    },
    retry::RetryPolicy,
};

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io/v2";
pub const API_KEY_ENV: &str = "POLYGON_API_KEY";

/// Everything about the provider except its credentials.
#[derive(Debug, Clone)]
pub struct PolygonSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Records per page requested from the provider.
    pub page_limit: u32,
    pub retry: RetryPolicy,
    /// Shared request quota for every fetch made through one provider.
    pub requests_per_minute: Option<NonZeroU32>,
}

impl Default for PolygonSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            page_limit: 50_000,
            retry: RetryPolicy::default(),
            requests_per_minute: None,
        }
    }
}

pub struct PolygonProvider<T = ReqwestTransport> {
    transport: T,
    base_url: String,
    page_limit: u32,
    retry: RetryPolicy,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl PolygonProvider<ReqwestTransport> {
    /// Creates a provider backed by a real HTTP client.
    pub fn new(api_key: SecretString, settings: PolygonSettings) -> Result<Self, ProviderInitError> {
        let transport = ReqwestTransport::new(api_key, settings.request_timeout)?;
        Self::with_transport(transport, settings)
    }
}

impl<T: PageTransport> PolygonProvider<T> {
    pub fn with_transport(transport: T, settings: PolygonSettings) -> Result<Self, ProviderInitError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            InvalidBaseUrlSnafu { url: base_url }
        );

        Ok(Self {
            transport,
            base_url,
            page_limit: settings.page_limit.max(1),
            retry: settings.retry,
            limiter: settings
                .requests_per_minute
                .map(|rate| RateLimiter::direct(Quota::per_minute(rate))),
        })
    }

    /// One page, retried in place while the failure is retryable.
    ///
    /// Errors come back as `Retryable` (budget spent), `Terminal` with no
    /// cursor attached, or `Cancelled`. The caller adds pagination context.
    async fn fetch_page(
        &self,
        symbol: &str,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<AggregatesPage, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            if let Some(limiter) = &self.limiter {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = limiter.until_ready() => {}
                }
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = self.transport.get_page(request) => result,
            };

            let failure = match result
                .and_then(AggregatesResponse::from_value)
                .and_then(AggregatesResponse::into_page)
            {
                Ok(page) => return Ok(page),
                Err(failure) => failure,
            };

            if !failure.is_retryable() {
                return Err(FetchError::Terminal {
                    cursor: None,
                    source: failure,
                });
            }
            if attempt >= self.retry.max_attempts {
                return Err(FetchError::Retryable(failure));
            }

            let delay = self.retry.delay_with_hint(attempt - 1, failure.retry_after());
            warn!(
                symbol,
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "page request failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[async_trait]
impl<T: PageTransport> BarSource for PolygonProvider<T> {
    async fn fetch(
        &self,
        window: &FetchWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawBarRecord>, FetchError> {
        let symbol = window.symbol();
        let mut records: Vec<RawBarRecord> = Vec::new();
        let mut request = first_page_request(&self.base_url, window, self.page_limit);
        // The continuation being requested; `None` while on the first page.
        let mut cursor: Option<PageCursor> = None;
        let mut pages: usize = 0;
        let mut visited: HashSet<PageCursor> = HashSet::new();

        loop {
            let page = match self.fetch_page(symbol, &request, cancel).await {
                Ok(page) => page,
                Err(FetchError::Retryable(source)) => {
                    warn!(
                        symbol,
                        pages,
                        kept = records.len(),
                        error = %source,
                        "retry budget exhausted, returning partial window"
                    );
                    return Err(FetchError::Partial {
                        records,
                        cursor,
                        attempts: self.retry.max_attempts,
                        source,
                    });
                }
                Err(FetchError::Terminal { source, .. }) => {
                    return Err(FetchError::Terminal { cursor, source });
                }
                Err(other) => return Err(other),
            };

            pages += 1;
            debug!(symbol, page = pages, records = page.results.len(), "fetched page");
            records.extend(page.results);

            match page.next {
                None => break,
                Some(next) if visited.contains(&next) => {
                    return Err(FetchError::Terminal {
                        source: PageFailure::CursorLoop(format!("after page {pages}")),
                        cursor: Some(next),
                    });
                }
                Some(next) => {
                    visited.insert(next.clone());
                    request = PageRequest::resume(&next);
                    cursor = Some(next);
                }
            }
        }

        debug!(symbol, pages, records = records.len(), "window complete");
        Ok(records)
    }
}
