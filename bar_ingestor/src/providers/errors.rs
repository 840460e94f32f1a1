use std::time::Duration;

use thiserror::Error;

use crate::models::bar::RawBarRecord;
use crate::providers::transport::PageCursor;

/// Why a single page request failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageFailure {
    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or broke mid-response.
    #[error("transport error: {0}")]
    Connection(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        retry_after: Option<Duration>,
        body: String,
    },

    /// The request itself could not be built (e.g. an unusable URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The body was not the JSON document we expected.
    #[error("malformed response body: {0}")]
    MalformedBody(String),

    /// The body parsed but carries no `results` field.
    #[error("response has no `results` field")]
    MissingResults,

    /// The provider answered with `status: "ERROR"`.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider handed back the cursor we just requested.
    #[error("provider repeated continuation cursor {0}")]
    CursorLoop(String),
}

impl PageFailure {
    /// Timeouts, connection failures, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PageFailure::Timeout(_) | PageFailure::Connection(_) => true,
            PageFailure::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PageFailure::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Outcome of a failed window fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A page failed retryably and used up its budget. The fetcher converts this
    /// into [`FetchError::Partial`] before returning, attaching what it already has.
    #[error("retryable page failure: {0}")]
    Retryable(PageFailure),

    /// Pagination stopped early. `records` holds every record from the pages
    /// before the failing one; `cursor` is the continuation that failed
    /// (`None` when the very first request failed).
    #[error(
        "pagination incomplete after {attempts} attempts ({} records kept): {source}",
        .records.len()
    )]
    Partial {
        records: Vec<RawBarRecord>,
        cursor: Option<PageCursor>,
        attempts: u32,
        source: PageFailure,
    },

    /// Non-retryable failure. Records from earlier pages are discarded.
    #[error("terminal fetch failure: {source}")]
    Terminal {
        cursor: Option<PageCursor>,
        source: PageFailure,
    },

    #[error("fetch cancelled")]
    Cancelled,
}
