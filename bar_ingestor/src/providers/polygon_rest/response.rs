use serde::Deserialize;

use crate::models::bar::RawBarRecord;
use crate::providers::{errors::PageFailure, transport::PageCursor};

/// Body of one aggregates page.
#[derive(Deserialize, Debug)]
pub struct AggregatesResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "resultsCount", default)]
    pub results_count: Option<u64>,
    #[serde(default)]
    pub results: Option<Vec<RawBarRecord>>,
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// What the fetch loop needs from a page: its records and where to go next.
#[derive(Debug)]
pub struct AggregatesPage {
    pub results: Vec<RawBarRecord>,
    pub next: Option<PageCursor>,
}

impl AggregatesResponse {
    pub fn from_value(body: serde_json::Value) -> Result<Self, PageFailure> {
        serde_json::from_value(body).map_err(|e| PageFailure::MalformedBody(e.to_string()))
    }

    /// Validates the body and splits it into records plus continuation.
    ///
    /// Polygon omits `results` entirely for an empty window, so a missing
    /// `results` is only accepted alongside `resultsCount: 0`.
    pub fn into_page(self) -> Result<AggregatesPage, PageFailure> {
        if self.status.as_deref() == Some("ERROR") {
            let detail = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "unspecified provider error".to_string());
            return Err(PageFailure::Provider(detail));
        }

        let results = match (self.results, self.results_count) {
            (Some(results), _) => results,
            (None, Some(0)) => Vec::new(),
            (None, _) => return Err(PageFailure::MissingResults),
        };

        let next = self
            .next_url
            .filter(|url| !url.trim().is_empty())
            .map(PageCursor::new);

        Ok(AggregatesPage { results, next })
    }
}
