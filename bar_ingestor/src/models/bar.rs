//! Raw provider records and the canonical bar they normalize into.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::timeframe::TimeFrame;

/// One provider-native bar as received, keys in provider order.
///
/// Field names depend on the provider and granularity (`t` vs `day`, optional
/// `vw`/`n`), so nothing is interpreted until [`crate::normalize`] runs.
pub type RawBarRecord = IndexMap<String, serde_json::Value>;

/// A single vendor-agnostic OHLCV bar.
///
/// Identified by `(symbol, timestamp, timeframe)`. Re-ingesting the same key
/// replaces the stored row rather than adding one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBar {
    /// Upper-case ticker (e.g. "AAPL").
    pub symbol: String,

    /// Bar open time in UTC. Midnight UTC for day-or-coarser bars.
    pub timestamp: DateTime<Utc>,

    pub timeframe: TimeFrame,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Shares traded during the bar interval.
    pub volume: i64,

    /// Trade count for the bar. Not all providers supply this.
    pub trade_count: Option<i64>,

    /// Volume-weighted average price. Not all providers supply this.
    pub vwap: Option<f64>,

    /// Calendar month (1-12) of `timestamp`; intraday bars only.
    pub month: Option<u32>,

    /// ISO-8601 week number of `timestamp`; intraday bars only.
    pub iso_week: Option<u32>,
}

impl CanonicalBar {
    pub fn is_intraday(&self) -> bool {
        self.timeframe.granularity.is_intraday()
    }
}
