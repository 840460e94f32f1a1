//! Mapping of raw provider records into [`CanonicalBar`]s.
//!
//! Sub-day bars carry an epoch-millisecond `t` and get `month`/`iso_week`
//! derived from it. Day-or-coarser bars are keyed by calendar date: `day`
//! (epoch millis or `YYYY-MM-DD`) or, failing that, `t`, truncated to
//! midnight UTC.
//!
//! Required fields are never defaulted, and optional fields keep the
//! difference between "absent" and zero. Everything here is pure, so records
//! can be normalized in any order or in parallel with identical results.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    bar::{CanonicalBar, RawBarRecord},
    timeframe::TimeFrame,
};

pub const FIELD_TIMESTAMP: &str = "t";
pub const FIELD_DAY: &str = "day";
pub const FIELD_OPEN: &str = "o";
pub const FIELD_HIGH: &str = "h";
pub const FIELD_LOW: &str = "l";
pub const FIELD_CLOSE: &str = "c";
pub const FIELD_VOLUME: &str = "v";
pub const FIELD_TRADE_COUNT: &str = "n";
pub const FIELD_VWAP: &str = "vw";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("required field `{field}` is missing")]
    MissingField { field: &'static str },

    #[error("field `{field}` has an unusable value: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Normalizes one raw record.
pub fn normalize(
    symbol: &str,
    timeframe: TimeFrame,
    raw: &RawBarRecord,
) -> Result<CanonicalBar, NormalizationError> {
    let intraday = timeframe.granularity.is_intraday();

    let timestamp = if intraday {
        let millis = required_i64(raw, FIELD_TIMESTAMP)?;
        DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| invalid(FIELD_TIMESTAMP, millis))?
    } else {
        calendar_day(raw)?
    };

    let (month, iso_week) = if intraday {
        (Some(timestamp.month()), Some(timestamp.iso_week().week()))
    } else {
        (None, None)
    };

    Ok(CanonicalBar {
        symbol: symbol.to_string(),
        timestamp,
        timeframe,
        open: required_f64(raw, FIELD_OPEN)?,
        high: required_f64(raw, FIELD_HIGH)?,
        low: required_f64(raw, FIELD_LOW)?,
        close: required_f64(raw, FIELD_CLOSE)?,
        volume: required_i64(raw, FIELD_VOLUME)?,
        trade_count: optional_i64(raw, FIELD_TRADE_COUNT)?,
        vwap: optional_f64(raw, FIELD_VWAP)?,
        month,
        iso_week,
    })
}

/// Result of normalizing a whole page set.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub bars: Vec<CanonicalBar>,
    /// Index into the input slice and the reason each record was dropped.
    pub rejected: Vec<(usize, NormalizationError)>,
}

impl NormalizedBatch {
    pub fn total(&self) -> usize {
        self.bars.len() + self.rejected.len()
    }

    /// Share of input records that were dropped; `0.0` for an empty input.
    pub fn dropped_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.rejected.len() as f64 / total as f64,
        }
    }
}

/// Normalizes every record, keeping failures alongside their input index.
pub fn normalize_batch(symbol: &str, timeframe: TimeFrame, raw: &[RawBarRecord]) -> NormalizedBatch {
    let mut out = NormalizedBatch {
        bars: Vec::with_capacity(raw.len()),
        rejected: Vec::new(),
    };
    for (idx, record) in raw.iter().enumerate() {
        match normalize(symbol, timeframe, record) {
            Ok(bar) => out.bars.push(bar),
            Err(e) => out.rejected.push((idx, e)),
        }
    }
    out
}

fn calendar_day(raw: &RawBarRecord) -> Result<DateTime<Utc>, NormalizationError> {
    let (field, value) = if let Some(v) = present(raw, FIELD_DAY) {
        (FIELD_DAY, v)
    } else if let Some(v) = present(raw, FIELD_TIMESTAMP) {
        (FIELD_TIMESTAMP, v)
    } else {
        return Err(NormalizationError::MissingField { field: FIELD_DAY });
    };

    let date = match value {
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| invalid(field, s))?,
        other => {
            let millis = as_i64(other).ok_or_else(|| invalid(field, other))?;
            DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| invalid(field, millis))?
                .date_naive()
        }
    };

    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

/// A key mapped to JSON `null` counts as absent.
fn present<'a>(raw: &'a RawBarRecord, field: &str) -> Option<&'a Value> {
    raw.get(field).filter(|v| !v.is_null())
}

fn invalid(field: &'static str, value: impl ToString) -> NormalizationError {
    NormalizationError::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    // Some feeds send integral volumes as floats (e.g. 1.2e6).
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

fn required_f64(raw: &RawBarRecord, field: &'static str) -> Result<f64, NormalizationError> {
    optional_f64(raw, field)?.ok_or(NormalizationError::MissingField { field })
}

fn required_i64(raw: &RawBarRecord, field: &'static str) -> Result<i64, NormalizationError> {
    optional_i64(raw, field)?.ok_or(NormalizationError::MissingField { field })
}

fn optional_f64(raw: &RawBarRecord, field: &'static str) -> Result<Option<f64>, NormalizationError> {
    match present(raw, field) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|f| f.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(field, v)),
    }
}

fn optional_i64(raw: &RawBarRecord, field: &'static str) -> Result<Option<i64>, NormalizationError> {
    match present(raw, field) {
        None => Ok(None),
        Some(v) => as_i64(v).map(Some).ok_or_else(|| invalid(field, v)),
    }
}
