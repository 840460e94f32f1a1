//! Timestamp encoding for the store.
//!
//! All `ts` columns hold RFC-3339 UTC strings with millisecond precision, so
//! lexical order matches chronological order.

use chrono::{DateTime, Utc};

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
