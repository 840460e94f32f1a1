//! Bar resolution: a [`Granularity`] unit scaled by a non-zero multiplier.

use std::{fmt, num::NonZeroU32, str::FromStr};

use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeFrameError {
    #[error("Invalid multiplier for {granularity}: {message}")]
    InvalidMultiplier {
        granularity: Granularity,
        message: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

/// Time resolution of a bar, named after the provider's `timespan` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }

    /// Sub-day granularities carry a full instant; everything else is keyed by calendar date.
    pub const fn is_intraday(&self) -> bool {
        matches!(self, Granularity::Minute | Granularity::Hour)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = TimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "M" is month, "m" is minute; everything else is case-insensitive.
        if s.trim() == "M" {
            return Ok(Granularity::Month);
        }
        match s.trim().to_lowercase().as_str() {
            "m" | "min" | "minute" => Ok(Granularity::Minute),
            "h" | "hr" | "hour" => Ok(Granularity::Hour),
            "d" | "day" => Ok(Granularity::Day),
            "w" | "wk" | "week" => Ok(Granularity::Week),
            "mo" | "month" => Ok(Granularity::Month),
            "q" | "quarter" => Ok(Granularity::Quarter),
            "y" | "yr" | "year" => Ok(Granularity::Year),
            _ => Err(TimeFrameError::InvalidInput {
                message: format!("Invalid granularity: {s}"),
            }),
        }
    }
}

/// A bar interval = multiplier × granularity (e.g. 5 minute, 1 day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeFrame {
    pub multiplier: NonZeroU32,
    pub granularity: Granularity,
}

impl TimeFrame {
    pub const fn new(multiplier: NonZeroU32, granularity: Granularity) -> Self {
        Self {
            multiplier,
            granularity,
        }
    }

    /// Builds a timeframe from a raw multiplier, rejecting zero.
    pub fn try_new(multiplier: u32, granularity: Granularity) -> Result<Self, TimeFrameError> {
        let multiplier =
            NonZeroU32::new(multiplier).ok_or_else(|| TimeFrameError::InvalidMultiplier {
                granularity,
                message: "multiplier must be a positive integer".into(),
            })?;
        Ok(Self::new(multiplier, granularity))
    }

    pub fn hour() -> Self {
        Self::new(nonzero!(1u32), Granularity::Hour)
    }

    pub fn day() -> Self {
        Self::new(nonzero!(1u32), Granularity::Day)
    }

    /// Storage label, e.g. `"1hour"` or `"15minute"`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.multiplier, self.granularity)
    }
}
