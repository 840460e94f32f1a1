//! The date window requested for one symbol.

use std::num::NonZeroU32;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::timeframe::{Granularity, TimeFrame};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window start {start} is after end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    #[error("symbol must not be empty")]
    EmptySymbol,
}

/// Specifies the sort order for the bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

impl Sort {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Sort::Asc => "asc",
            Sort::Desc => "desc",
        }
    }
}

/// Everything about a fetch except the symbol. One template is shared by the
/// whole run and stamped into a [`FetchWindow`] per symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTemplate {
    /// First calendar date requested (inclusive).
    pub start: NaiveDate,
    /// Last calendar date requested (inclusive, as the provider treats it).
    pub end: NaiveDate,
    pub timeframe: TimeFrame,
    /// Request split/dividend adjusted prices.
    pub adjusted: bool,
    pub sort: Sort,
}

impl WindowTemplate {
    pub fn new(start: NaiveDate, end: NaiveDate, timeframe: TimeFrame) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self {
            start,
            end,
            timeframe,
            adjusted: true,
            sort: Sort::Asc,
        })
    }

    pub fn adjusted(mut self, adjusted: bool) -> Self {
        self.adjusted = adjusted;
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Stamps the template with a symbol. Symbols are trimmed and upper-cased.
    pub fn for_symbol(&self, symbol: &str) -> Result<FetchWindow, WindowError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(WindowError::EmptySymbol);
        }
        Ok(FetchWindow {
            symbol,
            template: self.clone(),
        })
    }
}

/// A fully specified, immutable request window for one symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchWindow {
    symbol: String,
    template: WindowTemplate,
}

impl FetchWindow {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn start(&self) -> NaiveDate {
        self.template.start
    }

    pub fn end(&self) -> NaiveDate {
        self.template.end
    }

    pub fn timeframe(&self) -> TimeFrame {
        self.template.timeframe
    }

    pub fn granularity(&self) -> Granularity {
        self.template.timeframe.granularity
    }

    pub fn multiplier(&self) -> NonZeroU32 {
        self.template.timeframe.multiplier
    }

    pub fn adjusted(&self) -> bool {
        self.template.adjusted
    }

    pub fn sort(&self) -> Sort {
        self.template.sort
    }
}
