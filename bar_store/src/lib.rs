//! Relational store for canonical bars.
//!
//! Sub-day bars land in `intraday_bars`, day-or-coarser bars in `daily_bars`;
//! both are keyed by `(symbol, ts, timeframe)`.

pub mod db;
pub mod schema;
pub mod tz;
pub mod writer;
