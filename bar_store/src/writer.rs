//! Idempotent, transactional persistence of canonical bars.
//!
//! Each batch is written inside one `BEGIN IMMEDIATE` transaction as a series
//! of `INSERT ... ON CONFLICT (symbol, ts, timeframe) DO UPDATE` statements, so
//! replaying a batch leaves the store exactly as one write would.

use async_trait::async_trait;
use bar_ingestor::models::bar::CanonicalBar;
use chrono::Datelike;
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use thiserror::Error;
use tracing::debug;

use crate::{
    db::pool::SqlitePool,
    schema::{daily_bars, intraday_bars},
    tz,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteResult {
    /// Rows inserted or replaced.
    pub rows: usize,
}

#[derive(Debug, Error)]
pub enum WriteError {
    /// Worth retrying later: pool exhaustion, a locked database, a dropped connection.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Retrying will not help: constraint violation, schema mismatch.
    #[error("store write failed: {0}")]
    Fatal(String),
}

impl WriteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WriteError::Transient(_))
    }
}

impl From<DieselError> for WriteError {
    fn from(err: DieselError) -> Self {
        match &err {
            DieselError::DatabaseError(kind, info) => {
                let message = info.message().to_ascii_lowercase();
                if message.contains("database is locked") || message.contains("busy") {
                    return WriteError::Transient(err.to_string());
                }
                match kind {
                    DatabaseErrorKind::UnableToSendCommand | DatabaseErrorKind::ClosedConnection => {
                        WriteError::Transient(err.to_string())
                    }
                    _ => WriteError::Fatal(err.to_string()),
                }
            }
            _ => WriteError::Fatal(err.to_string()),
        }
    }
}

/// Destination for normalized bars.
#[async_trait]
pub trait BarSink: Send + Sync {
    /// Persists `batch` atomically. An empty batch is a no-op.
    async fn write(&self, batch: &[CanonicalBar]) -> Result<WriteResult, WriteError>;
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = intraday_bars, treat_none_as_null = true)]
struct IntradayRow<'a> {
    symbol: &'a str,
    ts: String,
    timeframe: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
    trade_count: Option<i64>,
    vwap: Option<f64>,
    month: i32,
    iso_week: i32,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = daily_bars, treat_none_as_null = true)]
struct DailyRow<'a> {
    symbol: &'a str,
    ts: String,
    timeframe: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
    trade_count: Option<i64>,
    vwap: Option<f64>,
}

impl<'a> From<&'a CanonicalBar> for IntradayRow<'a> {
    fn from(bar: &'a CanonicalBar) -> Self {
        Self {
            symbol: &bar.symbol,
            ts: tz::to_rfc3339_millis(bar.timestamp),
            timeframe: bar.timeframe.label(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            trade_count: bar.trade_count,
            vwap: bar.vwap,
            month: bar.month.unwrap_or_else(|| bar.timestamp.month()) as i32,
            iso_week: bar
                .iso_week
                .unwrap_or_else(|| bar.timestamp.iso_week().week()) as i32,
        }
    }
}

impl<'a> From<&'a CanonicalBar> for DailyRow<'a> {
    fn from(bar: &'a CanonicalBar) -> Self {
        Self {
            symbol: &bar.symbol,
            ts: tz::to_rfc3339_millis(bar.timestamp),
            timeframe: bar.timeframe.label(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            trade_count: bar.trade_count,
            vwap: bar.vwap,
        }
    }
}

fn upsert_bar(conn: &mut SqliteConnection, bar: &CanonicalBar) -> QueryResult<usize> {
    if bar.is_intraday() {
        use crate::schema::intraday_bars::dsl::*;

        let row = IntradayRow::from(bar);
        diesel::insert_into(intraday_bars)
            .values(&row)
            .on_conflict((symbol, ts, timeframe))
            .do_update()
            .set(&row)
            .execute(conn)
    } else {
        use crate::schema::daily_bars::dsl::*;

        let row = DailyRow::from(bar);
        diesel::insert_into(daily_bars)
            .values(&row)
            .on_conflict((symbol, ts, timeframe))
            .do_update()
            .set(&row)
            .execute(conn)
    }
}

/// Writes a whole batch in one immediate transaction. Blocking.
pub fn write_batch(conn: &mut SqliteConnection, batch: &[CanonicalBar]) -> QueryResult<usize> {
    conn.immediate_transaction(|conn| {
        let mut rows = 0;
        for bar in batch {
            rows += upsert_bar(conn, bar)?;
        }
        Ok(rows)
    })
}

/// [`BarSink`] over a pooled SQLite store.
///
/// Diesel work runs on the blocking pool. Once a write has been handed over it
/// runs to commit or rollback even if the caller stops waiting.
#[derive(Clone)]
pub struct SqliteBarWriter {
    pool: SqlitePool,
}

impl SqliteBarWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BarSink for SqliteBarWriter {
    async fn write(&self, batch: &[CanonicalBar]) -> Result<WriteResult, WriteError> {
        if batch.is_empty() {
            return Ok(WriteResult::default());
        }

        let pool = self.pool.clone();
        let batch = batch.to_vec();
        let rows = tokio::task::spawn_blocking(move || -> Result<usize, WriteError> {
            let mut conn = pool
                .get()
                .map_err(|e| WriteError::Transient(format!("no store connection: {e}")))?;
            Ok(write_batch(&mut conn, &batch)?)
        })
        .await
        .map_err(|e| WriteError::Fatal(format!("write task failed: {e}")))??;

        debug!(rows, "batch committed");
        Ok(WriteResult { rows })
    }
}
