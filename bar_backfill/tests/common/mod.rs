#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bar_backfill::pipeline::{PipelineSettings, SymbolPipeline};
use bar_ingestor::{
    models::{
        bar::{CanonicalBar, RawBarRecord},
        timeframe::TimeFrame,
        window::{FetchWindow, WindowTemplate},
    },
    providers::{
        BarSource,
        errors::{FetchError, PageFailure},
    },
};
use bar_store::{
    db::{self, pool::PoolSettings, pool::SqlitePool},
    writer::{BarSink, SqliteBarWriter, WriteError, WriteResult},
};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// What the fake provider answers for one symbol.
#[derive(Clone)]
pub enum Canned {
    Records(Vec<RawBarRecord>),
    Partial(Vec<RawBarRecord>),
    Terminal,
}

/// In-memory [`BarSource`] that also tracks how many fetches overlap.
#[derive(Default)]
pub struct FakeSource {
    canned: HashMap<String, Canned>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: &str, canned: Canned) -> Self {
        self.canned.insert(symbol.to_string(), canned);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarSource for FakeSource {
    async fn fetch(
        &self,
        window: &FetchWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawBarRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let waited = tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(self.delay) => Ok(()),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        waited?;

        match self.canned.get(window.symbol()).cloned() {
            Some(Canned::Records(records)) => Ok(records),
            Some(Canned::Partial(records)) => Err(FetchError::Partial {
                records,
                cursor: None,
                attempts: 5,
                source: PageFailure::Status {
                    status: 503,
                    retry_after: None,
                    body: String::new(),
                },
            }),
            Some(Canned::Terminal) | None => Err(FetchError::Terminal {
                cursor: None,
                source: PageFailure::Status {
                    status: 404,
                    retry_after: None,
                    body: "unknown ticker".into(),
                },
            }),
        }
    }
}

/// Sink that fails transiently a fixed number of times, then records batches.
#[derive(Default)]
pub struct FlakySink {
    failures_left: AtomicUsize,
    pub written: Mutex<Vec<CanonicalBar>>,
}

impl FlakySink {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            written: Mutex::default(),
        }
    }
}

#[async_trait]
impl BarSink for FlakySink {
    async fn write(&self, batch: &[CanonicalBar]) -> Result<WriteResult, WriteError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(WriteError::Transient("database is locked".into()));
        }
        self.written.lock().unwrap().extend_from_slice(batch);
        Ok(WriteResult { rows: batch.len() })
    }
}

/// `n` hourly records; the ones at `bad` are missing their close.
pub fn hourly_records(n: usize, bad: &[usize]) -> Vec<RawBarRecord> {
    let start = 1_672_754_400_000_i64; // 2023-01-03T14:00:00Z
    (0..n)
        .map(|i| {
            let mut value = json!({
                "t": start + i as i64 * 3_600_000,
                "o": 100.0,
                "h": 101.0,
                "l": 99.0,
                "c": 100.5,
                "v": 1_000,
                "vw": 100.2,
                "n": 12,
            });
            if bad.contains(&i) {
                value.as_object_mut().unwrap().remove("c");
            }
            serde_json::from_value(value).unwrap()
        })
        .collect()
}

pub fn template() -> WindowTemplate {
    WindowTemplate::new(
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
        TimeFrame::hour(),
    )
    .unwrap()
}

pub struct TestStore {
    _dir: TempDir,
    pub pool: SqlitePool,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path: PathBuf = dir.path().join("bars.db");
        let pool = db::open(
            &path.to_string_lossy(),
            PoolSettings {
                max_connections: 2,
                ..PoolSettings::default()
            },
        )
        .expect("open store");
        Self { _dir: dir, pool }
    }

    pub fn writer(&self) -> Arc<SqliteBarWriter> {
        Arc::new(SqliteBarWriter::new(self.pool.clone()))
    }

    pub fn intraday_rows(&self, for_symbol: &str) -> i64 {
        use bar_store::schema::intraday_bars::dsl::*;
        let mut conn = self.pool.get().unwrap();
        intraday_bars
            .filter(symbol.eq(for_symbol))
            .count()
            .get_result(&mut conn)
            .unwrap()
    }

    pub fn total_intraday_rows(&self) -> i64 {
        use bar_store::schema::intraday_bars::dsl::*;
        let mut conn = self.pool.get().unwrap();
        intraday_bars.count().get_result(&mut conn).unwrap()
    }
}

pub fn pipeline(source: Arc<dyn BarSource>, sink: Arc<dyn BarSink>, drop_threshold: f64) -> SymbolPipeline {
    SymbolPipeline::new(source, sink, PipelineSettings { drop_threshold })
}
