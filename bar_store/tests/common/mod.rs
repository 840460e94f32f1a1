#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use bar_ingestor::models::{bar::CanonicalBar, timeframe::TimeFrame};
use bar_store::db::{
    self,
    pool::{PoolSettings, SqlitePool, build_pool},
};
use chrono::{Datelike, Duration as ChronoDuration, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

fn temp_path() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();
    TestDb { _dir: dir, path }
}

pub fn settings() -> PoolSettings {
    PoolSettings {
        max_connections: 2,
        connection_timeout: Duration::from_secs(5),
        busy_timeout: Duration::from_millis(200),
    }
}

/// Migrated store behind a pool.
pub fn setup_store() -> (TestDb, SqlitePool) {
    let db = temp_path();
    let pool = db::open(&db.path, settings()).expect("open store");
    (db, pool)
}

/// Pool over a database with no tables at all.
pub fn setup_unmigrated() -> (TestDb, SqlitePool) {
    let db = temp_path();
    let pool = build_pool(&db.path, settings()).expect("pool");
    (db, pool)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection, busy_timeout_ms: i32) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, busy_timeout_ms);
}

/// `n` consecutive hourly bars for `symbol` starting 2023-01-03T14:00Z.
pub fn hourly_bars(symbol: &str, n: usize) -> Vec<CanonicalBar> {
    let start = Utc.with_ymd_and_hms(2023, 1, 3, 14, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let timestamp = start + ChronoDuration::hours(i as i64);
            CanonicalBar {
                symbol: symbol.to_string(),
                timestamp,
                timeframe: TimeFrame::hour(),
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.5 + i as f64,
                volume: 1_000 + i as i64,
                trade_count: Some(10),
                vwap: Some(100.25 + i as f64),
                month: Some(timestamp.month()),
                iso_week: Some(timestamp.iso_week().week()),
            }
        })
        .collect()
}

/// `n` consecutive daily bars for `symbol` starting 2023-01-03.
pub fn daily_bars(symbol: &str, n: usize) -> Vec<CanonicalBar> {
    let start = Utc.with_ymd_and_hms(2023, 1, 3, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| CanonicalBar {
            symbol: symbol.to_string(),
            timestamp: start + ChronoDuration::days(i as i64),
            timeframe: TimeFrame::day(),
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            volume: 5_000,
            trade_count: None,
            vwap: None,
            month: None,
            iso_week: None,
        })
        .collect()
}

pub fn count_intraday(conn: &mut SqliteConnection) -> i64 {
    use bar_store::schema::intraday_bars::dsl::*;
    intraday_bars.count().get_result(conn).unwrap()
}

pub fn count_daily(conn: &mut SqliteConnection) -> i64 {
    use bar_store::schema::daily_bars::dsl::*;
    daily_bars.count().get_result(conn).unwrap()
}
