//! SQLite connection helpers.
//!
//! Provides [`connect_sqlite`] that opens a connection and applies the PRAGMAs
//! every store connection runs with: WAL journaling, foreign_keys=ON, and a
//! busy timeout (5000ms unless the pool is configured otherwise).
//!
//! Example:
//! ```no_run
//! use bar_store::db::connection::connect_sqlite;
//!
//! let path = std::env::temp_dir().join("bar_store_example.db");
//! let _conn = connect_sqlite(path.to_str().unwrap()).expect("open sqlite");
//! ```

use std::time::Duration;

use diesel::{Connection, QueryResult, SqliteConnection, connection::SimpleConnection};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open a SQLite connection and apply connection-wide PRAGMAs.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)?;
    apply_pragmas(&mut conn, DEFAULT_BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Busy timeout goes first so the journal-mode switch can wait out a writer.
pub fn apply_pragmas(conn: &mut SqliteConnection, busy_timeout: Duration) -> QueryResult<()> {
    conn.batch_execute(&format!(
        "PRAGMA busy_timeout={}; PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;",
        busy_timeout.as_millis()
    ))
}
