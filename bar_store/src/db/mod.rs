//! Database utilities: tuned connections, the connection pool and migrations.
//!
//! - [`connection::connect_sqlite`] opens a single connection with WAL
//!   journaling, `foreign_keys=ON` and a busy timeout.
//! - [`pool::build_pool`] hands out connections with the same PRAGMAs.
//! - [`migrate::run_pending`] applies the embedded migrations.
//!
//! Example:
//! ```no_run
//! use bar_store::db::{self, pool::PoolSettings};
//!
//! let db_path = std::env::temp_dir().join("bar_store_example.db");
//! let pool = db::open(db_path.to_str().unwrap(), PoolSettings::default()).expect("open store");
//! assert!(pool.max_size() >= 1);
//! ```

pub mod connection;
pub mod migrate;
pub mod pool;

use anyhow::Context;
use tracing::info;

use crate::db::pool::{PoolSettings, SqlitePool, build_pool};

/// Builds the pool and brings the schema up to date.
///
/// Any failure here means the run cannot start.
pub fn open(database_url: &str, settings: PoolSettings) -> anyhow::Result<SqlitePool> {
    let pool = build_pool(database_url, settings)
        .with_context(|| format!("failed to open store at {database_url}"))?;

    let mut conn = pool.get().context("failed to check out a store connection")?;
    let applied = migrate::run_pending(&mut conn)?;
    info!(
        database_url,
        applied,
        max_connections = settings.max_connections,
        "store ready"
    );

    Ok(pool)
}
