//! r2d2 pool of tuned SQLite connections.
//!
//! The pool bound is independent of how many symbols are processed at once;
//! a writer waits up to `connection_timeout` for a free connection.

use std::time::Duration;

use diesel::{
    SqliteConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError},
};

use crate::db::connection::{DEFAULT_BUSY_TIMEOUT, apply_pragmas};

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub connection_timeout: Duration,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 4,
            connection_timeout: Duration::from_secs(30),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

#[derive(Debug)]
struct SqlitePragmas {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        apply_pragmas(conn, self.busy_timeout).map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn build_pool(database_url: &str, settings: PoolSettings) -> Result<SqlitePool, PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(settings.max_connections.max(1))
        .min_idle(Some(1))
        .connection_timeout(settings.connection_timeout)
        .connection_customizer(Box::new(SqlitePragmas {
            busy_timeout: settings.busy_timeout,
        }))
        .build(manager)
}
