use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use crate::config::ConnectionSettings;
use crate::error::DbError;

/// One rusqlite connection shared with the blocking worker threads.
pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STATEMENT_CACHE: usize = 64;

/// Run `func` against the connection on the blocking pool.
pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, DbError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DbError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| DbError::connection(format!("sqlite spawn_blocking join error: {e}")))?
}

/// Open and configure the database named by `settings`.
///
/// Recognised options: `busy_timeout` (milliseconds), `foreign_keys`
/// (on/off) and `statement_cache` (prepared statements kept per connection).
pub(crate) fn open(settings: &ConnectionSettings) -> Result<rusqlite::Connection, DbError> {
    let path = settings.database.trim();
    if path.is_empty() {
        return Err(DbError::connection("sqlite needs a database path or :memory:"));
    }
    let busy_timeout = settings
        .option_parsed::<u64>("busy_timeout")?
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);
    let cache = settings
        .option_parsed::<usize>("statement_cache")?
        .unwrap_or(DEFAULT_STATEMENT_CACHE);
    let foreign_keys = settings.option_flag("foreign_keys")?;

    let conn = rusqlite::Connection::open(path).map_err(|e| {
        DbError::connection(format!("cannot open sqlite database '{path}': {e}")).with_source(e)
    })?;
    conn.busy_timeout(Duration::from_millis(busy_timeout))
        .map_err(|e| DbError::connection(format!("cannot set busy_timeout: {e}")).with_source(e))?;
    conn.set_prepared_statement_cache_capacity(cache);
    if let Some(enabled) = foreign_keys {
        conn.pragma_update(None, "foreign_keys", enabled)
            .map_err(|e| DbError::connection(format!("cannot set foreign_keys: {e}")).with_source(e))?;
    }
    ensure_utf8(&conn)?;
    Ok(conn)
}

/// The text codec rows come back in must be UTF-8.
fn ensure_utf8(conn: &rusqlite::Connection) -> Result<(), DbError> {
    let encoding: String = conn
        .query_row("PRAGMA encoding", [], |row| row.get(0))
        .map_err(|e| DbError::connection(format!("cannot read database encoding: {e}")).with_source(e))?;
    if encoding.eq_ignore_ascii_case("UTF-8") {
        Ok(())
    } else {
        Err(DbError::connection(format!(
            "database encoding is {encoding}; only UTF-8 is supported"
        )))
    }
}
