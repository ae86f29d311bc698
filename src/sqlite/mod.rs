//! Native `SQLite` driver built directly on rusqlite.
//!
//! Calls run on tokio's blocking pool against one connection guarded by an
//! async mutex. Prepared statements are compiled through rusqlite's
//! statement cache; their rows are copied out of rusqlite as owned values
//! and stay tied to the statement until it is reset.

mod connection;
pub mod params;
pub mod query;
mod result;
mod statement;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use crate::config::ConnectionSettings;
use crate::driver::{DatabaseDriver, TransactionState, deliver, next_connection_id, quote_literal};
use crate::error::DbError;
use crate::results::QueryOutcome;
use crate::statement::Statement;
use crate::translation::{PlaceholderStyle, ScanOptions, is_blank_sql, parse_placeholders};
use crate::types::{DriverKind, FetchMode};

use connection::{SharedSqliteConnection, run_blocking};
use query::{Executed, Output};

pub use result::SqliteResult;
pub use statement::SqliteStatementHandle;

/// Driver backed by a single rusqlite connection.
pub struct SqliteDriver {
    conn: Option<SharedSqliteConnection>,
    connection_id: u64,
    database: String,
    tx: TransactionState,
    last_insert_id: Option<i64>,
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("database", &self.database)
            .field("connection_id", &self.connection_id)
            .field("connected", &self.conn.is_some())
            .field("tx", &self.tx)
            .finish_non_exhaustive()
    }
}

impl SqliteDriver {
    /// Open the database named in `settings`.
    ///
    /// # Errors
    /// `DbErrorKind::Connection` if the file cannot be opened or is not
    /// UTF-8 encoded; `DbErrorKind::Config` for malformed options.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, DbError> {
        let owned = settings.clone();
        let conn = spawn_blocking(move || connection::open(&owned))
            .await
            .map_err(|e| DbError::connection(format!("sqlite spawn_blocking join error: {e}")))??;
        let driver = Self {
            conn: Some(Arc::new(Mutex::new(conn))),
            connection_id: next_connection_id(),
            database: settings.database.clone(),
            tx: TransactionState::Idle,
            last_insert_id: None,
        };
        tracing::debug!(
            database = %driver.database,
            connection_id = driver.connection_id,
            "sqlite connected"
        );
        Ok(driver)
    }

    fn shared(&self) -> Result<SharedSqliteConnection, DbError> {
        self.conn
            .clone()
            .ok_or_else(|| DbError::connection("the sqlite connection has been closed"))
    }

    /// Keep local state in step with what the connection reports.
    fn observe(&mut self, executed: &Executed) {
        if let Some(id) = executed.last_insert_id {
            self.last_insert_id = Some(id);
        }
        self.sync_transaction(executed.autocommit);
    }

    fn sync_transaction(&mut self, autocommit: bool) {
        self.tx = if autocommit {
            TransactionState::Idle
        } else {
            TransactionState::Active
        };
    }

    async fn transaction_command(&mut self, command: &'static str) -> Result<(), DbError> {
        let conn = self.shared()?;
        let (outcome, autocommit) = run_blocking(conn, move |c| {
            let outcome = c.execute_batch(command);
            Ok((outcome, c.is_autocommit()))
        })
        .await?;
        self.sync_transaction(autocommit);
        outcome.map_err(|e| {
            DbError::transaction(format!("{command} failed: {e}")).with_source(e)
        })?;
        tracing::debug!(connection_id = self.connection_id, command, "sqlite transaction");
        Ok(())
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Sqlite
    }

    fn connection_id(&self) -> u64 {
        self.connection_id
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn query(
        &mut self,
        sql: &str,
        one_shot: bool,
        mode: FetchMode,
    ) -> Result<QueryOutcome, DbError> {
        let conn = self.shared()?;
        tracing::debug!(connection_id = self.connection_id, sql, "sqlite query");
        if is_blank_sql(sql, false) {
            return Err(DbError::query(sql, "the query is empty"));
        }
        let owned = sql.to_string();
        let executed = run_blocking(conn, move |c| {
            query::run_raw(c, &owned).map_err(|e| DbError::query(&owned, &e).with_source(e))
        })
        .await?;
        self.observe(&executed);
        match executed.output {
            Output::Rows { columns, rows } => {
                deliver(SqliteResult::query(sql, columns, rows), one_shot, mode)
            }
            Output::Changed(changes) => Ok(QueryOutcome::Affected(changes)),
        }
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), DbError> {
        let conn = self.shared()?;
        tracing::debug!(connection_id = self.connection_id, sql, "sqlite execute_batch");
        let owned = sql.to_string();
        let (outcome, autocommit) = run_blocking(conn, move |c| {
            let outcome = c
                .execute_batch(&owned)
                .map_err(|e| DbError::query(&owned, &e).with_source(e));
            Ok((outcome, c.is_autocommit()))
        })
        .await?;
        self.sync_transaction(autocommit);
        outcome
    }

    async fn prepare(&mut self, sql: &str) -> Result<Statement, DbError> {
        let conn = self.shared()?;
        let parsed = parse_placeholders(sql, ScanOptions::new(PlaceholderStyle::Question))
            .map_err(|e| DbError::prepare(sql, e))?;
        if parsed.is_blank() {
            let handle = Box::new(SqliteStatementHandle::new(0));
            return Statement::new(self.connection_id, sql, parsed, Vec::new(), handle);
        }
        tracing::debug!(connection_id = self.connection_id, sql, native = %parsed.sql, "sqlite prepare");

        let native = parsed.sql.to_string();
        let original = sql.to_string();
        let (columns, parameter_count) = run_blocking(conn, move |c| {
            let stmt = c
                .prepare_cached(&native)
                .map_err(|e| DbError::prepare(&original, &e).with_source(e))?;
            let columns: Vec<String> = stmt
                .column_names()
                .iter()
                .map(std::string::ToString::to_string)
                .collect();
            Ok((columns, stmt.parameter_count()))
        })
        .await?;

        let expected = parsed.placeholders.positions();
        if parameter_count != expected {
            return Err(DbError::prepare(
                sql,
                format!("sqlite expects {parameter_count} parameters but {expected} placeholders were found"),
            ));
        }
        Statement::new(
            self.connection_id,
            sql,
            parsed,
            columns,
            Box::new(SqliteStatementHandle::new(parameter_count)),
        )
    }

    async fn exec(
        &mut self,
        stmt: &mut Statement,
        one_shot: bool,
        mode: FetchMode,
    ) -> Result<QueryOutcome, DbError> {
        self.check_statement(stmt)?;
        stmt.handle::<SqliteStatementHandle>()?;
        stmt.ensure_no_open_cursor()?;
        let values = params::convert(&stmt.ordered_params()?);
        let conn = self.shared()?;
        tracing::debug!(
            connection_id = self.connection_id,
            sql = stmt.sql(),
            params = values.len(),
            "sqlite exec"
        );

        let native = stmt.native_sql().to_string();
        let original = stmt.sql().to_string();
        let executed = run_blocking(conn, move |c| {
            query::run_cached(c, &native, &values)
                .map_err(|e| DbError::exec(&original, &e).with_source(e))
        })
        .await?;
        self.observe(&executed);
        stmt.handle_mut::<SqliteStatementHandle>()?.record_execution();

        match executed.output {
            Output::Rows { columns, rows } => {
                let link = stmt.attach_cursor();
                deliver(
                    SqliteResult::statement(stmt.sql(), columns, rows, link),
                    one_shot,
                    mode,
                )
            }
            Output::Changed(changes) => Ok(QueryOutcome::Affected(changes)),
        }
    }

    fn escape(&self, value: &str) -> Result<String, DbError> {
        quote_literal(value, false).map_err(|e| DbError::bind("", e))
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    async fn start_transaction(&mut self) -> Result<(), DbError> {
        self.tx.ensure_can_start()?;
        self.transaction_command("BEGIN").await
    }

    async fn commit_transaction(&mut self) -> Result<(), DbError> {
        if !self.tx.should_finish("commit") {
            return Ok(());
        }
        self.transaction_command("COMMIT").await
    }

    async fn rollback_transaction(&mut self) -> Result<(), DbError> {
        if !self.tx.should_finish("rollback") {
            return Ok(());
        }
        self.transaction_command("ROLLBACK").await
    }

    fn is_transaction_active(&self) -> bool {
        self.tx.is_active()
    }

    async fn close(&mut self) -> Result<(), DbError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if self.tx.is_active() {
            tracing::warn!(
                connection_id = self.connection_id,
                "closing sqlite connection with an active transaction; it is rolled back"
            );
        }
        self.tx = TransactionState::Idle;
        tracing::debug!(connection_id = self.connection_id, database = %self.database, "sqlite close");
        match Arc::try_unwrap(conn) {
            Ok(mutex) => {
                let raw = mutex.into_inner();
                spawn_blocking(move || raw.close())
                    .await
                    .map_err(|e| DbError::connection(format!("sqlite spawn_blocking join error: {e}")))?
                    .map_err(|(_, e)| DbError::connection(format!("sqlite close failed: {e}")).with_source(e))
            }
            // A worker still holds a clone; the connection closes when it finishes.
            Err(_) => Ok(()),
        }
    }
}

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        if self.conn.is_some() && self.tx.is_active() {
            tracing::warn!(
                connection_id = self.connection_id,
                "sqlite driver dropped with an active transaction; it is rolled back"
            );
        }
    }
}
