//! Generic driver over sqlx's `Any` connection.
//!
//! One API for every backend sqlx was built with; the backend is picked by
//! the connection URL scheme. sqlx only understands positional parameters,
//! so named placeholders are always rewritten, to `$N` for PostgreSQL and
//! to `?` elsewhere.

pub mod params;
pub mod query;
mod result;
mod statement;

use std::sync::{Arc, Once};

use async_trait::async_trait;
use sqlx::{AnyConnection, Column as _, Connection as _, Executor as _, Statement as _};

use crate::config::ConnectionSettings;
use crate::driver::{DatabaseDriver, TransactionState, deliver, next_connection_id, quote_literal};
use crate::error::DbError;
use crate::results::QueryOutcome;
use crate::statement::Statement;
use crate::translation::{PlaceholderStyle, ScanOptions, is_blank_sql, parse_placeholders};
use crate::types::{DriverKind, FetchMode};

pub use result::AnyResult;
pub use statement::AnyStatementHandle;

static INSTALL_DRIVERS: Once = Once::new();

const DEFAULT_SCHEME: &str = "mysql";

/// Driver backed by a single sqlx `AnyConnection`.
pub struct AnyDriver {
    conn: Option<AnyConnection>,
    connection_id: u64,
    backend: String,
    tx: TransactionState,
    last_insert_id: Option<i64>,
}

impl std::fmt::Debug for AnyDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyDriver")
            .field("backend", &self.backend)
            .field("connection_id", &self.connection_id)
            .field("connected", &self.conn.is_some())
            .field("tx", &self.tx)
            .finish_non_exhaustive()
    }
}

/// Connection URL for `settings`: the `url` option if given, otherwise
/// assembled from the individual fields.
#[must_use]
pub fn connection_url(settings: &ConnectionSettings) -> String {
    if let Some(url) = settings.option_str("url") {
        return url.trim().to_string();
    }
    let scheme = settings.option_str("scheme").unwrap_or(DEFAULT_SCHEME).trim();
    let database = settings.database.trim();
    if scheme.eq_ignore_ascii_case("sqlite") {
        return if database.is_empty() || database == ":memory:" {
            "sqlite::memory:".to_string()
        } else if database.contains('?') {
            format!("sqlite://{database}")
        } else {
            format!("sqlite://{database}?mode=rwc")
        };
    }

    let mut url = format!("{scheme}://");
    if !settings.user.is_empty() {
        url.push_str(&settings.user);
        if !settings.password.is_empty() {
            url.push(':');
            url.push_str(&settings.password);
        }
        url.push('@');
    }
    url.push_str(if settings.host.is_empty() { "localhost" } else { settings.host.trim() });
    if let Some(port) = settings.option_str("port") {
        url.push(':');
        url.push_str(port.trim());
    }
    url.push('/');
    url.push_str(database);
    url
}

impl AnyDriver {
    /// Connect to the backend named by the connection URL.
    ///
    /// # Errors
    /// `DbErrorKind::Connection` if the URL is unusable, names a backend sqlx
    /// was not built with, or the handshake fails.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, DbError> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
        let url = connection_url(settings);
        let conn = AnyConnection::connect(&url).await.map_err(|e| {
            DbError::connection(format!("cannot connect to {}: {e}", redact(&url, &settings.password)))
                .with_source(e)
        })?;
        let backend = conn.backend_name().to_string();
        let driver = Self {
            conn: Some(conn),
            connection_id: next_connection_id(),
            backend,
            tx: TransactionState::Idle,
            last_insert_id: None,
        };
        tracing::debug!(
            backend = %driver.backend,
            connection_id = driver.connection_id,
            "any connected"
        );
        Ok(driver)
    }

    /// Backend name reported by sqlx (`SQLite`, `MySQL`, `PostgreSQL`).
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    fn is_mysql(&self) -> bool {
        self.backend.eq_ignore_ascii_case("MySQL")
    }

    fn scan_options(&self) -> ScanOptions {
        let target = if self.backend.eq_ignore_ascii_case("PostgreSQL") {
            PlaceholderStyle::Dollar
        } else {
            PlaceholderStyle::Question
        };
        ScanOptions::new(target).with_mysql_lexing(self.is_mysql())
    }

    fn conn_mut(&mut self) -> Result<&mut AnyConnection, DbError> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::connection("the connection has been closed"))
    }

    fn observe(&mut self, last_insert_id: Option<i64>) {
        if let Some(id) = last_insert_id {
            self.last_insert_id = Some(id);
        }
    }

    async fn transaction_command(&mut self, command: &'static str) -> Result<(), DbError> {
        let connection_id = self.connection_id;
        let conn = self.conn_mut()?;
        (&mut *conn)
            .execute(command)
            .await
            .map_err(|e| DbError::transaction(format!("{command} failed: {e}")).with_source(e))?;
        tracing::debug!(connection_id, command, "any transaction");
        Ok(())
    }
}

/// Result column names of the prepared form of `sql`.
async fn describe(conn: &mut AnyConnection, sql: &str) -> Result<Vec<String>, sqlx::Error> {
    let prepared = (&mut *conn).prepare(sql).await?;
    Ok(prepared
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect())
}

fn redact(url: &str, password: &str) -> String {
    if password.is_empty() {
        url.to_string()
    } else {
        url.replace(password, "***")
    }
}

#[async_trait]
impl DatabaseDriver for AnyDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Any
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
        tracing::debug!(connection_id = self.connection_id, sql, "any query");
        let mysql = self.is_mysql();
        if is_blank_sql(sql, mysql) {
            return Err(DbError::query(sql, "the query is empty"));
        }
        let conn = self.conn_mut()?;
        let columns = describe(conn, sql)
            .await
            .map_err(|e| DbError::query(sql, &e).with_source(e))?;
        if columns.is_empty() {
            let done = sqlx::query(sql)
                .persistent(false)
                .execute(&mut *conn)
                .await
                .map_err(|e| DbError::query(sql, &e).with_source(e))?;
            self.observe(done.last_insert_id().filter(|id| *id != 0));
            self.tx = self.tx.after_raw_sql(sql, mysql);
            return Ok(QueryOutcome::Affected(done.rows_affected()));
        }
        let (rows, last_insert_id) = query::fetch_with_summary(conn, sqlx::query(sql).persistent(false))
            .await
            .map_err(|e| DbError::query(sql, &e).with_source(e))?;
        self.observe(last_insert_id);
        let values = query::collect_rows(&rows, columns.len())
            .map_err(|e| DbError::query(sql, &e).with_source(e))?;
        deliver(AnyResult::new(sql, Arc::new(columns), values, None), one_shot, mode)
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), DbError> {
        tracing::debug!(connection_id = self.connection_id, sql, "any execute_batch");
        let mysql = self.is_mysql();
        let conn = self.conn_mut()?;
        (&mut *conn)
            .execute(sql)
            .await
            .map_err(|e| DbError::query(sql, &e).with_source(e))?;
        self.tx = self.tx.after_raw_sql(sql, mysql);
        Ok(())
    }

    async fn prepare(&mut self, sql: &str) -> Result<Statement, DbError> {
        let parsed = parse_placeholders(sql, self.scan_options()).map_err(|e| DbError::prepare(sql, e))?;
        let handle = Box::new(AnyStatementHandle::new(self.backend.clone()));
        if parsed.is_blank() {
            return Statement::new(self.connection_id, sql, parsed, Vec::new(), handle);
        }
        tracing::debug!(connection_id = self.connection_id, sql, native = %parsed.sql, "any prepare");
        let conn = self.conn_mut()?;
        let columns = describe(conn, &parsed.sql)
            .await
            .map_err(|e| DbError::prepare(sql, &e).with_source(e))?;
        Statement::new(self.connection_id, sql, parsed, columns, handle)
    }

    async fn exec(
        &mut self,
        stmt: &mut Statement,
        one_shot: bool,
        mode: FetchMode,
    ) -> Result<QueryOutcome, DbError> {
        self.check_statement(stmt)?;
        stmt.handle::<AnyStatementHandle>()?;
        stmt.ensure_no_open_cursor()?;
        let params = stmt.ordered_params()?;
        tracing::debug!(
            connection_id = self.connection_id,
            sql = stmt.sql(),
            params = params.len(),
            "any exec"
        );
        let mysql = self.is_mysql();
        let conn = self.conn_mut()?;
        let sql = stmt.sql().to_string();
        let native = stmt.native_sql().to_string();

        if !stmt.is_row_producing() {
            let done = params::bind_all(&native, &params)
                .execute(&mut *conn)
                .await
                .map_err(|e| DbError::exec(&sql, &e).with_source(e))?;
            self.observe(done.last_insert_id().filter(|id| *id != 0));
            self.tx = self.tx.after_raw_sql(&native, mysql);
            stmt.handle_mut::<AnyStatementHandle>()?.record_execution();
            return Ok(QueryOutcome::Affected(done.rows_affected()));
        }

        let (rows, last_insert_id) = query::fetch_with_summary(conn, params::bind_all(&native, &params))
            .await
            .map_err(|e| DbError::exec(&sql, &e).with_source(e))?;
        self.observe(last_insert_id);
        let values = query::collect_rows(&rows, stmt.column_names().len())
            .map_err(|e| DbError::exec(&sql, &e).with_source(e))?;
        stmt.handle_mut::<AnyStatementHandle>()?.record_execution();
        let link = stmt.attach_cursor();
        let result = AnyResult::new(&sql, Arc::clone(stmt.column_names()), values, Some(link));
        deliver(result, one_shot, mode)
    }

    fn escape(&self, value: &str) -> Result<String, DbError> {
        quote_literal(value, self.is_mysql()).map_err(|e| DbError::bind("", e))
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    async fn start_transaction(&mut self) -> Result<(), DbError> {
        self.tx.ensure_can_start()?;
        self.transaction_command("BEGIN").await?;
        self.tx = TransactionState::Active;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<(), DbError> {
        if !self.tx.should_finish("commit") {
            return Ok(());
        }
        self.transaction_command("COMMIT").await?;
        self.tx = TransactionState::Idle;
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<(), DbError> {
        if !self.tx.should_finish("rollback") {
            return Ok(());
        }
        self.transaction_command("ROLLBACK").await?;
        self.tx = TransactionState::Idle;
        Ok(())
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
                "closing connection with an active transaction; it is rolled back"
            );
        }
        self.tx = TransactionState::Idle;
        tracing::debug!(connection_id = self.connection_id, backend = %self.backend, "any close");
        conn.close()
            .await
            .map_err(|e| DbError::connection(format!("close failed: {e}")).with_source(e))
    }
}

impl Drop for AnyDriver {
    fn drop(&mut self) {
        if self.conn.is_some() && self.tx.is_active() {
            tracing::warn!(
                connection_id = self.connection_id,
                "any driver dropped with an active transaction; it is rolled back"
            );
        }
    }
}
