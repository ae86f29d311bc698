//! The capability set every concrete driver implements.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::DbError;
use crate::results::{DbResult, QueryOutcome};
use crate::statement::{Params, Placeholder, Statement};
use crate::translation::statement_heads;
use crate::types::{BindParam, DriverKind, FetchMode};

/// Database driver contract.
///
/// Calls on one driver never overlap: every method takes the driver by
/// reference and completes before the next can start. Failures from the
/// client library are wrapped into [`DbError`] at the call site.
#[async_trait]
pub trait DatabaseDriver: Send {
    fn kind(&self) -> DriverKind;

    /// Identity of the live connection; statements remember it.
    fn connection_id(&self) -> u64;

    fn is_connected(&self) -> bool;

    /// Run raw SQL.
    ///
    /// Row-producing SQL yields [`QueryOutcome::Rows`], or
    /// [`QueryOutcome::Row`] with the first row when `one_shot` is set; other
    /// SQL yields [`QueryOutcome::Affected`].
    ///
    /// # Errors
    /// `DbErrorKind::Query` carrying the SQL and the driver message.
    async fn query(
        &mut self,
        sql: &str,
        one_shot: bool,
        mode: FetchMode,
    ) -> Result<QueryOutcome, DbError>;

    /// Run one or more statements that take no parameters and return nothing.
    ///
    /// # Errors
    /// `DbErrorKind::Query` if any statement fails.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), DbError>;

    /// Parse placeholders and create the driver-side prepared form.
    ///
    /// # Errors
    /// `DbErrorKind::Prepare` if the SQL is rejected or mixes placeholder styles.
    async fn prepare(&mut self, sql: &str) -> Result<Statement, DbError>;

    /// Record one value against one placeholder of `stmt`.
    ///
    /// # Errors
    /// `DbErrorKind::Statement` for a foreign or orphaned statement,
    /// `DbErrorKind::Bind` for unknown placeholders or mistyped values.
    fn bind(
        &self,
        stmt: &mut Statement,
        placeholder: Placeholder,
        param: BindParam,
    ) -> Result<(), DbError> {
        self.check_statement(stmt)?;
        stmt.bind(placeholder, param)
    }

    /// Bind every recorded value and execute; returns like [`DatabaseDriver::query`].
    ///
    /// # Errors
    /// `DbErrorKind::Bind` for missing values, `DbErrorKind::Exec` for
    /// execution failures.
    async fn exec(
        &mut self,
        stmt: &mut Statement,
        one_shot: bool,
        mode: FetchMode,
    ) -> Result<QueryOutcome, DbError>;

    /// Prepare, bind every parameter and execute in one call.
    ///
    /// # Errors
    /// Any error of the three steps.
    async fn stmt_query(
        &mut self,
        sql: &str,
        params: Params,
        one_shot: bool,
        mode: FetchMode,
    ) -> Result<QueryOutcome, DbError> {
        let mut stmt = self.prepare(sql).await?;
        for (placeholder, param) in params {
            self.bind(&mut stmt, placeholder, param)?;
        }
        self.exec(&mut stmt, one_shot, mode).await
    }

    /// Quote `value` as a SQL string literal, surrounding quotes included.
    ///
    /// # Errors
    /// `DbErrorKind::Bind` if the value cannot be represented as a literal.
    fn escape(&self, value: &str) -> Result<String, DbError>;

    /// Key generated by the most recent insert on this connection.
    fn last_insert_id(&self) -> Option<i64>;

    /// # Errors
    /// `DbErrorKind::Transaction` if one is already active or BEGIN fails.
    async fn start_transaction(&mut self) -> Result<(), DbError>;

    /// No-op when no transaction is active.
    ///
    /// # Errors
    /// `DbErrorKind::Transaction` if COMMIT fails; the transaction stays active.
    async fn commit_transaction(&mut self) -> Result<(), DbError>;

    /// No-op when no transaction is active.
    ///
    /// # Errors
    /// `DbErrorKind::Transaction` if ROLLBACK fails.
    async fn rollback_transaction(&mut self) -> Result<(), DbError>;

    fn is_transaction_active(&self) -> bool;

    /// Release the connection. Calling it again is a no-op.
    ///
    /// # Errors
    /// `DbErrorKind::Connection` if the client reports a failure while closing.
    async fn close(&mut self) -> Result<(), DbError>;

    /// Refuse statements prepared elsewhere or outliving the connection.
    ///
    /// # Errors
    /// `DbErrorKind::Statement`.
    fn check_statement(&self, stmt: &Statement) -> Result<(), DbError> {
        if !self.is_connected() {
            return Err(DbError::statement("The statement's connection has been closed")
                .with_query(stmt.sql()));
        }
        if stmt.connection_id() != self.connection_id() {
            return Err(DbError::statement(
                "The statement was prepared on a different connection",
            )
            .with_query(stmt.sql()));
        }
        Ok(())
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_connection_id() -> u64 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Hand a finished result back the way the caller asked for it.
pub(crate) fn deliver<R>(mut result: R, one_shot: bool, mode: FetchMode) -> Result<QueryOutcome, DbError>
where
    R: DbResult + 'static,
{
    if one_shot {
        let row = result.fetch(mode)?;
        result.free();
        Ok(QueryOutcome::Row(row))
    } else {
        Ok(QueryOutcome::Rows(Box::new(result)))
    }
}

/// Idle → Active → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
}

impl TransactionState {
    #[must_use]
    pub fn is_active(self) -> bool {
        self == TransactionState::Active
    }

    /// # Errors
    /// `DbErrorKind::Transaction` when a transaction is already active.
    pub fn ensure_can_start(self) -> Result<(), DbError> {
        if self.is_active() {
            Err(DbError::transaction("A transaction is already active on this connection"))
        } else {
            Ok(())
        }
    }

    /// Whether commit/rollback has anything to end; logs the no-op otherwise.
    #[must_use]
    pub fn should_finish(self, operation: &str) -> bool {
        if !self.is_active() {
            tracing::warn!(operation, "no active transaction; ignoring");
        }
        self.is_active()
    }

    /// State after `sql` ran as raw SQL, following any `BEGIN`, `START
    /// TRANSACTION`, `COMMIT`, `END` or `ROLLBACK` it contains. Bodies of
    /// `CREATE TRIGGER` are skipped; `ROLLBACK TO` and savepoints leave the
    /// state alone.
    #[must_use]
    pub fn after_raw_sql(self, sql: &str, mysql_lexing: bool) -> Self {
        let mut state = self;
        let mut in_trigger = false;
        for head in statement_heads(sql, mysql_lexing) {
            let words: Vec<&str> = head.iter().map(String::as_str).collect();
            if in_trigger {
                in_trigger = words.first() != Some(&"END");
                continue;
            }
            state = match words.as_slice() {
                ["CREATE", rest @ ..] if rest.contains(&"TRIGGER") => {
                    in_trigger = true;
                    state
                }
                ["BEGIN", ..] | ["START", "TRANSACTION", ..] => TransactionState::Active,
                ["COMMIT" | "END" | "ABORT", ..] => TransactionState::Idle,
                ["ROLLBACK", rest @ ..] if !rest.contains(&"TO") => TransactionState::Idle,
                _ => state,
            };
        }
        state
    }
}

/// Quote `value` as a single-quoted SQL literal.
///
/// With `backslash_escapes` (MySQL) the client-side escapes of
/// `mysql_real_escape_string` are applied as well; otherwise only quotes are
/// doubled and NUL is rejected, since standard SQL strings cannot hold it.
///
/// # Errors
/// Returns a diagnostic when `value` contains NUL and backslash escapes are off.
pub fn quote_literal(value: &str, backslash_escapes: bool) -> Result<String, String> {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' if backslash_escapes => out.push_str("\\'"),
            '\'' => out.push_str("''"),
            '\\' if backslash_escapes => out.push_str("\\\\"),
            '"' if backslash_escapes => out.push_str("\\\""),
            '\n' if backslash_escapes => out.push_str("\\n"),
            '\r' if backslash_escapes => out.push_str("\\r"),
            '\u{1a}' if backslash_escapes => out.push_str("\\Z"),
            '\0' if backslash_escapes => out.push_str("\\0"),
            '\0' => return Err("NUL characters cannot appear in a SQL string literal".into()),
            other => out.push(other),
        }
    }
    out.push('\'');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_standard_literals() {
        assert_eq!(quote_literal("O'Brien", false).unwrap(), "'O''Brien'");
        assert_eq!(quote_literal(r"C:\", false).unwrap(), r"'C:\'");
        assert!(quote_literal("a\0b", false).is_err());
    }

    #[test]
    fn quotes_mysql_literals() {
        assert_eq!(
            quote_literal("it's \\ \"x\"\n", true).unwrap(),
            r#"'it\'s \\ \"x\"\n'"#
        );
    }

    #[test]
    fn transaction_transitions() {
        let mut state = TransactionState::default();
        assert!(state.ensure_can_start().is_ok());
        assert!(!state.should_finish("commit"));
        state = TransactionState::Active;
        assert!(state.ensure_can_start().is_err());
        assert!(state.should_finish("rollback"));
    }

    #[test]
    fn raw_transaction_control_is_followed() {
        let idle = TransactionState::Idle;
        let active = TransactionState::Active;
        assert_eq!(idle.after_raw_sql("begin", false), active);
        assert_eq!(idle.after_raw_sql("/* go */ START TRANSACTION", true), active);
        assert_eq!(active.after_raw_sql("COMMIT;", false), idle);
        assert_eq!(active.after_raw_sql("end transaction", false), idle);
        assert_eq!(active.after_raw_sql("ROLLBACK", false), idle);
        assert_eq!(active.after_raw_sql("ROLLBACK TO sp1", false), active);
        assert_eq!(active.after_raw_sql("ROLLBACK TRANSACTION TO sp1", false), active);
        assert_eq!(idle.after_raw_sql("BEGIN; INSERT INTO t VALUES (1); COMMIT", false), idle);
        assert_eq!(idle.after_raw_sql("SELECT 'BEGIN'", false), idle);
        assert_eq!(
            idle.after_raw_sql(
                "CREATE TRIGGER t_ai AFTER INSERT ON t BEGIN UPDATE t SET n = 1; END; BEGIN",
                false
            ),
            active
        );
        assert_eq!(
            active.after_raw_sql("CREATE TEMP TRIGGER x AFTER DELETE ON t BEGIN SELECT 1; END", false),
            active
        );
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(next_connection_id(), next_connection_id());
    }
}
