use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed driver-native error kept as the source of a [`DbError`].
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How serious an error is; used to pick a logging sink.
///
/// The numeric values (`Fatal = 0` .. `Debug = 3`) are stable so they can be
/// stored in an error-log table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal = 0,
    #[default]
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl Severity {
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base application error with a two-level message.
///
/// `message` is safe to show to an end user; `internal` is the diagnostic
/// meant for logs. When no diagnostic is supplied the public message is reused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AppError {
    message: String,
    code: i32,
    internal: String,
    severity: Severity,
}

impl AppError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            internal: message.clone(),
            message,
            code: 0,
            severity: Severity::default(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        let internal = internal.into();
        if !internal.is_empty() {
            self.internal = internal;
        }
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    #[must_use]
    pub fn internal_message(&self) -> &str {
        &self.internal
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// Which stage of the database layer produced a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    /// Handshake, authentication or charset negotiation failed, or the connection is gone.
    Connection,
    /// The driver rejected the SQL, or the placeholder syntax is unsupported.
    Prepare,
    /// A value could not be bound to a placeholder.
    Bind,
    /// Executing a prepared statement failed.
    Exec,
    /// Executing raw SQL failed.
    Query,
    /// The statement handle is invalid, foreign, or in the wrong state.
    Statement,
    /// Fetch attempted on a cursor without a result set.
    Result,
    /// Invalid transaction transition or failed BEGIN/COMMIT/ROLLBACK.
    Transaction,
    /// Neither the facade nor the driver knows the requested operation.
    DriverMethodNotFound,
    /// A dispatched operation got arguments of the wrong shape.
    InvalidArguments,
    /// Connection settings are missing or malformed.
    Config,
}

impl DbErrorKind {
    fn public_message(self) -> &'static str {
        match self {
            DbErrorKind::Connection => "Unable to connect to the database server",
            DbErrorKind::Prepare => "Unable to prepare the database instructions",
            DbErrorKind::Bind => "Unable to pass data to the database",
            DbErrorKind::Exec => "Error while executing database commands",
            DbErrorKind::Query => "Error while querying the database",
            DbErrorKind::Statement => "Invalid database statement",
            DbErrorKind::Result => "There is no data to return",
            DbErrorKind::Transaction => "Database transaction error",
            DbErrorKind::DriverMethodNotFound | DbErrorKind::InvalidArguments => {
                "Error invoking the database"
            }
            DbErrorKind::Config => "Invalid database configuration",
        }
    }

    fn default_severity(self) -> Severity {
        match self {
            DbErrorKind::Connection | DbErrorKind::Config => Severity::Fatal,
            DbErrorKind::Result => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbErrorKind::Connection => "ConnectionError",
            DbErrorKind::Prepare => "PrepareError",
            DbErrorKind::Bind => "BindError",
            DbErrorKind::Exec => "ExecError",
            DbErrorKind::Query => "QueryError",
            DbErrorKind::Statement => "StatementError",
            DbErrorKind::Result => "ResultError",
            DbErrorKind::Transaction => "TransactionError",
            DbErrorKind::DriverMethodNotFound => "DriverMethodNotFound",
            DbErrorKind::InvalidArguments => "InvalidArguments",
            DbErrorKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

/// Error raised by every operation of the database layer.
///
/// Immutable once built: the constructors below fill in a user-safe message
/// per kind, the driver diagnostic, and the offending SQL when there is one.
///
/// ```rust
/// use sql_facade::prelude::*;
///
/// let err = DbError::query("SELEC 1", "near \"SELEC\": syntax error");
/// assert_eq!(err.kind(), DbErrorKind::Query);
/// assert_eq!(err.sql(), Some("SELEC 1"));
/// assert_eq!(err.internal_message(), "near \"SELEC\": syntax error | SELEC 1");
/// ```
#[derive(Debug, Error)]
#[error("{kind}: {}", .app.internal_message())]
pub struct DbError {
    kind: DbErrorKind,
    app: AppError,
    query: Option<String>,
    #[source]
    source: Option<BoxedSource>,
}

impl DbError {
    #[must_use]
    pub fn new(kind: DbErrorKind, internal: impl Into<String>) -> Self {
        Self {
            kind,
            app: AppError::new(kind.public_message())
                .with_internal(internal)
                .with_severity(kind.default_severity()),
            query: None,
            source: None,
        }
    }

    #[must_use]
    pub fn connection(internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Connection, internal.to_string())
    }

    #[must_use]
    pub fn prepare(sql: &str, internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Prepare, format!("Prepare failed: {internal}")).with_query(sql)
    }

    #[must_use]
    pub fn bind(sql: &str, internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Bind, internal.to_string()).with_query(sql)
    }

    #[must_use]
    pub fn exec(sql: &str, internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Exec, format!("Execute failed: {internal}")).with_query(sql)
    }

    #[must_use]
    pub fn query(sql: &str, internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Query, internal.to_string()).with_query(sql)
    }

    #[must_use]
    pub fn statement(internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Statement, internal.to_string())
    }

    #[must_use]
    pub fn result(sql: &str, internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Result, internal.to_string()).with_query(sql)
    }

    #[must_use]
    pub fn transaction(internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Transaction, internal.to_string())
    }

    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            DbErrorKind::DriverMethodNotFound,
            format!("The database method '{method}' does not exist"),
        )
    }

    #[must_use]
    pub fn invalid_arguments(method: &str, internal: impl fmt::Display) -> Self {
        Self::new(
            DbErrorKind::InvalidArguments,
            format!("Invalid arguments for '{method}': {internal}"),
        )
    }

    #[must_use]
    pub fn config(internal: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::Config, internal.to_string())
    }

    /// Attach the SQL text the error refers to. Empty text is ignored.
    #[must_use]
    pub fn with_query(mut self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        if !sql.is_empty() {
            self.query = Some(sql);
        }
        self
    }

    /// Keep the driver-native error as the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.app = self.app.with_severity(severity);
        self
    }

    #[must_use]
    pub fn kind(&self) -> DbErrorKind {
        self.kind
    }

    /// The base application error (public message, code, severity).
    #[must_use]
    pub fn app(&self) -> &AppError {
        &self.app
    }

    #[must_use]
    pub fn message(&self) -> &str {
        self.app.message()
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.app.severity()
    }

    /// The SQL text this error refers to, if any.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Driver diagnostic followed by the offending SQL.
    #[must_use]
    pub fn internal_message(&self) -> String {
        match &self.query {
            Some(sql) => format!("{} | {sql}", self.app.internal_message()),
            None => self.app.internal_message().to_string(),
        }
    }
}
