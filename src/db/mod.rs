//! The application-facing entry point.
//!
//! [`Db`] owns exactly one driver. [`Db::connect`] is the only place a
//! [`DriverKind`] is turned into a concrete driver; everything after that
//! goes through the [`DatabaseDriver`] contract.

mod dispatch;

pub use dispatch::{CallOutcome, DriverMethod};

use crate::config::ConnectionSettings;
use crate::driver::DatabaseDriver;
use crate::error::DbError;
use crate::report::{ErrorReport, log_to_db};
use crate::results::QueryOutcome;
use crate::statement::{Params, Placeholder, Statement};
use crate::types::{BindParam, DriverKind, FetchMode, RowValues};

use dispatch::Args;

/// Facade over one active driver.
///
/// ```rust,no_run
/// use sql_facade::prelude::*;
///
/// # async fn run() -> Result<(), DbError> {
/// let settings = ConnectionSettings::for_driver_name("sqlite", "gestione.db")?;
/// let mut db = Db::connect(settings).await?;
/// let row = db
///     .stmt_query(
///         "SELECT * FROM log WHERE nome_interessato LIKE ?",
///         Params::positional(["Sup%"]),
///         true,
///         FetchMode::Assoc,
///     )
///     .await?
///     .into_row()?;
/// # let _ = row;
/// db.disconnect().await
/// # }
/// ```
pub struct Db {
    driver: Box<dyn DatabaseDriver>,
    settings: Option<ConnectionSettings>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("driver", &self.driver.kind())
            .field("connection_id", &self.driver.connection_id())
            .field("connected", &self.driver.is_connected())
            .finish_non_exhaustive()
    }
}

/// Build the driver named by `settings.driver`.
async fn open_driver(settings: &ConnectionSettings) -> Result<Box<dyn DatabaseDriver>, DbError> {
    let driver: Box<dyn DatabaseDriver> = match settings.driver {
        #[cfg(feature = "sqlite")]
        DriverKind::Sqlite => Box::new(crate::sqlite::SqliteDriver::connect(settings).await?),
        #[cfg(feature = "any")]
        DriverKind::Any => Box::new(crate::any::AnyDriver::connect(settings).await?),
    };
    Ok(driver)
}

impl Db {
    /// Connect with the driver named in `settings`.
    ///
    /// # Errors
    /// Whatever the driver's connect reports, usually `DbErrorKind::Connection`.
    pub async fn connect(settings: ConnectionSettings) -> Result<Self, DbError> {
        let driver = open_driver(&settings).await?;
        tracing::debug!(driver = settings.driver.name(), "facade connected");
        Ok(Self {
            driver,
            settings: Some(settings),
        })
    }

    /// Wrap a driver that is already connected.
    #[must_use]
    pub fn with_driver(driver: Box<dyn DatabaseDriver>) -> Self {
        Self {
            driver,
            settings: None,
        }
    }

    /// A second, independent connection with the same settings.
    ///
    /// # Errors
    /// `DbErrorKind::Config` when this facade was built from an injected
    /// driver and has no settings to reconnect with.
    pub async fn new_instance(&self) -> Result<Self, DbError> {
        let settings = self.settings.clone().ok_or_else(|| {
            DbError::config("this facade wraps an injected driver and cannot open another")
        })?;
        Self::connect(settings).await
    }

    /// Swap in another driver, closing the current one first.
    ///
    /// # Errors
    /// `DbErrorKind::Connection` if closing the current driver fails; the
    /// new driver is installed regardless.
    pub async fn replace_driver(&mut self, driver: Box<dyn DatabaseDriver>) -> Result<(), DbError> {
        let mut previous = std::mem::replace(&mut self.driver, driver);
        self.settings = None;
        previous.close().await
    }

    #[must_use]
    pub fn settings(&self) -> Option<&ConnectionSettings> {
        self.settings.as_ref()
    }

    #[must_use]
    pub fn driver_kind(&self) -> DriverKind {
        self.driver.kind()
    }

    #[must_use]
    pub fn driver(&self) -> &dyn DatabaseDriver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn DatabaseDriver {
        self.driver.as_mut()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    /// # Errors
    /// See [`DatabaseDriver::query`].
    pub async fn query(&mut self, sql: &str, one_shot: bool, mode: FetchMode) -> Result<QueryOutcome, DbError> {
        self.driver.query(sql, one_shot, mode).await
    }

    /// # Errors
    /// See [`DatabaseDriver::execute_batch`].
    pub async fn execute_batch(&mut self, sql: &str) -> Result<(), DbError> {
        self.driver.execute_batch(sql).await
    }

    /// # Errors
    /// See [`DatabaseDriver::prepare`].
    pub async fn prepare(&mut self, sql: &str) -> Result<Statement, DbError> {
        self.driver.prepare(sql).await
    }

    /// # Errors
    /// See [`DatabaseDriver::bind`].
    pub fn bind(
        &self,
        stmt: &mut Statement,
        placeholder: impl Into<Placeholder>,
        param: impl Into<BindParam>,
    ) -> Result<(), DbError> {
        self.driver.bind(stmt, placeholder.into(), param.into())
    }

    /// # Errors
    /// See [`DatabaseDriver::exec`].
    pub async fn exec(&mut self, stmt: &mut Statement, one_shot: bool, mode: FetchMode) -> Result<QueryOutcome, DbError> {
        self.driver.exec(stmt, one_shot, mode).await
    }

    /// # Errors
    /// See [`DatabaseDriver::stmt_query`].
    pub async fn stmt_query(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        one_shot: bool,
        mode: FetchMode,
    ) -> Result<QueryOutcome, DbError> {
        self.driver.stmt_query(sql, params.into(), one_shot, mode).await
    }

    /// # Errors
    /// See [`DatabaseDriver::escape`].
    pub fn escape(&self, value: &str) -> Result<String, DbError> {
        self.driver.escape(value)
    }

    #[must_use]
    pub fn last_insert_id(&self) -> Option<i64> {
        self.driver.last_insert_id()
    }

    /// # Errors
    /// See [`DatabaseDriver::start_transaction`].
    pub async fn start_transaction(&mut self) -> Result<(), DbError> {
        self.driver.start_transaction().await
    }

    /// # Errors
    /// See [`DatabaseDriver::commit_transaction`].
    pub async fn commit_transaction(&mut self) -> Result<(), DbError> {
        self.driver.commit_transaction().await
    }

    /// # Errors
    /// See [`DatabaseDriver::rollback_transaction`].
    pub async fn rollback_transaction(&mut self) -> Result<(), DbError> {
        self.driver.rollback_transaction().await
    }

    #[must_use]
    pub fn is_transaction_active(&self) -> bool {
        self.driver.is_transaction_active()
    }

    /// Close the active driver's connection. Safe to call more than once.
    ///
    /// # Errors
    /// See [`DatabaseDriver::close`].
    pub async fn disconnect(&mut self) -> Result<(), DbError> {
        self.driver.close().await
    }

    /// Write `report` into the error-log `table` through the active driver.
    pub async fn log_error<R>(&mut self, report: &R, table: &str, prefix: &str) -> bool
    where
        R: ErrorReport + Sync + ?Sized,
    {
        log_to_db(report, self.driver.as_mut(), table, prefix).await
    }

    /// Invoke an operation by name with loosely typed arguments.
    ///
    /// Names are matched ignoring case and underscores, so `getLastID`,
    /// `get_last_id` and `lastInsertId` all resolve to the same operation.
    /// `stmtQuery` takes its parameters as a JSON array (positional) or
    /// object (named); fetch modes may be given by code (1-4) or by name.
    /// `prepare` hands back the [`Statement`]; bind and execute it through
    /// [`Db::bind`] and [`Db::exec`].
    ///
    /// # Errors
    /// `DbErrorKind::DriverMethodNotFound` for unknown names,
    /// `DbErrorKind::InvalidArguments` for malformed arguments, otherwise the
    /// error of the operation itself.
    pub async fn call(&mut self, name: &str, args: &[RowValues]) -> Result<CallOutcome, DbError> {
        let method = DriverMethod::lookup(name)?;
        let args = Args::new(method, args);
        tracing::debug!(method = method.name(), "facade dispatch");
        let outcome = match method {
            DriverMethod::Query => {
                args.at_most(3)?;
                let outcome = self.query(args.text(0)?, args.flag(1)?, args.mode(2)?).await?;
                CallOutcome::Outcome(outcome)
            }
            DriverMethod::ExecuteBatch => {
                args.at_most(1)?;
                self.execute_batch(args.text(0)?).await?;
                CallOutcome::Done
            }
            DriverMethod::Prepare => {
                args.at_most(1)?;
                CallOutcome::Statement(self.prepare(args.text(0)?).await?)
            }
            DriverMethod::StmtQuery => {
                args.at_most(4)?;
                let outcome = self
                    .stmt_query(args.text(0)?, args.params(1)?, args.flag(2)?, args.mode(3)?)
                    .await?;
                CallOutcome::Outcome(outcome)
            }
            DriverMethod::Escape => {
                args.at_most(1)?;
                CallOutcome::Text(self.escape(args.text(0)?)?)
            }
            DriverMethod::LastInsertId => {
                args.at_most(0)?;
                CallOutcome::Id(self.last_insert_id())
            }
            DriverMethod::StartTransaction => {
                args.at_most(0)?;
                self.start_transaction().await?;
                CallOutcome::Done
            }
            DriverMethod::CommitTransaction => {
                args.at_most(0)?;
                self.commit_transaction().await?;
                CallOutcome::Done
            }
            DriverMethod::RollbackTransaction => {
                args.at_most(0)?;
                self.rollback_transaction().await?;
                CallOutcome::Done
            }
            DriverMethod::IsTransactionActive => {
                args.at_most(0)?;
                CallOutcome::Flag(self.is_transaction_active())
            }
            DriverMethod::Close => {
                args.at_most(0)?;
                self.disconnect().await?;
                CallOutcome::Done
            }
        };
        Ok(outcome)
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        if self.driver.is_connected() {
            tracing::debug!(
                driver = self.driver.kind().name(),
                connection_id = self.driver.connection_id(),
                "facade dropped; releasing connection"
            );
        }
    }
}
