//! Driver-agnostic SQL access.
//!
//! Application code talks to [`Db`], which owns one [`DatabaseDriver`]:
//! the native `SQLite` driver (`rusqlite`) or the generic driver over sqlx's
//! `Any` connection. Both speak the same contract: raw queries, prepared
//! statements with `?` or `:name` placeholders, four row shapes
//! ([`FetchMode`]), transactions and typed errors ([`DbError`]).

#[cfg(not(any(feature = "sqlite", feature = "any")))]
compile_error!("enable at least one driver feature: `sqlite` or `any`");

pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod prelude;
pub mod report;
pub mod results;
pub mod statement;
pub mod translation;
pub mod types;

#[cfg(feature = "any")]
pub mod any;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::ConnectionSettings;
pub use db::{CallOutcome, Db, DriverMethod};
pub use driver::DatabaseDriver;
pub use error::{AppError, DbError, DbErrorKind, Severity};
pub use results::{DbResult, DbRow, FetchedRow, QueryOutcome};
pub use statement::{Params, Placeholder, Statement};
pub use types::{BindParam, DriverKind, FetchMode, ParamType, RowValues};
