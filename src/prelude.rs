//! Convenient imports for common functionality.
//!
//! ```rust
//! use sql_facade::prelude::*;
//! ```

pub use crate::config::ConnectionSettings;
pub use crate::db::{CallOutcome, Db, DriverMethod};
pub use crate::driver::DatabaseDriver;
pub use crate::error::{AppError, DbError, DbErrorKind, Severity};
pub use crate::report::{ErrorReport, log_to_db};
pub use crate::results::{DbResult, DbRow, FetchedRow, QueryOutcome};
pub use crate::statement::{Params, Placeholder, Statement};
pub use crate::translation::{PlaceholderStyle, ScanOptions, parse_placeholders};
pub use crate::types::{BindParam, DriverKind, FetchMode, ParamType, RowValues};

#[cfg(feature = "any")]
pub use crate::any::AnyDriver;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDriver;
