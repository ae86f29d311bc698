//! Driver-independent row retrieval.
//!
//! Every driver hands back results through [`DbResult`]; rows come out in one
//! of the four [`FetchMode`] shapes regardless of which client produced them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::DbError;
use crate::types::{FetchMode, RowValues};

mod cursor;
mod row;

pub use cursor::{CursorLink, RowCursor};
pub use row::DbRow;
pub(crate) use row::index_columns;

/// One row in the shape requested by a [`FetchMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedRow {
    Assoc(BTreeMap<String, RowValues>),
    Num(Vec<RowValues>),
    Both(DbRow),
    Object(JsonMap<String, JsonValue>),
}

impl FetchedRow {
    pub(crate) fn build(
        column_names: &Arc<Vec<String>>,
        column_index: &Arc<HashMap<String, usize>>,
        values: Vec<RowValues>,
        mode: FetchMode,
    ) -> Self {
        match mode {
            FetchMode::Assoc => FetchedRow::Assoc(
                column_names.iter().cloned().zip(values).collect(),
            ),
            FetchMode::Num => FetchedRow::Num(values),
            FetchMode::Both => FetchedRow::Both(DbRow::with_index(
                Arc::clone(column_names),
                Arc::clone(column_index),
                values,
            )),
            FetchMode::Object => FetchedRow::Object(
                column_names
                    .iter()
                    .zip(values.iter())
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn mode(&self) -> FetchMode {
        match self {
            FetchedRow::Assoc(_) => FetchMode::Assoc,
            FetchedRow::Num(_) => FetchMode::Num,
            FetchedRow::Both(_) => FetchMode::Both,
            FetchedRow::Object(_) => FetchMode::Object,
        }
    }

    /// Value of a column by name (`Assoc` and `Both` rows only).
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RowValues> {
        match self {
            FetchedRow::Assoc(map) => map.get(column),
            FetchedRow::Both(row) => row.get(column),
            FetchedRow::Num(_) | FetchedRow::Object(_) => None,
        }
    }

    /// Value of a column by position (`Num` and `Both` rows only).
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        match self {
            FetchedRow::Num(values) => values.get(index),
            FetchedRow::Both(row) => row.get_by_index(index),
            FetchedRow::Assoc(_) | FetchedRow::Object(_) => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&JsonMap<String, JsonValue>> {
        if let FetchedRow::Object(map) = self {
            Some(map)
        } else {
            None
        }
    }

    /// Deserialize an `Object` row into a caller type.
    ///
    /// # Errors
    /// Returns `DbErrorKind::Result` when the row is not object-shaped or its
    /// fields do not match `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, DbError> {
        match self {
            FetchedRow::Object(map) => serde_json::from_value(JsonValue::Object(map))
                .map_err(|e| DbError::result("", format!("cannot deserialize row: {e}"))),
            other => Err(DbError::result(
                "",
                format!("row fetched as {:?} is not an object", other.mode()),
            )),
        }
    }
}

/// Cursor over the rows of one executed query or statement.
pub trait DbResult: Send + fmt::Debug {
    /// Next row, or `None` once drained.
    ///
    /// # Errors
    /// Returns `DbErrorKind::Result` if the result was freed or released by a
    /// statement reset.
    fn fetch(&mut self, mode: FetchMode) -> Result<Option<FetchedRow>, DbError>;

    /// Drain the remaining rows.
    ///
    /// # Errors
    /// Same as [`DbResult::fetch`].
    fn fetch_all(&mut self, mode: FetchMode) -> Result<Vec<FetchedRow>, DbError> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch(mode)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Number of rows the query produced.
    fn num_rows(&self) -> u64;

    fn column_names(&self) -> &[String];

    /// Release the rows. Calling it again is a no-op.
    fn free(&mut self);

    fn is_freed(&self) -> bool;
}

/// What a `query`/`exec` call produced.
#[derive(Debug)]
pub enum QueryOutcome {
    /// A live cursor over a row-producing statement.
    Rows(Box<dyn DbResult>),
    /// The first row of a one-shot call (`None` if there were no rows).
    Row(Option<FetchedRow>),
    /// Rows changed by a statement that produces no result columns.
    Affected(u64),
}

impl QueryOutcome {
    #[must_use]
    pub fn affected_rows(&self) -> Option<u64> {
        if let QueryOutcome::Affected(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    /// # Errors
    /// Returns `DbErrorKind::Result` unless this outcome is a live cursor.
    pub fn into_rows(self) -> Result<Box<dyn DbResult>, DbError> {
        match self {
            QueryOutcome::Rows(result) => Ok(result),
            other => Err(DbError::result("", format!("expected a result set, got {other:?}"))),
        }
    }

    /// # Errors
    /// Returns `DbErrorKind::Result` unless this outcome is a one-shot row.
    pub fn into_row(self) -> Result<Option<FetchedRow>, DbError> {
        match self {
            QueryOutcome::Row(row) => Ok(row),
            other => Err(DbError::result("", format!("expected a single row, got {other:?}"))),
        }
    }

    /// Collect every row, whatever kind of row outcome this is.
    ///
    /// # Errors
    /// Returns `DbErrorKind::Result` for an affected-row count, or any fetch error.
    pub fn fetch_all(self, mode: FetchMode) -> Result<Vec<FetchedRow>, DbError> {
        match self {
            QueryOutcome::Rows(mut result) => {
                let rows = result.fetch_all(mode);
                result.free();
                rows
            }
            QueryOutcome::Row(row) => Ok(row.into_iter().collect()),
            QueryOutcome::Affected(n) => Err(DbError::result(
                "",
                format!("statement affected {n} rows and produced no result set"),
            )),
        }
    }
}
