use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::DbError;
use crate::types::{FetchMode, RowValues};

use super::{FetchedRow, index_columns};

/// Open/closed flag shared between a statement and the result it produced.
///
/// The statement refuses a new bind cycle while the flag is open; resetting
/// the statement closes it, which invalidates the result.
#[derive(Debug, Clone)]
pub struct CursorLink(Arc<AtomicBool>);

impl CursorLink {
    #[must_use]
    pub fn open() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Rows already pulled from the client, handed out front to back.
#[derive(Debug)]
pub struct RowCursor {
    sql: String,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    rows: VecDeque<Vec<RowValues>>,
    total: u64,
    freed: bool,
}

impl RowCursor {
    #[must_use]
    pub fn new(sql: impl Into<String>, column_names: Arc<Vec<String>>, rows: Vec<Vec<RowValues>>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            sql: sql.into(),
            column_names,
            column_index,
            total: rows.len() as u64,
            rows: rows.into(),
            freed: false,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Take the next row's values out of the cursor.
    ///
    /// # Errors
    /// Returns `DbErrorKind::Result` once the cursor has been freed.
    pub fn next_values(&mut self) -> Result<Option<Vec<RowValues>>, DbError> {
        if self.freed {
            return Err(self.freed_error());
        }
        Ok(self.rows.pop_front())
    }

    #[must_use]
    pub fn shape(&self, values: Vec<RowValues>, mode: FetchMode) -> FetchedRow {
        FetchedRow::build(&self.column_names, &self.column_index, values, mode)
    }

    /// # Errors
    /// Returns `DbErrorKind::Result` once the cursor has been freed.
    pub fn fetch(&mut self, mode: FetchMode) -> Result<Option<FetchedRow>, DbError> {
        Ok(self.next_values()?.map(|values| self.shape(values, mode)))
    }

    #[must_use]
    pub fn num_rows(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn free(&mut self) {
        self.rows.clear();
        self.rows.shrink_to_fit();
        self.freed = true;
    }

    #[must_use]
    pub fn is_freed(&self) -> bool {
        self.freed
    }

    #[must_use]
    pub fn freed_error(&self) -> DbError {
        DbError::result(&self.sql, "fetch called on a result whose result set was released")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbErrorKind;

    fn cursor() -> RowCursor {
        RowCursor::new(
            "SELECT n FROM t",
            Arc::new(vec!["n".into()]),
            vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]],
        )
    }

    #[test]
    fn drains_then_returns_none() {
        let mut cur = cursor();
        assert_eq!(cur.num_rows(), 2);
        assert!(cur.fetch(FetchMode::Num).unwrap().is_some());
        assert!(cur.fetch(FetchMode::Num).unwrap().is_some());
        assert!(cur.fetch(FetchMode::Num).unwrap().is_none());
        assert_eq!(cur.num_rows(), 2);
    }

    #[test]
    fn free_is_idempotent_and_blocks_fetch() {
        let mut cur = cursor();
        cur.free();
        cur.free();
        let err = cur.fetch(FetchMode::Assoc).unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Result);
        assert_eq!(err.sql(), Some("SELECT n FROM t"));
    }

    #[test]
    fn link_is_shared() {
        let link = CursorLink::open();
        let held = link.clone();
        assert!(held.is_open());
        link.close();
        assert!(!held.is_open());
    }
}
