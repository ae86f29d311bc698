use std::sync::Arc;

use crate::error::DbError;
use crate::results::{CursorLink, DbResult, FetchedRow, RowCursor};
use crate::types::{FetchMode, RowValues};

#[derive(Debug)]
enum Strategy {
    /// Raw SQL: rows are handed out straight from the cursor.
    Query,
    /// Prepared statement: rows stay readable only while the statement has
    /// not been reset. Each row is owned by the caller once fetched.
    Statement { link: CursorLink },
}

/// Rows produced by [`super::SqliteDriver`].
#[derive(Debug)]
pub struct SqliteResult {
    cursor: RowCursor,
    strategy: Strategy,
}

impl SqliteResult {
    pub(crate) fn query(sql: &str, columns: Vec<String>, rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            cursor: RowCursor::new(sql, Arc::new(columns), rows),
            strategy: Strategy::Query,
        }
    }

    pub(crate) fn statement(
        sql: &str,
        columns: Vec<String>,
        rows: Vec<Vec<RowValues>>,
        link: CursorLink,
    ) -> Self {
        Self {
            cursor: RowCursor::new(sql, Arc::new(columns), rows),
            strategy: Strategy::Statement { link },
        }
    }
}

impl DbResult for SqliteResult {
    fn fetch(&mut self, mode: FetchMode) -> Result<Option<FetchedRow>, DbError> {
        let Self { cursor, strategy } = self;
        match strategy {
            Strategy::Query => cursor.fetch(mode),
            Strategy::Statement { link } => {
                if !link.is_open() {
                    cursor.free();
                    return Err(cursor.freed_error());
                }
                cursor.fetch(mode)
            }
        }
    }

    fn num_rows(&self) -> u64 {
        self.cursor.num_rows()
    }

    fn column_names(&self) -> &[String] {
        self.cursor.column_names()
    }

    fn free(&mut self) {
        self.cursor.free();
        if let Strategy::Statement { link } = &self.strategy {
            link.close();
        }
    }

    fn is_freed(&self) -> bool {
        self.cursor.is_freed()
    }
}

impl Drop for SqliteResult {
    fn drop(&mut self) {
        self.free();
    }
}
