use std::sync::Arc;

use crate::error::DbError;
use crate::results::{CursorLink, DbResult, FetchedRow, RowCursor};
use crate::types::{FetchMode, RowValues};

/// Rows produced by [`super::AnyDriver`].
///
/// Rows arrive already decoded into owned values, so fetching hands them
/// out directly. Results of a prepared statement keep a link to it.
#[derive(Debug)]
pub struct AnyResult {
    cursor: RowCursor,
    link: Option<CursorLink>,
}

impl AnyResult {
    pub(crate) fn new(
        sql: &str,
        columns: Arc<Vec<String>>,
        rows: Vec<Vec<RowValues>>,
        link: Option<CursorLink>,
    ) -> Self {
        Self {
            cursor: RowCursor::new(sql, columns, rows),
            link,
        }
    }
}

impl DbResult for AnyResult {
    fn fetch(&mut self, mode: FetchMode) -> Result<Option<FetchedRow>, DbError> {
        if self.link.as_ref().is_some_and(|link| !link.is_open()) {
            self.cursor.free();
        }
        self.cursor.fetch(mode)
    }

    fn num_rows(&self) -> u64 {
        self.cursor.num_rows()
    }

    fn column_names(&self) -> &[String] {
        self.cursor.column_names()
    }

    fn free(&mut self) {
        self.cursor.free();
        if let Some(link) = &self.link {
            link.close();
        }
    }

    fn is_freed(&self) -> bool {
        self.cursor.is_freed()
    }
}

impl Drop for AnyResult {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbErrorKind;

    #[test]
    fn closed_link_turns_fetch_into_result_error() {
        let link = CursorLink::open();
        let mut result = AnyResult::new(
            "SELECT 1",
            Arc::new(vec!["1".into()]),
            vec![vec![RowValues::Int(1)]],
            Some(link.clone()),
        );
        link.close();
        assert_eq!(result.fetch(FetchMode::Num).unwrap_err().kind(), DbErrorKind::Result);
        result.free();
    }
}
