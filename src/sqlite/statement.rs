use std::any::Any;

use crate::error::DbError;
use crate::statement::StatementHandle;

/// rusqlite's side of a prepared statement.
///
/// The compiled statement lives in the connection's statement cache keyed by
/// its SQL; the handle remembers what the compiler reported about it.
#[derive(Debug)]
pub struct SqliteStatementHandle {
    parameter_count: usize,
    executions: u64,
}

impl SqliteStatementHandle {
    pub(crate) fn new(parameter_count: usize) -> Self {
        Self {
            parameter_count,
            executions: 0,
        }
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Executions since prepare or the last reset.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions
    }

    pub(crate) fn record_execution(&mut self) {
        self.executions += 1;
    }
}

impl StatementHandle for SqliteStatementHandle {
    fn reset(&mut self) -> Result<(), DbError> {
        self.executions = 0;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
