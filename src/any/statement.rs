use std::any::Any;

use crate::error::DbError;
use crate::statement::StatementHandle;

/// sqlx's side of a prepared statement.
///
/// The compiled form is cached by the connection (queries are sent as
/// persistent); the handle records which backend compiled it.
#[derive(Debug)]
pub struct AnyStatementHandle {
    backend: String,
    executions: u64,
}

impl AnyStatementHandle {
    pub(crate) fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            executions: 0,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions
    }

    pub(crate) fn record_execution(&mut self) {
        self.executions += 1;
    }
}

impl StatementHandle for AnyStatementHandle {
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
