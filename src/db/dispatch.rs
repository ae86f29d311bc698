use serde_json::Value as JsonValue;

use crate::error::DbError;
use crate::results::QueryOutcome;
use crate::statement::{Params, Statement};
use crate::types::{FetchMode, RowValues};

/// Operations reachable through [`super::Db::call`].
///
/// `bind` and `exec` act on a [`Statement`] value, which loosely typed
/// arguments cannot carry; use [`super::Db::bind`] and [`super::Db::exec`]
/// on the statement `prepare` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMethod {
    Query,
    ExecuteBatch,
    Prepare,
    StmtQuery,
    Escape,
    LastInsertId,
    StartTransaction,
    CommitTransaction,
    RollbackTransaction,
    IsTransactionActive,
    Close,
}

/// Normalized name → method. Names are compared lowercased with `_` removed.
const METHODS: &[(&str, DriverMethod)] = &[
    ("query", DriverMethod::Query),
    ("executebatch", DriverMethod::ExecuteBatch),
    ("prepare", DriverMethod::Prepare),
    ("stmtquery", DriverMethod::StmtQuery),
    ("escape", DriverMethod::Escape),
    ("getlastid", DriverMethod::LastInsertId),
    ("lastinsertid", DriverMethod::LastInsertId),
    ("starttransaction", DriverMethod::StartTransaction),
    ("committransaction", DriverMethod::CommitTransaction),
    ("rollbacktransaction", DriverMethod::RollbackTransaction),
    ("istransactionactive", DriverMethod::IsTransactionActive),
    ("close", DriverMethod::Close),
    ("disconnect", DriverMethod::Close),
];

impl DriverMethod {
    /// # Errors
    /// `DbErrorKind::DriverMethodNotFound` for names outside the table.
    pub fn lookup(name: &str) -> Result<Self, DbError> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        METHODS
            .iter()
            .find(|(key, _)| *key == normalized)
            .map(|(_, method)| *method)
            .ok_or_else(|| DbError::method_not_found(name))
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DriverMethod::Query => "query",
            DriverMethod::ExecuteBatch => "executeBatch",
            DriverMethod::Prepare => "prepare",
            DriverMethod::StmtQuery => "stmtQuery",
            DriverMethod::Escape => "escape",
            DriverMethod::LastInsertId => "getLastID",
            DriverMethod::StartTransaction => "startTransaction",
            DriverMethod::CommitTransaction => "commitTransaction",
            DriverMethod::RollbackTransaction => "rollbackTransaction",
            DriverMethod::IsTransactionActive => "isTransactionActive",
            DriverMethod::Close => "close",
        }
    }
}

/// What a dispatched call returned.
#[derive(Debug)]
pub enum CallOutcome {
    Outcome(QueryOutcome),
    Statement(Statement),
    Text(String),
    Id(Option<i64>),
    Flag(bool),
    Done,
}

impl CallOutcome {
    /// # Errors
    /// `DbErrorKind::Result` when the call did not run SQL.
    pub fn into_outcome(self) -> Result<QueryOutcome, DbError> {
        match self {
            CallOutcome::Outcome(outcome) => Ok(outcome),
            other => Err(DbError::result("", format!("call returned {other:?}, not a query outcome"))),
        }
    }

    /// # Errors
    /// `DbErrorKind::Result` when the call did not prepare a statement.
    pub fn into_statement(self) -> Result<Statement, DbError> {
        match self {
            CallOutcome::Statement(stmt) => Ok(stmt),
            other => Err(DbError::result("", format!("call returned {other:?}, not a statement"))),
        }
    }
}

/// Positional arguments of one dispatched call.
pub(crate) struct Args<'a> {
    method: DriverMethod,
    values: &'a [RowValues],
}

impl<'a> Args<'a> {
    pub(crate) fn new(method: DriverMethod, values: &'a [RowValues]) -> Self {
        Self { method, values }
    }

    fn invalid(&self, why: impl std::fmt::Display) -> DbError {
        DbError::invalid_arguments(self.method.name(), why)
    }

    pub(crate) fn at_most(&self, count: usize) -> Result<&Self, DbError> {
        if self.values.len() > count {
            Err(self.invalid(format!(
                "takes at most {count} arguments, got {}",
                self.values.len()
            )))
        } else {
            Ok(self)
        }
    }

    pub(crate) fn text(&self, idx: usize) -> Result<&'a str, DbError> {
        match self.values.get(idx) {
            Some(RowValues::Text(s)) => Ok(s),
            Some(other) => Err(self.invalid(format!("argument {} must be text, got {other:?}", idx + 1))),
            None => Err(self.invalid(format!("argument {} is required", idx + 1))),
        }
    }

    pub(crate) fn flag(&self, idx: usize) -> Result<bool, DbError> {
        match self.values.get(idx) {
            None | Some(RowValues::Null) => Ok(false),
            Some(RowValues::Bool(b)) => Ok(*b),
            Some(RowValues::Int(i)) => Ok(*i != 0),
            Some(other) => Err(self.invalid(format!("argument {} must be a flag, got {other:?}", idx + 1))),
        }
    }

    /// A [`FetchMode`] given by its numeric code or its name.
    pub(crate) fn mode(&self, idx: usize) -> Result<FetchMode, DbError> {
        let mode = match self.values.get(idx) {
            None | Some(RowValues::Null) => Some(FetchMode::default()),
            Some(RowValues::Int(code)) => FetchMode::from_code(*code),
            Some(RowValues::Text(name)) => {
                serde_json::from_value(JsonValue::String(name.to_ascii_lowercase())).ok()
            }
            Some(_) => None,
        };
        mode.ok_or_else(|| self.invalid(format!("argument {} is not a fetch mode", idx + 1)))
    }

    /// Statement parameters: a JSON array binds positionally, a JSON object by name.
    pub(crate) fn params(&self, idx: usize) -> Result<Params, DbError> {
        match self.values.get(idx) {
            None | Some(RowValues::Null) => Ok(Params::new()),
            Some(RowValues::JSON(JsonValue::Array(items))) => {
                Ok(Params::positional(items.iter().map(json_to_row_value)))
            }
            Some(RowValues::JSON(JsonValue::Object(map))) => Ok(Params::named(
                map.iter().map(|(k, v)| (k.as_str(), json_to_row_value(v))),
            )),
            Some(other) => Err(self.invalid(format!(
                "argument {} must be a JSON array or object of parameters, got {other:?}",
                idx + 1
            ))),
        }
    }
}

fn json_to_row_value(value: &JsonValue) -> RowValues {
    match value {
        JsonValue::Null => RowValues::Null,
        JsonValue::Bool(b) => RowValues::Bool(*b),
        JsonValue::Number(n) => n
            .as_i64()
            .map(RowValues::Int)
            .or_else(|| n.as_f64().map(RowValues::Float))
            .unwrap_or(RowValues::Null),
        JsonValue::String(s) => RowValues::Text(s.clone()),
        other => RowValues::JSON(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbErrorKind;
    use crate::statement::Placeholder;

    #[test]
    fn lookup_ignores_case_and_underscores() {
        assert_eq!(DriverMethod::lookup("getLastID").unwrap(), DriverMethod::LastInsertId);
        assert_eq!(DriverMethod::lookup("get_last_id").unwrap(), DriverMethod::LastInsertId);
        assert_eq!(DriverMethod::lookup("STMT_QUERY").unwrap(), DriverMethod::StmtQuery);
        assert_eq!(DriverMethod::lookup("disconnect").unwrap(), DriverMethod::Close);
        assert_eq!(DriverMethod::lookup("Prepare").unwrap(), DriverMethod::Prepare);
        assert_eq!(
            DriverMethod::lookup("exec").unwrap_err().kind(),
            DbErrorKind::DriverMethodNotFound
        );
        let err = DriverMethod::lookup("dropDatabase").unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::DriverMethodNotFound);
    }

    #[test]
    fn parses_arguments() {
        let values = vec![
            RowValues::Text("SELECT ?".into()),
            RowValues::JSON(serde_json::json!(["Sup%", 2, 1.5, null])),
            RowValues::Bool(true),
            RowValues::Text("Object".into()),
        ];
        let args = Args::new(DriverMethod::StmtQuery, &values);
        assert_eq!(args.text(0).unwrap(), "SELECT ?");
        let params: Vec<_> = args.params(1).unwrap().into_iter().map(|(_, p)| p.value).collect();
        assert_eq!(
            params,
            vec![
                RowValues::Text("Sup%".into()),
                RowValues::Int(2),
                RowValues::Float(1.5),
                RowValues::Null,
            ]
        );
        assert!(args.flag(2).unwrap());
        assert_eq!(args.mode(3).unwrap(), FetchMode::Object);
        assert_eq!(args.mode(9).unwrap(), FetchMode::Assoc);
        assert!(args.at_most(3).is_err());
    }

    #[test]
    fn named_parameters_from_objects() {
        let values = vec![RowValues::JSON(serde_json::json!({":log_id": 2}))];
        let args = Args::new(DriverMethod::StmtQuery, &values);
        let params = args.params(0).unwrap();
        assert_eq!(params.iter().next().unwrap().0, Placeholder::Named("log_id".into()));
    }

    #[test]
    fn bad_shapes_are_invalid_arguments() {
        let values = vec![RowValues::Int(7)];
        let args = Args::new(DriverMethod::Query, &values);
        assert_eq!(args.text(0).unwrap_err().kind(), DbErrorKind::InvalidArguments);
        assert_eq!(args.params(0).unwrap_err().kind(), DbErrorKind::InvalidArguments);
        assert_eq!(args.mode(0).unwrap_err().kind(), DbErrorKind::InvalidArguments);
        assert!(args.text(1).is_err());
    }
}
