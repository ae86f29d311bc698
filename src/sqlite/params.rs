use rusqlite::types::Value;

use crate::types::{BindParam, RowValues, format_timestamp};

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(format_timestamp(dt)),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Bound parameters in execution order, already coerced to their declared types.
pub(crate) fn convert(params: &[BindParam]) -> Vec<Value> {
    params
        .iter()
        .map(|p| row_value_to_sqlite_value(&p.value))
        .collect()
}

/// Borrow converted values as the slice rusqlite executes with.
pub(crate) fn as_refs(values: &[Value]) -> Vec<&dyn rusqlite::ToSql> {
    values.iter().map(|v| v as &dyn rusqlite::ToSql).collect()
}
