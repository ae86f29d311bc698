use sqlx::Any;
use sqlx::any::AnyArguments;
use sqlx::query::Query;

use crate::types::{BindParam, RowValues, format_timestamp};

pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Attach one value to a query in the form the `Any` encoder understands.
///
/// Timestamps and JSON travel as text; NULL is sent as a text NULL, which
/// every backend accepts for any column type.
pub(crate) fn bind_value<'q>(query: AnyQuery<'q>, value: &RowValues) -> AnyQuery<'q> {
    match value {
        RowValues::Int(i) => query.bind(*i),
        RowValues::Float(f) => query.bind(*f),
        RowValues::Text(s) => query.bind(s.clone()),
        RowValues::Bool(b) => query.bind(*b),
        RowValues::Timestamp(dt) => query.bind(format_timestamp(dt)),
        RowValues::Null => query.bind(None::<String>),
        RowValues::JSON(jval) => query.bind(jval.to_string()),
        RowValues::Blob(bytes) => query.bind(bytes.clone()),
    }
}

/// Build a persistent query over `sql` with every parameter bound in order.
pub(crate) fn bind_all<'q>(sql: &'q str, params: &[BindParam]) -> AnyQuery<'q> {
    params
        .iter()
        .fold(sqlx::query(sql).persistent(true), |query, param| {
            bind_value(query, &param.value)
        })
}
