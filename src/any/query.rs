use futures_util::TryStreamExt;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Either, Executor as _, Row, TypeInfo, ValueRef};

use crate::types::RowValues;

use super::params::AnyQuery;

/// Extract a `RowValues` from an `Any` row, dispatching on the value's runtime type.
///
/// # Errors
///
/// Returns the sqlx error if the column is missing or cannot be decoded.
pub fn any_extract_value(row: &AnyRow, idx: usize) -> Result<RowValues, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(RowValues::Null);
    }
    let type_info = raw.type_info();
    let value = match type_info.name() {
        "BOOLEAN" => RowValues::Bool(row.try_get::<bool, _>(idx)?),
        "SMALLINT" => RowValues::Int(i64::from(row.try_get::<i16, _>(idx)?)),
        "INTEGER" => RowValues::Int(i64::from(row.try_get::<i32, _>(idx)?)),
        "BIGINT" => RowValues::Int(row.try_get::<i64, _>(idx)?),
        "REAL" => RowValues::Float(f64::from(row.try_get::<f32, _>(idx)?)),
        "DOUBLE" => RowValues::Float(row.try_get::<f64, _>(idx)?),
        "BLOB" => RowValues::Blob(row.try_get::<Vec<u8>, _>(idx)?),
        _ => RowValues::Text(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}

/// Rows of a row-producing statement plus the insert id its summary
/// reported, so `INSERT ... RETURNING` still updates the last insert id.
pub(crate) async fn fetch_with_summary<'q>(
    conn: &mut AnyConnection,
    query: AnyQuery<'q>,
) -> Result<(Vec<AnyRow>, Option<i64>), sqlx::Error> {
    let mut stream = (&mut *conn).fetch_many(query);
    let mut rows = Vec::new();
    let mut last_insert_id = None;
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => {
                if let Some(id) = done.last_insert_id().filter(|id| *id != 0) {
                    last_insert_id = Some(id);
                }
            }
            Either::Right(row) => rows.push(row),
        }
    }
    Ok((rows, last_insert_id))
}

/// Decode every row into owned values, `width` columns each.
pub(crate) fn collect_rows(rows: &[AnyRow], width: usize) -> Result<Vec<Vec<RowValues>>, sqlx::Error> {
    rows.iter()
        .map(|row| (0..width).map(|i| any_extract_value(row, i)).collect())
        .collect()
}
