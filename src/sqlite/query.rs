use rusqlite::Statement;
use rusqlite::types::Value;

use crate::types::RowValues;

use super::params::as_refs;

/// What one statement produced, before it is wrapped into a result.
#[derive(Debug)]
pub(crate) enum Output {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<RowValues>>,
    },
    Changed(u64),
}

/// Output plus the connection state observed right after the statement ran.
#[derive(Debug)]
pub(crate) struct Executed {
    pub(crate) output: Output,
    pub(crate) last_insert_id: Option<i64>,
    pub(crate) autocommit: bool,
}

impl Executed {
    fn observe(conn: &rusqlite::Connection, output: Output) -> Self {
        // Row-producing writes (`INSERT ... RETURNING`) report an id too.
        let last_insert_id = (conn.changes() > 0)
            .then(|| conn.last_insert_rowid())
            .filter(|id| *id != 0);
        Self {
            output,
            last_insert_id,
            autocommit: conn.is_autocommit(),
        }
    }
}

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns the rusqlite error if the column cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<RowValues> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run a prepared statement to completion.
///
/// Statements without result columns are executed for their change count;
/// everything else is stepped and every row collected.
pub(crate) fn run_statement(stmt: &mut Statement<'_>, values: &[Value]) -> rusqlite::Result<Output> {
    let refs = as_refs(values);
    if stmt.column_count() == 0 {
        let changes = stmt.execute(&refs[..])?;
        return Ok(Output::Changed(changes as u64));
    }

    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let width = columns.len();
    let mut collected = Vec::new();
    let mut rows = stmt.query(&refs[..])?;
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(width);
        for i in 0..width {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        collected.push(row_values);
    }
    Ok(Output::Rows {
        columns,
        rows: collected,
    })
}

/// Raw SQL: compiled once, not kept in the statement cache.
pub(crate) fn run_raw(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<Executed> {
    let output = {
        let mut stmt = conn.prepare(sql)?;
        run_statement(&mut stmt, &[])?
    };
    Ok(Executed::observe(conn, output))
}

/// Prepared SQL with bound values, compiled through the statement cache.
pub(crate) fn run_cached(
    conn: &rusqlite::Connection,
    sql: &str,
    values: &[Value],
) -> rusqlite::Result<Executed> {
    let output = {
        let mut stmt = conn.prepare_cached(sql)?;
        run_statement(&mut stmt, values)?
    };
    Ok(Executed::observe(conn, output))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, raw BLOB);")
            .unwrap();
        conn
    }

    #[test]
    fn changes_and_insert_ids() {
        let conn = conn();
        let executed = run_cached(
            &conn,
            "INSERT INTO t (name) VALUES (?1)",
            &[Value::Text("a".into())],
        )
        .unwrap();
        assert!(matches!(executed.output, Output::Changed(1)));
        assert_eq!(executed.last_insert_id, Some(1));
        assert!(executed.autocommit);
    }

    #[test]
    fn returning_inserts_report_their_id() {
        let conn = conn();
        run_raw(&conn, "INSERT INTO t (name) VALUES ('a')").unwrap();
        let executed = run_cached(
            &conn,
            "INSERT INTO t (name) VALUES (?1) RETURNING id",
            &[Value::Text("b".into())],
        )
        .unwrap();
        assert!(matches!(executed.output, Output::Rows { ref rows, .. } if rows == &vec![vec![RowValues::Int(2)]]));
        assert_eq!(executed.last_insert_id, Some(2));
    }

    #[test]
    fn collects_typed_rows() {
        let conn = conn();
        conn.execute_batch("INSERT INTO t VALUES (1, 'x', 1.5, x'0102'), (2, NULL, NULL, NULL);")
            .unwrap();
        let executed = run_raw(&conn, "SELECT id, name, score, raw FROM t ORDER BY id").unwrap();
        let Output::Rows { columns, rows } = executed.output else {
            panic!("expected rows");
        };
        assert_eq!(columns, vec!["id", "name", "score", "raw"]);
        assert_eq!(
            rows[0],
            vec![
                RowValues::Int(1),
                RowValues::Text("x".into()),
                RowValues::Float(1.5),
                RowValues::Blob(vec![1, 2]),
            ]
        );
        assert!(rows[1][1..].iter().all(RowValues::is_null));
    }

    #[test]
    fn empty_select_still_reports_columns() {
        let conn = conn();
        let executed = run_raw(&conn, "SELECT id FROM t WHERE id < 0").unwrap();
        assert!(matches!(executed.output, Output::Rows { ref rows, .. } if rows.is_empty()));
    }
}
