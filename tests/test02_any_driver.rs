#![cfg(feature = "any")]

mod common;

use common::LOG_SCHEMA;
use sql_facade::any::{AnyStatementHandle, connection_url};
use sql_facade::prelude::*;
use tokio::runtime::Runtime;

fn sqlite_settings(database: impl Into<String>) -> ConnectionSettings {
    ConnectionSettings::new(DriverKind::Any, database).option("scheme", "sqlite")
}

#[test]
fn test02_connects_to_a_sqlite_file_and_reopens_it() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("any_reopen.db").to_string_lossy().into_owned();
        let settings = sqlite_settings(path.clone());
        assert_eq!(connection_url(&settings), format!("sqlite://{path}?mode=rwc"));

        let mut conn = AnyDriver::connect(&settings).await?;
        assert_eq!(conn.backend(), "SQLite");
        conn.execute_batch(LOG_SCHEMA).await?;
        conn.close().await?;
        assert!(!conn.is_connected());

        let mut reopened = AnyDriver::connect(&settings).await?;
        let rows = reopened
            .query("SELECT id FROM log ORDER BY id", false, FetchMode::Num)
            .await?
            .fetch_all(FetchMode::Num)?;
        assert_eq!(rows.len(), 3);
        reopened.close().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test02_named_placeholders_are_rewritten_and_repeated() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = AnyDriver::connect(&sqlite_settings(":memory:")).await?;
        conn.execute_batch(LOG_SCHEMA).await?;

        let mut stmt = conn
            .prepare(
                "SELECT nome_interessato FROM log \
                 WHERE codice_evento = :code OR id = :code ORDER BY id",
            )
            .await?;
        assert_eq!(
            stmt.native_sql(),
            "SELECT nome_interessato FROM log WHERE codice_evento = ? OR id = ? ORDER BY id"
        );
        assert_eq!(stmt.handle::<AnyStatementHandle>()?.backend(), "SQLite");

        conn.bind(&mut stmt, ":code".into(), 3.into())?;
        let rows = conn.exec(&mut stmt, false, FetchMode::Num).await?.fetch_all(FetchMode::Num)?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_by_index(0), Some(&RowValues::Text("Mario".into())));
        assert_eq!(stmt.handle::<AnyStatementHandle>()?.executions(), 1);

        // Colons inside literals are left alone.
        let row = conn
            .stmt_query(
                "SELECT descrizione_evento FROM log WHERE descrizione_evento = 'note a:b :c' AND id = :id",
                Params::named([(":id", 2)]),
                true,
                FetchMode::Assoc,
            )
            .await?
            .into_row()?
            .ok_or("no row")?;
        assert_eq!(row.get("descrizione_evento"), Some(&RowValues::Text("note a:b :c".into())));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test02_values_decode_by_runtime_type() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = AnyDriver::connect(&sqlite_settings(":memory:")).await?;
        conn.execute_batch(
            "CREATE TABLE sample (id INTEGER PRIMARY KEY, ratio REAL, label TEXT, payload BLOB);
             INSERT INTO sample (ratio, label, payload) VALUES (0.5, 'half', x'0102');
             INSERT INTO sample (ratio, label, payload) VALUES (NULL, NULL, NULL);",
        )
        .await?;

        let rows = conn
            .query("SELECT id, ratio, label, payload FROM sample ORDER BY id", false, FetchMode::Num)
            .await?
            .fetch_all(FetchMode::Num)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_by_index(0), Some(&RowValues::Int(1)));
        assert_eq!(rows[0].get_by_index(1).and_then(RowValues::as_float), Some(0.5));
        assert_eq!(rows[0].get_by_index(2), Some(&RowValues::Text("half".into())));
        assert_eq!(rows[0].get_by_index(3), Some(&RowValues::Blob(vec![1, 2])));
        assert!(rows[1].get_by_index(1).is_some_and(RowValues::is_null));
        assert!(rows[1].get_by_index(2).is_some_and(RowValues::is_null));
        assert!(rows[1].get_by_index(3).is_some_and(RowValues::is_null));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test02_errors_and_last_insert_id() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = AnyDriver::connect(&sqlite_settings(":memory:")).await?;
        conn.execute_batch(LOG_SCHEMA).await?;

        let err = conn.query("SELECT * FROM missing_table", false, FetchMode::Assoc).await.unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Query);
        assert_eq!(err.sql(), Some("SELECT * FROM missing_table"));

        let err = conn.prepare("SELECT :a, ?").await.unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Prepare);

        let outcome = conn
            .stmt_query(
                "INSERT INTO log (nome_interessato, autore, data_evento, codice_evento) \
                 VALUES (:name, :author, CURRENT_TIMESTAMP, :code)",
                Params::named([
                    (":name", RowValues::from("Luigi")),
                    (":author", RowValues::from("::1")),
                    (":code", RowValues::Int(5)),
                ]),
                false,
                FetchMode::Assoc,
            )
            .await?;
        assert_eq!(outcome.affected_rows(), Some(1));
        assert_eq!(conn.last_insert_id(), Some(4));

        let outcome = conn.query("DELETE FROM log WHERE codice_evento < 3", false, FetchMode::Assoc).await?;
        assert_eq!(outcome.affected_rows(), Some(2));
        assert_eq!(conn.last_insert_id(), Some(4));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test02_unknown_scheme_is_a_connection_error() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let settings = ConnectionSettings::new(DriverKind::Any, "gdrcd")
            .option("url", "unknownscheme://nobody@localhost/gdrcd");
        let err = AnyDriver::connect(&settings).await.unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Connection);
        assert_eq!(err.severity(), Severity::Fatal);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test02_returning_insert_updates_last_insert_id() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = AnyDriver::connect(&sqlite_settings(":memory:")).await?;
        conn.execute_batch(LOG_SCHEMA).await?;

        let row = conn
            .query(
                "INSERT INTO log (nome_interessato, autore, data_evento, codice_evento) \
                 VALUES ('Luigi', '::1', CURRENT_TIMESTAMP, 4) RETURNING id",
                true,
                FetchMode::Num,
            )
            .await?
            .into_row()?
            .ok_or("no row")?;
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(4)));
        assert_eq!(conn.last_insert_id(), Some(4));

        let row = conn
            .stmt_query(
                "INSERT INTO log (nome_interessato, autore, data_evento, codice_evento) \
                 VALUES (?, '::1', CURRENT_TIMESTAMP, 5) RETURNING id",
                Params::positional(["Peach"]),
                true,
                FetchMode::Num,
            )
            .await?
            .into_row()?
            .ok_or("no row")?;
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(5)));
        assert_eq!(conn.last_insert_id(), Some(5));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test02_raw_transaction_sql_is_tracked() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("raw_tx.db").to_string_lossy().into_owned();
        let mut conn = AnyDriver::connect(&sqlite_settings(file.clone())).await?;
        conn.execute_batch(LOG_SCHEMA).await?;

        conn.query("BEGIN", false, FetchMode::Assoc).await?;
        assert!(conn.is_transaction_active());
        conn.query("DELETE FROM log WHERE id = 1", false, FetchMode::Assoc).await?;
        conn.commit_transaction().await?;
        assert!(!conn.is_transaction_active());
        // The commit reached the server, so a fresh transaction can start.
        conn.start_transaction().await?;
        conn.rollback_transaction().await?;

        conn.execute_batch("BEGIN; DELETE FROM log WHERE id = 2;").await?;
        assert!(conn.is_transaction_active());
        conn.query("ROLLBACK", false, FetchMode::Assoc).await?;
        assert!(!conn.is_transaction_active());
        conn.close().await?;

        let mut reopened = AnyDriver::connect(&sqlite_settings(file)).await?;
        let ids = reopened
            .query("SELECT id FROM log ORDER BY id", false, FetchMode::Num)
            .await?
            .fetch_all(FetchMode::Num)?;
        let ids: Vec<_> = ids.iter().filter_map(|row| row.get_by_index(0).cloned()).collect();
        assert_eq!(ids, vec![RowValues::Int(2), RowValues::Int(3)]);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
