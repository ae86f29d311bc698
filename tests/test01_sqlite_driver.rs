#![cfg(feature = "sqlite")]

mod common;

use common::LOG_SCHEMA;
use sql_facade::prelude::*;
use sql_facade::sqlite::SqliteStatementHandle;
use tokio::runtime::Runtime;

async fn memory() -> Result<SqliteDriver, DbError> {
    SqliteDriver::connect(&ConnectionSettings::new(DriverKind::Sqlite, ":memory:")).await
}

#[test]
fn test01_rows_fetched_from_a_statement_are_stable_copies() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = memory().await?;
        conn.execute_batch(LOG_SCHEMA).await?;

        let mut stmt = conn.prepare("SELECT id, nome_interessato FROM log ORDER BY id").await?;
        let mut result = conn.exec(&mut stmt, false, FetchMode::Num).await?.into_rows()?;
        assert_eq!(result.num_rows(), 3);
        assert_eq!(result.column_names(), ["id", "nome_interessato"]);

        let first = result.fetch(FetchMode::Num)?.ok_or("missing first row")?;
        let second = result.fetch(FetchMode::Num)?.ok_or("missing second row")?;
        assert_eq!(first.get_by_index(1), Some(&RowValues::Text("Super".into())));
        assert_eq!(second.get_by_index(1), Some(&RowValues::Text("Supporto".into())));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test01_rebinding_while_a_result_is_open_fails() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = memory().await?;
        conn.execute_batch(LOG_SCHEMA).await?;

        let mut stmt = conn.prepare("SELECT * FROM log WHERE id > ?").await?;
        conn.bind(&mut stmt, 1usize.into(), 0.into())?;
        let mut open = conn.exec(&mut stmt, false, FetchMode::Assoc).await?.into_rows()?;

        let err = conn.bind(&mut stmt, 1usize.into(), 1.into()).unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Statement);
        let err = conn.exec(&mut stmt, false, FetchMode::Assoc).await.unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Statement);

        open.free();
        conn.bind(&mut stmt, 1usize.into(), 1.into())?;
        let rows = conn.exec(&mut stmt, false, FetchMode::Assoc).await?.fetch_all(FetchMode::Assoc)?;
        assert_eq!(rows.len(), 2);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test01_handle_counts_executions_until_reset() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = memory().await?;
        conn.execute_batch(LOG_SCHEMA).await?;

        let mut stmt = conn
            .prepare("UPDATE log SET codice_evento = codice_evento + 1 WHERE id = :id")
            .await?;
        assert!(!stmt.is_row_producing());
        for id in 1..=3 {
            conn.bind(&mut stmt, ":id".into(), id.into())?;
            let outcome = conn.exec(&mut stmt, false, FetchMode::Assoc).await?;
            assert_eq!(outcome.affected_rows(), Some(1));
        }
        assert_eq!(stmt.handle::<SqliteStatementHandle>()?.executions(), 3);
        assert_eq!(stmt.handle::<SqliteStatementHandle>()?.parameter_count(), 1);

        stmt.reset_statement()?;
        assert_eq!(stmt.handle::<SqliteStatementHandle>()?.executions(), 0);
        let err = conn.exec(&mut stmt, false, FetchMode::Assoc).await.unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Bind);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test01_foreign_and_orphaned_statements_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut first = memory().await?;
        let mut second = memory().await?;
        assert_ne!(first.connection_id(), second.connection_id());

        let mut stmt = first.prepare("SELECT ? AS echo").await?;
        let err = second.bind(&mut stmt, 1usize.into(), "x".into()).unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Statement);
        let err = second.exec(&mut stmt, true, FetchMode::Num).await.unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Statement);

        first.bind(&mut stmt, 1usize.into(), "x".into())?;
        let row = first.exec(&mut stmt, true, FetchMode::Num).await?.into_row()?;
        assert_eq!(
            row.as_ref().and_then(|r| r.get_by_index(0)),
            Some(&RowValues::Text("x".into()))
        );

        first.close().await?;
        let err = first.exec(&mut stmt, true, FetchMode::Num).await.unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Statement);
        second.close().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test01_foreign_keys_option_is_applied() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let settings = ConnectionSettings::new(DriverKind::Sqlite, ":memory:").option("foreign_keys", "on");
        let mut conn = SqliteDriver::connect(&settings).await?;
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id));",
        )
        .await?;
        let err = conn
            .query("INSERT INTO child (parent_id) VALUES (42)", false, FetchMode::Assoc)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Query);
        assert!(err.internal_message().contains("FOREIGN KEY"), "{err}");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test01_last_insert_id_survives_non_insert_statements() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = memory().await?;
        conn.execute_batch(LOG_SCHEMA).await?;
        assert_eq!(conn.last_insert_id(), None);

        conn.stmt_query(
            "INSERT INTO log (nome_interessato, autore, data_evento, codice_evento) VALUES (?, ?, ?, ?)",
            vec!["Luigi".into(), "::1".into(), "2024-02-01 08:00:00".into(), RowValues::Int(4)].into(),
            false,
            FetchMode::Assoc,
        )
        .await?;
        assert_eq!(conn.last_insert_id(), Some(4));

        conn.query("SELECT * FROM log", true, FetchMode::Assoc).await?;
        conn.query("DELETE FROM log WHERE id = 1", false, FetchMode::Assoc).await?;
        assert_eq!(conn.last_insert_id(), Some(4));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test01_transaction_transitions_and_escaped_literals() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = memory().await?;
        conn.execute_batch(LOG_SCHEMA).await?;

        conn.start_transaction().await?;
        let err = conn.start_transaction().await.unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::Transaction);
        conn.rollback_transaction().await?;
        // Nothing active: both are logged no-ops.
        conn.commit_transaction().await?;
        conn.rollback_transaction().await?;

        let name = conn.escape("O'Neill")?;
        assert_eq!(name, "'O''Neill'");
        let row = conn
            .query(&format!("SELECT {name} AS quoted"), true, FetchMode::Assoc)
            .await?
            .into_row()?
            .ok_or("no row")?;
        assert_eq!(row.get("quoted"), Some(&RowValues::Text("O'Neill".into())));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test01_returning_insert_updates_last_insert_id() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn = memory().await?;
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
                 VALUES (:name, '::1', CURRENT_TIMESTAMP, 5) RETURNING id",
                Params::named([(":name", "Peach")]),
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
