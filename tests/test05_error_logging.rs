mod common;

use common::{cases, count_rows, open};
use sql_facade::prelude::*;
use tokio::runtime::Runtime;

const ERROR_LOG_SCHEMA: &str = "
CREATE TABLE error_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    severity INTEGER NOT NULL,
    code INTEGER NOT NULL,
    message TEXT NOT NULL,
    logged_at TEXT NOT NULL
);
";

#[test]
fn test05_driver_errors_are_written_to_the_error_table() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        for case in cases() {
            let mut fx = open(case).await?;
            fx.db.execute_batch(ERROR_LOG_SCHEMA).await?;

            let err = fx
                .db
                .query("SELECT * FROM log WHERE", false, FetchMode::Assoc)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), DbErrorKind::Query);
            assert!(fx.db.log_error(&err, "error_log", "[gestione] ").await);

            let app = AppError::new("Character sheet unavailable")
                .with_internal("pg 42 missing")
                .with_code(404)
                .with_severity(Severity::Info);
            assert!(fx.db.log_error(&app, "error_log", "").await);

            let rows = fx
                .db
                .query("SELECT severity, code, message, logged_at FROM error_log ORDER BY id", false, FetchMode::Assoc)
                .await?
                .fetch_all(FetchMode::Assoc)?;
            assert_eq!(rows.len(), 2, "{case:?}");

            assert_eq!(rows[0].get("severity"), Some(&RowValues::Int(Severity::Warning.as_i64())));
            let message = rows[0].get("message").and_then(RowValues::as_text).ok_or("no message")?;
            assert!(message.starts_with("[gestione] QueryError: "), "{message}");
            assert!(message.ends_with("| SELECT * FROM log WHERE"), "{message}");
            assert!(rows[0].get("logged_at").is_some_and(|v| !v.is_null()));

            assert_eq!(rows[1].get("severity"), Some(&RowValues::Int(2)));
            assert_eq!(rows[1].get("code"), Some(&RowValues::Int(404)));
            assert_eq!(rows[1].get("message"), Some(&RowValues::Text("pg 42 missing".into())));
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test05_database_sink_failures_are_swallowed() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        for case in cases() {
            let mut fx = open(case).await?;
            let err = DbError::transaction("COMMIT failed: database is locked");

            // Unusual table names are refused before any SQL is built.
            assert!(!fx.db.log_error(&err, "error_log; DROP TABLE log", "").await);
            assert!(!fx.db.log_error(&err, "", "").await);
            // A table that does not exist only produces a warning.
            assert!(!fx.db.log_error(&err, "missing_errors", "").await);
            assert_eq!(count_rows(&mut fx.db, "log").await?, 3);

            // The free function works on a bare driver as well.
            fx.db.execute_batch(ERROR_LOG_SCHEMA).await?;
            assert!(log_to_db(&err, fx.db.driver_mut(), "main.error_log", "").await);
            assert_eq!(count_rows(&mut fx.db, "error_log").await?, 1);
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn test05_every_sink_can_be_chained() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gestione_errors.log");

    let connection = DbError::connection("Access denied for user 'gdrcd'@'localhost'");
    assert_eq!(connection.severity(), Severity::Fatal);
    assert_eq!(connection.message(), "Unable to connect to the database server");
    connection.log_to_file(&path).log_to_syslog();

    let empty = DbError::result("SELECT 1", "the result set has been freed");
    assert_eq!(empty.severity(), Severity::Info);
    empty.log_to_file(&path);

    let written = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("[fatal] ConnectionError: Access denied"), "{}", lines[0]);
    assert!(lines[1].contains("[info] ResultError: the result set has been freed | SELECT 1"), "{}", lines[1]);

    assert_eq!(
        connection.render(true),
        r#"<div class="app_error">Unable to connect to the database server</div>"#
    );
    assert_eq!(empty.render(false), "There is no data to return");
    Ok(())
}
