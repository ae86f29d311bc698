#![allow(dead_code)]

use sql_facade::prelude::*;
use tempfile::TempDir;

/// The event log table the scenarios run against, with three seed rows.
pub const LOG_SCHEMA: &str = "
CREATE TABLE log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nome_interessato TEXT NOT NULL,
    autore TEXT NOT NULL,
    data_evento TEXT NOT NULL,
    codice_evento INTEGER NOT NULL,
    descrizione_evento TEXT
);
INSERT INTO log (nome_interessato, autore, data_evento, codice_evento, descrizione_evento) VALUES
    ('Super', '::1', '2024-01-01 10:00:00', 1, 'login'),
    ('Supporto', '10.0.0.2', '2024-01-02 11:30:00', 2, 'note a:b :c'),
    ('Mario', '10.0.0.3', '2024-01-03 12:45:00', 3, 'logout');
";

#[derive(Debug, Clone, Copy)]
pub enum TestCase {
    #[cfg(feature = "sqlite")]
    SqliteMemory,
    #[cfg(feature = "sqlite")]
    SqliteFile,
    #[cfg(feature = "any")]
    AnyMemory,
    #[cfg(feature = "any")]
    AnyFile,
}

pub fn cases() -> Vec<TestCase> {
    vec![
        #[cfg(feature = "sqlite")]
        TestCase::SqliteMemory,
        #[cfg(feature = "sqlite")]
        TestCase::SqliteFile,
        #[cfg(feature = "any")]
        TestCase::AnyMemory,
        #[cfg(feature = "any")]
        TestCase::AnyFile,
    ]
}

impl TestCase {
    pub fn settings(self, dir: &TempDir) -> ConnectionSettings {
        let file = dir.path().join("facade_test.db").to_string_lossy().into_owned();
        match self {
            #[cfg(feature = "sqlite")]
            TestCase::SqliteMemory => ConnectionSettings::new(DriverKind::Sqlite, ":memory:"),
            #[cfg(feature = "sqlite")]
            TestCase::SqliteFile => {
                ConnectionSettings::new(DriverKind::Sqlite, file).option("busy_timeout", "1000")
            }
            #[cfg(feature = "any")]
            TestCase::AnyMemory => {
                ConnectionSettings::new(DriverKind::Any, ":memory:").option("scheme", "sqlite")
            }
            #[cfg(feature = "any")]
            TestCase::AnyFile => ConnectionSettings::new(DriverKind::Any, file).option("scheme", "sqlite"),
        }
    }
}

/// A connected facade with the log table created; the temp dir lives as long as it does.
pub struct Fixture {
    pub db: Db,
    pub case: TestCase,
    pub dir: TempDir,
}

pub async fn open(case: TestCase) -> Result<Fixture, Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut db = Db::connect(case.settings(&dir)).await?;
    db.execute_batch(LOG_SCHEMA).await?;
    Ok(Fixture { db, case, dir })
}

pub async fn count_rows(db: &mut Db, table: &str) -> Result<i64, Box<dyn std::error::Error>> {
    let row = db
        .query(&format!("SELECT COUNT(*) AS n FROM {table}"), true, FetchMode::Num)
        .await?
        .into_row()?
        .ok_or("count returned no row")?;
    let count = row
        .get_by_index(0)
        .and_then(RowValues::as_int)
        .copied()
        .ok_or("count is not an integer")?;
    Ok(count)
}
