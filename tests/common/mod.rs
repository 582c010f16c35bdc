//! Shared helpers for the SQLite-backed integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tidemark::dialect::SqliteDialect;
use tidemark::executor::{DbError, DbExecutor, Row, SqliteExecutor, Value};
use tidemark::migration::{FileMigrationSource, Migrator, Reporter};

/// `SqliteExecutor` that remembers every statement passed to `execute`
pub struct RecordingExecutor {
    inner: SqliteExecutor,
    executed: RefCell<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            inner: SqliteExecutor::open_in_memory().unwrap(),
            executed: RefCell::new(Vec::new()),
        }
    }

    /// Everything executed, including transaction control and bookkeeping
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    /// Only statements that came from migration files
    pub fn migration_statements(&self) -> Vec<String> {
        self.executed
            .borrow()
            .iter()
            .filter(|sql| !is_bookkeeping(sql))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.executed.borrow_mut().clear();
    }
}

fn is_bookkeeping(sql: &str) -> bool {
    matches!(sql, "BEGIN" | "COMMIT" | "ROLLBACK")
        || sql.starts_with("CREATE TABLE IF NOT EXISTS \"migrations\"")
        || sql.starts_with("INSERT INTO \"migrations\"")
        || sql.starts_with("DELETE FROM \"migrations\"")
}

impl DbExecutor for RecordingExecutor {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        self.executed.borrow_mut().push(sql.to_string());
        self.inner.execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        self.inner.query(sql, params)
    }
}

/// Temporary migrations directory holding `files` (name, content)
pub fn migration_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

pub fn sqlite_migrator(dir: &Path) -> Migrator {
    Migrator::new(FileMigrationSource::new(dir), Arc::new(SqliteDialect))
}

/// Ids in the tracking table, ascending
pub fn record_ids(migrator: &Migrator, db: &dyn DbExecutor) -> Vec<String> {
    migrator
        .records(db)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

pub fn table_exists(db: &dyn DbExecutor, name: &str) -> bool {
    let rows = db
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[Value::from(name)],
        )
        .unwrap();
    !rows.is_empty()
}

/// `(level, message)` pairs sent to a reporter
#[derive(Default)]
pub struct CapturingReporter {
    pub messages: RefCell<Vec<(&'static str, String)>>,
}

impl CapturingReporter {
    pub fn lines(&self, level: &str) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Reporter for CapturingReporter {
    fn output(&self, message: &str) {
        self.messages.borrow_mut().push(("output", message.to_string()));
    }
    fn info(&self, message: &str) {
        self.messages.borrow_mut().push(("info", message.to_string()));
    }
    fn warn(&self, message: &str) {
        self.messages.borrow_mut().push(("warn", message.to_string()));
    }
    fn error(&self, message: &str) {
        self.messages.borrow_mut().push(("error", message.to_string()));
    }
}

pub const CREATE_A: &str = "20240101000000-a.sql";
pub const CREATE_B: &str = "20240102000000-b.sql";
pub const CREATE_C: &str = "20240103000000-c.sql";

pub fn create_table_migration(table: &str) -> String {
    format!(
        "-- +migrate Up\nCREATE TABLE {table} (id INTEGER PRIMARY KEY);\n\n-- +migrate Down\nDROP TABLE {table};\n"
    )
}

/// Three migrations creating tables `a`, `b` and `c`
pub fn abc_dir() -> TempDir {
    migration_dir(&[
        (CREATE_A, &create_table_migration("a")),
        (CREATE_B, &create_table_migration("b")),
        (CREATE_C, &create_table_migration("c")),
    ])
}
