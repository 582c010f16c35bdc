//! `DbExecutor` over `rusqlite::Connection`

use super::{DbError, DbExecutor, Row, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;

const BACKEND: &str = "SQLite";

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::driver(BACKEND, err)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => Ok(ToSqlOutput::Owned(rusqlite::types::Value::Null)),
            Value::Bool(b) => b.to_sql(),
            Value::Integer(i) => i.to_sql(),
            Value::Text(s) => s.to_sql(),
            Value::Timestamp(t) => t.to_sql(),
        }
    }
}

/// Implementation of `DbExecutor` for a `rusqlite::Connection`
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) a database file
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Ok(Self::new(Connection::open(path)?))
    }

    /// Open a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns `DbError` if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

fn column_value(value: ValueRef<'_>) -> Result<Value, DbError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(r) => Ok(Value::Text(r.to_string())),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|e| DbError::Parse(format!("invalid UTF-8 in text column: {e}"))),
        ValueRef::Blob(_) => Err(DbError::Parse("blob columns are not supported".to_string())),
    }
}

impl DbExecutor for SqliteExecutor {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        if params.is_empty() {
            // `execute_batch` tolerates statements that return rows and
            // trailing comments, both common in hand-written migrations.
            self.conn.execute_batch(sql)?;
            return Ok(self.conn.changes() as u64);
        }

        let affected = self.conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|idx| column_value(row.get_ref(idx)?))
                .collect::<Result<Vec<_>, DbError>>()?;
            out.push(Row::new(values));
        }
        Ok(out)
    }
}
