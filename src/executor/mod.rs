//! Database execution seam
//!
//! Provides the `DbExecutor` trait that the record store, the planner and the
//! migrator run their SQL through. Backends translate between their driver
//! types and the small [`Value`]/[`Row`] model defined here, so nothing above
//! this module knows which driver is in use.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::MayPostgresExecutor;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;

/// Boxed driver error carried inside [`DbError::Driver`]
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// `DbExecutor` error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Error raised by the underlying database driver
    #[error("{backend} error: {source}")]
    Driver {
        backend: &'static str,
        #[source]
        source: DriverError,
    },
    /// Query execution error
    #[error("Query error: {0}")]
    Query(String),
    /// Row parsing/conversion error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Other execution errors
    #[error("Execution error: {0}")]
    Other(String),
}

impl DbError {
    /// Wrap a driver error, tagging it with the backend name
    pub fn driver(backend: &'static str, source: impl Into<DriverError>) -> Self {
        DbError::Driver {
            backend,
            source: source.into(),
        }
    }
}

/// A bound parameter or a fetched column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// One fetched row, columns in `SELECT` order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Read column `index` as text
    ///
    /// # Errors
    ///
    /// Returns `DbError::Parse` if the column is missing or NULL.
    pub fn text(&self, index: usize) -> Result<String, DbError> {
        match self.get(index) {
            Some(Value::Text(s)) => Ok(s.clone()),
            Some(Value::Integer(i)) => Ok(i.to_string()),
            Some(Value::Null) | None => Err(DbError::Parse(format!(
                "column {index} is missing or NULL"
            ))),
            Some(other) => Ok(other.to_string()),
        }
    }

    /// Read column `index` as a UTC timestamp
    ///
    /// Backends that store timestamps as text (SQLite) hand back strings, so
    /// text values are parsed with the formats those drivers emit.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Parse` if the column is missing, NULL, or holds text
    /// in an unrecognized format.
    pub fn timestamp(&self, index: usize) -> Result<DateTime<Utc>, DbError> {
        match self.get(index) {
            Some(Value::Timestamp(t)) => Ok(*t),
            Some(Value::Text(s)) => parse_timestamp(s),
            Some(other) => Err(DbError::Parse(format!(
                "column {index} is not a timestamp: {other}"
            ))),
            None => Err(DbError::Parse(format!("column {index} is missing"))),
        }
    }
}

/// Parse a timestamp string as written by the supported drivers
///
/// # Errors
///
/// Returns `DbError::Parse` when no known format matches.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    // rusqlite's chrono encoding: "%Y-%m-%d %H:%M:%S%.f%:z"
    if let Ok(t) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(t.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(DbError::Parse(format!(
        "Failed to parse timestamp '{raw}': unrecognized format"
    )))
}

/// Trait for executing database operations
///
/// This trait abstracts database execution, allowing different backends
/// (a direct client, a transaction, a test recorder) to be used
/// interchangeably. Placeholders in `sql` must use the syntax of the active
/// [`Dialect`](crate::dialect::Dialect) (see `Dialect::bind_var`).
pub trait DbExecutor {
    /// Execute a SQL statement and return the number of rows affected
    ///
    /// Statements without parameters are sent as-is, so DDL and other
    /// statements that cannot be prepared still run.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the statement fails.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError>;

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query execution fails.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError>;
}

impl<T: DbExecutor + ?Sized> DbExecutor for &T {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        (**self).execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        (**self).query(sql, params)
    }
}

impl<T: DbExecutor + ?Sized> DbExecutor for Box<T> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        (**self).execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        (**self).query(sql, params)
    }
}
