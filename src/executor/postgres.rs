//! `DbExecutor` over `may_postgres::Client`

use super::{DbError, DbExecutor, Row, Value};
use chrono::{DateTime, NaiveDateTime, Utc};
use may_postgres::types::{ToSql, Type};
use may_postgres::Client;
use std::time::Instant;

const BACKEND: &str = "PostgreSQL";

static NULL_TEXT: Option<String> = None;

impl From<may_postgres::Error> for DbError {
    fn from(err: may_postgres::Error) -> Self {
        DbError::driver(BACKEND, err)
    }
}

/// Implementation of `DbExecutor` for `may_postgres::Client`
///
/// `Client` calls are blocking, so the executor works both inside `may`
/// coroutines and on a plain thread.
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Consume the executor and return the underlying client
    pub fn into_client(self) -> Client {
        self.client
    }
}

fn bind_params(params: &[Value]) -> Vec<&dyn ToSql> {
    params
        .iter()
        .map(|value| match value {
            Value::Null => &NULL_TEXT as &dyn ToSql,
            Value::Bool(b) => b as &dyn ToSql,
            Value::Integer(i) => i as &dyn ToSql,
            Value::Text(s) => s as &dyn ToSql,
            Value::Timestamp(t) => t as &dyn ToSql,
        })
        .collect()
}

fn column_value(row: &may_postgres::Row, idx: usize) -> Result<Value, DbError> {
    let ty = row.columns()[idx].type_().clone();

    let value = if ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(Value::Timestamp)
    } else if ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|naive| Value::Timestamp(naive.and_utc()))
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::Integer)
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|i| Value::Integer(i64::from(i)))
    } else if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|i| Value::Integer(i64::from(i)))
    } else if ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool)
    } else if ty == Type::TEXT || ty == Type::VARCHAR || ty == Type::BPCHAR || ty == Type::NAME {
        row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
    } else {
        return Err(DbError::Parse(format!(
            "unsupported PostgreSQL column type {ty} at index {idx}"
        )));
    };

    Ok(value.unwrap_or(Value::Null))
}

impl DbExecutor for MayPostgresExecutor {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let start = Instant::now();
        if params.is_empty() {
            // Simple-query protocol: DDL, `DO` blocks and multi-statement bodies.
            self.client.batch_execute(sql)?;
            log::trace!("postgres batch took {:?}", start.elapsed());
            return Ok(0);
        }
        let bound = bind_params(params);
        let result = self.client.execute(sql, &bound).map_err(DbError::from);
        log::trace!("postgres execute took {:?}", start.elapsed());
        result
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let start = Instant::now();
        let bound = bind_params(params);
        let rows = self.client.query(sql, &bound)?;
        log::trace!("postgres query took {:?}", start.elapsed());

        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|idx| column_value(row, idx))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Row::new)
            })
            .collect()
    }
}
