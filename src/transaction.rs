//! Transaction Module
//!
//! A migration's statements and its record-store mutation run inside one
//! [`Transaction`]. Transactions are issued as plain `BEGIN`/`COMMIT`/
//! `ROLLBACK` statements (spelled per [`Dialect`]) over any [`DbExecutor`], so
//! every backend gets the same behavior without driver-specific transaction
//! handles.

use crate::dialect::Dialect;
use crate::executor::{DbError, DbExecutor, Row, Value};

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Transaction error type
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] DbError),
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] DbError),
    #[error("failed to roll back transaction: {0}")]
    Rollback(#[source] DbError),
    /// Transaction already committed or rolled back
    #[error("Transaction has already been committed or rolled back")]
    Closed,
}

/// A database transaction scoped to one migration
///
/// Dropping an open transaction rolls it back.
///
/// # Examples
///
/// ```no_run
/// use tidemark::dialect::SqliteDialect;
/// use tidemark::executor::{DbExecutor, SqliteExecutor};
/// use tidemark::transaction::Transaction;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = SqliteExecutor::open_in_memory()?;
/// let tx = Transaction::begin(&db, &SqliteDialect)?;
/// tx.execute("CREATE TABLE users (id INTEGER PRIMARY KEY);", &[])?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'a> {
    executor: &'a dyn DbExecutor,
    dialect: &'a dyn Dialect,
    closed: bool,
}

impl<'a> Transaction<'a> {
    /// Start a new transaction on `executor`
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Begin` if the `BEGIN` statement fails.
    pub fn begin(
        executor: &'a dyn DbExecutor,
        dialect: &'a dyn Dialect,
    ) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        executor
            .execute(dialect.begin_transaction(), &[])
            .map_err(TransactionError::Begin)?;

        Ok(Self {
            executor,
            dialect,
            closed: false,
        })
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Commit` if the `COMMIT` statement fails. The
    /// transaction is then rolled back when dropped.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::Closed);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        self.executor
            .execute(self.dialect.commit_transaction(), &[])
            .map_err(TransactionError::Commit)?;

        self.closed = true;
        Ok(())
    }

    /// Roll back the transaction
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Rollback` if the `ROLLBACK` statement fails.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::Closed);
        }
        self.closed = true;

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        self.executor
            .execute(self.dialect.rollback_transaction(), &[])
            .map_err(TransactionError::Rollback)?;

        Ok(())
    }

    /// Check if the transaction is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self
            .executor
            .execute(self.dialect.rollback_transaction(), &[])
        {
            log::warn!("Rollback of abandoned transaction failed: {e}");
        }
    }
}

impl DbExecutor for Transaction<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.query(sql, params)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::executor::SqliteExecutor;

    fn count(db: &SqliteExecutor) -> i64 {
        let rows = db.query("SELECT COUNT(*) FROM t", &[]).unwrap();
        match rows[0].get(0) {
            Some(Value::Integer(n)) => *n,
            other => panic!("unexpected count: {other:?}"),
        }
    }

    fn setup() -> SqliteExecutor {
        let db = SqliteExecutor::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER);", &[]).unwrap();
        db
    }

    #[test]
    fn test_commit_persists() {
        let db = setup();
        let tx = Transaction::begin(&db, &SqliteDialect).unwrap();
        tx.execute("INSERT INTO t VALUES (1);", &[]).unwrap();
        tx.commit().unwrap();
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn test_rollback_discards() {
        let db = setup();
        let tx = Transaction::begin(&db, &SqliteDialect).unwrap();
        tx.execute("INSERT INTO t VALUES (1);", &[]).unwrap();
        tx.rollback().unwrap();
        assert_eq!(count(&db), 0);
    }

    #[test]
    fn test_drop_rolls_back() {
        let db = setup();
        {
            let tx = Transaction::begin(&db, &SqliteDialect).unwrap();
            tx.execute("INSERT INTO t VALUES (1);", &[]).unwrap();
            assert!(!tx.is_closed());
        }
        assert_eq!(count(&db), 0);
    }

    #[test]
    fn test_transaction_error_display() {
        let err = TransactionError::Closed;
        assert!(err
            .to_string()
            .contains("Transaction has already been committed"));

        let err = TransactionError::Begin(DbError::Other("boom".to_string()));
        assert!(err.to_string().contains("failed to begin transaction"));
    }
}
