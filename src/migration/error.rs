//! Migration-specific error types

use crate::executor::DbError;
use crate::transaction::TransactionError;

/// Migration-specific errors
///
/// `Source`, `Parse`, `DuplicateId` and `Store` are raised before anything is
/// written. `Execution` and the redo variants may follow committed work; the
/// `applied` counts say how much.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Migrations directory or file could not be read
    #[error("Failed to read migrations from {path}: {message}")]
    Source { path: String, message: String },

    /// Malformed migration file
    #[error("Error parsing migration {id}: {message}")]
    Parse { id: String, message: String },

    /// Two migration files map to the same id
    #[error("Duplicate migration id: {0}")]
    DuplicateId(String),

    /// Tracking table could not be created or read
    #[error("Migration record store error: {0}")]
    Store(#[source] DbError),

    /// A statement failed; the migration was rolled back
    #[error(
        "Migration {id} failed at statement {statement_index} ({applied} applied before it): {message}"
    )]
    Execution {
        id: String,
        statement_index: usize,
        applied: usize,
        message: String,
    },

    /// Begin, commit or rollback failed
    #[error("Transaction error in migration {id}: {source}")]
    Transaction {
        id: String,
        applied: usize,
        #[source]
        source: TransactionError,
    },

    /// Record insert/delete failed after the migration's statements ran
    #[error("Failed to record migration {id}: {source}")]
    Record {
        id: String,
        applied: usize,
        #[source]
        source: DbError,
    },

    /// Redo stopped before the migration was reverted
    #[error("Migration (down) failed: {0}")]
    RedoDown(#[source] Box<MigrationError>),

    /// Redo reverted the migration but could not reapply it
    #[error("Migration (up) failed: migration {id} was reverted but not reapplied: {source}")]
    RedoUp {
        id: String,
        #[source]
        source: Box<MigrationError>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Run was cancelled between migrations
    #[error("Cancelled after {applied} migration(s)")]
    Cancelled { applied: usize },
}

impl MigrationError {
    /// Number of migrations committed before this error stopped the run
    ///
    /// Returns 0 for errors raised before any mutation.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        match self {
            MigrationError::Execution { applied, .. }
            | MigrationError::Transaction { applied, .. }
            | MigrationError::Record { applied, .. }
            | MigrationError::Cancelled { applied } => *applied,
            MigrationError::RedoDown(inner) => inner.applied_count(),
            MigrationError::RedoUp { .. } => 1,
            _ => 0,
        }
    }

    pub(crate) fn unreadable(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MigrationError::Source {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
