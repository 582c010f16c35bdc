//! `MigrationRecord` - Represents rows of the tracking table

use crate::executor::{DbError, Row};
use chrono::{DateTime, Utc};

/// One applied migration, as stored in the tracking table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Id of the applied migration (file name without `.sql`)
    pub id: String,

    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
}

impl MigrationRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, applied_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            applied_at,
        }
    }

    /// Record for `id` stamped with the current time
    #[must_use]
    pub fn now(id: impl Into<String>) -> Self {
        Self::new(id, Utc::now())
    }

    /// Create a `MigrationRecord` from a database row
    ///
    /// Expected column order: `id`, `applied_at`
    ///
    /// # Errors
    ///
    /// Returns `DbError::Parse` if a column is missing or the timestamp cannot
    /// be parsed.
    pub fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.text(0)?,
            applied_at: row.timestamp(1)?,
        })
    }
}
