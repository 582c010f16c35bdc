//! Tracking table management

use super::error::MigrationError;
use super::record::MigrationRecord;
use crate::dialect::Dialect;
use crate::executor::{DbError, DbExecutor, Value};
use std::sync::Arc;

/// Default name of the tracking table
pub const DEFAULT_TABLE: &str = "migrations";

/// Reads and writes the tracking table
///
/// The table has two columns: `id` (text primary key) and `applied_at`
/// (timestamp). It is created with `CREATE TABLE IF NOT EXISTS` whenever the
/// records are read, so a fresh database needs no setup.
#[derive(Clone)]
pub struct RecordStore {
    dialect: Arc<dyn Dialect>,
    schema: Option<String>,
    table: String,
}

impl RecordStore {
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            schema: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Qualify the table with a schema. The schema must already exist.
    #[must_use]
    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema.filter(|s| !s.is_empty());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Quoted, optionally schema-qualified table name
    pub fn quoted_table(&self) -> String {
        self.dialect.quoted_table(self.schema.as_deref(), &self.table)
    }

    /// DDL for the tracking table
    pub fn create_table_sql(&self) -> String {
        let d = self.dialect.as_ref();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} {} NOT NULL PRIMARY KEY, {} {} NOT NULL){}",
            self.quoted_table(),
            d.quote_identifier("id"),
            d.text_key_type(),
            d.quote_identifier("applied_at"),
            d.timestamp_type(),
            d.create_table_suffix(),
        )
    }

    /// Create the tracking table if it does not exist
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Store` if the DDL fails.
    pub fn ensure_table(&self, db: &dyn DbExecutor) -> Result<(), MigrationError> {
        db.execute(&self.create_table_sql(), &[])
            .map_err(MigrationError::Store)?;
        Ok(())
    }

    /// All applied migrations, ascending by id
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Store` if the table cannot be created or read.
    pub fn get_migration_records(
        &self,
        db: &dyn DbExecutor,
    ) -> Result<Vec<MigrationRecord>, MigrationError> {
        self.ensure_table(db)?;

        let d = self.dialect.as_ref();
        let sql = format!(
            "SELECT {}, {} FROM {} ORDER BY {} ASC",
            d.quote_identifier("id"),
            d.quote_identifier("applied_at"),
            self.quoted_table(),
            d.quote_identifier("id"),
        );

        let rows = db.query(&sql, &[]).map_err(MigrationError::Store)?;
        let mut records = rows
            .iter()
            .map(MigrationRecord::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(MigrationError::Store)?;

        // Database collation may disagree with byte order; the planner relies on the latter.
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// Insert a record
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the insert fails (for example on a duplicate id).
    pub fn insert(&self, db: &dyn DbExecutor, record: &MigrationRecord) -> Result<(), DbError> {
        let d = self.dialect.as_ref();
        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            self.quoted_table(),
            d.quote_identifier("id"),
            d.quote_identifier("applied_at"),
            d.bind_var(1),
            d.bind_var(2),
        );
        db.execute(
            &sql,
            &[Value::from(record.id.as_str()), Value::from(record.applied_at)],
        )?;
        Ok(())
    }

    /// Delete the record for `id`
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the delete fails.
    pub fn delete(&self, db: &dyn DbExecutor, id: &str) -> Result<(), DbError> {
        let d = self.dialect.as_ref();
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.quoted_table(),
            d.quote_identifier("id"),
            d.bind_var(1),
        );
        db.execute(&sql, &[Value::from(id)])?;
        Ok(())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("dialect", &self.dialect.name())
            .field("schema", &self.schema)
            .field("table", &self.table)
            .finish()
    }
}
