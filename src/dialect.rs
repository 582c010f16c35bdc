//! SQL dialect capability sets
//!
//! Everything engine-specific that the record store or the `new` templates
//! need lives behind [`Dialect`]. The planner and the migrator never branch on
//! the engine; adding one means adding an implementation here and a
//! [`DialectKind`] variant.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    Postgres,
    Sqlite,
    MySql,
}

impl DialectKind {
    /// Canonical identifier, as accepted by `FromStr`
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Postgres => "postgresql",
            DialectKind::Sqlite => "sqlite3",
            DialectKind::MySql => "mysql",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognized dialect identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dialect '{0}' (expected one of: postgresql, sqlite3, mysql)")]
pub struct UnknownDialect(pub String);

impl FromStr for DialectKind {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(DialectKind::Postgres),
            "sqlite3" | "sqlite" => Ok(DialectKind::Sqlite),
            "mysql" => Ok(DialectKind::MySql),
            other => Err(UnknownDialect(other.to_string())),
        }
    }
}

/// Per-engine SQL syntax
pub trait Dialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Quote a single identifier (table, column, schema, sequence)
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a table name, optionally qualified by a schema
    fn quoted_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) if !schema.is_empty() => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
            _ => self.quote_identifier(table),
        }
    }

    /// Placeholder for the `index`-th bound parameter (1-based)
    fn bind_var(&self, index: usize) -> String;

    /// Column type for a text primary key
    fn text_key_type(&self) -> &'static str {
        "TEXT"
    }

    /// Column type for a UTC timestamp
    fn timestamp_type(&self) -> &'static str;

    /// Integer primary key column definition, including any auto-increment
    /// clause. `sequence` is only used by engines with sequences.
    fn auto_increment_primary_key(&self, column: &str, sequence: &str) -> String;

    /// Keyword or clause making an integer column auto-increment
    fn auto_increment_clause(&self) -> &'static str;

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "true"
        } else {
            "false"
        }
    }

    /// Appended after the closing parenthesis of `CREATE TABLE`
    fn create_table_suffix(&self) -> String {
        String::new()
    }

    fn supports_sequences(&self) -> bool {
        false
    }

    fn create_sequence(&self, _name: &str) -> Option<String> {
        None
    }

    fn drop_sequence(&self, _name: &str) -> Option<String> {
        None
    }

    fn begin_transaction(&self) -> &'static str {
        "BEGIN"
    }

    fn commit_transaction(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_transaction(&self) -> &'static str {
        "ROLLBACK"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn bind_var(&self, index: usize) -> String {
        format!("${index}")
    }

    fn timestamp_type(&self) -> &'static str {
        "TIMESTAMP WITH TIME ZONE"
    }

    fn auto_increment_primary_key(&self, column: &str, sequence: &str) -> String {
        format!(
            "{} BIGINT NOT NULL DEFAULT nextval('{}'::regclass) PRIMARY KEY",
            self.quote_identifier(column),
            sequence.replace('\'', "''")
        )
    }

    fn auto_increment_clause(&self) -> &'static str {
        ""
    }

    fn supports_sequences(&self) -> bool {
        true
    }

    fn create_sequence(&self, name: &str) -> Option<String> {
        Some(format!(
            "CREATE SEQUENCE IF NOT EXISTS {};",
            self.quote_identifier(name)
        ))
    }

    fn drop_sequence(&self, name: &str) -> Option<String> {
        Some(format!("DROP SEQUENCE IF EXISTS {};", self.quote_identifier(name)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn bind_var(&self, index: usize) -> String {
        format!("?{index}")
    }

    fn timestamp_type(&self) -> &'static str {
        "TIMESTAMP"
    }

    fn auto_increment_primary_key(&self, column: &str, _sequence: &str) -> String {
        format!(
            "{} INTEGER PRIMARY KEY {}",
            self.quote_identifier(column),
            self.auto_increment_clause()
        )
    }

    fn auto_increment_clause(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }
}

#[derive(Debug, Clone)]
pub struct MySqlDialect {
    pub engine: String,
    pub encoding: String,
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self {
            engine: "InnoDB".to_string(),
            encoding: "utf8mb4".to_string(),
        }
    }
}

impl Dialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn bind_var(&self, _index: usize) -> String {
        "?".to_string()
    }

    // TEXT cannot be a primary key without a prefix length.
    fn text_key_type(&self) -> &'static str {
        "VARCHAR(255)"
    }

    fn timestamp_type(&self) -> &'static str {
        "DATETIME(6)"
    }

    fn auto_increment_primary_key(&self, column: &str, _sequence: &str) -> String {
        format!(
            "{} BIGINT {} PRIMARY KEY",
            self.quote_identifier(column),
            self.auto_increment_clause()
        )
    }

    fn auto_increment_clause(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn create_table_suffix(&self) -> String {
        format!(" ENGINE={} DEFAULT CHARSET={}", self.engine, self.encoding)
    }

    fn begin_transaction(&self) -> &'static str {
        "START TRANSACTION"
    }
}

/// Capability set for `kind`
pub fn dialect_for(kind: DialectKind) -> Arc<dyn Dialect> {
    match kind {
        DialectKind::Postgres => Arc::new(PostgresDialect),
        DialectKind::Sqlite => Arc::new(SqliteDialect),
        DialectKind::MySql => Arc::new(MySqlDialect::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_kind_from_str() {
        assert_eq!("postgresql".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert_eq!("Postgres".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert_eq!("sqlite3".parse::<DialectKind>().unwrap(), DialectKind::Sqlite);
        assert_eq!("sqlite".parse::<DialectKind>().unwrap(), DialectKind::Sqlite);
        assert_eq!("mysql".parse::<DialectKind>().unwrap(), DialectKind::MySql);

        let err = "oracle".parse::<DialectKind>().unwrap_err();
        assert!(err.to_string().contains("unknown dialect 'oracle'"));
    }

    #[test]
    fn test_dialect_kind_round_trips_through_as_str() {
        for kind in [DialectKind::Postgres, DialectKind::Sqlite, DialectKind::MySql] {
            assert_eq!(kind.as_str().parse::<DialectKind>().unwrap(), kind);
            assert_eq!(dialect_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_quoting() {
        assert_eq!(PostgresDialect.quote_identifier("migrations"), "\"migrations\"");
        assert_eq!(PostgresDialect.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(
            PostgresDialect.quoted_table(Some("ops"), "migrations"),
            "\"ops\".\"migrations\""
        );
        assert_eq!(SqliteDialect.quoted_table(None, "migrations"), "\"migrations\"");
        assert_eq!(
            MySqlDialect::default().quoted_table(Some("ops"), "migrations"),
            "`ops`.`migrations`"
        );
    }

    #[test]
    fn test_bind_vars() {
        assert_eq!(PostgresDialect.bind_var(2), "$2");
        assert_eq!(SqliteDialect.bind_var(2), "?2");
        assert_eq!(MySqlDialect::default().bind_var(2), "?");
    }

    #[test]
    fn test_sequences_only_on_postgres() {
        assert!(PostgresDialect.supports_sequences());
        assert_eq!(
            PostgresDialect.create_sequence("users_id_seq").unwrap(),
            "CREATE SEQUENCE IF NOT EXISTS \"users_id_seq\";"
        );
        assert!(SqliteDialect.create_sequence("users_id_seq").is_none());
        assert!(MySqlDialect::default().drop_sequence("users_id_seq").is_none());
    }

    #[test]
    fn test_auto_increment_and_literals() {
        assert_eq!(
            SqliteDialect.auto_increment_primary_key("id", "unused"),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );
        assert_eq!(
            MySqlDialect::default().auto_increment_primary_key("id", "unused"),
            "`id` BIGINT AUTO_INCREMENT PRIMARY KEY"
        );
        assert!(PostgresDialect
            .auto_increment_primary_key("id", "users_id_seq")
            .contains("nextval('users_id_seq'::regclass)"));
        assert_eq!(SqliteDialect.bool_literal(false), "0");
        assert_eq!(PostgresDialect.bool_literal(true), "true");
        assert_eq!(MySqlDialect::default().begin_transaction(), "START TRANSACTION");
        assert_eq!(
            MySqlDialect::default().create_table_suffix(),
            " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );
        assert!(PostgresDialect.create_table_suffix().is_empty());
    }
}
