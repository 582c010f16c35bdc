//! `tidemark new <name>`: create a timestamped migration file
//!
//! Names following a few conventions get a pre-filled body:
//!
//! | name                       | Up                          |
//! |----------------------------|-----------------------------|
//! | `create_<t>_table`         | `CREATE TABLE <t>` (+ sequence where supported) |
//! | `drop_<t>_table`           | `DROP TABLE <t>`            |
//! | `add_<f>_in_<t>_table`     | `ALTER TABLE <t> ADD COLUMN <f>` |
//! | `remove_<f>_from_<t>_table`| `ALTER TABLE <t> DROP COLUMN <f>` |
//! | `rename_<a>_in_<b>_table`  | `ALTER TABLE <a> RENAME TO <b>` |
//! | `alter_<f>_in_<t>_table`, `change_<f>_in_<t>_table` | column type change |
//!
//! Down is the inverse. Any other name gets empty sections.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tidemark::dialect::{Dialect, DialectKind};

static VALID_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").ok());

/// Column type used for generated `ADD COLUMN` / `ALTER COLUMN`
const DEFAULT_COLUMN_TYPE: &str = "VARCHAR(200)";

#[derive(Debug, thiserror::Error)]
pub enum NewMigrationError {
    #[error("A name for the migration is needed")]
    MissingName,
    #[error("Invalid migration name '{0}': use letters, digits, '_' and '-'")]
    InvalidName(String),
    #[error("Migration file already exists: {}", .0.display())]
    Exists(PathBuf),
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Up and Down bodies of a new migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub up: String,
    pub down: String,
}

impl Template {
    /// File content with both markers
    pub fn render(&self) -> String {
        format!(
            "\n-- +migrate Up\n{}\n\n-- +migrate Down\n{}\n",
            self.up, self.down
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Shape {
    CreateTable(String),
    DropTable(String),
    AddColumn { field: String, table: String },
    RemoveColumn { field: String, table: String },
    RenameTable { from: String, to: String },
    AlterColumn { field: String, table: String },
    Blank,
}

/// Split `<verb>_<left>_<sep>_<right>_table` around the first `sep`
fn split_on(body: &[&str], sep: &str) -> Option<(String, String)> {
    let at = body.iter().position(|part| *part == sep)?;
    let left = body[..at].join("_");
    let right = body[at + 1..].join("_");
    if left.is_empty() || right.is_empty() {
        None
    } else {
        Some((left, right))
    }
}

fn shape(name: &str) -> Shape {
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() < 3 || parts.last() != Some(&"table") {
        return Shape::Blank;
    }
    let body = &parts[1..parts.len() - 1];
    let whole = body.join("_");

    let shaped = match parts[0] {
        "create" if !whole.is_empty() => Some(Shape::CreateTable(whole)),
        "drop" if !whole.is_empty() => Some(Shape::DropTable(whole)),
        "add" => split_on(body, "in").map(|(field, table)| Shape::AddColumn { field, table }),
        "remove" => {
            split_on(body, "from").map(|(field, table)| Shape::RemoveColumn { field, table })
        }
        "rename" => split_on(body, "in").map(|(from, to)| Shape::RenameTable { from, to }),
        "alter" | "change" => {
            split_on(body, "in").map(|(field, table)| Shape::AlterColumn { field, table })
        }
        _ => None,
    };
    shaped.unwrap_or(Shape::Blank)
}

fn create_table(d: &dyn Dialect, table: &str) -> String {
    let sequence = format!("{table}_id_seq");
    let ts = d.timestamp_type();
    let mut sql = String::new();
    if let Some(create) = d.create_sequence(&sequence) {
        sql.push_str(&create);
        sql.push('\n');
    }
    sql.push_str(&format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {},\n    {} BOOLEAN DEFAULT {},\n    {} {ts},\n    {} {ts},\n    {} {ts}\n){};",
        d.quote_identifier(table),
        d.auto_increment_primary_key("id", &sequence),
        d.quote_identifier("is_active"),
        d.bool_literal(false),
        d.quote_identifier("created_at"),
        d.quote_identifier("updated_at"),
        d.quote_identifier("deleted_at"),
        d.create_table_suffix(),
    ));
    sql
}

fn drop_table(d: &dyn Dialect, table: &str) -> String {
    // The table's default depends on the sequence, so the table goes first.
    let mut sql = format!("DROP TABLE IF EXISTS {};", d.quote_identifier(table));
    if let Some(drop) = d.drop_sequence(&format!("{table}_id_seq")) {
        sql.push('\n');
        sql.push_str(&drop);
    }
    sql
}

fn add_column(d: &dyn Dialect, table: &str, field: &str) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {DEFAULT_COLUMN_TYPE};",
        d.quote_identifier(table),
        d.quote_identifier(field)
    )
}

fn drop_column(d: &dyn Dialect, table: &str, field: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {};",
        d.quote_identifier(table),
        d.quote_identifier(field)
    )
}

fn rename_table(d: &dyn Dialect, from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {};",
        d.quote_identifier(from),
        d.quote_identifier(to)
    )
}

/// `None` for SQLite, which cannot change a column's type in place
fn alter_column(d: &dyn Dialect, table: &str, field: &str) -> Option<String> {
    let table = d.quote_identifier(table);
    let field = d.quote_identifier(field);
    match d.kind() {
        DialectKind::Postgres => Some(format!(
            "ALTER TABLE {table} ALTER COLUMN {field} TYPE {DEFAULT_COLUMN_TYPE};"
        )),
        DialectKind::MySql => Some(format!(
            "ALTER TABLE {table} MODIFY COLUMN {field} {DEFAULT_COLUMN_TYPE};"
        )),
        DialectKind::Sqlite => None,
    }
}

/// Pre-filled bodies for `name` (already lower-cased)
pub fn template_for(name: &str, dialect: &dyn Dialect) -> Template {
    let d = dialect;
    match shape(name) {
        Shape::CreateTable(table) => Template {
            up: create_table(d, &table),
            down: drop_table(d, &table),
        },
        Shape::DropTable(table) => Template {
            up: drop_table(d, &table),
            down: create_table(d, &table),
        },
        Shape::AddColumn { field, table } => Template {
            up: add_column(d, &table, &field),
            down: drop_column(d, &table, &field),
        },
        Shape::RemoveColumn { field, table } => Template {
            up: drop_column(d, &table, &field),
            down: add_column(d, &table, &field),
        },
        Shape::RenameTable { from, to } => Template {
            up: rename_table(d, &from, &to),
            down: rename_table(d, &to, &from),
        },
        Shape::AlterColumn { field, table } => match alter_column(d, &table, &field) {
            Some(sql) => Template {
                up: sql.clone(),
                down: sql,
            },
            None => Template::default(),
        },
        Shape::Blank => Template::default(),
    }
}

/// Write `<dir>/<YYYYMMDDHHMMSS>-<name>.sql` and return its path
///
/// `name` is trimmed and lower-cased. `dir` is created if missing; an
/// existing file is never overwritten.
///
/// # Errors
///
/// Returns `NewMigrationError` for an empty or invalid name, an existing file,
/// or an I/O failure.
pub fn create_migration(
    dir: &Path,
    name: &str,
    dialect: &dyn Dialect,
    now: DateTime<Utc>,
) -> Result<PathBuf, NewMigrationError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(NewMigrationError::MissingName);
    }
    let valid = VALID_NAME.as_ref().map_or(true, |re| re.is_match(&name));
    if !valid {
        return Err(NewMigrationError::InvalidName(name));
    }

    fs::create_dir_all(dir).map_err(|source| NewMigrationError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(format!("{}-{name}.sql", now.format("%Y%m%d%H%M%S")));
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|source| match source.kind() {
            io::ErrorKind::AlreadyExists => NewMigrationError::Exists(path.clone()),
            _ => NewMigrationError::Io {
                path: path.clone(),
                source,
            },
        })?;

    file.write_all(template_for(&name, dialect).render().as_bytes())
        .map_err(|source| NewMigrationError::Io {
            path: path.clone(),
            source,
        })?;

    log::debug!("Wrote migration template {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark::dialect::{MySqlDialect, PostgresDialect, SqliteDialect};
    use tidemark::migration::parse_migration;

    #[test]
    fn test_shape_detection() {
        assert_eq!(shape("create_users_table"), Shape::CreateTable("users".into()));
        assert_eq!(
            shape("create_user_roles_table"),
            Shape::CreateTable("user_roles".into())
        );
        assert_eq!(shape("drop_users_table"), Shape::DropTable("users".into()));
        assert_eq!(
            shape("add_last_name_in_users_table"),
            Shape::AddColumn {
                field: "last_name".into(),
                table: "users".into()
            }
        );
        assert_eq!(
            shape("remove_email_from_users_table"),
            Shape::RemoveColumn {
                field: "email".into(),
                table: "users".into()
            }
        );
        assert_eq!(
            shape("rename_users_in_accounts_table"),
            Shape::RenameTable {
                from: "users".into(),
                to: "accounts".into()
            }
        );
        assert_eq!(
            shape("change_email_in_users_table"),
            Shape::AlterColumn {
                field: "email".into(),
                table: "users".into()
            }
        );
    }

    #[test]
    fn test_unrecognized_names_are_blank() {
        for name in [
            "seed_data",
            "table",
            "create_table",
            "add_email_users_table",
            "add_in_users_table",
            "truncate_users_table",
        ] {
            assert_eq!(shape(name), Shape::Blank, "name: {name}");
        }
        assert_eq!(template_for("seed_data", &PostgresDialect), Template::default());
    }

    #[test]
    fn test_create_table_postgres_uses_sequence() {
        let t = template_for("create_users_table", &PostgresDialect);
        assert!(t.up.starts_with("CREATE SEQUENCE IF NOT EXISTS \"users_id_seq\";\n"));
        assert!(t.up.contains("CREATE TABLE IF NOT EXISTS \"users\" ("));
        assert!(t.up.contains("nextval('users_id_seq'::regclass)"));
        assert!(t.up.contains("\"deleted_at\" TIMESTAMP WITH TIME ZONE"));
        assert_eq!(
            t.down,
            "DROP TABLE IF EXISTS \"users\";\nDROP SEQUENCE IF EXISTS \"users_id_seq\";"
        );
    }

    #[test]
    fn test_create_table_mysql_and_sqlite() {
        let mysql = template_for("create_users_table", &MySqlDialect::default());
        assert!(mysql.up.starts_with("CREATE TABLE IF NOT EXISTS `users` ("));
        assert!(mysql.up.contains("`id` BIGINT AUTO_INCREMENT PRIMARY KEY"));
        assert!(mysql.up.ends_with(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"));
        assert_eq!(mysql.down, "DROP TABLE IF EXISTS `users`;");

        let sqlite = template_for("create_users_table", &SqliteDialect);
        assert!(sqlite.up.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sqlite.up.contains("\"is_active\" BOOLEAN DEFAULT 0"));
    }

    #[test]
    fn test_drop_is_inverse_of_create() {
        let create = template_for("create_users_table", &PostgresDialect);
        let drop = template_for("drop_users_table", &PostgresDialect);
        assert_eq!(create.up, drop.down);
        assert_eq!(create.down, drop.up);
    }

    #[test]
    fn test_column_templates() {
        let add = template_for("add_email_in_users_table", &SqliteDialect);
        assert_eq!(add.up, "ALTER TABLE \"users\" ADD COLUMN \"email\" VARCHAR(200);");
        assert_eq!(add.down, "ALTER TABLE \"users\" DROP COLUMN \"email\";");

        let remove = template_for("remove_email_from_users_table", &SqliteDialect);
        assert_eq!(remove.up, add.down);
        assert_eq!(remove.down, add.up);

        let rename = template_for("rename_users_in_accounts_table", &PostgresDialect);
        assert_eq!(rename.up, "ALTER TABLE \"users\" RENAME TO \"accounts\";");
        assert_eq!(rename.down, "ALTER TABLE \"accounts\" RENAME TO \"users\";");
    }

    #[test]
    fn test_alter_column_per_dialect() {
        let pg = template_for("alter_email_in_users_table", &PostgresDialect);
        assert_eq!(
            pg.up,
            "ALTER TABLE \"users\" ALTER COLUMN \"email\" TYPE VARCHAR(200);"
        );
        let mysql = template_for("alter_email_in_users_table", &MySqlDialect::default());
        assert_eq!(
            mysql.up,
            "ALTER TABLE `users` MODIFY COLUMN `email` VARCHAR(200);"
        );
        assert_eq!(
            template_for("alter_email_in_users_table", &SqliteDialect),
            Template::default()
        );
    }

    #[test]
    fn test_rendered_templates_parse() {
        for name in ["create_users_table", "add_email_in_users_table", "seed_data"] {
            let content = template_for(name, &PostgresDialect).render();
            let migration = parse_migration("20240101000000-x", &content).unwrap();
            if name == "seed_data" {
                assert!(migration.up.is_empty());
                assert!(migration.down.is_empty());
            } else {
                assert!(!migration.up.is_empty(), "name: {name}");
                assert!(!migration.down.is_empty(), "name: {name}");
            }
        }

        let create = parse_migration(
            "20240101000000-create_users_table",
            &template_for("create_users_table", &PostgresDialect).render(),
        )
        .unwrap();
        assert_eq!(create.up.len(), 2);
        assert_eq!(create.down.len(), 2);
    }
}
