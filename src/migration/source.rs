//! Migration sources
//!
//! A [`MigrationSource`] enumerates `*.sql` files and parses each with
//! [`parse_migration`]. The filesystem and embedded backings differ only in
//! how they list files; ordering and duplicate detection are shared.

use super::error::MigrationError;
use super::migration::Migration;
use super::parser::parse_migration;
use include_dir::Dir;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

static CONVENTIONAL_ID: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\d{14}-[A-Za-z0-9_\-]+$").ok());

/// Anything that can enumerate migrations
pub trait MigrationSource: Send + Sync {
    /// Load and parse every migration, sorted ascending by id
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Source` for unreadable files or directories,
    /// `MigrationError::Parse` for malformed files, and
    /// `MigrationError::DuplicateId` if two files share an id.
    fn find_migrations(&self) -> Result<Vec<Migration>, MigrationError>;
}

impl<T: MigrationSource + ?Sized> MigrationSource for Box<T> {
    fn find_migrations(&self) -> Result<Vec<Migration>, MigrationError> {
        (**self).find_migrations()
    }
}

/// Migration id for `file_name`, or `None` if it is not a `.sql` file
fn migration_id(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(".sql")
        .filter(|stem| !stem.is_empty())
}

/// Parse every `(id, content)` pair, then sort and reject duplicate ids
fn collect<I>(files: I) -> Result<Vec<Migration>, MigrationError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut migrations = files
        .into_iter()
        .map(|(id, content)| {
            let conventional = CONVENTIONAL_ID
                .as_ref()
                .map_or(true, |re| re.is_match(&id));
            if !conventional {
                log::warn!(
                    "Migration id '{id}' does not follow the YYYYMMDDHHMMSS-<name> convention"
                );
            }
            parse_migration(&id, &content)
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Plain byte-wise order: fixed-width timestamp prefixes sort chronologically.
    migrations.sort_by(|a, b| a.id.cmp(&b.id));

    if let Some(pair) = migrations.windows(2).find(|pair| pair[0].id == pair[1].id) {
        return Err(MigrationError::DuplicateId(pair[0].id.clone()));
    }

    Ok(migrations)
}

/// Migrations read from a directory on disk (non-recursive)
#[derive(Debug, Clone)]
pub struct FileMigrationSource {
    dir: PathBuf,
}

impl FileMigrationSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationSource for FileMigrationSource {
    fn find_migrations(&self) -> Result<Vec<Migration>, MigrationError> {
        let display = self.dir.display().to_string();

        if !self.dir.is_dir() {
            return Err(MigrationError::unreadable(
                display,
                "path does not exist or is not a directory",
            ));
        }

        let entries =
            fs::read_dir(&self.dir).map_err(|e| MigrationError::unreadable(&display, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::unreadable(&display, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                log::warn!("Skipping migration file with non UTF-8 name: {}", path.display());
                continue;
            };
            let Some(id) = migration_id(file_name) else {
                continue;
            };

            let content = fs::read_to_string(&path)
                .map_err(|e| MigrationError::unreadable(path.display().to_string(), e))?;
            files.push((id.to_string(), content));
        }

        log::debug!("Found {} migration file(s) in {}", files.len(), display);
        collect(files)
    }
}

/// Migrations compiled into the binary with `include_dir!`
///
/// ```rust,ignore
/// use include_dir::{include_dir, Dir};
/// use tidemark::migration::{EmbeddedMigrationSource, MigrationSource};
///
/// static MIGRATIONS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/migrations");
///
/// let source = EmbeddedMigrationSource::new(&MIGRATIONS);
/// let migrations = source.find_migrations().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedMigrationSource {
    dir: &'static Dir<'static>,
    root: Option<String>,
}

impl EmbeddedMigrationSource {
    pub fn new(dir: &'static Dir<'static>) -> Self {
        Self { dir, root: None }
    }

    /// Read migrations from a sub-directory of the embedded tree
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        let root = root.trim_matches('/').trim_start_matches("./").to_string();
        self.root = if root.is_empty() || root == "." {
            None
        } else {
            Some(root)
        };
        self
    }
}

impl MigrationSource for EmbeddedMigrationSource {
    fn find_migrations(&self) -> Result<Vec<Migration>, MigrationError> {
        let dir = match &self.root {
            Some(root) => self.dir.get_dir(root).ok_or_else(|| {
                MigrationError::unreadable(root.as_str(), "directory not found in embedded tree")
            })?,
            None => self.dir,
        };

        let mut files = Vec::new();
        for file in dir.files() {
            let Some(id) = file
                .path()
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(migration_id)
            else {
                continue;
            };

            let content = file.contents_utf8().ok_or_else(|| {
                MigrationError::unreadable(file.path().display().to_string(), "not valid UTF-8")
            })?;
            files.push((id.to_string(), content.to_string()));
        }

        collect(files)
    }
}

/// Where migrations come from
#[derive(Debug, Clone)]
pub enum SourceConfig {
    Directory(PathBuf),
    Embedded {
        dir: &'static Dir<'static>,
        root: Option<String>,
    },
}

impl SourceConfig {
    /// Build the configured source
    pub fn build(&self) -> Box<dyn MigrationSource> {
        match self {
            SourceConfig::Directory(path) => Box::new(FileMigrationSource::new(path)),
            SourceConfig::Embedded { dir, root } => {
                let source = EmbeddedMigrationSource::new(*dir);
                Box::new(match root {
                    Some(root) => source.with_root(root.clone()),
                    None => source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_migration_id() {
        assert_eq!(migration_id("20240101000000-a.sql"), Some("20240101000000-a"));
        assert_eq!(migration_id("README.md"), None);
        assert_eq!(migration_id(".sql"), None);
    }

    #[test]
    fn test_file_source_sorts_and_filters() {
        let dir = TempDir::new().unwrap();
        write(&dir, "20240102000000-b.sql", "-- +migrate Up\nSELECT 2;\n");
        write(&dir, "20240101000000-a.sql", "-- +migrate Up\nSELECT 1;\n");
        write(&dir, "notes.txt", "not a migration");
        fs::create_dir(dir.path().join("20240103000000-nested.sql")).unwrap();

        let migrations = FileMigrationSource::new(dir.path()).find_migrations().unwrap();
        let ids: Vec<_> = migrations.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["20240101000000-a", "20240102000000-b"]);
    }

    #[test]
    fn test_file_source_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = FileMigrationSource::new(&missing).find_migrations().unwrap_err();
        assert!(matches!(err, MigrationError::Source { .. }));
    }

    #[test]
    fn test_file_source_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        write(&dir, "20240101000000-bad.sql", "SELECT 1;\n");
        let err = FileMigrationSource::new(dir.path()).find_migrations().unwrap_err();
        match err {
            MigrationError::Parse { id, .. } => assert_eq!(id, "20240101000000-bad"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let files = vec![
            ("20240101000000-a".to_string(), "-- +migrate Up\n".to_string()),
            ("20240101000000-a".to_string(), "-- +migrate Up\n".to_string()),
        ];
        let err = collect(files).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateId(id) if id == "20240101000000-a"));
    }

    #[test]
    fn test_empty_directory_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let migrations = FileMigrationSource::new(dir.path()).find_migrations().unwrap();
        assert!(migrations.is_empty());
    }
}
