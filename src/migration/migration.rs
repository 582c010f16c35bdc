//! Migration and direction types

use std::fmt;

/// Direction of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply pending migrations, ascending by id
    Up,
    /// Revert applied migrations, descending by id
    Down,
}

impl Direction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed migration file
///
/// Loaded fresh from a [`MigrationSource`](super::MigrationSource) on every
/// invocation; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// File name without the `.sql` extension, e.g. `20240120120000-create_users_table`
    pub id: String,

    /// Statements of the `Up` section, in file order
    pub up: Vec<String>,

    /// Statements of the `Down` section, in file order
    pub down: Vec<String>,
}

impl Migration {
    #[must_use]
    pub fn new(id: impl Into<String>, up: Vec<String>, down: Vec<String>) -> Self {
        Self {
            id: id.into(),
            up,
            down,
        }
    }

    /// Statements for `direction`
    #[must_use]
    pub fn statements(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

/// One planner output entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMigration {
    pub id: String,
    pub direction: Direction,
    pub statements: Vec<String>,
}

impl PlannedMigration {
    #[must_use]
    pub fn from_migration(migration: &Migration, direction: Direction) -> Self {
        Self {
            id: migration.id.clone(),
            direction,
            statements: migration.statements(direction).to_vec(),
        }
    }
}
