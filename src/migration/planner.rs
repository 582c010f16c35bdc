//! Migration planning
//!
//! [`plan_migrations`] is a pure function of the loaded migrations and the
//! applied records; `Migrator::plan` feeds it from the database.

use super::migration::{Direction, Migration, PlannedMigration};
use super::record::MigrationRecord;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Mismatch between the tracking table and the migration files
///
/// Never fatal. Drift is returned with the plan, reported once per run and
/// shown by `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftWarning {
    /// A record exists but no migration file has its id
    MissingFile {
        id: String,
        applied_at: DateTime<Utc>,
    },
    /// A planned Down migration has no Down statements
    EmptyDown { id: String },
}

impl DriftWarning {
    pub fn id(&self) -> &str {
        match self {
            DriftWarning::MissingFile { id, .. } | DriftWarning::EmptyDown { id } => id,
        }
    }
}

impl fmt::Display for DriftWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftWarning::MissingFile { id, .. } => {
                write!(f, "Could not find migration file: {id}")
            }
            DriftWarning::EmptyDown { id } => write!(
                f,
                "Migration {id} has no Down statements; reverting it only removes its record"
            ),
        }
    }
}

/// Ordered, limit-bounded work for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub direction: Direction,
    pub migrations: Vec<PlannedMigration>,
    pub drift: Vec<DriftWarning>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Records whose id matches no migration, in record order
pub fn missing_files(migrations: &[Migration], records: &[MigrationRecord]) -> Vec<DriftWarning> {
    let known: HashSet<&str> = migrations.iter().map(|m| m.id.as_str()).collect();
    records
        .iter()
        .filter(|r| !known.contains(r.id.as_str()))
        .map(|r| DriftWarning::MissingFile {
            id: r.id.clone(),
            applied_at: r.applied_at,
        })
        .collect()
}

/// Compute the migrations to run
///
/// `migrations` must be sorted ascending by id, as every `MigrationSource`
/// returns them. Up selects unapplied migrations in ascending order; Down
/// selects applied migrations that still have a file, in descending order.
/// `limit == 0` means no limit.
pub fn plan_migrations(
    migrations: &[Migration],
    records: &[MigrationRecord],
    direction: Direction,
    limit: usize,
) -> Plan {
    let applied: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let mut drift = missing_files(migrations, records);

    let candidates: Vec<&Migration> = match direction {
        Direction::Up => migrations
            .iter()
            .filter(|m| !applied.contains(m.id.as_str()))
            .collect(),
        Direction::Down => {
            let by_id: HashMap<&str, &Migration> =
                migrations.iter().map(|m| (m.id.as_str(), m)).collect();
            let mut applied_migrations: Vec<&Migration> = records
                .iter()
                .filter_map(|r| by_id.get(r.id.as_str()).copied())
                .collect();
            applied_migrations.sort_by(|a, b| b.id.cmp(&a.id));
            applied_migrations
        }
    };

    let take = if limit == 0 { candidates.len() } else { limit };
    let planned: Vec<PlannedMigration> = candidates
        .into_iter()
        .take(take)
        .map(|m| PlannedMigration::from_migration(m, direction))
        .collect();

    if direction == Direction::Down {
        drift.extend(
            planned
                .iter()
                .filter(|p| p.statements.is_empty())
                .map(|p| DriftWarning::EmptyDown { id: p.id.clone() }),
        );
    }

    Plan {
        direction,
        migrations: planned,
        drift,
    }
}
