//! Redo: revert the newest applied migration and apply it again

use super::error::MigrationError;
use super::migration::{Direction, PlannedMigration};
use super::migrator::{Migrator, RunMode};
use super::planner::plan_migrations;
use super::report::{print_planned, report_drift, Reporter};
use crate::executor::DbExecutor;

/// Result of [`Migrator::redo`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedoOutcome {
    /// No applied migration with a file to revert
    NothingToDo,
    /// Dry run: the statements for this id were printed, nothing ran
    DryRun(String),
    /// The migration was reverted and applied again
    Reapplied(String),
}

impl Migrator {
    /// Revert the newest applied migration, then apply that same migration
    ///
    /// Down and Up run in two separate transactions. The Up step targets the
    /// id that was reverted, not whichever migration is next pending.
    ///
    /// # Errors
    ///
    /// `MigrationError::RedoDown` if planning or the revert failed (nothing
    /// changed). `MigrationError::RedoUp` if the revert committed but the
    /// re-apply failed, leaving the migration unapplied.
    pub fn redo(
        &self,
        db: &dyn DbExecutor,
        dry_run: bool,
        reporter: &dyn Reporter,
    ) -> Result<RedoOutcome, MigrationError> {
        let result = self.redo_inner(db, dry_run, reporter);
        match &result {
            Ok(RedoOutcome::NothingToDo) => reporter.output("Nothing to do!"),
            Ok(RedoOutcome::Reapplied(id)) => {
                reporter.output(&format!("Reapplied migration {id}."));
            }
            Ok(RedoOutcome::DryRun(_)) => {}
            Err(e) => reporter.error(&e.to_string()),
        }
        result
    }

    fn redo_inner(
        &self,
        db: &dyn DbExecutor,
        dry_run: bool,
        reporter: &dyn Reporter,
    ) -> Result<RedoOutcome, MigrationError> {
        let redo_down = |e| MigrationError::RedoDown(Box::new(e));

        let migrations = self.find_migrations().map_err(redo_down)?;
        let records = self.records(db).map_err(redo_down)?;
        let plan = plan_migrations(&migrations, &records, Direction::Down, 1);
        report_drift(reporter, &plan.drift);

        let Some(down) = plan.migrations.first() else {
            return Ok(RedoOutcome::NothingToDo);
        };
        let Some(migration) = migrations.iter().find(|m| m.id == down.id) else {
            return Ok(RedoOutcome::NothingToDo);
        };
        let up = PlannedMigration::from_migration(migration, Direction::Up);

        if dry_run {
            print_planned(reporter, down);
            print_planned(reporter, &up);
            return Ok(RedoOutcome::DryRun(down.id.clone()));
        }

        self.execute_plan(db, std::slice::from_ref(down), RunMode::Execute)
            .map_err(redo_down)?;

        self.execute_plan(db, std::slice::from_ref(&up), RunMode::Execute)
            .map_err(|e| MigrationError::RedoUp {
                id: up.id.clone(),
                source: Box::new(e),
            })?;

        log::info!("Reapplied migration {}", up.id);
        Ok(RedoOutcome::Reapplied(up.id))
    }
}
