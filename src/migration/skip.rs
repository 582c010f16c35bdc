//! Skip: mark migrations as applied without running them

use super::error::MigrationError;
use super::migration::Direction;
use super::migrator::{Migrator, RunMode};
use super::report::{count_message, report_drift, LogReporter, Reporter};
use crate::executor::DbExecutor;

impl Migrator {
    /// Record up to `limit` planned migrations without executing their SQL
    ///
    /// Candidate selection is the same as [`Migrator::plan`]. With
    /// `Direction::Up` each candidate gets a record; with `Direction::Down`
    /// each candidate's record is removed. Every record change runs in its own
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns planning errors, or `MigrationError::Record` with the count
    /// already recorded.
    pub fn skip(
        &self,
        db: &dyn DbExecutor,
        direction: Direction,
        limit: usize,
    ) -> Result<usize, MigrationError> {
        self.skip_inner(db, direction, limit, &LogReporter)
    }

    fn skip_inner(
        &self,
        db: &dyn DbExecutor,
        direction: Direction,
        limit: usize,
        reporter: &dyn Reporter,
    ) -> Result<usize, MigrationError> {
        let plan = self.plan(db, direction, limit)?;
        report_drift(reporter, &plan.drift);
        let skipped = self.execute_plan(db, &plan.migrations, RunMode::RecordOnly)?;
        log::info!("Skipped {skipped} migration(s) {direction}");
        Ok(skipped)
    }

    /// `skip` with user-facing output
    ///
    /// # Errors
    ///
    /// Same as [`Migrator::skip`].
    pub fn skip_with_report(
        &self,
        db: &dyn DbExecutor,
        direction: Direction,
        limit: usize,
        reporter: &dyn Reporter,
    ) -> Result<usize, MigrationError> {
        match self.skip_inner(db, direction, limit, reporter) {
            Ok(0) => {
                reporter.output("All migrations have already been applied");
                Ok(0)
            }
            Ok(skipped) => {
                reporter.output(&count_message("Skipped", skipped));
                Ok(skipped)
            }
            Err(e) => {
                reporter.error(&format!("Migration failed: {e}"));
                Err(e)
            }
        }
    }
}
