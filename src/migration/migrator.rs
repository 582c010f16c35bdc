//! Migrator - Core migration execution engine

use super::error::MigrationError;
use super::migration::{Direction, Migration, PlannedMigration};
use super::planner::{plan_migrations, Plan};
use super::record::MigrationRecord;
use super::report::{count_message, print_planned, report_drift, LogReporter, Reporter};
use super::source::{MigrationSource, SourceConfig};
use super::store::RecordStore;
use crate::config::MigrateConfig;
use crate::dialect::{dialect_for, Dialect};
use crate::executor::DbExecutor;
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// What a planned migration's transaction does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    /// Run the statements, then update the tracking table
    Execute,
    /// Only update the tracking table
    RecordOnly,
}

/// Core migration execution engine
///
/// The `Migrator` ties a [`MigrationSource`], a [`Dialect`] and a
/// [`RecordStore`] together. Every operation takes the database as a
/// `&dyn DbExecutor`, so one migrator can serve several connections.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tidemark::dialect::SqliteDialect;
/// use tidemark::executor::SqliteExecutor;
/// use tidemark::migration::{Direction, FileMigrationSource, Migrator};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = SqliteExecutor::open("app.db")?;
/// let migrator = Migrator::new(
///     FileMigrationSource::new("./database/migrations"),
///     Arc::new(SqliteDialect),
/// );
/// let applied = migrator.apply(&db, Direction::Up, 0)?;
/// println!("applied {applied}");
/// # Ok(())
/// # }
/// ```
pub struct Migrator {
    source: Box<dyn MigrationSource>,
    dialect: Arc<dyn Dialect>,
    store: RecordStore,
    cancel: Option<Arc<AtomicBool>>,
}

impl Migrator {
    pub fn new(source: impl MigrationSource + 'static, dialect: Arc<dyn Dialect>) -> Self {
        Self::with_boxed_source(Box::new(source), dialect)
    }

    pub fn with_boxed_source(source: Box<dyn MigrationSource>, dialect: Arc<dyn Dialect>) -> Self {
        let store = RecordStore::new(Arc::clone(&dialect));
        Self {
            source,
            dialect,
            store,
            cancel: None,
        }
    }

    /// Build a migrator reading `config.directory`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Config` if the configuration is invalid.
    pub fn from_config(config: &MigrateConfig) -> Result<Self, MigrationError> {
        Self::from_config_with_source(config, &SourceConfig::Directory(config.directory.clone()))
    }

    /// Build a migrator from `config` with an explicit source, such as an
    /// embedded tree
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Config` if the configuration is invalid.
    pub fn from_config_with_source(
        config: &MigrateConfig,
        source: &SourceConfig,
    ) -> Result<Self, MigrationError> {
        config.validate()?;
        let dialect = dialect_for(config.dialect_kind()?);
        Ok(Self::with_boxed_source(source.build(), dialect)
            .with_table(config.table.clone())
            .with_schema(config.schema.clone()))
    }

    /// Use a tracking table other than `migrations`
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.store = self.store.with_table(table);
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.store = self.store.with_schema(schema);
        self
    }

    /// Stop between migrations once `flag` is set
    ///
    /// A migration that has started always runs to commit or rollback.
    #[must_use]
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// All migrations from the source, ascending by id
    ///
    /// # Errors
    ///
    /// Propagates source and parse errors.
    pub fn find_migrations(&self) -> Result<Vec<Migration>, MigrationError> {
        self.source.find_migrations()
    }

    /// Applied migration records, ascending by id
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Store` if the tracking table is unusable.
    pub fn records(&self, db: &dyn DbExecutor) -> Result<Vec<MigrationRecord>, MigrationError> {
        self.store.get_migration_records(db)
    }

    /// Compute the migrations `apply` would run
    ///
    /// Drift is returned in [`Plan::drift`] and never fails the plan. The
    /// running operations report it.
    ///
    /// # Errors
    ///
    /// Returns source, parse and store errors. Nothing is written except the
    /// tracking table, which is created if missing.
    pub fn plan(
        &self,
        db: &dyn DbExecutor,
        direction: Direction,
        limit: usize,
    ) -> Result<Plan, MigrationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::plan_span(direction.as_str(), limit).entered();

        let migrations = self.find_migrations()?;
        let records = self.records(db)?;
        let plan = plan_migrations(&migrations, &records, direction, limit);

        log::debug!(
            "Planned {} migration(s) {direction} (limit {limit})",
            plan.len()
        );
        Ok(plan)
    }

    /// Apply up to `limit` migrations in `direction` (`limit == 0`: all)
    ///
    /// Each migration runs in its own transaction together with its record
    /// insert (Up) or delete (Down). The run stops at the first failure;
    /// migrations committed before it stay applied.
    ///
    /// # Returns
    ///
    /// Number of migrations committed.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Execution` when a statement fails, carrying the
    /// count committed before it, and source/store errors from planning.
    pub fn apply(
        &self,
        db: &dyn DbExecutor,
        direction: Direction,
        limit: usize,
    ) -> Result<usize, MigrationError> {
        let plan = self.plan(db, direction, limit)?;
        report_drift(&LogReporter, &plan.drift);
        self.execute_plan(db, &plan.migrations, RunMode::Execute)
    }

    /// `apply` with user-facing output; `dry_run` prints the plan instead
    ///
    /// Prints `Applied N migrations` on success. On failure the error is
    /// reported and returned.
    ///
    /// # Errors
    ///
    /// Same as [`Migrator::apply`].
    pub fn apply_with_report(
        &self,
        db: &dyn DbExecutor,
        direction: Direction,
        limit: usize,
        dry_run: bool,
        reporter: &dyn Reporter,
    ) -> Result<usize, MigrationError> {
        let plan = match self.plan(db, direction, limit) {
            Ok(plan) => plan,
            Err(e) => {
                reporter.error(&format!("Cannot plan migration: {e}"));
                return Err(e);
            }
        };
        report_drift(reporter, &plan.drift);

        if dry_run {
            for planned in &plan.migrations {
                print_planned(reporter, planned);
            }
            return Ok(0);
        }

        match self.execute_plan(db, &plan.migrations, RunMode::Execute) {
            Ok(applied) => {
                reporter.output(&count_message("Applied", applied));
                Ok(applied)
            }
            Err(e) => {
                reporter.error(&format!("Migration failed: {e}"));
                Err(e)
            }
        }
    }

    /// Print the plan without executing anything
    ///
    /// # Errors
    ///
    /// Same as [`Migrator::plan`].
    pub fn print_plan(
        &self,
        db: &dyn DbExecutor,
        direction: Direction,
        limit: usize,
        reporter: &dyn Reporter,
    ) -> Result<Plan, MigrationError> {
        let plan = self.plan(db, direction, limit)?;
        report_drift(reporter, &plan.drift);
        for planned in &plan.migrations {
            print_planned(reporter, planned);
        }
        Ok(plan)
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run `planned` in order, one transaction each, stopping at the first failure
    pub(crate) fn execute_plan(
        &self,
        db: &dyn DbExecutor,
        planned: &[PlannedMigration],
        mode: RunMode,
    ) -> Result<usize, MigrationError> {
        let mut applied = 0;
        for migration in planned {
            if self.cancelled() {
                log::warn!("Migration run cancelled after {applied} migration(s)");
                return Err(MigrationError::Cancelled { applied });
            }

            let start = Instant::now();
            let result = self.run_one(db, migration, applied, mode);

            #[cfg(feature = "metrics")]
            if let Some(metrics) = crate::metrics::MIGRATION_METRICS.as_ref() {
                record_metrics(metrics, migration, mode, start.elapsed(), result.is_ok());
            }

            result?;
            applied += 1;
            match mode {
                RunMode::Execute => log::info!(
                    "Applied migration {} ({}) in {:?}",
                    migration.id,
                    migration.direction,
                    start.elapsed()
                ),
                RunMode::RecordOnly => log::info!(
                    "Skipped migration {} ({})",
                    migration.id,
                    migration.direction
                ),
            }
        }
        Ok(applied)
    }

    /// One migration inside one transaction
    fn run_one(
        &self,
        db: &dyn DbExecutor,
        migration: &PlannedMigration,
        applied: usize,
        mode: RunMode,
    ) -> Result<(), MigrationError> {
        #[cfg(feature = "tracing")]
        let _span =
            tracing_helpers::apply_migration_span(&migration.id, migration.direction.as_str())
                .entered();

        let id = migration.id.as_str();
        let transaction_error = |source| MigrationError::Transaction {
            id: id.to_string(),
            applied,
            source,
        };

        let tx = Transaction::begin(db, self.dialect.as_ref()).map_err(transaction_error)?;

        if mode == RunMode::Execute {
            for (index, statement) in migration.statements.iter().enumerate() {
                #[cfg(feature = "tracing")]
                let _statement_span = tracing_helpers::execute_statement_span(id, index).entered();

                log::debug!("{id} [{index}]: {statement}");
                if let Err(e) = tx.execute(statement, &[]) {
                    rollback(tx, id);
                    return Err(MigrationError::Execution {
                        id: id.to_string(),
                        statement_index: index,
                        applied,
                        message: e.to_string(),
                    });
                }

                #[cfg(feature = "metrics")]
                if let Some(metrics) = crate::metrics::MIGRATION_METRICS.as_ref() {
                    metrics.record_statement();
                }
            }
        }

        let recorded = match migration.direction {
            Direction::Up => self.store.insert(&tx, &MigrationRecord::now(id)),
            Direction::Down => self.store.delete(&tx, id),
        };
        if let Err(source) = recorded {
            rollback(tx, id);
            return Err(MigrationError::Record {
                id: id.to_string(),
                applied,
                source,
            });
        }

        tx.commit().map_err(transaction_error)
    }
}

#[cfg(feature = "metrics")]
fn record_metrics(
    metrics: &crate::metrics::MigrationMetrics,
    migration: &PlannedMigration,
    mode: RunMode,
    elapsed: std::time::Duration,
    succeeded: bool,
) {
    let direction = migration.direction.as_str();
    match (succeeded, mode) {
        (false, _) => metrics.record_failed(direction),
        (true, RunMode::Execute) => metrics.record_applied(direction, elapsed),
        (true, RunMode::RecordOnly) => metrics.record_skipped(direction),
    }
}

fn rollback(tx: Transaction<'_>, id: &str) {
    if let Err(e) = tx.rollback() {
        log::warn!("Rollback of migration {id} failed: {e}");
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("dialect", &self.dialect.name())
            .field("store", &self.store)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;
    use crate::metrics::MigrationMetrics;
    use std::time::Duration;

    fn planned(direction: Direction) -> PlannedMigration {
        PlannedMigration {
            id: "20240101000000-a".to_string(),
            direction,
            statements: vec!["CREATE TABLE a (id INT);".to_string()],
        }
    }

    fn histogram_count(metrics: &MigrationMetrics, direction: &str) -> u64 {
        metrics
            .migration_duration
            .with_label_values(&[direction])
            .get_sample_count()
    }

    #[test]
    fn test_record_only_runs_are_not_counted_as_applied() {
        let metrics = MigrationMetrics::init().unwrap();

        record_metrics(
            &metrics,
            &planned(Direction::Up),
            RunMode::RecordOnly,
            Duration::from_millis(3),
            true,
        );
        record_metrics(
            &metrics,
            &planned(Direction::Down),
            RunMode::RecordOnly,
            Duration::from_millis(3),
            true,
        );

        assert_eq!(metrics.migrations_skipped.with_label_values(&["up"]).get(), 1);
        assert_eq!(metrics.migrations_skipped.with_label_values(&["down"]).get(), 1);
        assert_eq!(metrics.migrations_applied.with_label_values(&["up"]).get(), 0);
        assert_eq!(histogram_count(&metrics, "up"), 0);
    }

    #[test]
    fn test_executed_runs_are_counted_and_timed() {
        let metrics = MigrationMetrics::init().unwrap();

        record_metrics(
            &metrics,
            &planned(Direction::Up),
            RunMode::Execute,
            Duration::from_millis(3),
            true,
        );
        record_metrics(
            &metrics,
            &planned(Direction::Up),
            RunMode::Execute,
            Duration::from_millis(3),
            false,
        );

        assert_eq!(metrics.migrations_applied.with_label_values(&["up"]).get(), 1);
        assert_eq!(metrics.migrations_failed.with_label_values(&["up"]).get(), 1);
        assert_eq!(metrics.migrations_skipped.with_label_values(&["up"]).get(), 0);
        assert_eq!(histogram_count(&metrics, "up"), 1);
    }
}
