//! Drift warnings reach the log exactly once per operation
#![cfg(feature = "sqlite")]

mod common;

use common::*;
use log::{Level, Log, Metadata, Record};
use std::sync::Mutex;
use tidemark::migration::{Direction, LogReporter, MigrationRecord};

const GONE: &str = "20231231000000-gone";

struct CapturingLogger {
    warnings: Mutex<Vec<String>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.warnings.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    warnings: Mutex::new(Vec::new()),
};

/// Warnings naming the drifted record since the last call
fn take_drift_warnings() -> usize {
    let mut warnings = LOGGER.warnings.lock().unwrap();
    let count = warnings.iter().filter(|w| w.contains(GONE)).count();
    warnings.clear();
    count
}

// Single test: the logger is process-global.
#[test]
fn test_drift_is_logged_once_per_operation() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(log::LevelFilter::Warn);

    let dir = abc_dir();
    let migrator = sqlite_migrator(dir.path());
    let db = RecordingExecutor::new();
    migrator.apply(&db, Direction::Up, 0).unwrap();
    migrator
        .store()
        .insert(&db, &MigrationRecord::now(GONE))
        .unwrap();
    take_drift_warnings();

    migrator
        .apply_with_report(&db, Direction::Down, 1, false, &LogReporter)
        .unwrap();
    assert_eq!(take_drift_warnings(), 1, "apply_with_report");

    migrator.apply(&db, Direction::Up, 0).unwrap();
    assert_eq!(take_drift_warnings(), 1, "apply");

    migrator.redo(&db, false, &LogReporter).unwrap();
    assert_eq!(take_drift_warnings(), 1, "redo");

    migrator
        .print_plan(&db, Direction::Down, 1, &LogReporter)
        .unwrap();
    assert_eq!(take_drift_warnings(), 1, "print_plan");

    migrator
        .skip_with_report(&db, Direction::Up, 0, &LogReporter)
        .unwrap();
    assert_eq!(take_drift_warnings(), 1, "skip_with_report");

    migrator.skip(&db, Direction::Up, 0).unwrap();
    assert_eq!(take_drift_warnings(), 1, "skip");

    migrator.status_with_report(&db, &LogReporter).unwrap();
    assert_eq!(take_drift_warnings(), 1, "status_with_report");

    let plan = migrator.plan(&db, Direction::Up, 0).unwrap();
    assert_eq!(plan.drift.len(), 1);
    assert_eq!(take_drift_warnings(), 0, "plan");
}
