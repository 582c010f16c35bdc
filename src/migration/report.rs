//! Human-facing output
//!
//! Orchestration calls take a `&dyn Reporter` instead of writing to stdout, so
//! the CLI can colour its output and tests can capture it.

use super::migration::PlannedMigration;
use super::planner::DriftWarning;

/// Sink for user-facing messages
pub trait Reporter {
    /// Primary result output (summaries, dry-run SQL, status tables)
    fn output(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards everything to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn output(&self, message: &str) {
        log::info!("{message}");
    }

    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}

/// Print the statements a dry run would execute
pub fn print_planned(reporter: &dyn Reporter, planned: &PlannedMigration) {
    reporter.output(&format!(
        "==> Would apply migration {} ({})",
        planned.id, planned.direction
    ));
    for statement in &planned.statements {
        reporter.output(statement);
    }
}

/// Drift warnings go through the reporter only, so a `LogReporter` logs each once
pub(crate) fn report_drift(reporter: &dyn Reporter, drift: &[DriftWarning]) {
    for warning in drift {
        reporter.warn(&warning.to_string());
    }
}

/// `"Applied 1 migration"` / `"Applied 3 migrations"`
pub(crate) fn count_message(verb: &str, count: usize) -> String {
    if count == 1 {
        format!("{verb} 1 migration")
    } else {
        format!("{verb} {count} migrations")
    }
}
