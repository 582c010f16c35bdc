//! Migration status reporting

use super::error::MigrationError;
use super::migrator::Migrator;
use super::planner::{missing_files, DriftWarning};
use super::report::Reporter;
use crate::executor::DbExecutor;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// One line of the status table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub id: String,
    /// `None` when the migration is pending
    pub applied_at: Option<DateTime<Utc>>,
}

impl StatusRow {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }

    /// Text for the `Applied` column
    pub fn applied_label(&self) -> String {
        match self.applied_at {
            Some(at) => at.format("%Y-%m-%d %H:%M:%S%.f %z").to_string(),
            None => "no".to_string(),
        }
    }
}

/// Migration files joined with the tracking table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Every migration file, ascending by id
    pub rows: Vec<StatusRow>,
    /// Records with no matching file
    pub drift: Vec<DriftWarning>,
}

impl StatusReport {
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_applied()).count()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.rows.len() - self.applied_count()
    }

    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count() == 0
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ID_HEADER: &str = "Migration";
        const APPLIED_HEADER: &str = "Applied";

        let labels: Vec<String> = self.rows.iter().map(StatusRow::applied_label).collect();
        let id_width = self
            .rows
            .iter()
            .map(|r| r.id.len())
            .chain(std::iter::once(ID_HEADER.len()))
            .max()
            .unwrap_or(ID_HEADER.len());
        let applied_width = labels
            .iter()
            .map(String::len)
            .chain(std::iter::once(APPLIED_HEADER.len()))
            .max()
            .unwrap_or(APPLIED_HEADER.len());

        let border = format!("+-{}-+-{}-+", "-".repeat(id_width), "-".repeat(applied_width));
        writeln!(f, "{border}")?;
        writeln!(f, "| {ID_HEADER:<id_width$} | {APPLIED_HEADER:<applied_width$} |")?;
        writeln!(f, "{border}")?;
        for (row, label) in self.rows.iter().zip(&labels) {
            writeln!(f, "| {:<id_width$} | {:<applied_width$} |", row.id, label)?;
        }
        write!(f, "{border}")?;

        if !self.drift.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "Applied migrations without a file:")?;
            for warning in &self.drift {
                match warning {
                    DriftWarning::MissingFile { id, applied_at } => write!(
                        f,
                        "\n  {id} (applied at {})",
                        applied_at.format("%Y-%m-%d %H:%M:%S%.f %z")
                    )?,
                    other => write!(f, "\n  {other}")?,
                }
            }
        }
        Ok(())
    }
}

impl Migrator {
    /// Status of every migration file plus drifted records
    ///
    /// # Errors
    ///
    /// Returns source, parse and store errors.
    pub fn status(&self, db: &dyn DbExecutor) -> Result<StatusReport, MigrationError> {
        let migrations = self.find_migrations()?;
        let records = self.records(db)?;

        let applied: HashMap<&str, DateTime<Utc>> = records
            .iter()
            .map(|r| (r.id.as_str(), r.applied_at))
            .collect();

        let rows = migrations
            .iter()
            .map(|m| StatusRow {
                id: m.id.clone(),
                applied_at: applied.get(m.id.as_str()).copied(),
            })
            .collect();

        let drift = missing_files(&migrations, &records);

        Ok(StatusReport { rows, drift })
    }

    /// `status` printed through `reporter`
    ///
    /// Drift is reported as warnings before the table.
    ///
    /// # Errors
    ///
    /// Same as [`Migrator::status`].
    pub fn status_with_report(
        &self,
        db: &dyn DbExecutor,
        reporter: &dyn Reporter,
    ) -> Result<StatusReport, MigrationError> {
        match self.status(db) {
            Ok(report) => {
                for warning in &report.drift {
                    reporter.warn(&warning.to_string());
                }
                reporter.output(&report.to_string());
                Ok(report)
            }
            Err(e) => {
                reporter.error(&e.to_string());
                Err(e)
            }
        }
    }
}
