//! Migration system for tidemark
//!
//! This module provides:
//! - Migration sources (directory or embedded tree) and the `.sql` file parser
//! - The tracking table ([`RecordStore`])
//! - Planning, execution, skip, redo and status on [`Migrator`]
//!
//! # Example
//!
//! ```rust,no_run
//! use tidemark::config::MigrateConfig;
//! use tidemark::connection;
//! use tidemark::migration::{Direction, LogReporter, Migrator};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrateConfig::load()?;
//!     let migrator = Migrator::from_config(&config)?;
//!     let db = connection::open(config.dialect_kind()?, config.url.as_deref().unwrap_or(""))?;
//!
//!     migrator.apply_with_report(db.as_ref(), Direction::Up, 0, false, &LogReporter)?;
//!     println!("{}", migrator.status(db.as_ref())?);
//!     Ok(())
//! }
//! ```

pub mod error;
#[allow(clippy::module_inception)]
pub mod migration;
pub mod migrator;
pub mod parser;
pub mod planner;
pub mod record;
pub mod redo;
pub mod report;
pub mod skip;
pub mod source;
pub mod startup;
pub mod status;
pub mod store;

pub use error::MigrationError;
pub use migration::{Direction, Migration, PlannedMigration};
pub use migrator::Migrator;
pub use parser::parse_migration;
pub use planner::{plan_migrations, DriftWarning, Plan};
pub use record::MigrationRecord;
pub use redo::RedoOutcome;
pub use report::{print_planned, LogReporter, Reporter};
pub use source::{EmbeddedMigrationSource, FileMigrationSource, MigrationSource, SourceConfig};
pub use status::{StatusReport, StatusRow};
pub use store::RecordStore;
