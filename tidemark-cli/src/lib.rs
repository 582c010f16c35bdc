//! Library half of the `tidemark` command-line tool
//!
//! `main.rs` only parses arguments and dispatches; the pieces below are kept
//! here so they can be tested without spawning the binary.

pub mod console;
pub mod new_migration;
pub mod settings;

pub use console::ConsoleReporter;
pub use new_migration::{create_migration, template_for, NewMigrationError, Template};
pub use settings::{resolve, Overrides};
