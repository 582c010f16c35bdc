//! # tidemark
//!
//! Plans and applies ordered, reversible SQL migrations (`-- +migrate Up` /
//! `-- +migrate Down` files) against PostgreSQL, SQLite or any database reachable
//! through a [`DbExecutor`](executor::DbExecutor).
//!
//! See [`migration`] for the engine and [`config`] for settings.

pub mod config;
pub mod connection;
pub mod dialect;
pub mod executor;
pub mod migration;
pub mod transaction;

#[cfg(feature = "metrics")]
pub mod metrics;
#[cfg(feature = "tracing")]
pub mod tracing_helpers;

pub use config::MigrateConfig;
pub use connection::ConnectionError;
pub use dialect::{dialect_for, Dialect, DialectKind};
pub use executor::{DbError, DbExecutor, Row, Value};
#[cfg(feature = "postgres")]
pub use executor::MayPostgresExecutor;
#[cfg(feature = "sqlite")]
pub use executor::SqliteExecutor;
pub use migration::{Direction, MigrationError, Migrator, RedoOutcome};
pub use transaction::{Transaction, TransactionError};
