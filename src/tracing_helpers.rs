//! `tracing` spans for migration runs (feature `tracing`)

use tracing::{info_span, Span};

pub fn plan_span(direction: &str, limit: usize) -> Span {
    info_span!("tidemark.plan", direction, limit)
}

pub fn apply_migration_span(id: &str, direction: &str) -> Span {
    info_span!("tidemark.migration", migration.id = id, direction)
}

pub fn execute_statement_span(id: &str, index: usize) -> Span {
    info_span!("tidemark.statement", migration.id = id, statement.index = index)
}

pub fn begin_transaction_span() -> Span {
    info_span!("tidemark.transaction.begin")
}

pub fn commit_transaction_span() -> Span {
    info_span!("tidemark.transaction.commit")
}

pub fn rollback_transaction_span() -> Span {
    info_span!("tidemark.transaction.rollback")
}
