//! Relational store backends.
//!
//! The Apply Engine and the Schema Synthesizer only talk to a store through
//! [`SchemaStore`] and [`MutationStore`]. [`PgStore`] is the production
//! backend; [`MemoryStore`] enforces the same rules in process for tests.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryRow, MemoryStore};
pub use postgres::PgStore;

use crate::core::mapper::MutationIntent;
use crate::schema::{ColumnSpec, TableRef, TableSpec};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Bookkeeping table recording deleted addresses and the slot they were
/// deleted at.
pub const TOMBSTONE_TABLE: &str = "_sink_tombstones";

/// Terminal result of applying one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyOutcome {
    /// Upsert created the row.
    Inserted,
    /// Upsert changed an existing row.
    Upserted,
    Updated,
    /// Update of a row that does not exist; nothing written.
    Missing,
    Deleted,
    /// Delete of a row that does not exist; nothing removed.
    Absent,
    /// Ordering rules rejected the write.
    Superseded,
}

impl ApplyOutcome {
    /// Whether the intent changed stored state.
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(
            self,
            ApplyOutcome::Inserted
                | ApplyOutcome::Upserted
                | ApplyOutcome::Updated
                | ApplyOutcome::Deleted
        )
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyOutcome::Inserted => "inserted",
            ApplyOutcome::Upserted => "upserted",
            ApplyOutcome::Updated => "updated",
            ApplyOutcome::Missing => "missing",
            ApplyOutcome::Deleted => "deleted",
            ApplyOutcome::Absent => "absent",
            ApplyOutcome::Superseded => "superseded",
        })
    }
}

/// Additive schema operations.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()>;

    /// Creates the tombstone table if needed.
    async fn ensure_tombstones(&self) -> Result<()>;

    /// Column names of `table`, or `None` if it does not exist.
    async fn existing_columns(&self, table: &TableRef) -> Result<Option<Vec<String>>>;

    async fn create_table(&self, spec: &TableSpec) -> Result<()>;

    async fn add_column(&self, table: &TableRef, column: &ColumnSpec) -> Result<()>;
}

/// Atomic application of one mutation intent.
#[async_trait]
pub trait MutationStore: Send + Sync {
    /// Applies `intent` to the table described by `spec` in one transaction.
    ///
    /// Implementations enforce the rules of [`crate::core::apply::slots`] and
    /// the tombstone protocol.
    async fn apply(&self, intent: &MutationIntent, spec: &TableSpec) -> Result<ApplyOutcome>;
}
