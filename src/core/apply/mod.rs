//! Apply Engine: idempotent, slot-ordered execution of mutation intents.
//!
//! - Upserts are keyed by address. `slot_created_at` keeps the smallest
//!   non-zero slot seen, `slot_updated_at` the largest; provided fields and
//!   `refreshed_at` are always overwritten.
//! - Updates never create rows and never touch `slot_created_at`.
//! - Deletes of absent rows are no-ops. A delete with a known slot leaves a
//!   tombstone so that older upserts delivered later cannot resurrect the
//!   row.

pub mod engine;
pub mod slots;

pub use crate::storage::ApplyOutcome;
pub use engine::ApplyEngine;
