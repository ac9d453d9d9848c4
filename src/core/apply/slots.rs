//! Slot-ordering rules shared by every store backend.
//!
//! A slot of `0` means "unset": it is what the bookkeeping columns default
//! to and what an intent without a known slot contributes.

use crate::core::mapper::SlotSpan;

/// New `slot_created_at`: the smallest non-zero value seen.
#[must_use]
pub fn merge_created(stored: u64, incoming: u64) -> u64 {
    match (stored, incoming) {
        (s, 0) => s,
        (0, i) => i,
        (s, i) => s.min(i),
    }
}

/// New `slot_updated_at`: the largest value seen.
#[must_use]
pub fn merge_updated(stored: u64, incoming: u64) -> u64 {
    stored.max(incoming)
}

/// Slot pair contributed by an intent, `(0, 0)` when unknown.
#[must_use]
pub fn contributed(slots: Option<SlotSpan>) -> (u64, u64) {
    slots.map_or((0, 0), |s| (s.first, s.last))
}

/// What to do with an upsert given the tombstone left by an earlier delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAdmission {
    /// Write the row; `clear_tombstone` when the upsert is newer than the
    /// delete.
    Apply { clear_tombstone: bool },
    /// The row was deleted at or after this upsert's slot.
    Superseded,
}

#[must_use]
pub fn admit_upsert(tombstone: Option<u64>, slots: Option<SlotSpan>) -> UpsertAdmission {
    match (tombstone, slots) {
        (Some(deleted_at), Some(span)) if span.last <= deleted_at => UpsertAdmission::Superseded,
        (Some(_), Some(_)) => UpsertAdmission::Apply {
            clear_tombstone: true,
        },
        _ => UpsertAdmission::Apply {
            clear_tombstone: false,
        },
    }
}

/// Whether a delete is older than the row it targets.
///
/// Only decidable when both the row's `slot_updated_at` and the delete's
/// slot are known.
#[must_use]
pub fn delete_is_stale(row_updated: Option<u64>, slots: Option<SlotSpan>) -> bool {
    match (row_updated, slots) {
        (Some(updated), Some(span)) => updated > span.last,
        _ => false,
    }
}
