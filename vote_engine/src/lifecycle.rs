//! Pure derivation of an election's status from its timestamps.

use chrono::{DateTime, Utc};

use crate::model::{Election, ElectionStatus};

/// Derives the time-based status of an election.
///
/// Both bounds are inclusive: an election is `Active` at exactly its start
/// instant and at exactly its end instant.
pub fn derive_status(election: &Election, now: DateTime<Utc>) -> ElectionStatus {
    if now < election.start_date {
        ElectionStatus::Upcoming
    } else if now > election.end_date {
        ElectionStatus::Completed
    } else {
        ElectionStatus::Active
    }
}

/// Whether the election accepts new allocations at `now`.
///
/// Requires both the time-derived status to be `Active` and the
/// administrative `is_active` flag to be set. The flag alone is never
/// sufficient: it is a kill-switch, not a scheduling override.
pub fn is_open(election: &Election, now: DateTime<Utc>) -> bool {
    election.is_active && derive_status(election, now) == ElectionStatus::Active
}
