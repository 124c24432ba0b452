//! The voting power ledger: per (voter, election) budgets and recorded
//! allocations.
//!
//! The ledger is the only invariant-bearing state machine in the engine.
//! Each entry moves at most once from `Unallocated` to `Submitted`; the
//! engine serializes that transition per key with the guard table below.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::model::{AllocationState, ElectionId, VoterId, VotingPowerEntry};

pub(crate) type LedgerKey = (VoterId, ElectionId);

/// Tracks voting power entries. Entries are created lazily on first query
/// and never removed, except when the parent election is purged.
#[derive(Debug, Default)]
pub struct VotingPowerLedger {
    entries: RwLock<HashMap<LedgerKey, VotingPowerEntry>>,
    // One mutex per key, handed out to submitters so that concurrent
    // submissions for the same (voter, election) pair cannot interleave.
    // Guards for different keys are independent.
    guards: Mutex<HashMap<LedgerKey, Arc<Mutex<()>>>>,
}

impl VotingPowerLedger {
    pub fn new() -> VotingPowerLedger {
        VotingPowerLedger::default()
    }

    /// The submission guard for one ledger key.
    pub(crate) fn guard(&self, key: &LedgerKey) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock();
        guards.entry(key.clone()).or_default().clone()
    }

    /// Returns the entry for the key, creating an `Unallocated` one with
    /// the given budget if none exists, and whether this call created it.
    /// The budget is frozen at creation: later changes to the election's
    /// `votes_per_voter` do not affect the entry.
    pub(crate) fn get_or_create(
        &self,
        voter_id: &VoterId,
        election_id: &ElectionId,
        budget: u64,
    ) -> (VotingPowerEntry, bool) {
        let key = (voter_id.clone(), election_id.clone());
        let mut entries = self.entries.write();
        let mut created = false;
        let entry = entries
            .entry(key)
            .or_insert_with(|| {
                created = true;
                VotingPowerEntry::unallocated(voter_id.clone(), election_id.clone(), budget)
            })
            .clone();
        (entry, created)
    }

    /// Records an entry, overwriting the previous state for its key.
    /// Callers hold the key's guard and the catalog write lock, so this
    /// is the single state-changing write of a submission.
    pub(crate) fn record(&self, entry: VotingPowerEntry) {
        let key = (entry.voter_id.clone(), entry.election_id.clone());
        self.entries.write().insert(key, entry);
    }

    /// Drops all entries (and guards) for an election. Called with the
    /// catalog write lock held while the election itself is removed, so
    /// no new entry for it can be created concurrently.
    pub(crate) fn purge_election(&self, election_id: &ElectionId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(_, eid), _| eid != election_id);
        let purged = before - entries.len();
        self.guards
            .lock()
            .retain(|(_, eid), _| eid != election_id);
        purged
    }

    /// All submitted entries for an election, for the aggregator.
    pub(crate) fn submitted_entries(&self, election_id: &ElectionId) -> Vec<VotingPowerEntry> {
        self.entries
            .read()
            .values()
            .filter(|e| e.election_id == *election_id && e.state == AllocationState::Submitted)
            .cloned()
            .collect()
    }

    /// Snapshot of every entry, for the persistence port.
    pub(crate) fn all_entries(&self) -> Vec<VotingPowerEntry> {
        self.entries.read().values().cloned().collect()
    }

    pub(crate) fn restore(&self, entries: Vec<VotingPowerEntry>) {
        let mut map = self.entries.write();
        map.clear();
        for entry in entries {
            map.insert((entry.voter_id.clone(), entry.election_id.clone()), entry);
        }
    }
}
