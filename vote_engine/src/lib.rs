//! Budgeted vote-allocation engine for the Smart Vote platform.
//!
//! A voter is granted a fixed budget of votes per election
//! (`votes_per_voter`) and may split that budget arbitrarily across the
//! candidates on the ballot, subject to a sum-of-allocations ≤ budget
//! invariant. The engine keeps the election catalog, enforces the budget
//! invariant in a per-voter ledger, derives the election lifecycle from
//! injected timestamps and aggregates results.
//!
//! This crate is a library, not a service: `now` is always passed in by
//! the caller, persistence goes through the [`StateStore`] port, and all
//! errors are typed values for the embedding layer to present.
//!
//! See the [`quick_start`] module for a worked example.

mod builder;
mod catalog;
mod ledger;
mod lifecycle;
mod model;
mod polls;
mod results;
mod store;

pub mod manual;
pub mod quick_start;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{info, warn};

pub use crate::builder::ElectionBuilder;
pub use crate::catalog::ElectionCatalog;
pub use crate::ledger::VotingPowerLedger;
pub use crate::lifecycle::{derive_status, is_open};
pub use crate::model::*;
pub use crate::polls::{Poll, PollBoard, PollPatch, PollSpec};
pub use crate::store::{InMemoryStore, Snapshot, StateStore};

/// The engine facade: catalog + ledger + poll board behind one injected
/// persistence port.
///
/// All methods take `&self` and are safe for concurrent callers. The one
/// write with real contention semantics, [`submit_allocation`], is
/// serialized per (voter, election) key; submissions for different keys
/// proceed independently.
///
/// [`submit_allocation`]: VotingEngine::submit_allocation
pub struct VotingEngine {
    catalog: ElectionCatalog,
    ledger: VotingPowerLedger,
    polls: PollBoard,
    store: Box<dyn StateStore>,
}

impl Default for VotingEngine {
    fn default() -> Self {
        VotingEngine::new()
    }
}

impl VotingEngine {
    /// A fresh engine backed by the in-memory store stub.
    pub fn new() -> VotingEngine {
        VotingEngine {
            catalog: ElectionCatalog::new(),
            ledger: VotingPowerLedger::new(),
            polls: PollBoard::new(),
            store: Box::new(InMemoryStore::new()),
        }
    }

    /// Opens an engine on an injected store, restoring the last saved
    /// snapshot if the store holds one.
    pub fn open(store: Box<dyn StateStore>) -> EngineResult<VotingEngine> {
        let engine = VotingEngine {
            catalog: ElectionCatalog::new(),
            ledger: VotingPowerLedger::new(),
            polls: PollBoard::new(),
            store,
        };
        if let Some(snapshot) = engine.store.load()? {
            info!(
                "open: restoring snapshot ({} elections, {} candidates, {} ledger entries)",
                snapshot.elections.len(),
                snapshot.candidates.len(),
                snapshot.entries.len()
            );
            engine.restore(snapshot);
        }
        Ok(engine)
    }

    /// Read access to the election catalog.
    pub fn catalog(&self) -> &ElectionCatalog {
        &self.catalog
    }

    /// Read access to the poll board.
    pub fn polls(&self) -> &PollBoard {
        &self.polls
    }

    // ******** Catalog pass-throughs (persisted) *********

    pub fn create_election(&self, spec: ElectionSpec) -> EngineResult<Election> {
        let election = self.catalog.create_election(spec)?;
        self.persist()?;
        Ok(election)
    }

    /// Applies a partial update and re-validates the merged election.
    ///
    /// A roster patch may not drop a candidate who already holds
    /// submitted votes: recorded allocations must stay accounted for in
    /// `total_votes_cast`. The check runs under the catalog write lock,
    /// so no submission for the dropped candidate can slip in between.
    pub fn update_election(
        &self,
        id: &ElectionId,
        patch: ElectionPatch,
    ) -> EngineResult<Election> {
        let updated = {
            let mut state = self.catalog.write();
            let mut merged = state
                .elections
                .get(id)
                .cloned()
                .ok_or_else(|| EngineError::NotFound(format!("election {}", id)))?;
            let previous_roster = merged.candidates.clone();
            catalog::apply_patch(&mut merged, patch);
            catalog::validate_election(&state, &merged)?;
            let submitted = self.ledger.submitted_entries(id);
            for cid in previous_roster
                .iter()
                .filter(|c| !merged.candidates.contains(c))
            {
                if submitted.iter().any(|e| e.allocations.contains_key(cid)) {
                    return Err(EngineError::Validation(format!(
                        "candidate {} holds recorded votes and cannot leave the roster",
                        cid
                    )));
                }
            }
            state.elections.insert(id.clone(), merged.clone());
            merged
        };
        self.persist()?;
        Ok(updated)
    }

    /// Deletes an election and purges every ledger entry keyed to it.
    ///
    /// The purge runs under the catalog write lock, so a concurrent
    /// submission either commits before the election disappears or fails
    /// with `NotFound`; no orphaned entry can survive.
    pub fn delete_election(&self, id: &ElectionId) -> EngineResult<()> {
        {
            let mut state = self.catalog.write();
            if state.elections.shift_remove(id).is_none() {
                return Err(EngineError::NotFound(format!("election {}", id)));
            }
            let purged = self.ledger.purge_election(id);
            info!("delete_election: {} (purged {} ledger entries)", id, purged);
        }
        self.persist()
    }

    pub fn add_candidate(&self, candidate: Candidate) -> EngineResult<Candidate> {
        let candidate = self.catalog.add_candidate(candidate)?;
        self.persist()?;
        Ok(candidate)
    }

    pub fn follow_candidate(&self, id: &CandidateId) -> EngineResult<u64> {
        let followers = self.catalog.follow_candidate(id)?;
        self.persist()?;
        Ok(followers)
    }

    // ******** Voting power *********

    /// The voting power of a voter in an election, creating the
    /// `Unallocated` entry on first query. The budget is copied from the
    /// election's `votes_per_voter` at this moment and frozen, so later
    /// administrative budget changes never invalidate in-flight voting.
    /// A newly created entry is persisted right away: the frozen budget
    /// must survive a reopen.
    pub fn voting_power(
        &self,
        voter_id: &VoterId,
        election_id: &ElectionId,
    ) -> EngineResult<VotingPowerEntry> {
        let election = self.catalog.get_election(election_id)?;
        let (entry, created) =
            self.ledger
                .get_or_create(voter_id, election_id, election.votes_per_voter);
        if created {
            self.persist()?;
        }
        Ok(entry)
    }

    /// Submits a voter's allocations for an election.
    ///
    /// Preconditions are checked in order, first failure wins: the
    /// election exists; it is open (time-active and not administratively
    /// deactivated); the voter has not submitted before; every candidate
    /// is on the roster; every count is non-negative; the ballot sums to
    /// at least one vote and at most the budget. Validation fully
    /// precedes mutation: a failed submission changes nothing.
    ///
    /// On success the entry transitions to `Submitted` (zero-valued
    /// allocations dropped), the election's `total_votes_cast` grows by
    /// the ballot sum and each candidate's `total_votes` by its share.
    pub fn submit_allocation(
        &self,
        voter_id: &VoterId,
        election_id: &ElectionId,
        request: &AllocationRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<VotingPowerEntry> {
        let key = (voter_id.clone(), election_id.clone());
        let guard = self.ledger.guard(&key);
        let _submission = guard.lock();

        // Validation phase, under read locks only.
        let election = self.catalog.get_election(election_id)?;
        if !lifecycle::is_open(&election, now) {
            return Err(EngineError::ElectionNotOpen(election_id.clone()));
        }
        let (entry, created) =
            self.ledger
                .get_or_create(voter_id, election_id, election.votes_per_voter);
        if created {
            self.persist()?;
        }
        if entry.state == AllocationState::Submitted {
            return Err(EngineError::AlreadySubmitted {
                voter: voter_id.clone(),
                election: election_id.clone(),
            });
        }
        for cid in request.keys() {
            if !election.candidates.contains(cid) {
                return Err(EngineError::UnknownCandidate(cid.clone()));
            }
        }
        for (cid, count) in request {
            if *count < 0 {
                return Err(EngineError::InvalidAllocation {
                    candidate: cid.clone(),
                    count: *count,
                });
            }
        }
        // Normalization: zero-valued entries are not stored.
        let allocations: BTreeMap<CandidateId, u64> = request
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(cid, count)| (cid.clone(), *count as u64))
            .collect();
        let sum: u128 = allocations.values().map(|v| *v as u128).sum();
        if sum == 0 {
            return Err(EngineError::EmptyBallot);
        }
        if sum > entry.total_votes as u128 {
            return Err(EngineError::BudgetExceeded {
                requested: sum.min(u64::MAX as u128) as u64,
                budget: entry.total_votes,
            });
        }
        let sum = sum as u64;

        // Commit phase, under the catalog write lock so a concurrent
        // delete_election cannot interleave with the totals update.
        let submitted = {
            let mut state = self.catalog.write();
            let election = state
                .elections
                .get_mut(election_id)
                .ok_or_else(|| EngineError::NotFound(format!("election {}", election_id)))?;
            election.total_votes_cast += sum;
            for (cid, votes) in &allocations {
                if let Some(candidate) = state.candidates.get_mut(cid) {
                    candidate.total_votes += votes;
                }
            }
            let submitted = VotingPowerEntry {
                allocations,
                state: AllocationState::Submitted,
                ..entry
            };
            self.ledger.record(submitted.clone());
            submitted
        };
        info!(
            "submit_allocation: voter {} cast {} votes in election {}",
            voter_id, sum, election_id
        );
        self.persist()?;
        Ok(submitted)
    }

    // ******** Results *********

    pub fn compute_results(&self, election_id: &ElectionId) -> EngineResult<Vec<CandidateResult>> {
        results::compute_results(&self.catalog, &self.ledger, election_id)
    }

    /// Turnout against a caller-supplied eligible-voter count. The caller
    /// owns roll consistency; an understated count reads as over 100%.
    pub fn compute_turnout(
        &self,
        election_id: &ElectionId,
        eligible_voter_count: u64,
    ) -> EngineResult<f64> {
        results::compute_turnout(&self.catalog, &self.ledger, election_id, eligible_voter_count)
    }

    pub fn lead_margin(&self, election_id: &ElectionId) -> EngineResult<Option<f64>> {
        results::lead_margin(&self.catalog, &self.ledger, election_id)
    }

    pub fn winner(&self, election_id: &ElectionId) -> EngineResult<Option<CandidateResult>> {
        results::winner(&self.catalog, &self.ledger, election_id)
    }

    // ******** Polls (persisted pass-throughs) *********

    pub fn create_poll(&self, spec: PollSpec, now: DateTime<Utc>) -> EngineResult<Poll> {
        let poll = self.polls.create_poll(spec, now)?;
        self.persist()?;
        Ok(poll)
    }

    pub fn update_poll(&self, id: &PollId, patch: PollPatch) -> EngineResult<Poll> {
        let poll = self.polls.update_poll(id, patch)?;
        self.persist()?;
        Ok(poll)
    }

    pub fn delete_poll(&self, id: &PollId) -> EngineResult<()> {
        self.polls.delete_poll(id)?;
        self.persist()
    }

    pub fn vote_on_poll(
        &self,
        id: &PollId,
        option_index: usize,
        now: DateTime<Utc>,
    ) -> EngineResult<Poll> {
        let poll = self.polls.vote(id, option_index, now)?;
        self.persist()?;
        Ok(poll)
    }

    // ******** Persistence *********

    /// The current state as a snapshot for the persistence port.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.catalog.read();
        Snapshot {
            elections: state.elections.values().cloned().collect(),
            candidates: state.candidates.values().cloned().collect(),
            entries: self.ledger.all_entries(),
            polls: self.polls.all_polls(),
        }
    }

    fn restore(&self, snapshot: Snapshot) {
        {
            let mut state = self.catalog.write();
            state.elections.clear();
            state.candidates.clear();
            for election in snapshot.elections {
                state.elections.insert(election.id.clone(), election);
            }
            for candidate in snapshot.candidates {
                state.candidates.insert(candidate.id.clone(), candidate);
            }
        }
        self.ledger.restore(snapshot.entries);
        self.polls.restore(snapshot.polls);
    }

    fn persist(&self) -> EngineResult<()> {
        if let Err(err) = self.store.save(&self.snapshot()) {
            warn!("persist: state store rejected the snapshot: {}", err);
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod engine_tests;
