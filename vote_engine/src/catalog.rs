//! The election catalog: the authoritative store of elections and
//! candidates.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, info};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::lifecycle;
use crate::model::{
    Candidate, CandidateId, Election, ElectionFilter, ElectionId, ElectionPatch, ElectionSpec,
    EngineError, EngineResult,
};

/// The mutable catalog state, behind a single lock. Insertion order of the
/// maps is the listing order.
#[derive(Debug, Default)]
pub(crate) struct CatalogState {
    pub(crate) elections: IndexMap<ElectionId, Election>,
    pub(crate) candidates: IndexMap<CandidateId, Candidate>,
}

/// Authoritative store of elections and candidate profiles.
///
/// All methods take `&self`; interior locking makes the catalog safe to
/// share between threads. Mutations are serialized by the write lock,
/// which the engine also holds while cascading an election deletion into
/// the ledger.
#[derive(Debug, Default)]
pub struct ElectionCatalog {
    state: RwLock<CatalogState>,
}

impl ElectionCatalog {
    pub fn new() -> ElectionCatalog {
        ElectionCatalog::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, CatalogState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write()
    }

    // ******** Elections *********

    pub fn get_election(&self, id: &ElectionId) -> EngineResult<Election> {
        let state = self.state.read();
        state
            .elections
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("election {}", id)))
    }

    /// Lists elections in insertion order. The filter is a conjunction of
    /// all provided predicates; the status predicate is evaluated against
    /// the status derived at `now`.
    pub fn list_elections(&self, filter: &ElectionFilter, now: DateTime<Utc>) -> Vec<Election> {
        let state = self.state.read();
        let needle = filter.search_text.as_ref().map(|s| s.to_lowercase());
        state
            .elections
            .values()
            .filter(|e| match filter.status {
                Some(status) => lifecycle::derive_status(e, now) == status,
                None => true,
            })
            .filter(|e| match &needle {
                Some(text) => {
                    e.name.to_lowercase().contains(text)
                        || e.description.to_lowercase().contains(text)
                }
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Creates an election from a validated specification.
    ///
    /// The derived `total_votes_cast` counter starts at zero.
    pub fn create_election(&self, spec: ElectionSpec) -> EngineResult<Election> {
        let mut state = self.state.write();
        if state.elections.contains_key(&spec.id) {
            return Err(EngineError::Validation(format!(
                "an election with id {} already exists",
                spec.id
            )));
        }
        let election = Election::from_spec(spec);
        validate_election(&state, &election)?;
        info!(
            "create_election: {} ({} candidates, {} votes per voter)",
            election.id,
            election.candidates.len(),
            election.votes_per_voter
        );
        state.elections.insert(election.id.clone(), election.clone());
        Ok(election)
    }

    // ******** Candidates *********

    /// Registers a candidate profile. Candidates are shared across
    /// elections and referenced from rosters by id.
    pub fn add_candidate(&self, candidate: Candidate) -> EngineResult<Candidate> {
        let mut state = self.state.write();
        if state.candidates.contains_key(&candidate.id) {
            return Err(EngineError::Validation(format!(
                "a candidate with id {} already exists",
                candidate.id
            )));
        }
        debug!("add_candidate: {} ({})", candidate.id, candidate.name);
        state
            .candidates
            .insert(candidate.id.clone(), candidate.clone());
        Ok(candidate)
    }

    pub fn get_candidate(&self, id: &CandidateId) -> EngineResult<Candidate> {
        let state = self.state.read();
        state
            .candidates
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("candidate {}", id)))
    }

    pub fn list_candidates(&self) -> Vec<Candidate> {
        let state = self.state.read();
        state.candidates.values().cloned().collect()
    }

    /// Records one more follower for the candidate and returns the new
    /// follower count.
    pub fn follow_candidate(&self, id: &CandidateId) -> EngineResult<u64> {
        let mut state = self.state.write();
        let candidate = state
            .candidates
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("candidate {}", id)))?;
        candidate.followers += 1;
        Ok(candidate.followers)
    }
}

/// Merges a partial update into an election. Absent fields are left
/// untouched.
pub(crate) fn apply_patch(election: &mut Election, patch: ElectionPatch) {
    if let Some(name) = patch.name {
        election.name = name;
    }
    if let Some(description) = patch.description {
        election.description = description;
    }
    if let Some(start_date) = patch.start_date {
        election.start_date = start_date;
    }
    if let Some(end_date) = patch.end_date {
        election.end_date = end_date;
    }
    if let Some(votes_per_voter) = patch.votes_per_voter {
        election.votes_per_voter = votes_per_voter;
    }
    if let Some(candidates) = patch.candidates {
        election.candidates = candidates;
    }
    if let Some(is_active) = patch.is_active {
        election.is_active = is_active;
    }
}

/// Invariants checked on creation and after every merge:
/// `start_date < end_date`, a budget of at least one vote, a roster of at
/// least one known candidate.
pub(crate) fn validate_election(state: &CatalogState, election: &Election) -> EngineResult<()> {
    if election.start_date >= election.end_date {
        return Err(EngineError::Validation(format!(
            "start date {} must precede end date {}",
            election.start_date, election.end_date
        )));
    }
    if election.votes_per_voter < 1 {
        return Err(EngineError::Validation(
            "votes_per_voter must be at least 1".to_string(),
        ));
    }
    if election.candidates.is_empty() {
        return Err(EngineError::Validation(
            "an election needs at least one candidate".to_string(),
        ));
    }
    for cid in &election.candidates {
        if !state.candidates.contains_key(cid) {
            return Err(EngineError::Validation(format!(
                "roster references unregistered candidate {}",
                cid
            )));
        }
    }
    Ok(())
}
