//! Results aggregation: rankings, vote shares, turnout and lead margin.
//!
//! Everything here is a pure function of the catalog and ledger state; the
//! aggregator holds no mutable state of its own.

use std::collections::BTreeMap;

use log::debug;

use crate::catalog::ElectionCatalog;
use crate::ledger::VotingPowerLedger;
use crate::model::{CandidateId, CandidateResult, ElectionId, EngineResult};

/// Per-candidate totals for an election, in ranking order: descending by
/// votes, ties broken by candidate id ascending so the ordering is
/// deterministic. Every roster candidate appears, including those with
/// zero votes.
pub(crate) fn compute_results(
    catalog: &ElectionCatalog,
    ledger: &VotingPowerLedger,
    election_id: &ElectionId,
) -> EngineResult<Vec<CandidateResult>> {
    let election = catalog.get_election(election_id)?;

    let mut tally: BTreeMap<CandidateId, u64> = election
        .candidates
        .iter()
        .map(|cid| (cid.clone(), 0))
        .collect();
    for entry in ledger.submitted_entries(election_id) {
        for (cid, votes) in &entry.allocations {
            if let Some(count) = tally.get_mut(cid) {
                *count += votes;
            }
        }
    }
    debug!("compute_results: {} tally: {:?}", election_id, tally);

    let total = election.total_votes_cast;
    let mut rows: Vec<CandidateResult> = Vec::with_capacity(tally.len());
    for (cid, votes) in tally {
        let candidate = catalog.get_candidate(&cid)?;
        let percentage = if total > 0 {
            votes as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        rows.push(CandidateResult {
            candidate,
            votes,
            percentage,
        });
    }
    // BTreeMap iteration already ordered the rows by candidate id, so a
    // stable sort on descending votes leaves ties id-ascending.
    rows.sort_by(|a, b| b.votes.cmp(&a.votes));
    Ok(rows)
}

/// Percentage of eligible voters who submitted an allocation. Zero when no
/// votes were cast or the eligible count is zero. The eligible count is
/// caller-supplied and not validated against the ledger: a roll smaller
/// than the actual submitter set yields a figure above 100.
pub(crate) fn compute_turnout(
    catalog: &ElectionCatalog,
    ledger: &VotingPowerLedger,
    election_id: &ElectionId,
    eligible_voter_count: u64,
) -> EngineResult<f64> {
    let election = catalog.get_election(election_id)?;
    if election.total_votes_cast == 0 || eligible_voter_count == 0 {
        return Ok(0.0);
    }
    let submitted = ledger.submitted_entries(election_id).len() as u64;
    Ok(submitted as f64 / eligible_voter_count as f64 * 100.0)
}

/// The percentage-point gap between the top two candidates, or `None`
/// when fewer than two candidates received votes.
pub(crate) fn lead_margin(
    catalog: &ElectionCatalog,
    ledger: &VotingPowerLedger,
    election_id: &ElectionId,
) -> EngineResult<Option<f64>> {
    let results = compute_results(catalog, ledger, election_id)?;
    let with_votes: Vec<&CandidateResult> = results.iter().filter(|r| r.votes > 0).collect();
    match with_votes.as_slice() {
        [first, second, ..] => Ok(Some(first.percentage - second.percentage)),
        _ => Ok(None),
    }
}

/// The leading candidate, or `None` while no votes have been cast.
pub(crate) fn winner(
    catalog: &ElectionCatalog,
    ledger: &VotingPowerLedger,
    election_id: &ElectionId,
) -> EngineResult<Option<CandidateResult>> {
    let results = compute_results(catalog, ledger, election_id)?;
    Ok(results.into_iter().find(|r| r.votes > 0))
}
