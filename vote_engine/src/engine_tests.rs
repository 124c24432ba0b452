//! Engine-level tests: the full submission state machine, cascades and
//! persistence. Component-local behavior is tested next to each module.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::*;

pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn candidate(id: &str) -> Candidate {
        Candidate {
            id: CandidateId::from(id),
            name: format!("Candidate {}", id.to_uppercase()),
            party: "Test Party".to_string(),
            party_color: "#3B82F6".to_string(),
            slogan: "Building Tomorrow Together".to_string(),
            biography: "".to_string(),
            profile_image: "".to_string(),
            banner_image: "".to_string(),
            followers: 0,
            total_votes: 0,
        }
    }

    /// An engine with one election that is open at the returned `now`.
    pub(crate) fn engine_with_election(
        id: &str,
        budget: u64,
        roster: &[&str],
    ) -> (VotingEngine, DateTime<Utc>) {
        let engine = VotingEngine::new();
        for cid in roster {
            engine.add_candidate(candidate(cid)).unwrap();
        }
        let start = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
        engine
            .create_election(ElectionSpec {
                id: ElectionId::from(id),
                name: format!("Election {}", id),
                description: "".to_string(),
                start_date: start,
                end_date: start + Duration::days(30),
                votes_per_voter: budget,
                candidates: roster.iter().map(|c| CandidateId::from(*c)).collect(),
                is_active: true,
            })
            .unwrap();
        (engine, start + Duration::days(10))
    }

    pub(crate) fn request(pairs: &[(&str, i64)]) -> AllocationRequest {
        pairs
            .iter()
            .map(|(cid, count)| (CandidateId::from(*cid), *count))
            .collect()
    }
}

use fixtures::{engine_with_election, request};

#[test]
fn only_valid_ballots_change_election_state() {
    // Election with a budget of 100 and candidates A and B.
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");

    // V submits 60/30: fits in the budget.
    let entry = engine
        .submit_allocation(&VoterId::from("v"), &eid, &request(&[("a", 60), ("b", 30)]), now)
        .unwrap();
    assert_eq!(entry.state, AllocationState::Submitted);
    assert_eq!(entry.used_votes(), 90);
    assert_eq!(entry.total_votes, 100);

    // A retry of V always fails, whatever the payload.
    assert_eq!(
        engine.submit_allocation(&VoterId::from("v"), &eid, &request(&[("a", 10)]), now),
        Err(EngineError::AlreadySubmitted {
            voter: VoterId::from("v"),
            election: eid.clone(),
        })
    );

    // W overruns the budget.
    assert_eq!(
        engine.submit_allocation(&VoterId::from("w"), &eid, &request(&[("a", 150)]), now),
        Err(EngineError::BudgetExceeded {
            requested: 150,
            budget: 100,
        })
    );

    // X submits an empty ballot.
    assert_eq!(
        engine.submit_allocation(&VoterId::from("x"), &eid, &request(&[]), now),
        Err(EngineError::EmptyBallot)
    );

    // Y votes for a candidate who is not on the ballot.
    assert_eq!(
        engine.submit_allocation(&VoterId::from("y"), &eid, &request(&[("c", 5)]), now),
        Err(EngineError::UnknownCandidate(CandidateId::from("c")))
    );

    // Only V's ballot changed any state.
    let election = engine.catalog().get_election(&eid).unwrap();
    assert_eq!(election.total_votes_cast, 90);
    assert_eq!(
        engine
            .catalog()
            .get_candidate(&CandidateId::from("a"))
            .unwrap()
            .total_votes,
        60
    );
}

#[test]
fn zero_valued_allocations_are_dropped_on_submit() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b", "c"]);
    let eid = ElectionId::from("e");
    let entry = engine
        .submit_allocation(
            &VoterId::from("v"),
            &eid,
            &request(&[("a", 40), ("b", 0), ("c", 0)]),
            now,
        )
        .unwrap();
    assert_eq!(entry.allocations.len(), 1);
    assert_eq!(entry.used_votes(), 40);
    assert!(entry.used_votes() <= entry.total_votes);
}

#[test]
fn all_zero_ballot_is_an_empty_ballot() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");
    assert_eq!(
        engine.submit_allocation(
            &VoterId::from("v"),
            &eid,
            &request(&[("a", 0), ("b", 0)]),
            now
        ),
        Err(EngineError::EmptyBallot)
    );
}

#[test]
fn negative_counts_are_invalid() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");
    assert_eq!(
        engine.submit_allocation(
            &VoterId::from("v"),
            &eid,
            &request(&[("a", 10), ("b", -1)]),
            now
        ),
        Err(EngineError::InvalidAllocation {
            candidate: CandidateId::from("b"),
            count: -1,
        })
    );
    // Nothing was recorded.
    let entry = engine
        .voting_power(&VoterId::from("v"), &eid)
        .unwrap();
    assert_eq!(entry.state, AllocationState::Unallocated);
}

#[test]
fn precondition_order_unknown_candidate_before_budget() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");
    // Both violations present: the roster check fires first.
    assert_eq!(
        engine.submit_allocation(
            &VoterId::from("v"),
            &eid,
            &request(&[("zz", 500)]),
            now
        ),
        Err(EngineError::UnknownCandidate(CandidateId::from("zz")))
    );
}

#[test]
fn closed_elections_reject_ballots() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");

    // Before the window and after the window.
    let election = engine.catalog().get_election(&eid).unwrap();
    let before = election.start_date - Duration::seconds(1);
    let after = election.end_date + Duration::seconds(1);
    for at in [before, after] {
        assert_eq!(
            engine.submit_allocation(&VoterId::from("v"), &eid, &request(&[("a", 1)]), at),
            Err(EngineError::ElectionNotOpen(eid.clone()))
        );
    }

    // Administrative deactivation closes a time-active election too.
    engine
        .update_election(
            &eid,
            ElectionPatch {
                is_active: Some(false),
                ..ElectionPatch::default()
            },
        )
        .unwrap();
    assert_eq!(
        engine.submit_allocation(&VoterId::from("v"), &eid, &request(&[("a", 1)]), now),
        Err(EngineError::ElectionNotOpen(eid))
    );
}

#[test]
fn update_revalidates_the_merged_election_wholesale() {
    let (engine, _now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");
    let election = engine.catalog().get_election(&eid).unwrap();

    let res = engine.update_election(
        &eid,
        ElectionPatch {
            end_date: Some(election.start_date - Duration::days(1)),
            ..ElectionPatch::default()
        },
    );
    assert!(matches!(res, Err(EngineError::Validation(_))));
    // The stored election is untouched by the rejected patch.
    assert_eq!(engine.catalog().get_election(&eid).unwrap(), election);
}

#[test]
fn roster_cannot_drop_a_candidate_holding_votes() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b", "c"]);
    let eid = ElectionId::from("e");
    engine
        .submit_allocation(&VoterId::from("v"), &eid, &request(&[("a", 60), ("b", 30)]), now)
        .unwrap();

    // Dropping a candidate nobody voted for is a legal shrink.
    engine
        .update_election(
            &eid,
            ElectionPatch {
                candidates: Some(vec![CandidateId::from("a"), CandidateId::from("b")]),
                ..ElectionPatch::default()
            },
        )
        .unwrap();

    // Dropping a candidate with recorded votes would desynchronize the
    // tally from total_votes_cast, so the patch is rejected.
    let res = engine.update_election(
        &eid,
        ElectionPatch {
            candidates: Some(vec![CandidateId::from("a")]),
            ..ElectionPatch::default()
        },
    );
    assert!(matches!(res, Err(EngineError::Validation(_))));

    // Every cast vote is still accounted for in the shares.
    let results = engine.compute_results(&eid).unwrap();
    let sum: f64 = results.iter().map(|r| r.percentage).sum();
    assert!((sum - 100.0).abs() < 1e-9);
    assert_eq!(
        engine.catalog().get_election(&eid).unwrap().total_votes_cast,
        90
    );
}

#[test]
fn budget_changes_do_not_reach_existing_entries() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");
    let voter = VoterId::from("v");

    let entry = engine.voting_power(&voter, &eid).unwrap();
    assert_eq!(entry.total_votes, 100);

    engine
        .update_election(
            &eid,
            ElectionPatch {
                votes_per_voter: Some(10),
                ..ElectionPatch::default()
            },
        )
        .unwrap();

    // The frozen budget still applies to this voter...
    let entry = engine.voting_power(&voter, &eid).unwrap();
    assert_eq!(entry.total_votes, 100);
    engine
        .submit_allocation(&voter, &eid, &request(&[("a", 80)]), now)
        .unwrap();

    // ...while a fresh voter gets the new one.
    let fresh = engine.voting_power(&VoterId::from("w"), &eid).unwrap();
    assert_eq!(fresh.total_votes, 10);
}

#[test]
fn delete_cascades_into_the_ledger() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");
    engine
        .submit_allocation(&VoterId::from("v"), &eid, &request(&[("a", 10)]), now)
        .unwrap();

    engine.delete_election(&eid).unwrap();
    assert!(matches!(
        engine.catalog().get_election(&eid),
        Err(EngineError::NotFound(_))
    ));
    // No orphaned ledger entry survives the cascade.
    assert!(engine.snapshot().entries.is_empty());
    assert!(matches!(
        engine.delete_election(&eid),
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn concurrent_double_submission_commits_at_most_once() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let engine = Arc::new(engine);
    let eid = ElectionId::from("e");

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        let eid = eid.clone();
        handles.push(thread::spawn(move || {
            engine.submit_allocation(
                &VoterId::from("racer"),
                &eid,
                &request(&[("a", 10 + i)]),
                now,
            )
        }));
    }
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes: Vec<_> = outcomes.iter().filter(|r| r.is_ok()).collect();
    assert_eq!(successes.len(), 1);
    assert!(outcomes
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(EngineError::AlreadySubmitted { .. }))));

    // The totals were bumped exactly once, by the winning ballot.
    let election = engine.catalog().get_election(&eid).unwrap();
    let entry = engine
        .voting_power(&VoterId::from("racer"), &eid)
        .unwrap();
    assert_eq!(election.total_votes_cast, entry.used_votes());
}

#[test]
fn independent_keys_submit_in_parallel() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let engine = Arc::new(engine);
    let eid = ElectionId::from("e");

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let eid = eid.clone();
            thread::spawn(move || {
                engine.submit_allocation(
                    &VoterId::from(format!("voter-{}", i)),
                    &eid,
                    &request(&[("a", 2), ("b", 3)]),
                    now,
                )
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    let election = engine.catalog().get_election(&eid).unwrap();
    assert_eq!(election.total_votes_cast, 16 * 5);
    let results = engine.compute_results(&eid).unwrap();
    assert_eq!(results[0].votes, 16 * 3);
    assert_eq!(results[1].votes, 16 * 2);
}

#[test]
fn engine_reopens_from_the_store() {
    let (engine, now) = engine_with_election("e", 100, &["a", "b"]);
    let eid = ElectionId::from("e");
    engine
        .submit_allocation(&VoterId::from("v"), &eid, &request(&[("a", 60), ("b", 30)]), now)
        .unwrap();
    let saved = engine.snapshot();

    let reopened = VotingEngine::open(Box::new(InMemoryStore::seeded(saved))).unwrap();
    let election = reopened.catalog().get_election(&eid).unwrap();
    assert_eq!(election.total_votes_cast, 90);
    // The submitted state machine position survives the round trip.
    assert_eq!(
        reopened.submit_allocation(&VoterId::from("v"), &eid, &request(&[("a", 1)]), now),
        Err(EngineError::AlreadySubmitted {
            voter: VoterId::from("v"),
            election: eid,
        })
    );
}

#[test]
fn first_query_budget_survives_a_reopen() {
    // Two engines sharing one store slot, as a restart would.
    struct SharedStore(Arc<InMemoryStore>);
    impl StateStore for SharedStore {
        fn load(&self) -> EngineResult<Option<Snapshot>> {
            self.0.load()
        }
        fn save(&self, snapshot: &Snapshot) -> EngineResult<()> {
            self.0.save(snapshot)
        }
    }

    let slot = Arc::new(InMemoryStore::new());
    let engine = VotingEngine::open(Box::new(SharedStore(Arc::clone(&slot)))).unwrap();
    for cid in ["a", "b"] {
        engine.add_candidate(fixtures::candidate(cid)).unwrap();
    }
    let start = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
    engine
        .create_election(ElectionSpec {
            id: ElectionId::from("e"),
            name: "Election e".to_string(),
            description: "".to_string(),
            start_date: start,
            end_date: start + Duration::days(30),
            votes_per_voter: 100,
            candidates: vec![CandidateId::from("a"), CandidateId::from("b")],
            is_active: true,
        })
        .unwrap();

    let voter = VoterId::from("v");
    let eid = ElectionId::from("e");
    assert_eq!(engine.voting_power(&voter, &eid).unwrap().total_votes, 100);

    // The entry created by the query alone was persisted, so the frozen
    // budget survives a reopen and a subsequent budget change.
    let reopened = VotingEngine::open(Box::new(SharedStore(slot))).unwrap();
    reopened
        .update_election(
            &eid,
            ElectionPatch {
                votes_per_voter: Some(10),
                ..ElectionPatch::default()
            },
        )
        .unwrap();
    assert_eq!(reopened.voting_power(&voter, &eid).unwrap().total_votes, 100);
    assert_eq!(
        reopened
            .voting_power(&VoterId::from("w"), &eid)
            .unwrap()
            .total_votes,
        10
    );
}

#[test]
fn voting_power_for_missing_election_is_not_created() {
    let (engine, _now) = engine_with_election("e", 100, &["a", "b"]);
    assert!(matches!(
        engine.voting_power(&VoterId::from("v"), &ElectionId::from("missing")),
        Err(EngineError::NotFound(_))
    ));
    assert!(engine.snapshot().entries.is_empty());
}
