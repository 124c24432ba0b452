/*!

# Quick start

This example registers two candidates, opens an election with a budget of
100 votes per voter, submits one ballot and reads the results.

```
use chrono::{Duration, TimeZone, Utc};
use vote_engine::{ElectionBuilder, ElectionId, VoterId, VotingEngine};
# use vote_engine::EngineError;

let engine = VotingEngine::new();

// Candidates are registered once and shared across elections.
for (id, name, party) in [
    ("anna", "Anna", "Progressive Party"),
    ("bob", "Bob", "Conservative Alliance"),
] {
    engine.add_candidate(vote_engine::Candidate {
        id: id.into(),
        name: name.to_string(),
        party: party.to_string(),
        party_color: "#3B82F6".to_string(),
        slogan: String::new(),
        biography: String::new(),
        profile_image: String::new(),
        banner_image: String::new(),
        followers: 0,
        total_votes: 0,
    })?;
}

// The election window is inclusive at both ends.
let start = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
let spec = ElectionBuilder::new("pres-2024", "2024 Presidential Election")
    .window(start, start + Duration::days(30))
    .votes_per_voter(100)
    .candidate("anna")
    .candidate("bob")
    .build()?;
engine.create_election(spec)?;

// A voter splits their budget 60/30 (10 votes left unused is fine).
let now = start + Duration::days(10);
let eid = ElectionId::from("pres-2024");
let ballot: vote_engine::AllocationRequest =
    [("anna".into(), 60), ("bob".into(), 30)].into_iter().collect();
let entry = engine.submit_allocation(&VoterId::from("v-1"), &eid, &ballot, now)?;
assert_eq!(entry.used_votes(), 90);

// Rankings are descending by votes; percentages are shares of the cast total.
let results = engine.compute_results(&eid)?;
assert_eq!(results[0].candidate.name, "Anna");
assert!((results[0].percentage - 200.0 / 3.0).abs() < 1e-9);

// A second ballot from the same voter is rejected: allocations are final.
let retry = engine.submit_allocation(&VoterId::from("v-1"), &eid, &ballot, now);
assert!(retry.is_err());
# Ok::<(), EngineError>(())
```

The engine never reads the system clock: `now` is injected on every call
that needs it, which keeps lifecycle behavior fully testable. For replaying
whole scenarios from a file, see the `smartvote` command line tool.

*/
