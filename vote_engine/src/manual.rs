/*!

This is the long-form manual for `vote_engine` and `smartvote`.

## The allocation model

Every election grants each voter the same budget of votes
(`votesPerVoter`). A ballot is a mapping from candidate to a vote count;
the sum of the counts must be between 1 and the budget. Partial spending
is allowed (leftover votes simply expire), revising a submitted ballot is
not. The budget is frozen per voter the first time their voting power is
queried, so an administrator raising or lowering `votesPerVoter`
mid-election never invalidates ballots already in flight.

An election is open for ballots when both of these hold:

* the injected `now` lies inside `[startDate, endDate]` (both bounds
  inclusive), and
* the administrative `isActive` flag is set.

The flag is a kill-switch: clearing it closes a time-active election, but
setting it never opens an election outside its window.

## Scenario files

`smartvote` replays a scenario described in a single JSON document:

```text
{
  "now": "2024-11-10T00:00:00Z",
  "eligibleVoters": 50,
  "candidates": [
    {"id": "anna", "name": "Anna", "party": "Progressive Party",
     "partyColor": "#3B82F6"}
  ],
  "elections": [
    {"id": "pres-2024", "name": "2024 Presidential Election",
     "description": "Choose the next president",
     "startDate": "2024-11-01T00:00:00Z",
     "endDate": "2024-11-30T00:00:00Z",
     "votesPerVoter": 100,
     "candidates": ["anna"],
     "isActive": true}
  ],
  "submissions": [
    {"voterId": "v-1", "electionId": "pres-2024",
     "allocations": {"anna": 60}}
  ]
}
```

Notes:

- `now` (string, optional): the RFC 3339 instant at which the scenario
  runs. Defaults to the wall clock, and the `--now` command line option
  overrides both.
- `eligibleVoters` (number, optional): size of the voter roll, used for
  the turnout figure. Without it, turnout is reported against a roll of
  zero, which reads as 0%.
- Submissions are replayed in file order. A rejected submission does not
  abort the replay; its typed error is recorded in the summary instead,
  so scenarios can exercise failure paths on purpose.

The summary written to standard output (or `--out`) contains, per
election, the derived status, the ranked tally with vote shares, the
winner, the lead margin and the turnout, plus the outcome of every
submission in replay order.

*/
