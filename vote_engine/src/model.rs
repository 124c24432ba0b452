// ********* Identifiers ***********

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

id_newtype!(
    /// Identifier of an election in the catalog.
    ElectionId
);
id_newtype!(
    /// Identifier of a candidate. Candidates are shared across elections.
    CandidateId
);
id_newtype!(
    /// Identifier of a voter. Voter identity is established by an external
    /// collaborator; the engine only uses it as a ledger key.
    VoterId
);
id_newtype!(
    /// Identifier of a simple opinion poll.
    PollId
);

// ******** Input data structures *********

/// The specification of a new election, as submitted by an administrator.
///
/// Derived fields (`total_votes_cast`) are not part of the specification;
/// they are defaulted by the catalog on creation.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub id: ElectionId,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// The vote budget granted to each voter for this election.
    pub votes_per_voter: u64,
    /// Roster of candidates, in ballot order.
    pub candidates: Vec<CandidateId>,
    /// Administrative kill-switch, independent of the time-derived status.
    pub is_active: bool,
}

/// A partial update to an election. Absent fields are left untouched.
/// The merged election is re-validated as a whole.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub votes_per_voter: Option<u64>,
    pub candidates: Option<Vec<CandidateId>>,
    pub is_active: Option<bool>,
}

/// A raw allocation request: requested vote counts per candidate, as they
/// arrive from the outside world. Counts are signed on purpose so that a
/// negative count is rejected with a typed error instead of being mangled
/// by an unchecked cast at the call site.
pub type AllocationRequest = BTreeMap<CandidateId, i64>;

/// Filter for listing elections. All provided predicates must match.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ElectionFilter {
    /// Match against the status derived at the query's `now`.
    pub status: Option<ElectionStatus>,
    /// Case-insensitive substring match against name or description.
    pub search_text: Option<String>,
}

// ******** Engine state *********

/// An election as held by the catalog.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Election {
    pub id: ElectionId,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub votes_per_voter: u64,
    pub candidates: Vec<CandidateId>,
    pub is_active: bool,
    /// Total votes recorded across all submitted allocations.
    /// Maintained by the ledger, read by the aggregator.
    pub total_votes_cast: u64,
}

impl Election {
    pub(crate) fn from_spec(spec: ElectionSpec) -> Election {
        Election {
            id: spec.id,
            name: spec.name,
            description: spec.description,
            start_date: spec.start_date,
            end_date: spec.end_date,
            votes_per_voter: spec.votes_per_voter,
            candidates: spec.candidates,
            is_active: spec.is_active,
            total_votes_cast: 0,
        }
    }
}

/// A candidate profile. The vote counter is derived state owned by the
/// ledger; everything else is campaign material managed by administrators.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    pub party_color: String,
    pub slogan: String,
    pub biography: String,
    pub profile_image: String,
    pub banner_image: String,
    pub followers: u64,
    /// Cumulative votes received across all elections. Derived.
    pub total_votes: u64,
}

/// States of a voter's allocation for one election.
///
/// There is no transition back from `Submitted`: vote revocation would
/// need an explicit amendment protocol, which is out of scope.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum AllocationState {
    /// Entry exists but no ballot has been submitted yet.
    Unallocated,
    /// Terminal: the allocations are recorded and immutable.
    Submitted,
}

/// Per (voter, election) voting power: the frozen budget and the recorded
/// allocations.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VotingPowerEntry {
    pub voter_id: VoterId,
    pub election_id: ElectionId,
    /// Budget copied from the election's `votes_per_voter` when the entry
    /// was first created. Administrative budget changes after that point
    /// do not touch existing entries.
    pub total_votes: u64,
    /// Recorded allocations. Zero-valued entries are dropped on submit.
    pub allocations: BTreeMap<CandidateId, u64>,
    pub state: AllocationState,
}

impl VotingPowerEntry {
    pub(crate) fn unallocated(
        voter_id: VoterId,
        election_id: ElectionId,
        budget: u64,
    ) -> VotingPowerEntry {
        VotingPowerEntry {
            voter_id,
            election_id,
            total_votes: budget,
            allocations: BTreeMap::new(),
            state: AllocationState::Unallocated,
        }
    }

    /// The number of votes consumed out of the budget.
    pub fn used_votes(&self) -> u64 {
        self.allocations.values().sum()
    }
}

/// Time-derived election status. Independent of the administrative
/// `is_active` flag.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    Upcoming,
    Active,
    Completed,
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ElectionStatus::Upcoming => "upcoming",
            ElectionStatus::Active => "active",
            ElectionStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

// ******** Output data structures *********

/// One row of an election's tally.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct CandidateResult {
    pub candidate: Candidate,
    pub votes: u64,
    /// Share of `total_votes_cast`, in percent. Zero when nothing was cast.
    pub percentage: f64,
}

// ******** Errors *********

/// Errors reported by the engine. All of them are recoverable: callers are
/// responsible for user-facing messaging.
#[derive(Eq, PartialEq, Debug, Clone, Error)]
pub enum EngineError {
    /// The referenced election, candidate or poll does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed create/update input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Allocation attempted outside the active window or while the
    /// election is administratively deactivated.
    #[error("election {0} is not open for voting")]
    ElectionNotOpen(ElectionId),
    /// A second submission for the same (voter, election) pair.
    #[error("voter {voter} has already submitted a ballot for election {election}")]
    AlreadySubmitted {
        voter: VoterId,
        election: ElectionId,
    },
    /// The allocation references a candidate outside the election roster.
    #[error("candidate {0} is not on the ballot for this election")]
    UnknownCandidate(CandidateId),
    /// A negative vote count.
    #[error("invalid vote count {count} for candidate {candidate}")]
    InvalidAllocation { candidate: CandidateId, count: i64 },
    /// A submission that sums to zero.
    #[error("a ballot must allocate at least one vote")]
    EmptyBallot,
    /// A submission that sums past the voter's budget.
    #[error("allocated {requested} votes but the budget is {budget}")]
    BudgetExceeded { requested: u64, budget: u64 },
    /// A vote on a poll that has ended or was deactivated.
    #[error("poll {0} is closed")]
    ClosedPoll(PollId),
    /// A vote for a poll option index that does not exist.
    #[error("poll {poll} has no option at index {index}")]
    UnknownOption { poll: PollId, index: usize },
    /// Failure in the injected persistence port.
    #[error("state store failure: {0}")]
    Store(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
