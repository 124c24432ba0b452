use chrono::{DateTime, Utc};

use crate::model::{CandidateId, ElectionId, ElectionSpec, EngineError, EngineResult};

/// A builder for election specifications.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use vote_engine::ElectionBuilder;
/// # use vote_engine::EngineError;
///
/// let start = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2024, 11, 30, 0, 0, 0).unwrap();
///
/// let spec = ElectionBuilder::new("pres-2024", "2024 Presidential Election")
///     .description("Choose the next president")
///     .window(start, end)
///     .votes_per_voter(100)
///     .candidate("sarah-johnson")
///     .candidate("robert-martinez")
///     .build()?;
///
/// assert_eq!(spec.candidates.len(), 2);
/// # Ok::<(), EngineError>(())
/// ```
pub struct ElectionBuilder {
    id: ElectionId,
    name: String,
    description: String,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    votes_per_voter: u64,
    candidates: Vec<CandidateId>,
    is_active: bool,
}

impl ElectionBuilder {
    pub fn new(id: impl Into<ElectionId>, name: impl Into<String>) -> ElectionBuilder {
        ElectionBuilder {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            window: None,
            votes_per_voter: 1,
            candidates: Vec::new(),
            is_active: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> ElectionBuilder {
        self.description = description.into();
        self
    }

    /// The voting window. Both bounds are inclusive-active.
    pub fn window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> ElectionBuilder {
        self.window = Some((start, end));
        self
    }

    pub fn votes_per_voter(mut self, budget: u64) -> ElectionBuilder {
        self.votes_per_voter = budget;
        self
    }

    /// Appends one candidate to the roster, in ballot order.
    pub fn candidate(mut self, id: impl Into<CandidateId>) -> ElectionBuilder {
        self.candidates.push(id.into());
        self
    }

    /// Starts the election administratively deactivated.
    pub fn deactivated(mut self) -> ElectionBuilder {
        self.is_active = false;
        self
    }

    /// Assembles the specification. Full invariant checking happens in
    /// the catalog on creation; the builder only rejects a missing
    /// voting window.
    pub fn build(self) -> EngineResult<ElectionSpec> {
        let (start_date, end_date) = self.window.ok_or_else(|| {
            EngineError::Validation("an election needs a voting window".to_string())
        })?;
        Ok(ElectionSpec {
            id: self.id,
            name: self.name,
            description: self.description,
            start_date,
            end_date,
            votes_per_voter: self.votes_per_voter,
            candidates: self.candidates,
            is_active: self.is_active,
        })
    }
}
