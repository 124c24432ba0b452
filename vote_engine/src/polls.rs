//! Simple opinion polls: single-choice questions with per-option counters.
//!
//! Polls are deliberately much weaker than elections: there is no voter
//! budget, no per-voter deduplication and no ledger, matching the
//! single-session counters of the original platform.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{EngineError, EngineResult, PollId, VoterId};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    /// One counter per option, same order as `options`.
    pub votes: Vec<u64>,
    pub created_by: VoterId,
    pub created_at: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub category: String,
}

/// A new poll. Counters and the creation timestamp are derived.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollSpec {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub created_by: VoterId,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub category: String,
}

/// Partial poll update. Option lists cannot shrink below the recorded
/// counters, so options are not patchable.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub category: Option<String>,
}

/// Store of opinion polls, insertion-ordered.
#[derive(Debug, Default)]
pub struct PollBoard {
    polls: RwLock<IndexMap<PollId, Poll>>,
}

impl PollBoard {
    pub fn new() -> PollBoard {
        PollBoard::default()
    }

    pub fn create_poll(&self, spec: PollSpec, now: DateTime<Utc>) -> EngineResult<Poll> {
        if spec.options.len() < 2 {
            return Err(EngineError::Validation(
                "a poll needs at least two options".to_string(),
            ));
        }
        let mut polls = self.polls.write();
        if polls.contains_key(&spec.id) {
            return Err(EngineError::Validation(format!(
                "a poll with id {} already exists",
                spec.id
            )));
        }
        let poll = Poll {
            id: spec.id,
            title: spec.title,
            description: spec.description,
            votes: vec![0; spec.options.len()],
            options: spec.options,
            created_by: spec.created_by,
            created_at: now,
            end_date: spec.end_date,
            is_active: spec.is_active,
            category: spec.category,
        };
        debug!("create_poll: {}", poll.id);
        polls.insert(poll.id.clone(), poll.clone());
        Ok(poll)
    }

    pub fn get_poll(&self, id: &PollId) -> EngineResult<Poll> {
        self.polls
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("poll {}", id)))
    }

    pub fn list_polls(&self) -> Vec<Poll> {
        self.polls.read().values().cloned().collect()
    }

    pub fn update_poll(&self, id: &PollId, patch: PollPatch) -> EngineResult<Poll> {
        let mut polls = self.polls.write();
        let poll = polls
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("poll {}", id)))?;
        if let Some(title) = patch.title {
            poll.title = title;
        }
        if let Some(description) = patch.description {
            poll.description = description;
        }
        if let Some(end_date) = patch.end_date {
            poll.end_date = end_date;
        }
        if let Some(is_active) = patch.is_active {
            poll.is_active = is_active;
        }
        if let Some(category) = patch.category {
            poll.category = category;
        }
        Ok(poll.clone())
    }

    pub fn delete_poll(&self, id: &PollId) -> EngineResult<()> {
        self.polls
            .write()
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("poll {}", id)))
    }

    /// Records one vote for the option at `option_index`.
    pub fn vote(&self, id: &PollId, option_index: usize, now: DateTime<Utc>) -> EngineResult<Poll> {
        let mut polls = self.polls.write();
        let poll = polls
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("poll {}", id)))?;
        if !poll.is_active || now > poll.end_date {
            return Err(EngineError::ClosedPoll(id.clone()));
        }
        match poll.votes.get_mut(option_index) {
            Some(counter) => *counter += 1,
            None => {
                return Err(EngineError::UnknownOption {
                    poll: id.clone(),
                    index: option_index,
                })
            }
        }
        Ok(poll.clone())
    }

    pub(crate) fn all_polls(&self) -> Vec<Poll> {
        self.list_polls()
    }

    pub(crate) fn restore(&self, polls: Vec<Poll>) {
        let mut map = self.polls.write();
        map.clear();
        for poll in polls {
            map.insert(poll.id.clone(), poll);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn spec(id: &str, now: DateTime<Utc>) -> PollSpec {
        PollSpec {
            id: PollId::from(id),
            title: "Best language".to_string(),
            description: "".to_string(),
            options: vec!["Rust".to_string(), "Go".to_string(), "Python".to_string()],
            created_by: VoterId::from("admin"),
            end_date: now + Duration::days(30),
            is_active: true,
            category: "Technology".to_string(),
        }
    }

    #[test]
    fn voting_counts_per_option() {
        let board = PollBoard::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let poll = board.create_poll(spec("p1", now), now).unwrap();
        assert_eq!(poll.votes, vec![0, 0, 0]);

        board.vote(&poll.id, 0, now).unwrap();
        board.vote(&poll.id, 0, now).unwrap();
        let after = board.vote(&poll.id, 2, now).unwrap();
        assert_eq!(after.votes, vec![2, 0, 1]);
    }

    #[test]
    fn closed_and_out_of_range_votes_are_rejected() {
        let board = PollBoard::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let poll = board.create_poll(spec("p1", now), now).unwrap();

        assert!(matches!(
            board.vote(&poll.id, 7, now),
            Err(EngineError::UnknownOption { index: 7, .. })
        ));
        assert!(matches!(
            board.vote(&poll.id, 0, now + Duration::days(31)),
            Err(EngineError::ClosedPoll(_))
        ));

        board
            .update_poll(
                &poll.id,
                PollPatch {
                    is_active: Some(false),
                    ..PollPatch::default()
                },
            )
            .unwrap();
        assert!(matches!(
            board.vote(&poll.id, 0, now),
            Err(EngineError::ClosedPoll(_))
        ));
    }

    #[test]
    fn a_poll_needs_two_options() {
        let board = PollBoard::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let mut s = spec("p1", now);
        s.options.truncate(1);
        assert!(matches!(
            board.create_poll(s, now),
            Err(EngineError::Validation(_))
        ));
    }
}
