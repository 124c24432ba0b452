//! The persistence port. The engine is storage-agnostic: it talks to an
//! injected `StateStore` that can load and save a full state snapshot.
//! Production deployments would back this with a durable store; tests and
//! the default configuration use the in-memory stub.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::{Candidate, Election, EngineResult, VotingPowerEntry};
use crate::polls::Poll;

/// A serializable snapshot of the whole engine state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub elections: Vec<Election>,
    pub candidates: Vec<Candidate>,
    pub entries: Vec<VotingPowerEntry>,
    pub polls: Vec<Poll>,
}

/// Storage port injected into the engine.
pub trait StateStore: Send + Sync {
    /// Loads the last saved snapshot, or `None` for a fresh store.
    fn load(&self) -> EngineResult<Option<Snapshot>>;
    /// Persists a snapshot, replacing any previous one.
    fn save(&self, snapshot: &Snapshot) -> EngineResult<()>;
}

/// In-memory stub, the default store. Keeps the last snapshot in a slot.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    slot: Mutex<Option<Snapshot>>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    /// Pre-seeds the store so that an engine opened on it starts from the
    /// given snapshot.
    pub fn seeded(snapshot: Snapshot) -> InMemoryStore {
        InMemoryStore {
            slot: Mutex::new(Some(snapshot)),
        }
    }
}

impl StateStore for InMemoryStore {
    fn load(&self) -> EngineResult<Option<Snapshot>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> EngineResult<()> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_a_json_round_trip() {
        let snapshot = Snapshot::default();
        let text = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(snapshot, back);
    }

    #[test]
    fn in_memory_store_returns_last_saved() {
        let store = InMemoryStore::new();
        assert_eq!(store.load().unwrap(), None);
        let snapshot = Snapshot::default();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }
}
