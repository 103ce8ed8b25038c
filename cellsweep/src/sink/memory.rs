//! In-memory sink.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Sink, SinkCounters, SinkError, SinkStats};
use crate::entity::{EncounterId, Entity};

/// Sink keeping every stored entity in a concurrent map.
///
/// Insert-if-absent goes through `DashMap::entry`, which holds the shard
/// lock for the key, so racing reports of one encounter store it once.
#[derive(Debug, Default)]
pub struct MemorySink {
    entities: DashMap<EncounterId, Entity>,
    counters: SinkCounters,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored entity for `id`.
    pub fn get(&self, id: EncounterId) -> Option<Entity> {
        self.entities.get(&id).map(|e| e.value().clone())
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Snapshot of all stored entities ordered by encounter id.
    pub fn entities(&self) -> Vec<Entity> {
        let mut all: Vec<Entity> = self.entities.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.encounter_id);
        all
    }
}

impl Sink for MemorySink {
    fn report(&self, entity: &Entity) -> Result<bool, SinkError> {
        let inserted = match self.entities.entry(entity.encounter_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entity.clone());
                true
            }
        };
        self.counters.record(inserted);
        Ok(inserted)
    }

    fn stats(&self) -> SinkStats {
        self.counters.snapshot()
    }
}
