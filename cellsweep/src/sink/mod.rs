//! Deduplicating persistence of observed entities.
//!
//! Every scan session reports decoded entities to one shared [`Sink`]. The
//! sink is the only component that touches storage and the only owner of
//! the sighting counters. `report` is atomic per encounter id: concurrent
//! reports of the same id from different sessions store exactly one record,
//! and repeated reports are silently ignored.
//!
//! # Implementations
//!
//! | Sink | Storage | Dedup survives restart |
//! |------|---------|------------------------|
//! | [`MemorySink`] | `DashMap` | no |
//! | [`JsonLinesSink`] | append-only JSON-lines file | yes |
//! | [`AnnouncingSink`] | decorator, logs new sightings by name | inner |

mod announce;
mod jsonl;
mod memory;

pub use announce::AnnouncingSink;
pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entity::Entity;

/// Errors raised by a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Reading or writing the backing file failed.
    #[error("Storage I/O error on {path}: {source}")]
    Io {
        /// Backing file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An entity could not be serialized.
    #[error("Failed to encode entity: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Point-in-time sink counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Entities stored for the first time.
    pub inserted: u64,
    /// Reports ignored because the encounter was already stored.
    pub duplicates: u64,
}

impl SinkStats {
    /// Total number of reports received.
    pub fn reports(&self) -> u64 {
        self.inserted + self.duplicates
    }
}

/// Deduplicating entity store shared by all scan sessions.
pub trait Sink: Send + Sync {
    /// Stores `entity` unless its encounter id is already present.
    ///
    /// Returns `Ok(true)` if the entity was inserted and `Ok(false)` if it
    /// was a duplicate. A duplicate is never an error.
    fn report(&self, entity: &Entity) -> Result<bool, SinkError>;

    /// Current counters.
    fn stats(&self) -> SinkStats;
}

/// Lock-free counters backing [`SinkStats`].
#[derive(Debug, Default)]
pub(crate) struct SinkCounters {
    inserted: AtomicU64,
    duplicates: AtomicU64,
}

impl SinkCounters {
    pub(crate) fn record(&self, inserted: bool) {
        let counter = if inserted {
            &self.inserted
        } else {
            &self.duplicates
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SinkStats {
        SinkStats {
            inserted: self.inserted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }
}
