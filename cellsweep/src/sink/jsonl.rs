//! Append-only JSON-lines sink.
//!
//! Each newly observed entity becomes one line of JSON. Existing lines are
//! read back when the file is opened so deduplication holds across runs.
//! A line that fails to parse (typically a torn final write after a crash)
//! is skipped with a warning.
//!
//! Each record is written with a single unbuffered `write_all`. When that
//! fails the file is cut back to its length before the write, so a retry of
//! the same entity never leaves a duplicate or a torn line behind. If the
//! cut itself fails the sink refuses further writes.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{info, warn};

use super::{Sink, SinkCounters, SinkError, SinkStats};
use crate::entity::{EncounterId, Entity};

/// Append target that can be cut back after a failed write.
trait RecordFile: Write + Send {
    /// Current length in bytes.
    fn end(&mut self) -> io::Result<u64>;

    /// Discards everything past `len`.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl RecordFile for File {
    fn end(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

struct JsonLinesInner {
    seen: HashSet<EncounterId>,
    file: Box<dyn RecordFile>,
    poisoned: bool,
}

impl JsonLinesInner {
    /// Appends `record`, rolling the file back if the write fails.
    fn append(&mut self, record: &[u8]) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("sighting store disabled after a failed rollback"));
        }

        let before = self.file.end()?;
        let Err(write_err) = self.file.write_all(record) else {
            return Ok(());
        };

        if let Err(e) = self.file.truncate(before) {
            warn!(error = %e, length = before, "Rollback of partial record failed");
            self.poisoned = true;
        }
        Err(write_err)
    }
}

/// Sink appending new entities to a JSON-lines file.
///
/// All reports are serialized through one mutex; the dedup check and the
/// append happen under the same lock.
pub struct JsonLinesSink {
    path: PathBuf,
    inner: Mutex<JsonLinesInner>,
    counters: SinkCounters,
}

impl std::fmt::Debug for JsonLinesSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink")
            .field("path", &self.path)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl JsonLinesSink {
    /// Opens (or creates) the file at `path`, loading already stored ids.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let seen = load_existing(&path)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SinkError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        info!(
            path = %path.display(),
            existing = seen.len(),
            "Opened sighting store"
        );

        Ok(Self::from_parts(path, seen, Box::new(file)))
    }

    fn from_parts(path: PathBuf, seen: HashSet<EncounterId>, file: Box<dyn RecordFile>) -> Self {
        Self {
            path,
            inner: Mutex::new(JsonLinesInner {
                seen,
                file,
                poisoned: false,
            }),
            counters: SinkCounters::default(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct encounters stored, including earlier runs.
    pub fn len(&self) -> usize {
        self.inner.lock().seen.len()
    }

    /// Returns true if the file holds no encounters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for JsonLinesSink {
    fn report(&self, entity: &Entity) -> Result<bool, SinkError> {
        let mut inner = self.inner.lock();

        if inner.seen.contains(&entity.encounter_id) {
            drop(inner);
            self.counters.record(false);
            return Ok(false);
        }

        let mut record = serde_json::to_vec(entity)?;
        record.push(b'\n');
        inner.append(&record).map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })?;
        inner.seen.insert(entity.encounter_id);
        drop(inner);

        self.counters.record(true);
        Ok(true)
    }

    fn stats(&self) -> SinkStats {
        self.counters.snapshot()
    }
}

fn load_existing(path: &Path) -> Result<HashSet<EncounterId>, SinkError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(source) => {
            return Err(SinkError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut seen = HashSet::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Entity>(&line) {
            Ok(entity) => {
                seen.insert(entity.encounter_id);
            }
            Err(e) => warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "Skipping unreadable sighting record"
            ),
        }
    }

    Ok(seen)
}
