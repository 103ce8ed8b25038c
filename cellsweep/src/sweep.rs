//! Area sweep producer.
//!
//! The [`AreaSweepController`] turns configured areas into cell tasks:
//!
//! ```text
//! ┌──────────────── pass ────────────────┐
//! │ for area in areas:                   │
//! │   cells = coverage(area) − seen      │
//! │   for cell in cells:                 │
//! │     stopped? ──► return              │
//! │     queue.push(cell)   (blocks)      │
//! │   seen += cells                      │
//! └──────────────┬───────────────────────┘
//!                └──► next pass, forever
//! ```
//!
//! Coverage is recomputed every pass and never persisted. Cells shared by
//! overlapping areas are only enqueued once per pass. Stopping is
//! cooperative: the flag is checked before every push, so the producer
//! notices within one push.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coord::Cell;
use crate::coverage;
use crate::geometry::Area;
use crate::queue::{ScanTask, TaskQueue};
use crate::shutdown::ShutdownSignal;
use crate::sink::Sink;

/// Receives sweep progress callbacks.
///
/// All methods default to no-ops.
pub trait SweepObserver: Send + Sync {
    /// An area's coverage was computed and enqueueing begins.
    fn area_started(&self, _area: &Area, _cells: usize) {}

    /// A cell was handed to the queue.
    fn cell_enqueued(&self, _area: &Area, _cell: &Cell) {}

    /// Every cell of the area was enqueued; `new_entities` is the number of
    /// entities the sink stored meanwhile.
    fn area_finished(&self, _area: &Area, _new_entities: u64) {}

    /// A full pass over all areas completed.
    fn pass_finished(&self, _pass: u64, _cells: usize) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SweepObserver for NoopObserver {}

/// Result of one pass over all areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every area was enqueued; `cells` distinct cells in total.
    Completed {
        /// Distinct cells enqueued during the pass.
        cells: usize,
    },
    /// The controller was stopped mid-pass.
    Stopped,
}

/// Point-in-time sweep progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Passes that enqueued every area.
    pub passes_completed: u64,
    /// Cells enqueued since start, across passes.
    pub cells_enqueued: u64,
    /// One-based number of the pass in progress.
    pub current_pass: u64,
}

#[derive(Debug, Default)]
struct SweepProgress {
    passes_completed: AtomicU64,
    cells_enqueued: AtomicU64,
}

/// Producer feeding area coverage into the task queue.
pub struct AreaSweepController {
    areas: Vec<Area>,
    level: u8,
    sink: Arc<dyn Sink>,
    shutdown: ShutdownSignal,
    progress: SweepProgress,
}

impl std::fmt::Debug for AreaSweepController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AreaSweepController")
            .field("areas", &self.areas.len())
            .field("level", &self.level)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl AreaSweepController {
    /// Creates a controller sweeping `areas` at subdivision `level`.
    ///
    /// `sink` is only read for per-area sighting counts.
    pub fn new(
        areas: Vec<Area>,
        level: u8,
        sink: Arc<dyn Sink>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            areas,
            level,
            sink,
            shutdown,
            progress: SweepProgress::default(),
        }
    }

    /// Requests the run loop to exit before its next push.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Returns true once stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Configured areas.
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Current progress counters.
    pub fn progress(&self) -> ProgressSnapshot {
        let passes_completed = self.progress.passes_completed.load(Ordering::Relaxed);
        ProgressSnapshot {
            passes_completed,
            cells_enqueued: self.progress.cells_enqueued.load(Ordering::Relaxed),
            current_pass: passes_completed + 1,
        }
    }

    /// Sweeps all areas pass after pass until stopped.
    pub fn run(&self, queue: &TaskQueue, observer: &dyn SweepObserver) {
        if self.areas.is_empty() {
            warn!("No areas configured, nothing to sweep");
            return;
        }

        while !self.is_stopped() {
            match self.sweep_once(queue, observer) {
                SweepOutcome::Completed { cells } => {
                    let pass = self.progress.passes_completed.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(pass, cells, "Sweep pass complete");
                    observer.pass_finished(pass, cells);
                }
                SweepOutcome::Stopped => break,
            }
        }

        info!(
            cells_enqueued = self.progress.cells_enqueued.load(Ordering::Relaxed),
            "Sweep stopped"
        );
    }

    /// Enqueues every area once.
    pub fn sweep_once(&self, queue: &TaskQueue, observer: &dyn SweepObserver) -> SweepOutcome {
        let mut seen: HashSet<Cell> = HashSet::new();

        for area in &self.areas {
            let found_before = self.sink.stats().inserted;

            let cells: Vec<Cell> = coverage::compute(area, self.level)
                .into_iter()
                .filter(|cell| !seen.contains(cell))
                .collect();

            info!(area = %area.name, cells = cells.len(), "Scanning area");
            observer.area_started(area, cells.len());

            for cell in &cells {
                if self.is_stopped() {
                    debug!(area = %area.name, "Stop requested, abandoning area");
                    return SweepOutcome::Stopped;
                }
                queue.push(ScanTask::Cell(*cell));
                self.progress.cells_enqueued.fetch_add(1, Ordering::Relaxed);
                observer.cell_enqueued(area, cell);
            }

            seen.extend(cells);

            let found = self.sink.stats().inserted.saturating_sub(found_before);
            info!(area = %area.name, found, "Area done");
            observer.area_finished(area, found);
        }

        SweepOutcome::Completed { cells: seen.len() }
    }
}
