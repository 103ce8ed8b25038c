//! Survey runner.
//!
//! Wires the producer and the session pool together:
//!
//! ```text
//!                        ┌──► scan-0 (ScanSession, account A) ──┐
//! AreaSweepController ──►│ TaskQueue (bounded)                  ├──► Sink
//!   (calling thread)     └──► scan-1 (ScanSession, account B) ──┘
//! ```
//!
//! One named OS thread per credential. When the shared [`ShutdownSignal`]
//! fires the controller returns, one [`ScanTask::Stop`] per worker is
//! enqueued behind any remaining cells, and all workers are joined.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{error, info};

use crate::api::{Credential, MapConnector};
use crate::config::ScanConfig;
use crate::geometry::Area;
use crate::queue::{ScanTask, TaskQueue};
use crate::session::{ScanSession, SessionStats};
use crate::shutdown::ShutdownSignal;
use crate::sink::{Sink, SinkStats};
use crate::sweep::{AreaSweepController, SweepObserver};

/// Errors preventing a survey from starting.
#[derive(Debug, Error)]
pub enum SurveyError {
    /// Nothing to sweep.
    #[error("no areas configured")]
    NoAreas,

    /// Nobody to scan with.
    #[error("no accounts configured")]
    NoCredentials,

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Totals of a finished survey.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyReport {
    /// Complete passes over all areas.
    pub passes_completed: u64,
    /// Cells handed to the queue.
    pub cells_enqueued: u64,
    /// Sink counters at shutdown.
    pub sink: SinkStats,
    /// Per-account session counters, in credential order.
    pub sessions: Vec<(String, SessionStats)>,
}

/// Runs a sweep controller and one scan session per credential.
pub struct Surveyor {
    areas: Vec<Area>,
    credentials: Vec<Credential>,
    config: ScanConfig,
    connector: Arc<dyn MapConnector>,
    sink: Arc<dyn Sink>,
    shutdown: ShutdownSignal,
}

impl std::fmt::Debug for Surveyor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surveyor")
            .field("areas", &self.areas.len())
            .field("accounts", &self.credentials.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Surveyor {
    /// Creates a surveyor.
    pub fn new(
        areas: Vec<Area>,
        credentials: Vec<Credential>,
        config: ScanConfig,
        connector: Arc<dyn MapConnector>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            areas,
            credentials,
            config,
            connector,
            sink,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Signal that stops a running survey from another thread.
    pub fn stop_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Requests the survey to stop.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Runs until stopped, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Fails before scanning when there are no areas or no credentials, or
    /// when a worker thread cannot be spawned.
    pub fn run(&self, observer: &dyn SweepObserver) -> Result<SurveyReport, SurveyError> {
        if self.areas.is_empty() {
            return Err(SurveyError::NoAreas);
        }
        if self.credentials.is_empty() {
            return Err(SurveyError::NoCredentials);
        }

        let queue = Arc::new(TaskQueue::new(self.config.queue_capacity));
        let workers = self.spawn_workers(&queue)?;

        info!(
            areas = self.areas.len(),
            sessions = workers.len(),
            level = self.config.subdivision_level,
            "Survey started"
        );

        let controller = AreaSweepController::new(
            self.areas.clone(),
            self.config.subdivision_level,
            Arc::clone(&self.sink),
            self.shutdown.clone(),
        );
        controller.run(&queue, observer);

        let sessions = shutdown_workers(&queue, workers);
        let progress = controller.progress();
        let report = SurveyReport {
            passes_completed: progress.passes_completed,
            cells_enqueued: progress.cells_enqueued,
            sink: self.sink.stats(),
            sessions,
        };

        info!(
            passes = report.passes_completed,
            cells = report.cells_enqueued,
            inserted = report.sink.inserted,
            duplicates = report.sink.duplicates,
            "Survey finished"
        );

        Ok(report)
    }

    fn spawn_workers(
        &self,
        queue: &Arc<TaskQueue>,
    ) -> Result<Vec<(String, JoinHandle<SessionStats>)>, SurveyError> {
        let mut workers = Vec::with_capacity(self.credentials.len());

        for (index, credential) in self.credentials.iter().enumerate() {
            let session = ScanSession::new(
                credential.clone(),
                self.config.clone(),
                Arc::clone(&self.connector),
                Arc::clone(queue),
                Arc::clone(&self.sink),
                self.shutdown.clone(),
            );

            let name = format!("scan-{}", index);
            match thread::Builder::new()
                .name(name.clone())
                .spawn(move || session.run())
            {
                Ok(handle) => workers.push((credential.username.clone(), handle)),
                Err(source) => {
                    self.shutdown.trigger();
                    shutdown_workers(queue, workers);
                    return Err(SurveyError::Spawn { name, source });
                }
            }
        }

        Ok(workers)
    }
}

/// Sends one stop task per worker and joins them all.
fn shutdown_workers(
    queue: &TaskQueue,
    workers: Vec<(String, JoinHandle<SessionStats>)>,
) -> Vec<(String, SessionStats)> {
    for _ in 0..workers.len() {
        queue.push(ScanTask::Stop);
    }

    let mut sessions = Vec::with_capacity(workers.len());
    for (account, handle) in workers {
        match handle.join() {
            Ok(stats) => sessions.push((account, stats)),
            Err(_) => {
                error!(account = %account, "Scan session panicked");
                sessions.push((account, SessionStats::default()));
            }
        }
    }
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MapCellListing, MapObjectsResponse};
    use crate::coord::LatLng;
    use crate::geometry::Polygon;
    use crate::session::tests::{raw, MockConnector};
    use crate::sink::MemorySink;
    use crate::sweep::NoopObserver;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    fn fast_config() -> ScanConfig {
        ScanConfig::default()
            .with_pacing_interval(Duration::from_millis(1))
            .with_backoff_ceiling(Duration::from_millis(8))
            .with_login_retry_delay(Duration::from_millis(1))
            .with_start_jitter(false)
    }

    fn unit_area() -> Area {
        Area::new(
            "block",
            Polygon::new(vec![
                LatLng::new(47.600, -122.340),
                LatLng::new(47.600, -122.330),
                LatLng::new(47.607, -122.330),
                LatLng::new(47.607, -122.340),
            ]),
        )
    }

    fn credentials(n: usize) -> Vec<Credential> {
        (0..n)
            .map(|i| Credential::new(format!("scout{}", i), "secret"))
            .collect()
    }

    #[test]
    fn test_requires_areas() {
        let surveyor = Surveyor::new(
            Vec::new(),
            credentials(1),
            fast_config(),
            Arc::new(MockConnector::default()),
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(surveyor.run(&NoopObserver), Err(SurveyError::NoAreas)));
    }

    #[test]
    fn test_requires_credentials() {
        let surveyor = Surveyor::new(
            vec![unit_area()],
            Vec::new(),
            fast_config(),
            Arc::new(MockConnector::default()),
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(
            surveyor.run(&NoopObserver),
            Err(SurveyError::NoCredentials)
        ));
    }

    #[test]
    fn test_survey_runs_until_stopped_and_dedups() {
        // Every query sees the same entity
        let script = (0..10_000)
            .map(|_| {
                Ok(Some(MapObjectsResponse::success(vec![
                    MapCellListing::with_entities(vec![raw(42)]),
                ])))
            })
            .collect();
        let connector = Arc::new(MockConnector::with_script(script));
        let sink = Arc::new(MemorySink::new());

        let surveyor = Surveyor::new(
            vec![unit_area()],
            credentials(2),
            fast_config(),
            connector.clone(),
            sink.clone(),
        );
        let stop = surveyor.stop_handle();
        let runner = thread::spawn(move || surveyor.run(&NoopObserver));

        let cells = crate::coverage::compute(&unit_area(), 16).len();
        let deadline = Instant::now() + Duration::from_secs(10);
        while connector.queries.load(Ordering::SeqCst) < cells * 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        stop.trigger();

        let report = runner.join().unwrap().unwrap();
        assert!(connector.queries.load(Ordering::SeqCst) >= cells * 2);
        assert!(report.passes_completed >= 1);
        assert_eq!(report.sink.inserted, 1);
        assert_eq!(sink.len(), 1);
        assert!(sink.get(crate::entity::EncounterId(42)).is_some());

        let accounts: Vec<&str> = report.sessions.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(accounts, ["scout0", "scout1"]);
        assert!(connector.connects.load(Ordering::SeqCst) <= 2);
    }
}
