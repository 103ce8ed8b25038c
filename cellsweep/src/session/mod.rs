//! Scan sessions: one authenticated worker per credential.
//!
//! A [`ScanSession`] owns a single login to the remote API and pulls cell
//! tasks from the shared [`TaskQueue`] until it receives [`ScanTask::Stop`].
//!
//! # Loop body
//!
//! ```text
//! pop task ──► Stop? ──yes──► Stopped
//!    │
//!    ▼
//! ticket fresh for a whole batch? ──no──► sleep, login at cell center, repeat
//!    │ yes
//!    ▼
//! sleep pacing interval ──► query cell ──► decode ──► report to sink
//!    │                                                    │
//!    └─ failure: log, sleep backoff, double it ◄──────────┘ success: reset backoff
//! ```
//!
//! Failures never leave the session: the failed cell is dropped and the
//! loop moves on. Missed cells are acceptable, a wedged session is not.
//!
//! Login retries are unbounded unless `max_login_attempts` is configured,
//! matching the behavior of the scanner this engine replaces. A bounded
//! policy drops the cell once the cap is hit and keeps the session alive.

mod backoff;
mod state;

pub use backoff::{Backoff, DEFAULT_BACKOFF_CEILING_SECS};
pub use state::{ticket_is_fresh, SessionPhase, SessionState};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Credential, MapConnector};
use crate::config::ScanConfig;
use crate::coord::Cell;
use crate::entity::Entity;
use crate::queue::{ScanTask, TaskQueue};
use crate::shutdown::ShutdownSignal;
use crate::sink::{Sink, SinkError};

/// Whether the pull loop should continue after a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    /// Pull the next task.
    Continue,
    /// The stop task was received.
    Stop,
}

/// Counters of one session's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Cells queried successfully (including empty results).
    pub cells_scanned: u64,
    /// Cells dropped because of a failure.
    pub cells_failed: u64,
    /// Entities decoded and reported to the sink.
    pub entities_reported: u64,
    /// Successful logins.
    pub logins: u64,
}

#[derive(Debug, thiserror::Error)]
enum ScanError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("gave up logging in after {attempts} attempts")]
    LoginExhausted { attempts: u32 },

    #[error("no connection after login")]
    NotConnected,

    #[error("interrupted by shutdown")]
    Interrupted,
}

/// Worker owning one credential's connection to the remote API.
pub struct ScanSession {
    credential: Credential,
    config: ScanConfig,
    connector: Arc<dyn MapConnector>,
    queue: Arc<TaskQueue>,
    sink: Arc<dyn Sink>,
    shutdown: ShutdownSignal,
    state: SessionState,
    stats: SessionStats,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("account", &self.credential.username)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ScanSession {
    /// Creates a session for `credential`.
    pub fn new(
        credential: Credential,
        config: ScanConfig,
        connector: Arc<dyn MapConnector>,
        queue: Arc<TaskQueue>,
        sink: Arc<dyn Sink>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let backoff = Backoff::new(config.pacing_interval, config.backoff_ceiling);
        Self {
            credential,
            config,
            connector,
            queue,
            sink,
            shutdown,
            state: SessionState::new(backoff),
            stats: SessionStats::default(),
        }
    }

    /// Account name of this session.
    pub fn account(&self) -> &str {
        &self.credential.username
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Pulls and processes tasks until the stop task arrives.
    pub fn run(mut self) -> SessionStats {
        if self.config.start_jitter {
            // Keep sessions from querying in lockstep
            let jitter = self.config.pacing_interval.mul_f64(rand::random::<f64>());
            self.shutdown.sleep(jitter);
        }

        info!(account = %self.credential.username, "Scan session started");

        loop {
            let task = self.queue.pop();
            if self.process(task) == SessionFlow::Stop {
                break;
            }
        }

        info!(
            account = %self.credential.username,
            cells_scanned = self.stats.cells_scanned,
            cells_failed = self.stats.cells_failed,
            entities = self.stats.entities_reported,
            "Scan session stopped"
        );

        self.stats
    }

    /// Processes one task.
    pub fn process(&mut self, task: ScanTask) -> SessionFlow {
        let cell = match task {
            ScanTask::Stop => {
                self.state.phase = SessionPhase::Stopped;
                return SessionFlow::Stop;
            }
            ScanTask::Cell(cell) => cell,
        };

        match self.scan_cell(cell) {
            Ok(_) => {
                self.stats.cells_scanned += 1;
                self.state.backoff.reset();
            }
            Err(ScanError::Interrupted) => {
                debug!(
                    account = %self.credential.username,
                    cell = %cell,
                    "Abandoning cell on shutdown"
                );
            }
            Err(e) => {
                self.stats.cells_failed += 1;
                let delay = self.state.backoff.next_delay();
                warn!(
                    account = %self.credential.username,
                    cell = %cell,
                    error = %e,
                    retry_in = ?delay,
                    "Cell scan failed"
                );
                self.shutdown.sleep(delay);
            }
        }

        SessionFlow::Continue
    }

    fn scan_cell(&mut self, cell: Cell) -> Result<usize, ScanError> {
        self.ensure_logged_in(cell)?;

        if !self.shutdown.sleep(self.config.pacing_interval) {
            return Err(ScanError::Interrupted);
        }

        let position = cell.center();
        let connection = self
            .state
            .connection
            .as_mut()
            .ok_or(ScanError::NotConnected)?;
        connection.set_position(position);

        let response = match connection.query_map_objects(cell.id(), position)? {
            Some(response) if response.is_success() => response,
            Some(response) => {
                debug!(
                    account = %self.credential.username,
                    cell = %cell,
                    status = response.status,
                    "Unsuccessful map response, treating as empty"
                );
                return Ok(0);
            }
            None => {
                debug!(
                    account = %self.credential.username,
                    cell = %cell,
                    "Empty map response"
                );
                return Ok(0);
            }
        };

        let observed_at = Utc::now();
        let entities = response
            .entities()
            .map(|raw| Entity::from_raw(raw, observed_at))
            .collect::<Result<Vec<_>, _>>()?;

        let mut inserted = 0;
        for entity in &entities {
            if self.sink.report(entity)? {
                inserted += 1;
            }
            self.stats.entities_reported += 1;
        }

        debug!(
            account = %self.credential.username,
            cell = %cell,
            entities = entities.len(),
            inserted,
            "Cell scanned"
        );

        Ok(entities.len())
    }

    /// Logs in until the ticket covers a whole batch of queries.
    fn ensure_logged_in(&mut self, cell: Cell) -> Result<(), ScanError> {
        let margin = self.config.session_margin();
        let mut attempts = 0u32;

        loop {
            if self.state.is_fresh(Utc::now(), margin) {
                if self.state.phase != SessionPhase::Active {
                    info!(
                        account = %self.credential.username,
                        expires_at = ?self.state.expires_at(),
                        "Session authenticated"
                    );
                }
                self.state.phase = SessionPhase::Active;
                return Ok(());
            }

            self.state.phase = match self.state.phase {
                SessionPhase::Active => {
                    info!(account = %self.credential.username, "Login ticket expired");
                    SessionPhase::ReAuthenticating
                }
                SessionPhase::Unauthenticated => SessionPhase::Authenticating,
                phase => phase,
            };

            if let Some(max) = self.config.max_login_attempts {
                if attempts >= max {
                    return Err(ScanError::LoginExhausted { attempts });
                }
            }

            if !self.shutdown.sleep(self.config.login_retry_delay) {
                return Err(ScanError::Interrupted);
            }
            attempts += 1;

            match self.connector.connect(&self.credential, cell.center()) {
                Ok(connection) => {
                    self.stats.logins += 1;
                    self.state.connection = Some(connection);
                }
                Err(e) => {
                    warn!(
                        account = %self.credential.username,
                        attempt = attempts,
                        error = %e,
                        "Login failed"
                    );
                }
            }
        }
    }

    /// Delay the next failure would back off for.
    pub fn current_backoff(&self) -> Duration {
        self.state.backoff.current()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::{MapCellListing, MapObjectsResponse, MapSession, RawEntity};
    use crate::coord::{CellId, LatLng};
    use crate::entity::EncounterId;
    use crate::sink::MemorySink;
    use chrono::{DateTime, Duration as ChronoDuration};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type QueryResult = Result<Option<MapObjectsResponse>, ApiError>;

    /// Scripted remote API.
    ///
    /// Logins hand out tickets with the queued lifetimes (one hour once the
    /// queue is empty). Queries pop scripted results, answering with an
    /// empty success once the script runs out.
    #[derive(Default)]
    pub(crate) struct MockConnector {
        pub lifetimes: Mutex<VecDeque<Result<ChronoDuration, ApiError>>>,
        pub script: Arc<Mutex<VecDeque<QueryResult>>>,
        pub expiry: Arc<Mutex<Option<DateTime<Utc>>>>,
        pub connects: AtomicUsize,
        pub queries: Arc<AtomicUsize>,
    }

    impl MockConnector {
        pub fn with_script(script: Vec<QueryResult>) -> Self {
            let connector = Self::default();
            *connector.script.lock() = script.into();
            connector
        }
    }

    struct MockSession {
        script: Arc<Mutex<VecDeque<QueryResult>>>,
        expiry: Arc<Mutex<Option<DateTime<Utc>>>>,
        queries: Arc<AtomicUsize>,
    }

    impl MapConnector for MockConnector {
        fn connect(
            &self,
            _credential: &Credential,
            _position: LatLng,
        ) -> Result<Box<dyn MapSession>, ApiError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let lifetime = self
                .lifetimes
                .lock()
                .pop_front()
                .unwrap_or(Ok(ChronoDuration::hours(1)))?;
            *self.expiry.lock() = Some(Utc::now() + lifetime);

            Ok(Box::new(MockSession {
                script: Arc::clone(&self.script),
                expiry: Arc::clone(&self.expiry),
                queries: Arc::clone(&self.queries),
            }))
        }
    }

    impl MapSession for MockSession {
        fn ticket_expires_at(&self) -> Option<DateTime<Utc>> {
            *self.expiry.lock()
        }

        fn set_position(&mut self, _position: LatLng) {}

        fn query_map_objects(&mut self, _cell: CellId, _position: LatLng) -> QueryResult {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Some(MapObjectsResponse::success(Vec::new()))))
        }
    }

    pub(crate) fn raw(encounter_id: u64) -> RawEntity {
        RawEntity {
            encounter_id,
            type_id: 16,
            latitude: 47.61,
            longitude: -122.33,
            spawn_point_id: "54906ab4b1b".to_string(),
            time_till_hidden_ms: 300_000,
        }
    }

    fn fast_config() -> ScanConfig {
        ScanConfig::default()
            .with_pacing_interval(Duration::from_millis(1))
            .with_login_retry_delay(Duration::from_millis(1))
            .with_backoff_ceiling(Duration::from_millis(8))
            .with_start_jitter(false)
    }

    fn cell() -> Cell {
        Cell::containing(LatLng::new(47.61, -122.33), 16)
    }

    fn session(
        config: ScanConfig,
        connector: Arc<MockConnector>,
        sink: Arc<MemorySink>,
    ) -> ScanSession {
        ScanSession::new(
            Credential::new("scout1", "hunter2"),
            config,
            connector,
            Arc::new(TaskQueue::new(1)),
            sink,
            ShutdownSignal::new(),
        )
    }

    #[test]
    fn test_first_task_logs_in_then_queries() {
        let connector = Arc::new(MockConnector::default());
        let mut session = session(fast_config(), connector.clone(), Arc::new(MemorySink::new()));
        assert_eq!(session.phase(), SessionPhase::Unauthenticated);

        assert_eq!(session.process(ScanTask::Cell(cell())), SessionFlow::Continue);

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(connector.queries.load(Ordering::SeqCst), 1);
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.stats().cells_scanned, 1);
    }

    #[test]
    fn test_stop_task_is_terminal() {
        let connector = Arc::new(MockConnector::default());
        let mut session = session(fast_config(), connector.clone(), Arc::new(MemorySink::new()));

        assert_eq!(session.process(ScanTask::Stop), SessionFlow::Stop);
        assert_eq!(session.phase(), SessionPhase::Stopped);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_short_ticket_is_replaced_before_query() {
        let connector = Arc::new(MockConnector::default());
        // 5s is less than 10 × (1ms + 1s)
        connector
            .lifetimes
            .lock()
            .extend([Ok(ChronoDuration::seconds(5)), Ok(ChronoDuration::hours(1))]);
        let mut session = session(fast_config(), connector.clone(), Arc::new(MemorySink::new()));

        session.process(ScanTask::Cell(cell()));

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(connector.queries.load(Ordering::SeqCst), 1);
        assert_eq!(session.stats().logins, 2);
    }

    #[test]
    fn test_expiring_session_reauthenticates_before_next_query() {
        let connector = Arc::new(MockConnector::default());
        let mut session = session(fast_config(), connector.clone(), Arc::new(MemorySink::new()));

        session.process(ScanTask::Cell(cell()));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        // Ticket now has less than a batch of validity left
        *connector.expiry.lock() = Some(Utc::now() + ChronoDuration::seconds(3));

        session.process(ScanTask::Cell(cell()));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(connector.queries.load(Ordering::SeqCst), 2);
        assert_eq!(session.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_entities_are_reported_with_visibility() {
        let connector = Arc::new(MockConnector::with_script(vec![Ok(Some(
            MapObjectsResponse::success(vec![
                MapCellListing::with_entities(vec![raw(1), raw(2)]),
                MapCellListing::default(),
                MapCellListing::with_entities(vec![raw(3)]),
            ]),
        ))]));
        let sink = Arc::new(MemorySink::new());
        let mut session = session(fast_config(), connector, sink.clone());

        session.process(ScanTask::Cell(cell()));

        assert_eq!(sink.len(), 3);
        let stored = sink.get(EncounterId(2)).unwrap();
        assert_eq!(
            (stored.visible_until - stored.observed_at).num_milliseconds(),
            300_000
        );
        assert_eq!(session.stats().entities_reported, 3);
    }

    #[test]
    fn test_unsuccessful_status_is_empty_not_failure() {
        let connector = Arc::new(MockConnector::with_script(vec![
            Ok(Some(MapObjectsResponse {
                status: 2,
                map_cells: vec![MapCellListing::with_entities(vec![raw(1)])],
            })),
            Ok(None),
        ]));
        let sink = Arc::new(MemorySink::new());
        let mut session = session(fast_config(), connector, sink.clone());

        session.process(ScanTask::Cell(cell()));
        session.process(ScanTask::Cell(cell()));

        assert!(sink.is_empty());
        assert_eq!(session.stats().cells_failed, 0);
        assert_eq!(session.current_backoff(), Duration::from_millis(1));
    }

    #[test]
    fn test_failures_double_backoff_and_success_resets() {
        let failure = || Err(ApiError::Transport("connection reset".to_string()));
        let connector = Arc::new(MockConnector::with_script(vec![
            failure(),
            failure(),
            failure(),
            failure(),
            failure(),
        ]));
        let mut session = session(fast_config(), connector, Arc::new(MemorySink::new()));

        let mut observed = Vec::new();
        for _ in 0..5 {
            observed.push(session.current_backoff());
            session.process(ScanTask::Cell(cell()));
        }

        // Delay before the K-th retry is min(base × 2^(K-1), ceiling)
        let ms = Duration::from_millis;
        assert_eq!(observed, vec![ms(1), ms(2), ms(4), ms(8), ms(8)]);
        assert_eq!(session.stats().cells_failed, 5);

        session.process(ScanTask::Cell(cell()));
        assert_eq!(session.current_backoff(), ms(1));
    }

    #[test]
    fn test_decode_error_drops_whole_cell() {
        let mut bad = raw(2);
        bad.latitude = f64::INFINITY;
        let connector = Arc::new(MockConnector::with_script(vec![Ok(Some(
            MapObjectsResponse::success(vec![MapCellListing::with_entities(vec![raw(1), bad])]),
        ))]));
        let sink = Arc::new(MemorySink::new());
        let mut session = session(fast_config(), connector, sink.clone());

        session.process(ScanTask::Cell(cell()));

        assert!(sink.is_empty());
        assert_eq!(session.stats().cells_failed, 1);
        assert_eq!(session.current_backoff(), Duration::from_millis(2));
    }

    #[test]
    fn test_overflowing_visibility_fails_cell_without_killing_session() {
        let mut bad = raw(3);
        bad.time_till_hidden_ms = i64::MAX;
        let connector = Arc::new(MockConnector::with_script(vec![Ok(Some(
            MapObjectsResponse::success(vec![MapCellListing::with_entities(vec![bad])]),
        ))]));
        let sink = Arc::new(MemorySink::new());
        let mut session = session(fast_config(), connector, sink.clone());

        assert_eq!(session.process(ScanTask::Cell(cell())), SessionFlow::Continue);
        assert!(sink.is_empty());
        assert_eq!(session.stats().cells_failed, 1);

        // Next cell goes through normally
        assert_eq!(session.process(ScanTask::Cell(cell())), SessionFlow::Continue);
        assert_eq!(session.stats().cells_scanned, 1);
    }

    /// Sink whose every report fails.
    struct FailingSink;

    impl Sink for FailingSink {
        fn report(&self, _entity: &Entity) -> Result<bool, SinkError> {
            Err(SinkError::Io {
                path: "/full/disk.jsonl".into(),
                source: std::io::Error::other("no space left on device"),
            })
        }

        fn stats(&self) -> crate::sink::SinkStats {
            crate::sink::SinkStats::default()
        }
    }

    #[test]
    fn test_sink_error_counts_as_failure() {
        let connector = Arc::new(MockConnector::with_script(vec![Ok(Some(
            MapObjectsResponse::success(vec![MapCellListing::with_entities(vec![raw(4)])]),
        ))]));
        let mut session = ScanSession::new(
            Credential::new("scout1", "hunter2"),
            fast_config(),
            connector,
            Arc::new(TaskQueue::new(1)),
            Arc::new(FailingSink),
            ShutdownSignal::new(),
        );

        assert_eq!(session.process(ScanTask::Cell(cell())), SessionFlow::Continue);
        assert_eq!(session.stats().cells_failed, 1);
        assert_eq!(session.stats().cells_scanned, 0);
        assert_eq!(session.current_backoff(), Duration::from_millis(2));
    }

    #[test]
    fn test_bounded_login_gives_up_and_keeps_session_alive() {
        let connector = Arc::new(MockConnector::default());
        connector.lifetimes.lock().extend([
            Err(ApiError::Auth("bad password".to_string())),
            Err(ApiError::Auth("bad password".to_string())),
        ]);
        let config = fast_config().with_max_login_attempts(2);
        let mut session = session(config, connector.clone(), Arc::new(MemorySink::new()));

        assert_eq!(session.process(ScanTask::Cell(cell())), SessionFlow::Continue);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(connector.queries.load(Ordering::SeqCst), 0);
        assert_eq!(session.stats().cells_failed, 1);

        // Next cell logs in with the default ticket
        session.process(ScanTask::Cell(cell()));
        assert_eq!(connector.queries.load(Ordering::SeqCst), 1);
        assert_eq!(session.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_unbounded_login_retries_until_accepted() {
        let connector = Arc::new(MockConnector::default());
        for _ in 0..5 {
            connector
                .lifetimes
                .lock()
                .push_back(Err(ApiError::Auth("server busy".to_string())));
        }
        let mut session = session(fast_config(), connector.clone(), Arc::new(MemorySink::new()));

        session.process(ScanTask::Cell(cell()));

        assert_eq!(connector.connects.load(Ordering::SeqCst), 6);
        assert_eq!(connector.queries.load(Ordering::SeqCst), 1);
        assert_eq!(session.stats().cells_failed, 0);
    }

    #[test]
    fn test_shutdown_abandons_cell_without_failure() {
        let connector = Arc::new(MockConnector::default());
        let shutdown = ShutdownSignal::new();
        let mut session = ScanSession::new(
            Credential::new("scout1", "hunter2"),
            fast_config(),
            connector.clone(),
            Arc::new(TaskQueue::new(1)),
            Arc::new(MemorySink::new()),
            shutdown.clone(),
        );
        shutdown.trigger();

        assert_eq!(session.process(ScanTask::Cell(cell())), SessionFlow::Continue);
        assert_eq!(connector.queries.load(Ordering::SeqCst), 0);
        assert_eq!(session.stats().cells_failed, 0);
    }

    #[test]
    fn test_run_drains_queue_until_stop() {
        let connector = Arc::new(MockConnector::default());
        let queue = Arc::new(TaskQueue::new(1));
        let session = ScanSession::new(
            Credential::new("scout1", "hunter2"),
            fast_config(),
            connector.clone(),
            Arc::clone(&queue),
            Arc::new(MemorySink::new()),
            ShutdownSignal::new(),
        );

        let worker = std::thread::spawn(move || session.run());
        for _ in 0..3 {
            queue.push(ScanTask::Cell(cell()));
        }
        queue.push(ScanTask::Stop);

        let stats = worker.join().unwrap();
        assert_eq!(stats.cells_scanned, 3);
        assert_eq!(stats.logins, 1);
    }
}
