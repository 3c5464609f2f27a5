//! Record use-case service consumed by the presentation layer.
//!
//! # Responsibility
//! - Apply user intents (create, edit, delete, select, search) write-through:
//!   local persistence first, then the in-memory state event.
//! - Hand freshly mutated records to the sync engine while online.
//! - Expose state snapshots, subscriptions and the reconciliation entry point.
//!
//! # Invariants
//! - No in-memory event is applied for a mutation whose local write failed.
//! - Local write plus dispatch of an intent never interleaves with a sync
//!   commit for the same store.
//! - `syncing` never survives `load`: an attempt cut short by a restart is
//!   back to `unsynced`.
//! - Deletion is final locally; remote deletion failure is logged and dropped.
//! - Edits always leave the record `unsynced` until a later successful sync.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::model::record::{Record, RecordId, SyncStatus};
use crate::remote::RemoteStore;
use crate::repo::record_repo::{RecordRepository, StoreError};
use crate::service::edit_session::EditSession;
use crate::state::{AppState, StateEvent, StateStore};
use crate::sync::engine::{SyncEngine, SyncReport};
use crate::sync::monitor::{ConnectivityHandle, ConnectivityMonitor, ConnectivityProbe};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Service error for record use-cases.
#[derive(Debug)]
pub enum RecordServiceError {
    /// Target record is not in the in-memory set.
    RecordNotFound(RecordId),
    /// Local persistence failed; in-memory state was left untouched.
    Store(StoreError),
    /// A debounced commit task ended without producing a result.
    CommitAborted,
}

impl Display for RecordServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordNotFound(id) => write!(f, "record not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::CommitAborted => write!(f, "pending edit commit was aborted"),
        }
    }
}

impl Error for RecordServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::RecordNotFound(_) | Self::CommitAborted => None,
        }
    }
}

impl From<StoreError> for RecordServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Facade wiring local store, remote mirror, state store, sync engine and
/// connectivity monitor together.
pub struct RecordService {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    state: Arc<StateStore>,
    local: Arc<dyn RecordRepository>,
    engine: Arc<SyncEngine>,
    monitor: ConnectivityMonitor,
}

impl RecordService {
    /// Creates a service starting offline with an empty record set.
    ///
    /// Call [`RecordService::load`] to publish persisted records.
    pub fn new(
        local: Arc<dyn RecordRepository>,
        remote: Arc<dyn RemoteStore>,
        config: EngineConfig,
    ) -> Self {
        let state = Arc::new(StateStore::default());
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&state),
            Arc::clone(&local),
            remote,
        ));
        let monitor = ConnectivityMonitor::new(
            Arc::clone(&engine),
            Arc::clone(&state),
            config.poll_interval(),
        );
        Self {
            config,
            clock: Arc::new(SystemClock),
            state,
            local,
            engine,
            monitor,
        }
    }

    /// Replaces the timestamp source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Publishes every persisted record into the in-memory set.
    ///
    /// Records left `syncing` by an interrupted attempt are reset to
    /// `unsynced` in storage before publishing, so the next pass retries them.
    pub fn load(&self) -> Result<usize, RecordServiceError> {
        let started_at = Instant::now();
        let _writes = self.engine.local_write_guard();
        let (records, recovered) = self.read_persisted().map_err(|err| {
            error!(
                "event=records_load module=service status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            err
        })?;
        let count = records.len();
        self.state.dispatch(StateEvent::SetAllRecords(records));
        info!(
            "event=records_load module=service status=ok count={} recovered={} duration_ms={}",
            count,
            recovered,
            started_at.elapsed().as_millis()
        );
        Ok(count)
    }

    /// Creates an untitled record, selects it and syncs it while online.
    pub async fn create_record(&self) -> Result<Record, RecordServiceError> {
        let record = Record::new(self.clock.now_ms());
        {
            let _writes = self.engine.local_write_guard();
            self.persist("record_create", record.id, || self.local.add(&record))?;
            self.state.dispatch(StateEvent::AddRecord(record.clone()));
            self.state.dispatch(StateEvent::SelectRecord(Some(record.id)));
        }
        Ok(self.sync_if_online(record).await)
    }

    /// Replaces title and body of a record, resetting it to `unsynced`.
    pub async fn update_record(
        &self,
        id: RecordId,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Record, RecordServiceError> {
        let updated = {
            let _writes = self.engine.local_write_guard();
            let Some(current) = self.state.record(id) else {
                warn!("event=record_update module=service status=skipped reason=not_found record_id={id}");
                return Err(RecordServiceError::RecordNotFound(id));
            };

            let updated = current.apply_content(title, body, self.clock.now_ms());
            self.persist("record_update", id, || self.local.put(&updated))?;
            self.state.dispatch(StateEvent::UpdateRecord(updated.clone()));
            updated
        };
        Ok(self.sync_if_online(updated).await)
    }

    /// Deletes a record locally, then best-effort on the remote mirror.
    ///
    /// The remote delete waits for any in-flight reconciliation, so a create
    /// already on the wire cannot land after it.
    pub async fn delete_record(&self, id: RecordId) -> Result<(), RecordServiceError> {
        {
            let _writes = self.engine.local_write_guard();
            self.persist("record_delete", id, || self.local.remove(id))?;
            self.state.dispatch(StateEvent::DeleteRecord(id));
        }

        if !self.state.is_online() {
            return Ok(());
        }
        match self.engine.delete_remote(id).await {
            Ok(_) => info!("event=remote_delete module=service status=ok record_id={id}"),
            Err(err) => warn!(
                "event=remote_delete module=service status=error record_id={id} error_code={} error={err}",
                err.code()
            ),
        }
        Ok(())
    }

    pub fn select_record(&self, id: Option<RecordId>) {
        self.state.dispatch(StateEvent::SelectRecord(id));
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        self.state.dispatch(StateEvent::SetSearchQuery(query.into()));
    }

    /// Runs one reconciliation pass now.
    ///
    /// Shares the monitor's reentrancy guard; returns `None` when a pass was
    /// already running.
    pub async fn sync_all(&self) -> Option<SyncReport> {
        self.monitor.run_pass().await
    }

    /// Feeds a connectivity signal directly, as a platform notification would.
    pub fn set_connectivity(&self, online: bool) -> Option<JoinHandle<SyncReport>> {
        self.monitor.handle_signal(online)
    }

    /// Starts the connectivity loop polling `probe`.
    pub fn start_monitor(
        &self,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> (ConnectivityHandle, JoinHandle<()>) {
        self.monitor.start(probe)
    }

    /// Opens a debounced edit session bound to `id`.
    pub fn edit_session(self: &Arc<Self>, id: RecordId) -> EditSession {
        EditSession::new(Arc::clone(self), id, self.config.edit_debounce())
    }

    pub fn snapshot(&self) -> AppState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    fn persist(
        &self,
        event: &'static str,
        id: RecordId,
        write: impl FnOnce() -> Result<(), StoreError>,
    ) -> Result<(), RecordServiceError> {
        let started_at = Instant::now();
        match write() {
            Ok(()) => {
                info!(
                    "event={event} module=service status=ok record_id={id} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event={event} module=service status=error record_id={id} duration_ms={} error_code={} error={err}",
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err.into())
            }
        }
    }

    fn read_persisted(&self) -> Result<(Vec<Record>, usize), StoreError> {
        let mut records = self.local.get_all()?;
        let mut recovered = 0;
        for record in records
            .iter_mut()
            .filter(|record| record.sync_status == SyncStatus::Syncing)
        {
            self.local.set_sync_status(record.id, SyncStatus::Unsynced)?;
            record.sync_status = SyncStatus::Unsynced;
            recovered += 1;
            info!(
                "event=sync_recover module=service status=ok record_id={} from=syncing to=unsynced",
                record.id
            );
        }
        Ok((records, recovered))
    }

    async fn sync_if_online(&self, record: Record) -> Record {
        if self.state.is_online() {
            self.engine.sync_one(&record).await;
        }
        self.state.record(record.id).unwrap_or(record)
    }
}
