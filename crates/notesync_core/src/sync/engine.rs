//! Record reconciliation against the remote mirror.
//!
//! # Responsibility
//! - Drive one record through `syncing -> synced | error`.
//! - Decide create-vs-update from remote existence of the record id.
//! - Run a sequential reconciliation pass over every pending record.
//!
//! # Invariants
//! - Nothing is attempted while the state store reports offline.
//! - Steps of one record run strictly in order; records in a pass never
//!   interleave.
//! - A failure is converted into `SyncStatus::Error` for that record only and
//!   never aborts the pass.
//! - A record deleted or re-edited while its remote call was in flight is not
//!   overwritten by the stale sync result.
//! - Remote reconciliation is one lane: a record's existence check and write
//!   never overlap another record's, whoever triggered them.
//! - Deciding on the in-memory copy and writing the local store happen under
//!   the local write guard shared with user intents.
//!
//! Create-vs-update lists the whole mirror per record because the remote API
//! has no single-record lookup.

use crate::model::record::{Record, RecordId, SyncStatus};
use crate::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::repo::record_repo::{RecordRepository, StoreError};
use crate::state::{StateEvent, StateStore};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Failure of one record's sync attempt.
#[derive(Debug)]
pub enum SyncError {
    Remote(RemoteError),
    Store(StoreError),
}

impl SyncError {
    fn code(&self) -> &'static str {
        match self {
            Self::Remote(err) => err.code(),
            Self::Store(err) => err.code(),
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Remote write chosen for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteWrite {
    Create,
    Update,
}

/// Result of one `sync_one` call.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Connectivity is offline; nothing was attempted.
    Offline,
    /// The record is no longer in the in-memory set.
    Missing,
    /// Remote write succeeded and the record is now `synced`.
    Synced { record: Record, write: RemoteWrite },
    /// Remote write succeeded but the record changed locally meanwhile; the
    /// newer local copy was kept.
    Superseded { write: RemoteWrite },
    /// The attempt failed and the record is now `error`.
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Tally of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The pass did not run because connectivity was offline.
    pub skipped_offline: bool,
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub superseded: usize,
    /// Records not attempted because connectivity dropped mid-pass, or that
    /// vanished before their turn.
    pub skipped: usize,
}

/// Orchestrates record synchronization.
///
/// Reads the record set and connectivity from the state store and writes back
/// only through state events.
pub struct SyncEngine {
    state: Arc<StateStore>,
    local: Arc<dyn RecordRepository>,
    remote: Arc<dyn RemoteStore>,
    remote_lane: tokio::sync::Mutex<()>,
    local_writes: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        state: Arc<StateStore>,
        local: Arc<dyn RecordRepository>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            state,
            local,
            remote,
            remote_lane: tokio::sync::Mutex::new(()),
            local_writes: Mutex::new(()),
        }
    }

    /// Serializes "read in-memory copy, write local store, dispatch" sections.
    ///
    /// Never held across an await.
    pub(crate) fn local_write_guard(&self) -> MutexGuard<'_, ()> {
        // Guards `()`; poisoning leaves nothing to repair.
        self.local_writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deletes `id` on the remote mirror once no reconciliation is in flight.
    pub async fn delete_remote(&self, id: RecordId) -> RemoteResult<RecordId> {
        let _lane = self.remote_lane.lock().await;
        self.remote.delete(id).await
    }

    /// Synchronizes one record with the remote mirror.
    ///
    /// The freshest in-memory copy of `record.id` is sent, so edits committed
    /// after a pass selected the record are not lost. Waits while another
    /// record is being reconciled.
    pub async fn sync_one(&self, record: &Record) -> SyncOutcome {
        let _lane = self.remote_lane.lock().await;

        if !self.state.is_online() {
            debug!(
                "event=sync_record module=sync status=skipped reason=offline record_id={}",
                record.id
            );
            return SyncOutcome::Offline;
        }

        let Some(current) = self.state.record(record.id) else {
            debug!(
                "event=sync_record module=sync status=skipped reason=missing record_id={}",
                record.id
            );
            return SyncOutcome::Missing;
        };

        let started_at = Instant::now();
        info!(
            "event=sync_record module=sync status=start record_id={}",
            current.id
        );

        if let Err(err) = self.mark_syncing(current.id) {
            return self.fail(current.id, err.into(), started_at);
        }

        let (write, stored) = match self.push(&current).await {
            Ok(pushed) => pushed,
            Err(err) => return self.fail(current.id, err, started_at),
        };

        match self.commit(&current, write, stored) {
            Ok(outcome) => {
                info!(
                    "event=sync_record module=sync status=ok record_id={} write={} superseded={} duration_ms={}",
                    current.id,
                    write_name(write),
                    matches!(outcome, SyncOutcome::Superseded { .. }),
                    started_at.elapsed().as_millis()
                );
                outcome
            }
            Err(err) => self.fail(current.id, err, started_at),
        }
    }

    /// Runs one reconciliation pass over every `unsynced`/`error` record.
    ///
    /// Records are processed one at a time; one failure never stops the rest.
    pub async fn sync_all(&self) -> SyncReport {
        if !self.state.is_online() {
            debug!("event=sync_pass module=sync status=skipped reason=offline");
            return SyncReport {
                skipped_offline: true,
                ..SyncReport::default()
            };
        }

        let started_at = Instant::now();
        let pending = self.state.snapshot().pending_records();
        info!(
            "event=sync_pass module=sync status=start pending={}",
            pending.len()
        );

        let mut report = SyncReport::default();
        for record in &pending {
            match self.sync_one(record).await {
                SyncOutcome::Offline | SyncOutcome::Missing => report.skipped += 1,
                SyncOutcome::Synced { .. } => {
                    report.attempted += 1;
                    report.synced += 1;
                }
                SyncOutcome::Superseded { .. } => {
                    report.attempted += 1;
                    report.superseded += 1;
                }
                SyncOutcome::Failed(_) => {
                    report.attempted += 1;
                    report.failed += 1;
                }
            }
        }

        info!(
            "event=sync_pass module=sync status=ok attempted={} synced={} failed={} superseded={} skipped={} duration_ms={}",
            report.attempted,
            report.synced,
            report.failed,
            report.superseded,
            report.skipped,
            started_at.elapsed().as_millis()
        );
        report
    }

    fn mark_syncing(&self, id: RecordId) -> Result<(), StoreError> {
        let _writes = self.local_write_guard();
        self.local.set_sync_status(id, SyncStatus::Syncing)?;
        self.state.dispatch(StateEvent::SetRecordSyncStatus {
            id,
            status: SyncStatus::Syncing,
        });
        Ok(())
    }

    async fn push(&self, record: &Record) -> Result<(RemoteWrite, Record), SyncError> {
        let remote_records = self.remote.fetch_all().await?;
        let exists = remote_records.iter().any(|stored| stored.id == record.id);

        if exists {
            let stored = self.remote.update(record).await?;
            Ok((RemoteWrite::Update, stored))
        } else {
            let stored = self.remote.create(record).await?;
            Ok((RemoteWrite::Create, stored))
        }
    }

    fn commit(
        &self,
        sent: &Record,
        write: RemoteWrite,
        stored: Record,
    ) -> Result<SyncOutcome, SyncError> {
        let _writes = self.local_write_guard();
        match self.state.record(sent.id) {
            None => {
                debug!(
                    "event=sync_commit module=sync status=skipped reason=deleted record_id={}",
                    sent.id
                );
                return Ok(SyncOutcome::Superseded { write });
            }
            Some(current) if !same_content(&current, sent) => {
                debug!(
                    "event=sync_commit module=sync status=skipped reason=newer_local_edit record_id={}",
                    sent.id
                );
                return Ok(SyncOutcome::Superseded { write });
            }
            Some(_) => {}
        }

        let synced = stored.with_status(SyncStatus::Synced);
        self.local.put(&synced)?;
        self.state.dispatch(StateEvent::UpdateRecord(synced.clone()));
        Ok(SyncOutcome::Synced {
            record: synced,
            write,
        })
    }

    fn fail(&self, id: RecordId, err: SyncError, started_at: Instant) -> SyncOutcome {
        error!(
            "event=sync_record module=sync status=error record_id={} duration_ms={} error_code={} error={}",
            id,
            started_at.elapsed().as_millis(),
            err.code(),
            err
        );

        let _writes = self.local_write_guard();
        if let Err(store_err) = self.local.set_sync_status(id, SyncStatus::Error) {
            warn!(
                "event=sync_mark_error module=sync status=error record_id={} error_code={} error={}",
                id,
                store_err.code(),
                store_err
            );
        }
        self.state.dispatch(StateEvent::SetRecordSyncStatus {
            id,
            status: SyncStatus::Error,
        });
        SyncOutcome::Failed(err)
    }
}

fn same_content(a: &Record, b: &Record) -> bool {
    a.updated_at == b.updated_at && a.title == b.title && a.body == b.body
}

fn write_name(write: RemoteWrite) -> &'static str {
    match write {
        RemoteWrite::Create => "create",
        RemoteWrite::Update => "update",
    }
}
