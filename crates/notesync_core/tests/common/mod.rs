#![allow(dead_code)]

use notesync_core::db::{open_db_in_memory, DbError};
use notesync_core::{
    EngineConfig, ManualClock, Record, RecordId, RecordRepository, RecordService, RemoteConfig,
    SimulatedRemoteStore, SqliteRecordRepository, StoreError, StoreResult, SyncStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Harness {
    pub service: Arc<RecordService>,
    pub local: Arc<FlakyRepository>,
    pub remote: Arc<SimulatedRemoteStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Goes online and waits for the pass that the transition starts.
    pub async fn go_online(&self) {
        if let Some(pass) = self.service.set_connectivity(true) {
            pass.await.expect("sync pass should not panic");
        }
    }

    pub fn go_offline(&self) {
        assert!(self.service.set_connectivity(false).is_none());
    }

    pub fn status_in_memory(&self, id: RecordId) -> SyncStatus {
        self.service
            .snapshot()
            .records
            .iter()
            .find(|record| record.id == id)
            .expect("record should be in memory")
            .sync_status
    }

    pub fn status_on_disk(&self, id: RecordId) -> SyncStatus {
        self.local_record(id).sync_status
    }

    pub fn local_record(&self, id: RecordId) -> Record {
        self.local
            .get(id)
            .unwrap()
            .expect("record should be persisted")
    }
}

pub fn harness() -> Harness {
    harness_with_remote(RemoteConfig::instant())
}

pub fn harness_with_remote(remote_config: RemoteConfig) -> Harness {
    let local = Arc::new(FlakyRepository::new());
    let remote = Arc::new(SimulatedRemoteStore::new(remote_config.clone()));
    let clock = Arc::new(ManualClock::new(0));
    let config = EngineConfig {
        remote: remote_config,
        ..EngineConfig::default()
    };
    let service = RecordService::new(local.clone(), remote.clone(), config).with_clock(clock.clone());
    Harness {
        service: Arc::new(service),
        local,
        remote,
        clock,
    }
}

/// SQLite repository whose writes can be switched to fail.
pub struct FlakyRepository {
    inner: SqliteRecordRepository,
    fail_writes: AtomicBool,
    fail_status_updates: AtomicBool,
}

impl FlakyRepository {
    pub fn new() -> Self {
        Self {
            inner: SqliteRecordRepository::try_new(open_db_in_memory().unwrap()).unwrap(),
            fail_writes: AtomicBool::new(false),
            fail_status_updates: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_status_updates(&self, fail: bool) {
        self.fail_status_updates.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Storage(DbError::Sqlite(
                rusqlite::Error::InvalidQuery,
            )));
        }
        Ok(())
    }
}

impl RecordRepository for FlakyRepository {
    fn get_all(&self) -> StoreResult<Vec<Record>> {
        self.inner.get_all()
    }

    fn get(&self, id: RecordId) -> StoreResult<Option<Record>> {
        self.inner.get(id)
    }

    fn add(&self, record: &Record) -> StoreResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.add(record)
    }

    fn put(&self, record: &Record) -> StoreResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.put(record)
    }

    fn remove(&self, id: RecordId) -> StoreResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.remove(id)
    }

    fn set_sync_status(&self, id: RecordId, status: SyncStatus) -> StoreResult<()> {
        Self::check(&self.fail_status_updates)?;
        self.inner.set_sync_status(id, status)
    }
}
