//! In-process remote mirror with simulated latency and faults.
//!
//! Random faults hit only `create`/`update`. Tests script deterministic
//! faults instead and inspect the call journal.
//!
//! `create` appends like a `POST` would, so a duplicate create shows up as a
//! duplicate row.

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteConfig;
use crate::model::record::{Record, RecordId};
use async_trait::async_trait;
use log::debug;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Remote operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    FetchAll,
    Create,
    Update,
    Delete,
}

impl RemoteOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::FetchAll => "fetch_all",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One journal entry, recorded when a call starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub id: Option<RecordId>,
}

#[derive(Default)]
struct FaultScript {
    pending: HashMap<RemoteOp, usize>,
    failing_writes: HashSet<RecordId>,
}

/// Remote mirror kept in memory.
pub struct SimulatedRemoteStore {
    config: RemoteConfig,
    reachable: AtomicBool,
    mirror: Mutex<Vec<Record>>,
    faults: Mutex<FaultScript>,
    journal: Mutex<Vec<RemoteCall>>,
}

impl SimulatedRemoteStore {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            reachable: AtomicBool::new(true),
            mirror: Mutex::new(Vec::new()),
            faults: Mutex::new(FaultScript::default()),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Seeds the mirror, replacing its content.
    pub fn seed(&self, records: Vec<Record>) {
        *lock(&self.mirror) = records;
    }

    /// Snapshot of the mirror content.
    pub fn records(&self) -> Vec<Record> {
        lock(&self.mirror).clone()
    }

    /// When unreachable every call fails with `RemoteError::Unavailable`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes the next `times` calls of `op` fail transiently.
    pub fn fail_next(&self, op: RemoteOp, times: usize) {
        *lock(&self.faults).pending.entry(op).or_insert(0) += times;
    }

    /// Makes every create/update of `id` fail until faults are cleared.
    pub fn fail_writes_for(&self, id: RecordId) {
        lock(&self.faults).failing_writes.insert(id);
    }

    pub fn clear_faults(&self) {
        *lock(&self.faults) = FaultScript::default();
    }

    /// Calls observed so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.journal).clone()
    }

    /// Calls of one kind observed so far.
    pub fn calls_of(&self, op: RemoteOp) -> Vec<RemoteCall> {
        lock(&self.journal)
            .iter()
            .filter(|call| call.op == op)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.journal).clear();
    }

    async fn begin(&self, op: RemoteOp, id: Option<RecordId>) -> RemoteResult<()> {
        lock(&self.journal).push(RemoteCall { op, id });

        let latency = match op {
            RemoteOp::Create | RemoteOp::Update => self.config.write_latency(),
            RemoteOp::FetchAll | RemoteOp::Delete => self.config.latency(),
        };
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }

        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable);
        }
        self.take_fault(op, id)
    }

    fn take_fault(&self, op: RemoteOp, id: Option<RecordId>) -> RemoteResult<()> {
        let mut faults = lock(&self.faults);
        if let Some(remaining) = faults.pending.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Transient(format!(
                    "scripted {} failure",
                    op.as_str()
                )));
            }
        }

        let is_write = matches!(op, RemoteOp::Create | RemoteOp::Update);
        if is_write {
            if let Some(id) = id {
                if faults.failing_writes.contains(&id) {
                    return Err(RemoteError::Transient(format!(
                        "scripted {} failure for record",
                        op.as_str()
                    )));
                }
            }
            if roll_failure(self.config.failure_rate) {
                debug!(
                    "event=remote_fault_injected module=remote status=error op={}",
                    op.as_str()
                );
                return Err(RemoteError::Transient("simulated sync error".to_string()));
            }
        }
        Ok(())
    }
}

impl Default for SimulatedRemoteStore {
    fn default() -> Self {
        Self::new(RemoteConfig::default())
    }
}

#[async_trait]
impl RemoteStore for SimulatedRemoteStore {
    async fn fetch_all(&self) -> RemoteResult<Vec<Record>> {
        self.begin(RemoteOp::FetchAll, None).await?;
        Ok(self.records())
    }

    async fn create(&self, record: &Record) -> RemoteResult<Record> {
        self.begin(RemoteOp::Create, Some(record.id)).await?;
        lock(&self.mirror).push(record.clone());
        Ok(record.clone())
    }

    async fn update(&self, record: &Record) -> RemoteResult<Record> {
        self.begin(RemoteOp::Update, Some(record.id)).await?;
        let mut mirror = lock(&self.mirror);
        for stored in mirror.iter_mut().filter(|stored| stored.id == record.id) {
            *stored = record.clone();
        }
        Ok(record.clone())
    }

    async fn delete(&self, id: RecordId) -> RemoteResult<RecordId> {
        self.begin(RemoteOp::Delete, Some(id)).await?;
        lock(&self.mirror).retain(|stored| stored.id != id);
        Ok(id)
    }
}

fn roll_failure(rate: f64) -> bool {
    if rate <= 0.0 {
        return false;
    }
    rand::thread_rng().gen_bool(rate.min(1.0))
}

// Poisoning only follows a panic while mutating plain collections; the data
// is still structurally valid, so recover it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
