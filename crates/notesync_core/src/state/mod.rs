//! In-memory application state and its reducer.
//!
//! # Responsibility
//! - Own the single in-memory view of records, selection, connectivity and
//!   search query.
//! - Apply discrete events through a pure reducer and notify subscribers.
//!
//! # Invariants
//! - `reduce` is deterministic and side-effect free.
//! - At most one record per id in `AppState::records`.
//! - The store never calls persistence, the remote mirror or the sync engine.

use crate::model::record::{Record, RecordId, SyncStatus};
use log::debug;
use std::collections::HashSet;
use tokio::sync::watch;

/// Snapshot of everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    /// Newest-first insertion order; use `visible_records` for display order.
    pub records: Vec<Record>,
    pub selected_id: Option<RecordId>,
    pub is_online: bool,
    pub search_query: String,
}

impl AppState {
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.selected_id.and_then(|id| self.record(id))
    }

    /// Records matching the search query, newest `updated_at` first.
    pub fn visible_records(&self) -> Vec<&Record> {
        let mut visible: Vec<&Record> = self
            .records
            .iter()
            .filter(|record| record.matches_query(&self.search_query))
            .collect();
        visible.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        visible
    }

    /// Records a reconciliation pass should attempt.
    pub fn pending_records(&self) -> Vec<Record> {
        self.records
            .iter()
            .filter(|record| record.sync_status.needs_sync())
            .cloned()
            .collect()
    }
}

/// State transitions accepted by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    SetAllRecords(Vec<Record>),
    AddRecord(Record),
    UpdateRecord(Record),
    DeleteRecord(RecordId),
    SelectRecord(Option<RecordId>),
    SetOnlineStatus(bool),
    SetRecordSyncStatus { id: RecordId, status: SyncStatus },
    SetSearchQuery(String),
}

impl StateEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::SetAllRecords(_) => "set_all_records",
            Self::AddRecord(_) => "add_record",
            Self::UpdateRecord(_) => "update_record",
            Self::DeleteRecord(_) => "delete_record",
            Self::SelectRecord(_) => "select_record",
            Self::SetOnlineStatus(_) => "set_online_status",
            Self::SetRecordSyncStatus { .. } => "set_record_sync_status",
            Self::SetSearchQuery(_) => "set_search_query",
        }
    }
}

/// Pure reducer: same state and event always yield the same new state.
pub fn reduce(state: &AppState, event: StateEvent) -> AppState {
    let mut next = state.clone();
    match event {
        StateEvent::SetAllRecords(records) => {
            let mut seen = HashSet::new();
            next.records = records
                .into_iter()
                .filter(|record| seen.insert(record.id))
                .collect();
            if let Some(selected) = next.selected_id {
                if next.record(selected).is_none() {
                    next.selected_id = None;
                }
            }
        }
        StateEvent::AddRecord(record) => {
            next.records.retain(|existing| existing.id != record.id);
            next.records.insert(0, record);
        }
        StateEvent::UpdateRecord(record) => {
            if let Some(existing) = next.records.iter_mut().find(|r| r.id == record.id) {
                *existing = record;
            }
        }
        StateEvent::DeleteRecord(id) => {
            next.records.retain(|record| record.id != id);
            if next.selected_id == Some(id) {
                next.selected_id = None;
            }
        }
        StateEvent::SelectRecord(id) => {
            next.selected_id = id;
        }
        StateEvent::SetOnlineStatus(online) => {
            next.is_online = online;
        }
        StateEvent::SetRecordSyncStatus { id, status } => {
            if let Some(existing) = next.records.iter_mut().find(|r| r.id == id) {
                existing.sync_status = status;
            }
        }
        StateEvent::SetSearchQuery(query) => {
            next.search_query = query;
        }
    }
    next
}

/// Single owner of `AppState`.
///
/// Subscribers receive a `watch::Receiver` that is notified only when a
/// dispatched event actually changes the state.
pub struct StateStore {
    sender: watch::Sender<AppState>,
}

impl StateStore {
    pub fn new(initial: AppState) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self { sender }
    }

    /// Applies one event; returns whether the state changed.
    pub fn dispatch(&self, event: StateEvent) -> bool {
        let kind = event.kind();
        let changed = self.sender.send_if_modified(|state| {
            let next = reduce(state, event);
            if next == *state {
                return false;
            }
            *state = next;
            true
        });
        debug!("event=state_dispatch module=state kind={kind} changed={changed}");
        changed
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> AppState {
        self.sender.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        self.sender.borrow().is_online
    }

    pub fn record(&self, id: RecordId) -> Option<Record> {
        self.sender.borrow().record(id).cloned()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.sender.subscribe()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}
