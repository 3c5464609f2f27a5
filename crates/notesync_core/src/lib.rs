//! Offline-first record synchronization engine.
//!
//! A client keeps an authoritative local copy of its records in SQLite,
//! mutates it while disconnected and reconciles it against a remote mirror
//! whenever connectivity is available. Conflicts resolve last-writer-wins:
//! the client's record always overwrites the remote copy.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod service;
pub mod state;
pub mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig, RemoteConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{Record, RecordId, RecordValidationError, SyncStatus, DEFAULT_RECORD_TITLE};
pub use remote::{
    RemoteCall, RemoteError, RemoteOp, RemoteResult, RemoteStore, SimulatedRemoteStore,
};
pub use repo::record_repo::{RecordRepository, SqliteRecordRepository, StoreError, StoreResult};
pub use service::edit_session::EditSession;
pub use service::record_service::{RecordService, RecordServiceError};
pub use state::{reduce, AppState, StateEvent, StateStore};
pub use sync::engine::{RemoteWrite, SyncEngine, SyncError, SyncOutcome, SyncReport};
pub use sync::monitor::{ConnectivityHandle, ConnectivityMonitor, ConnectivityProbe, StaticProbe};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
