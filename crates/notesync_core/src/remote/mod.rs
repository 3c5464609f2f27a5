//! Remote mirror client contract.
//!
//! # Responsibility
//! - Abstract the remote record API: list, create, update, delete.
//! - Classify remote failures as retryable.
//!
//! # Invariants
//! - Every call transmits or returns whole records.
//! - The remote side is a passive mirror and never resolves conflicts.

use crate::model::record::{Record, RecordId};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod simulated;

pub use simulated::{RemoteCall, RemoteOp, SimulatedRemoteStore};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote call failure. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or API fault that may succeed on a later attempt.
    Transient(String),
    /// The transport could not reach the remote at all.
    Unavailable,
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Stable snake_case code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transient(_) => "remote_transient",
            Self::Unavailable => "remote_unavailable",
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(message) => write!(f, "transient remote failure: {message}"),
            Self::Unavailable => write!(f, "remote store unreachable"),
        }
    }
}

impl Error for RemoteError {}

/// Remote mirror API.
///
/// Maps onto `GET /records`, `POST /records`, `PUT /records/{id}` and
/// `DELETE /records/{id}`. There is no single-record fetch.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists every record held by the mirror.
    async fn fetch_all(&self) -> RemoteResult<Vec<Record>>;
    /// Stores a new record and returns the stored copy.
    async fn create(&self, record: &Record) -> RemoteResult<Record>;
    /// Overwrites the record with the same id and returns the stored copy.
    async fn update(&self, record: &Record) -> RemoteResult<Record>;
    /// Deletes by id and returns the deleted id.
    async fn delete(&self, id: RecordId) -> RemoteResult<RecordId>;
}
