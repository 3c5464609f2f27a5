//! Record domain model.
//!
//! # Responsibility
//! - Define the unit of synchronization and its lifecycle helpers.
//! - Encode the legal sync status transitions.
//!
//! # Invariants
//! - `id` and `created_at` never change after creation.
//! - `updated_at >= created_at` always.
//! - `updated_at` never decreases across content mutations.
//! - A content mutation always resets `sync_status` to `Unsynced`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Title given to freshly created records.
pub const DEFAULT_RECORD_TITLE: &str = "Untitled Note";

/// Stable identifier shared by local and remote copies of a record.
pub type RecordId = Uuid;

/// Per-record reconciliation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local changes not yet mirrored remotely.
    Unsynced,
    /// A sync attempt is in flight.
    Syncing,
    /// Local copy matches what was last written to the remote mirror.
    Synced,
    /// Last attempt failed; eligible for retry on the next pass.
    Error,
}

impl SyncStatus {
    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsynced => "unsynced",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }

    /// Parses a storage/wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unsynced" => Some(Self::Unsynced),
            "syncing" => Some(Self::Syncing),
            "synced" => Some(Self::Synced),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether a reconciliation pass should attempt this record.
    pub fn needs_sync(self) -> bool {
        matches!(self, Self::Unsynced | Self::Error)
    }

    /// Whether the sync state machine allows `self -> next`.
    ///
    /// Content mutations are not transitions of this machine; they reset any
    /// state to `Unsynced` through [`Record::apply_content`].
    pub fn can_transition_to(self, next: SyncStatus) -> bool {
        matches!(
            (self, next),
            (Self::Unsynced, Self::Syncing)
                | (Self::Error, Self::Syncing)
                | (Self::Syncing, Self::Synced)
                | (Self::Syncing, Self::Error)
        )
    }
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for record timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    UpdatedBeforeCreated { created_at: i64, updated_at: i64 },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdatedBeforeCreated {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({updated_at}) must not be earlier than created_at ({created_at})"
            ),
        }
    }
}

impl Error for RecordValidationError {}

/// The unit of synchronization.
///
/// Serialized with camelCase keys so the same shape travels to the remote
/// mirror unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    pub body: String,
    /// Unix epoch milliseconds, client clock.
    pub created_at: i64,
    /// Unix epoch milliseconds of the last local content mutation.
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

impl Record {
    /// Creates an untitled, empty, unsynced record stamped at `now_ms`.
    pub fn new(now_ms: i64) -> Self {
        Self::with_id(Uuid::new_v4(), now_ms)
    }

    /// Creates an untitled record with a caller-provided id.
    pub fn with_id(id: RecordId, now_ms: i64) -> Self {
        Self {
            id,
            title: DEFAULT_RECORD_TITLE.to_string(),
            body: String::new(),
            created_at: now_ms,
            updated_at: now_ms,
            sync_status: SyncStatus::Unsynced,
        }
    }

    /// Replaces title and body, returning the mutated copy.
    ///
    /// `updated_at` becomes `max(now_ms, previous updated_at)` so the ordering
    /// key never moves backwards under clock skew.
    pub fn apply_content(
        &self,
        title: impl Into<String>,
        body: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: self.id,
            title: title.into(),
            body: body.into(),
            created_at: self.created_at,
            updated_at: now_ms.max(self.updated_at),
            sync_status: SyncStatus::Unsynced,
        }
    }

    /// Returns a copy carrying `status`.
    pub fn with_status(&self, status: SyncStatus) -> Self {
        let mut next = self.clone();
        next.sync_status = status;
        next
    }

    /// Checks timestamp invariants.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.updated_at < self.created_at {
            return Err(RecordValidationError::UpdatedBeforeCreated {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }

    /// Case-insensitive substring match over title and body.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle) || self.body.to_lowercase().contains(&needle)
    }
}
