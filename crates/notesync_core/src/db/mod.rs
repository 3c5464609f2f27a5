//! Local record database: connection bootstrap and schema versioning.
//!
//! # Responsibility
//! - Hand out SQLite connections that already carry the `records` schema.
//! - Report storage failures with enough context to tell a broken schema
//!   upgrade apart from an ordinary query failure.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - A database written by a newer binary is never opened for writing.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-layer failure beneath the local record store.
#[derive(Debug)]
pub enum DbError {
    /// Query or connection failure outside schema upgrades.
    Sqlite(rusqlite::Error),
    /// Upgrading the schema to `version` failed; nothing was committed.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file was written by a binary with a newer schema.
    SchemaTooNew { found: u32, supported: u32 },
}

impl DbError {
    /// Stable snake_case code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite_error",
            Self::Migration { .. } => "migration_failed",
            Self::SchemaTooNew { .. } => "schema_too_new",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Migration { version, source } => {
                write!(f, "records schema migration to v{version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "records database is at schema v{found}, this build supports up to v{supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
