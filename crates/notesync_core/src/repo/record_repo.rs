//! Local record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Durable keyed persistence of records with a descending `updated_at` scan.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Exactly one row per record id.
//! - Every operation runs under one connection lock, so no caller observes a
//!   partially applied write from another operation.
//! - Write paths call `Record::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::record::{Record, RecordId, RecordValidationError, SyncStatus};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    title,
    body,
    created_at,
    updated_at,
    sync_status
FROM records";

pub type StoreResult<T> = Result<T, StoreError>;

/// Local store failure taxonomy.
#[derive(Debug)]
pub enum StoreError {
    /// `add` was called with an id that already exists.
    DuplicateKey(RecordId),
    /// Storage-layer failure.
    Storage(DbError),
    /// A persisted row could not be decoded.
    InvalidData(String),
    /// Record rejected before persistence.
    Validation(RecordValidationError),
    /// Another holder of the connection lock panicked.
    LockPoisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(id) => write!(f, "record already exists: {id}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::LockPoisoned => write!(f, "local store connection lock poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::DuplicateKey(_) | Self::InvalidData(_) | Self::LockPoisoned => None,
        }
    }
}

impl StoreError {
    /// Stable snake_case code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateKey(_) => "duplicate_key",
            Self::Storage(_) => "storage_error",
            Self::InvalidData(_) => "invalid_data",
            Self::Validation(_) => "validation_failed",
            Self::LockPoisoned => "lock_poisoned",
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Durable persistence contract for records.
pub trait RecordRepository: Send + Sync {
    /// Full scan ordered by `updated_at` descending.
    fn get_all(&self) -> StoreResult<Vec<Record>>;
    /// Looks up one record by id.
    fn get(&self, id: RecordId) -> StoreResult<Option<Record>>;
    /// Inserts a new record; fails with `DuplicateKey` if the id exists.
    fn add(&self, record: &Record) -> StoreResult<()>;
    /// Inserts or fully overwrites a record.
    fn put(&self, record: &Record) -> StoreResult<()>;
    /// Removes a record; succeeds when the id is absent.
    fn remove(&self, id: RecordId) -> StoreResult<()>;
    /// Updates only the status column; no-op when the id is absent.
    fn set_sync_status(&self, id: RecordId, status: SyncStatus) -> StoreResult<()>;
}

/// SQLite-backed record repository.
///
/// Owns its connection behind a mutex so it can be shared between the client
/// facade, the sync engine and the connectivity monitor.
pub struct SqliteRecordRepository {
    conn: Mutex<Connection>,
}

impl SqliteRecordRepository {
    /// Wraps a migrated connection, verifying the `records` table exists.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_records_table(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn get_all(&self) -> StoreResult<Vec<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT_SQL} ORDER BY updated_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn get(&self, id: RecordId) -> StoreResult<Option<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{RECORD_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_record_row(row)?)),
            None => Ok(None),
        }
    }

    fn add(&self, record: &Record) -> StoreResult<()> {
        record.validate()?;
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO records (id, title, body, created_at, updated_at, sync_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                record.id.to_string(),
                record.title.as_str(),
                record.body.as_str(),
                record.created_at,
                record.updated_at,
                record.sync_status.as_str(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_primary_key_violation(&err) => Err(StoreError::DuplicateKey(record.id)),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&self, record: &Record) -> StoreResult<()> {
        record.validate()?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO records (id, title, body, created_at, updated_at, sync_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                body = excluded.body,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                sync_status = excluded.sync_status;",
            params![
                record.id.to_string(),
                record.title.as_str(),
                record.body.as_str(),
                record.created_at,
                record.updated_at,
                record.sync_status.as_str(),
            ],
        )?;
        Ok(())
    }

    fn remove(&self, id: RecordId) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM records WHERE id = ?1;", [id.to_string()])?;
        Ok(())
    }

    fn set_sync_status(&self, id: RecordId, status: SyncStatus) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE records SET sync_status = ?1 WHERE id = ?2;",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(())
    }
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<Record> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in records.id"))
    })?;

    let status_text: String = row.get("sync_status")?;
    let sync_status = SyncStatus::parse(&status_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid sync status `{status_text}` in records.sync_status"
        ))
    })?;

    let record = Record {
        id,
        title: row.get("title")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        sync_status,
    };
    record.validate()?;
    Ok(record)
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn ensure_records_table(conn: &Connection) -> StoreResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'records'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(StoreError::InvalidData(
            "records table is missing; open the database through db::open_db".to_string(),
        ));
    }
    Ok(())
}
