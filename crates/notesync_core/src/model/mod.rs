//! Domain model for synchronized records.
//!
//! # Responsibility
//! - Define the record shape shared by local storage, the remote mirror and
//!   in-memory application state.
//! - Define the per-record sync status state machine.
//!
//! # Invariants
//! - Every record is identified by a stable, client-generated `RecordId`.
//! - `updated_at` is the sole ordering key; `sync_status` is derived state.

pub mod record;
