//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the local record store contract.
//! - Isolate SQLite query details from sync and client orchestration.

pub mod record_repo;
