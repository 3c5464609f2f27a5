//! Synchronization orchestration.
//!
//! # Responsibility
//! - Reconcile local records against the remote mirror (`engine`).
//! - Schedule reconciliation from connectivity signals (`monitor`).

pub mod engine;
pub mod monitor;
