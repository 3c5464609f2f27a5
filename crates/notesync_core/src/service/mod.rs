//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate persistence, state and sync into user-intent level APIs.
//! - Keep the presentation layer decoupled from storage and sync details.

pub mod edit_session;
pub mod record_service;
