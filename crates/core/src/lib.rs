//! Domain types and pure business rules for the migration orchestrator.
//!
//! This crate has no internal dependencies and no I/O, so the state machine
//! and validation rules can be shared by the store, the engine and the API.

pub mod error;
pub mod inventory;
pub mod migration;
pub mod types;
