//! Migration lifecycle state machine and pre-flight checks.
//!
//! ```text
//! not_started -> running -> success
//!                        \-> error
//! ```
//!
//! `success` and `error` are terminal. Stores must call
//! [`validate_transition`] before persisting any state change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Normalized name of the mount point that must be part of every migration
/// (the boot volume).
pub const SYSTEM_MOUNT_POINT: &str = "c:\\";

// ---------------------------------------------------------------------------
// MigrationState
// ---------------------------------------------------------------------------

/// Lifecycle state of a migration job.
///
/// Serialized (and stored) as the snake_case name, e.g. `"not_started"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    NotStarted,
    Running,
    Success,
    Error,
}

impl MigrationState {
    pub const ALL: [MigrationState; 4] = [
        MigrationState::NotStarted,
        MigrationState::Running,
        MigrationState::Success,
        MigrationState::Error,
    ];

    /// Column value used by the `migrations.state` check constraint.
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationState::NotStarted => "not_started",
            MigrationState::Running => "running",
            MigrationState::Success => "success",
            MigrationState::Error => "error",
        }
    }

    /// `true` for `success` and `error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationState::Success | MigrationState::Error)
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MigrationState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown migration state: \"{s}\"")))
    }
}

impl TryFrom<String> for MigrationState {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, CoreError> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::MigrationState::{self, *};
    use crate::error::CoreError;

    /// Returns the states reachable from `from` in a single step.
    ///
    /// Terminal states return an empty slice.
    pub fn valid_transitions(from: MigrationState) -> &'static [MigrationState] {
        match from {
            NotStarted => &[Running],
            Running => &[Success, Error],
            Success | Error => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: MigrationState, to: MigrationState) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition.
    pub fn validate_transition(from: MigrationState, to: MigrationState) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from, to })
        }
    }
}

pub use state_machine::{can_transition, valid_transitions, validate_transition};

// ---------------------------------------------------------------------------
// Pre-flight
// ---------------------------------------------------------------------------

/// Normalize a mount point name for comparison: trimmed and lowercased.
pub fn normalize_mount_point_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Checks that must pass before a migration may enter `running`.
///
/// 1. The job must still be `not_started` (otherwise `InvalidTransition`).
/// 2. The selection must contain the system mount point (otherwise
///    `Validation`).
///
/// Nothing is mutated here; a failed check leaves the job untouched.
pub fn preflight<'a, I>(state: MigrationState, selected_names: I) -> Result<(), CoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    validate_transition(state, MigrationState::Running)?;

    let has_system = selected_names
        .into_iter()
        .any(|name| normalize_mount_point_name(name) == SYSTEM_MOUNT_POINT);

    if !has_system {
        return Err(CoreError::Validation(
            "Cannot start migration: the system mount point 'C:\\' is not selected".to_string(),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
