//! Decision lifecycle: which status each action leads to, and when a
//! transition is allowed.
//!
//! ```text
//!            assign_owner            decide / dismiss
//!   OPEN ───────────────▶ IN_PROGRESS ───────────────▶ DECIDED | DISMISSED
//!    │ ▲                       │
//!    │ └── snooze expires ─┐   │ escalate
//!    ▼                     │   ▼
//!  SNOOZED ────────────────┘ ESCALATED ──▶ DECIDED | DISMISSED
//! ```
//!
//! `SNOOZED` is the only reversible state: it reads as `OPEN` again once
//! `snoozed_until` has passed.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::contract::{DecisionContract, DecisionStatus};
use crate::error::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleAction {
    Decide,
    Dismiss,
    Snooze,
    Escalate,
    Reassign,
    AssignOwner,
}

impl LifecycleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleAction::Decide => "DECIDE",
            LifecycleAction::Dismiss => "DISMISS",
            LifecycleAction::Snooze => "SNOOZE",
            LifecycleAction::Escalate => "ESCALATE",
            LifecycleAction::Reassign => "REASSIGN",
            LifecycleAction::AssignOwner => "ASSIGN_OWNER",
        }
    }

    pub fn target_status(self) -> DecisionStatus {
        match self {
            LifecycleAction::Decide => DecisionStatus::Decided,
            LifecycleAction::Dismiss => DecisionStatus::Dismissed,
            LifecycleAction::Snooze => DecisionStatus::Snoozed,
            LifecycleAction::Escalate => DecisionStatus::Escalated,
            LifecycleAction::Reassign => DecisionStatus::Open,
            LifecycleAction::AssignOwner => DecisionStatus::InProgress,
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How stale-state mutations (acting on an already terminal decision) are
/// treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Apply anyway; the write is last-write-wins.
    #[default]
    Permissive,
    /// Refuse to leave a terminal state. Re-applying the same terminal
    /// action (a caller retry) is still allowed.
    Strict,
}

pub fn check_transition(
    from: DecisionStatus,
    action: LifecycleAction,
    mode: TransitionMode,
) -> Result<DecisionStatus, TransitionError> {
    let to = action.target_status();
    if mode == TransitionMode::Strict && from.is_terminal() && from != to {
        return Err(TransitionError { from, action });
    }
    Ok(to)
}

/// Status as seen at `now`: an expired snooze reads as `OPEN`.
pub fn effective_status(decision: &DecisionContract, now: OffsetDateTime) -> DecisionStatus {
    match (decision.status, decision.snoozed_until) {
        (DecisionStatus::Snoozed, Some(until)) if until <= now => DecisionStatus::Open,
        (status, _) => status,
    }
}
