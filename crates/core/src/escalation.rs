//! Escalation policy evaluator.
//!
//! [`should_escalate`] is pure in its inputs, but one of those inputs is the
//! current time: the same decision flips from `false` to `true` once its
//! deadline is far enough behind `now`. Re-evaluate on every read; never
//! store the answer as a fact about the decision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::contract::{DecisionContract, DecisionStatus, Severity};

/// Thresholds for forwarding a decision to the cross-domain authority.
///
/// `impact_threshold` is compared against `abs(impact_amount)` in whatever
/// currency unit the caller normalized to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EscalationConfig {
    pub min_severity: Severity,
    pub overdue_hours: i64,
    pub impact_threshold: Decimal,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        EscalationConfig {
            min_severity: Severity::Critical,
            overdue_hours: 4,
            impact_threshold: Decimal::from(100_000_000i64),
        }
    }
}

/// Which rule fired (or why none did).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    Overdue,
    HighImpact,
}

impl EscalationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationReason::Overdue => "overdue",
            EscalationReason::HighImpact => "high_impact",
        }
    }
}

/// Evaluate the escalation rules in order and report which one fired.
pub fn escalation_reason(
    decision: &DecisionContract,
    config: &EscalationConfig,
    now: OffsetDateTime,
) -> Option<EscalationReason> {
    if matches!(
        decision.status,
        DecisionStatus::Escalated | DecisionStatus::Decided | DecisionStatus::Dismissed
    ) {
        return None;
    }
    if decision.severity < config.min_severity {
        return None;
    }
    let grace = config.overdue_hours.checked_mul(3600).map(Duration::seconds);
    if grace.is_some_and(|grace| now - decision.deadline_at >= grace) {
        return Some(EscalationReason::Overdue);
    }
    if decision.impact_amount.abs() >= config.impact_threshold {
        return Some(EscalationReason::HighImpact);
    }
    None
}

pub fn should_escalate(
    decision: &DecisionContract,
    config: &EscalationConfig,
    now: OffsetDateTime,
) -> bool {
    escalation_reason(decision, config, now).is_some()
}
