//! Side store for actions taken on auto decisions.
//!
//! Auto decisions have no row of their own, so what users did to them is
//! kept in `auto_card_states`, keyed by tenant and auto id, and laid over
//! each fresh synthesis. The stored state wins unless its snooze has run
//! out, it has expired, or its condition cleared since.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use towerline_core::{DecisionContract, DecisionStatus, Domain};
use towerline_storage::Row;

use super::rules::AutoDecision;
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCardState {
    /// `<tenant_id>:<auto_card_id>`
    pub id: String,
    pub tenant_id: String,
    pub auto_card_id: String,
    pub status: DecisionStatus,
    pub last_action: String,
    #[serde(default)]
    pub domain: Option<Domain>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub decision_outcome: Option<String>,
    #[serde(default)]
    pub owner_user_id: Option<String>,
    #[serde(default)]
    pub escalated_to: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub acted_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub snoozed_until: Option<OffsetDateTime>,
    /// After this instant the state no longer applies.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Set when the condition stopped being synthesized.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub cleared_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub version: i64,
}

impl AutoCardState {
    pub fn row_id(tenant_id: &str, auto_card_id: &str) -> String {
        format!("{tenant_id}:{auto_card_id}")
    }

    /// Capture a decision as it stands after a mutation.
    ///
    /// Terminal states expire after `ttl`; the rest last until the
    /// condition clears.
    pub fn capture(
        decision: &DecisionContract,
        action: &str,
        actor: Option<&str>,
        now: OffsetDateTime,
        ttl: time::Duration,
    ) -> Self {
        AutoCardState {
            id: Self::row_id(&decision.tenant_id, &decision.id),
            tenant_id: decision.tenant_id.clone(),
            auto_card_id: decision.id.clone(),
            status: decision.status,
            last_action: action.to_string(),
            domain: Some(decision.domain),
            actor: actor.map(str::to_string),
            decision_outcome: decision.decision_outcome.clone(),
            owner_user_id: decision.owner_user_id.clone(),
            escalated_to: decision.escalated_to.clone(),
            acted_at: now,
            snoozed_until: decision.snoozed_until,
            expires_at: decision.status.is_terminal().then(|| now.saturating_add(ttl)),
            cleared_at: None,
            version: 0,
        }
    }

    pub fn from_row(row: Row) -> Result<Self, EngineError> {
        Ok(serde_json::from_value(serde_json::Value::Object(row))?)
    }

    pub fn to_row(&self) -> Result<Row, EngineError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(EngineError::MalformedRow {
                id: self.id.clone(),
                message: "state is not an object".into(),
            }),
        }
    }

    /// Whether this state still overrides a fresh synthesis at `now`.
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        if self.cleared_at.is_some() {
            return false;
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return false;
        }
        !(self.status == DecisionStatus::Snoozed
            && self.snoozed_until.is_some_and(|until| until <= now))
    }

    fn overlay(&self, decision: &mut DecisionContract) {
        decision.status = self.status;
        if let Some(domain) = self.domain {
            if domain != decision.domain {
                decision.domain = domain;
                decision.owner_role = domain.default_owner_role().to_string();
            }
        }
        decision.owner_user_id = self.owner_user_id.clone();
        decision.escalated_to = self.escalated_to.clone();
        decision.snoozed_until = self.snoozed_until;
        decision.decision_outcome = self.decision_outcome.clone();
        if self.status.is_terminal() {
            decision.decided_by = self.actor.clone();
            decision.decided_at = Some(self.acted_at);
        }
        decision.updated_at = decision.updated_at.max(self.acted_at);
        decision.version = self.version;
    }
}

/// Lay active states over a fresh synthesis.
pub fn merge(
    base: Vec<AutoDecision>,
    states: &[AutoCardState],
    now: OffsetDateTime,
) -> Vec<AutoDecision> {
    base.into_iter()
        .map(|mut auto| {
            let state = states
                .iter()
                .find(|s| s.auto_card_id == auto.decision.id && s.is_active(now));
            if let Some(state) = state {
                tracing::debug!(
                    decision_id = %auto.decision.id,
                    status = %state.status,
                    "auto decision overlaid from side store"
                );
                state.overlay(&mut auto.decision);
            }
            auto
        })
        .collect()
}

/// States whose condition is no longer synthesized and not yet marked cleared.
pub fn vanished<'a>(base: &[AutoDecision], states: &'a [AutoCardState]) -> Vec<&'a AutoCardState> {
    states
        .iter()
        .filter(|s| s.cleared_at.is_none())
        .filter(|s| !base.iter().any(|a| a.decision.id == s.auto_card_id))
        .collect()
}
