//! Audit entry contract.
//!
//! One [`AuditLogEntry`] is appended per lifecycle action. The entry carries
//! a frozen copy of the decision (`card_snapshot`) plus a SHA-256 digest of
//! that copy so later tampering with a stored snapshot is detectable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::contract::{DecisionContract, DecisionStatus, Grain};

/// Where the acted-on decision lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSource {
    /// Backed by a storage row.
    Persisted,
    /// Synthesized on read; state kept in the side store.
    Ephemeral,
}

impl CardSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CardSource::Persisted => "persisted",
            CardSource::Ephemeral => "ephemeral",
        }
    }
}

/// The human- or policy-supplied part of an audit entry.
#[derive(Debug, Clone, Default)]
pub struct AuditAction {
    pub action_type: String,
    pub action_label: Option<String>,
    pub actor: Option<String>,
    pub comment: Option<String>,
    pub dismiss_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub tenant_id: String,
    pub card_identifier: String,
    pub card_source: CardSource,
    pub card_type: String,
    pub entity_type: Grain,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub entity_label: Option<String>,
    pub action_type: String,
    #[serde(default)]
    pub action_label: Option<String>,
    pub decision_status: DecisionStatus,
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub decided_at: OffsetDateTime,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub dismiss_reason: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub snoozed_until: Option<OffsetDateTime>,
    #[serde(default)]
    pub impact_amount: Option<Decimal>,
    pub card_snapshot: serde_json::Value,
    pub snapshot_digest: String,
}

impl AuditLogEntry {
    /// Freeze `decision` as it stands after the action was applied.
    pub fn from_decision(
        decision: &DecisionContract,
        source: CardSource,
        action: AuditAction,
        at: OffsetDateTime,
    ) -> Result<Self, serde_json::Error> {
        let card_snapshot = serde_json::to_value(decision)?;
        let snapshot_digest = digest(&card_snapshot)?;
        Ok(AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: decision.tenant_id.clone(),
            card_identifier: decision.id.clone(),
            card_source: source,
            card_type: decision.card_type(),
            entity_type: decision.entity_type,
            entity_id: Some(decision.entity_id.clone()),
            entity_label: Some(decision.entity_name.clone()),
            action_type: action.action_type,
            action_label: action.action_label,
            decision_status: decision.status,
            decided_by: action.actor,
            decided_at: at,
            comment: action.comment,
            dismiss_reason: action.dismiss_reason,
            snoozed_until: decision.snoozed_until,
            impact_amount: Some(decision.impact_amount),
            card_snapshot,
            snapshot_digest,
        })
    }

    /// Recompute the snapshot digest and compare.
    pub fn verify_snapshot(&self) -> bool {
        digest(&self.card_snapshot)
            .map(|d| d == self.snapshot_digest)
            .unwrap_or(false)
    }
}

fn digest(snapshot: &serde_json::Value) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(snapshot)?;
    Ok(Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}
