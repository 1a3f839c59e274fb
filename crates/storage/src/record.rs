use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A raw storage row: an open-ended column → value map.
///
/// Every row carries a string `id` and an integer `version`. Anything else
/// is whatever the producer wrote, with no guarantee on casing or type.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Table names used by the engine.
pub mod tables {
    /// Persisted decision cards for all domains, scoped by `card_type` prefix.
    pub const DECISION_CARDS: &str = "decision_cards";
    /// Append-only audit ledger.
    pub const AUDIT_LOG: &str = "decision_audit_log";
    /// Side store for actions taken on auto-synthesized decisions.
    pub const AUTO_CARD_STATES: &str = "auto_card_states";
}

/// Server-side status counts for one tenant and `card_type` prefix.
///
/// Computed over raw rows (no dedupe), reading canonical status strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub total: u64,
    pub open: u64,
    pub in_progress: u64,
    pub snoozed: u64,
    pub escalated: u64,
    pub decided: u64,
    pub dismissed: u64,
    pub critical: u64,
    pub overdue: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginCounts {
    pub persisted: u64,
    pub ephemeral: u64,
}

/// Server-side audit statistics for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: u64,
    pub by_origin: OriginCounts,
    pub decided: u64,
    pub dismissed: u64,
    pub snoozed: u64,
    pub last_7_days: u64,
    pub last_30_days: u64,
    /// Sum of `abs(impact_amount)` over `DECIDED` entries.
    pub total_impact: Decimal,
}
