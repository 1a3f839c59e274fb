//! Canonical contract types shared by every analytical domain.
//!
//! A [`DecisionContract`] is the one record type that FDP, MDP, CDP and the
//! auto-synthesizer all produce. Everything that arrives loosely typed from
//! storage is normalized into these closed enumerations before it gets here
//! (see [`crate::normalize`]).

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// ──────────────────────────────────────────────
// Domain
// ──────────────────────────────────────────────

/// Analytical domain that owns a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    /// Finance data platform.
    #[serde(rename = "FDP")]
    Fdp,
    /// Marketing data platform.
    #[serde(rename = "MDP")]
    Mdp,
    /// Customer data platform.
    #[serde(rename = "CDP")]
    Cdp,
    /// Cross-domain authority that receives escalations.
    #[serde(rename = "CONTROL_TOWER")]
    ControlTower,
}

impl Domain {
    /// Domains that own their own decision cards.
    pub const OPERATIONAL: [Domain; 3] = [Domain::Fdp, Domain::Mdp, Domain::Cdp];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Fdp => "FDP",
            Domain::Mdp => "MDP",
            Domain::Cdp => "CDP",
            Domain::ControlTower => "CONTROL_TOWER",
        }
    }

    /// Prefix used on persisted `card_type` values to scope rows to a domain.
    pub fn card_type_prefix(self) -> &'static str {
        match self {
            Domain::Fdp => "FDP_",
            Domain::Mdp => "MDP_",
            Domain::Cdp => "CDP_",
            Domain::ControlTower => "CT_",
        }
    }

    pub fn default_owner_role(self) -> &'static str {
        match self {
            Domain::Fdp => "CFO",
            Domain::Mdp => "CMO",
            Domain::Cdp => "CCO",
            Domain::ControlTower => "COO",
        }
    }

    /// Resolve the domain a persisted `card_type` belongs to.
    pub fn from_card_type(card_type: &str) -> Option<Domain> {
        [Domain::Fdp, Domain::Mdp, Domain::Cdp, Domain::ControlTower]
            .into_iter()
            .find(|d| card_type.starts_with(d.card_type_prefix()))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Grain
// ──────────────────────────────────────────────

/// Aggregation level a metric or decision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grain {
    Tenant,
    Channel,
    Sku,
    Customer,
    Segment,
    Campaign,
    Order,
    Store,
    Cohort,
}

impl Grain {
    pub fn as_str(self) -> &'static str {
        match self {
            Grain::Tenant => "tenant",
            Grain::Channel => "channel",
            Grain::Sku => "sku",
            Grain::Customer => "customer",
            Grain::Segment => "segment",
            Grain::Campaign => "campaign",
            Grain::Order => "order",
            Grain::Store => "store",
            Grain::Cohort => "cohort",
        }
    }
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Severity / Priority
// ──────────────────────────────────────────────

/// Urgency of a decision. Ordered so that `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Higher rank means more urgent.
    pub fn urgency_rank(self) -> u8 {
        match self {
            Severity::Critical => 3,
            Severity::High => 2,
            Severity::Medium => 1,
            Severity::Low => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.urgency_rank().cmp(&other.urgency_rank())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority label carried by auto-synthesized decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
}

impl Priority {
    pub fn severity(self) -> Severity {
        match self {
            Priority::P1 => Severity::Critical,
            Priority::P2 => Severity::High,
            Priority::P3 => Severity::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        };
        f.write_str(s)
    }
}

// ──────────────────────────────────────────────
// Status
// ──────────────────────────────────────────────

/// Lifecycle status of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    Open,
    InProgress,
    Snoozed,
    Escalated,
    Decided,
    Dismissed,
}

impl DecisionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionStatus::Open => "OPEN",
            DecisionStatus::InProgress => "IN_PROGRESS",
            DecisionStatus::Snoozed => "SNOOZED",
            DecisionStatus::Escalated => "ESCALATED",
            DecisionStatus::Decided => "DECIDED",
            DecisionStatus::Dismissed => "DISMISSED",
        }
    }

    /// `DECIDED` and `DISMISSED` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, DecisionStatus::Decided | DecisionStatus::Dismissed)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Facts
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactStatus {
    Good,
    Warning,
    Bad,
    #[default]
    Neutral,
}

/// A fact value is either numeric or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Number(Decimal),
    Text(String),
}

impl From<Decimal> for FactValue {
    fn from(d: Decimal) -> Self {
        FactValue::Number(d)
    }
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        FactValue::Text(s.to_string())
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Number(d) => write!(f, "{}", d.normalize()),
            FactValue::Text(s) => f.write_str(s),
        }
    }
}

/// Read-only snapshot of one business fact backing a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionFact {
    pub fact_id: String,
    pub label: String,
    pub value: FactValue,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    #[serde(default)]
    pub status: FactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_code: Option<String>,
}

// ──────────────────────────────────────────────
// Actions / Evidence
// ──────────────────────────────────────────────

/// One entry in the menu of responses offered with a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionAction {
    pub action_id: String,
    pub label: String,
    pub action_type: String,
    #[serde(default)]
    pub is_recommended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_impact: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityFlag {
    Complete,
    Partial,
    Stale,
    Estimated,
    ClientComputed,
}

/// Provenance attached to every decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceContract {
    #[serde(with = "time::serde::rfc3339")]
    pub as_of_timestamp: OffsetDateTime,
    pub source_tables: Vec<String>,
    pub data_quality_flags: Vec<DataQualityFlag>,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computation_method: Option<String>,
}

// ──────────────────────────────────────────────
// Decision
// ──────────────────────────────────────────────

/// The canonical decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContract {
    pub id: String,
    pub tenant_id: String,
    pub domain: Domain,
    pub decision_type: String,
    pub entity_type: Grain,
    pub entity_id: String,
    pub entity_name: String,
    pub metric_code: String,
    pub metric_version: u32,
    pub period: String,
    pub title: String,
    pub problem_statement: String,
    pub severity: Severity,
    pub status: DecisionStatus,
    pub owner_role: String,
    #[serde(default)]
    pub owner_user_id: Option<String>,
    pub impact_amount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline_at: OffsetDateTime,
    pub facts: Vec<DecisionFact>,
    pub actions: Vec<DecisionAction>,
    pub evidence: EvidenceContract,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub decision_outcome: Option<String>,
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub decided_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub escalated_to: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub snoozed_until: Option<OffsetDateTime>,
    /// Row version used for conditional updates.
    #[serde(default)]
    pub version: i64,
}

impl DecisionContract {
    /// `tenant|metric|grain|period|entity`
    pub fn dedupe_key(&self) -> String {
        crate::dedupe::dedupe_key(self)
    }

    /// Persisted `card_type`: domain prefix followed by the decision type.
    pub fn card_type(&self) -> String {
        format!("{}{}", self.domain.card_type_prefix(), self.decision_type)
    }

    pub fn recommended_action(&self) -> Option<&DecisionAction> {
        self.actions.iter().find(|a| a.is_recommended)
    }

    pub fn action_by_type(&self, action_type: &str) -> Option<&DecisionAction> {
        self.actions
            .iter()
            .find(|a| a.action_type.eq_ignore_ascii_case(action_type))
    }
}
