//! towerline-core: canonical decision contracts and the pure policy logic
//! around them.
//!
//! Everything here is synchronous and side-effect free apart from reading
//! the process-wide metric catalog. Storage, caching and the mutation API
//! live in `towerline-storage` and `towerline-engine`.
//!
//! # Public API
//!
//! - [`catalog`] -- fixed metric registry (`lookup`, `by_domain`, ...)
//! - [`builder`] -- `create_evidence`, `create_fact`, `create_action`, `create_decision`
//! - [`scenario`] -- per-domain scenario tables and `build_*_decision`
//! - [`normalize`] -- loosely-typed string → enum mapping
//! - [`dedupe`] -- `dedupe_key`, `deduplicate`
//! - [`escalation`] -- `should_escalate` (time-variant)
//! - [`lifecycle`] -- status targets, transition checks, snooze expiry
//! - [`summary`] -- per-domain counts
//! - [`audit`] -- audit entry contract with frozen snapshot

pub mod audit;
pub mod builder;
pub mod catalog;
pub mod contract;
pub mod dedupe;
pub mod error;
pub mod escalation;
pub mod lifecycle;
pub mod normalize;
pub mod scenario;
pub mod summary;

#[cfg(test)]
mod testing;

// ── Convenience re-exports ───────────────────────────────────────────

pub use audit::{AuditAction, AuditLogEntry, CardSource};
pub use catalog::{MetricContract, MetricUnit, SourceType};
pub use contract::{
    DataQualityFlag, DecisionAction, DecisionContract, DecisionFact, DecisionStatus, Domain,
    EvidenceContract, FactStatus, FactValue, Grain, Priority, Severity, Trend,
};
pub use dedupe::{dedupe_key, deduplicate};
pub use error::{ContractError, TransitionError};
pub use escalation::{escalation_reason, should_escalate, EscalationConfig, EscalationReason};
pub use lifecycle::{check_transition, effective_status, LifecycleAction, TransitionMode};
pub use scenario::{ScenarioInput, ScenarioType};
pub use summary::{summarize, DecisionSummary};
