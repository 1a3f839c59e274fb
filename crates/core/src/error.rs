//! Construction-time errors for decision contracts.
//!
//! These are programmer errors (bad scenario wiring, malformed metric codes),
//! raised at build time and never surfaced to end users.

use crate::contract::{DecisionStatus, Domain};
use crate::lifecycle::LifecycleAction;

/// Errors raised while building or validating contract records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    /// A required string field was empty.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// A metric code does not match `^[a-z][a-z0-9_]*$`.
    #[error("invalid metric code '{code}': must match ^[a-z][a-z0-9_]*$")]
    InvalidMetricCode { code: String },

    /// A metric code is not present in the catalog where one is required.
    #[error("unknown metric code: {code}")]
    UnknownMetric { code: String },

    /// A confidence score fell outside `[0, 1]`.
    #[error("confidence score {value} outside [0, 1]")]
    InvalidConfidence { value: f64 },

    /// A scenario name could not be parsed into a known scenario type.
    #[error("unknown scenario type: {name}")]
    UnknownScenario { name: String },

    /// A scenario was handed to the builder of a domain it does not belong to.
    #[error("scenario {scenario} belongs to {owner}, not {requested}")]
    ScenarioDomainMismatch {
        scenario: String,
        owner: Domain,
        requested: Domain,
    },

    /// The metric catalog table failed its integrity checks.
    #[error("metric catalog invalid: {message}")]
    InvalidCatalog { message: String },
}

/// A lifecycle action was refused under strict transition checking.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {action} to a decision in state {from}")]
pub struct TransitionError {
    pub from: DecisionStatus,
    pub action: LifecycleAction,
}
