//! Builders for evidence, facts, actions and decisions.
//!
//! Every constructor fills the defaults a well-formed record needs and
//! rejects malformed input up front. Time is always passed in so callers
//! control the clock.

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::catalog;
use crate::contract::{
    DataQualityFlag, DecisionAction, DecisionContract, DecisionFact, DecisionStatus, Domain,
    EvidenceContract, FactStatus, FactValue, Grain, Severity, Trend,
};
use crate::error::ContractError;

/// Confidence assumed when a producer does not supply one.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Version pinned for metrics the catalog does not know.
pub const UNKNOWN_METRIC_VERSION: u32 = 1;

// ──────────────────────────────────────────────
// Evidence
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct EvidenceParams {
    pub as_of_timestamp: Option<OffsetDateTime>,
    pub source_tables: Vec<String>,
    pub data_quality_flags: Option<Vec<DataQualityFlag>>,
    pub confidence_score: Option<f64>,
    pub sample_size: Option<u64>,
    pub data_period: Option<String>,
    pub computation_method: Option<String>,
}

pub fn create_evidence(
    params: EvidenceParams,
    now: OffsetDateTime,
) -> Result<EvidenceContract, ContractError> {
    let confidence_score = params.confidence_score.unwrap_or(DEFAULT_CONFIDENCE);
    if !(0.0..=1.0).contains(&confidence_score) {
        return Err(ContractError::InvalidConfidence {
            value: confidence_score,
        });
    }
    Ok(EvidenceContract {
        as_of_timestamp: params.as_of_timestamp.unwrap_or(now),
        source_tables: params.source_tables,
        data_quality_flags: params
            .data_quality_flags
            .unwrap_or_else(|| vec![DataQualityFlag::Complete]),
        confidence_score,
        sample_size: params.sample_size,
        data_period: params.data_period,
        computation_method: params.computation_method,
    })
}

// ──────────────────────────────────────────────
// Facts
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FactParams {
    pub fact_id: Option<String>,
    pub label: String,
    pub value: FactValue,
    pub unit: String,
    pub trend: Option<Trend>,
    pub status: FactStatus,
    pub metric_code: Option<String>,
}

impl FactParams {
    pub fn new(label: &str, value: impl Into<FactValue>, unit: &str) -> Self {
        FactParams {
            fact_id: None,
            label: label.to_string(),
            value: value.into(),
            unit: unit.to_string(),
            trend: None,
            status: FactStatus::Neutral,
            metric_code: None,
        }
    }

    pub fn status(mut self, status: FactStatus) -> Self {
        self.status = status;
        self
    }

    pub fn trend(mut self, trend: Trend) -> Self {
        self.trend = Some(trend);
        self
    }

    pub fn metric(mut self, code: &str) -> Self {
        self.metric_code = Some(code.to_string());
        self
    }
}

pub fn create_fact(params: FactParams) -> Result<DecisionFact, ContractError> {
    if params.label.trim().is_empty() {
        return Err(ContractError::MissingField { field: "label" });
    }
    if let Some(code) = &params.metric_code {
        if !catalog::is_valid_metric_code(code) {
            return Err(ContractError::InvalidMetricCode { code: code.clone() });
        }
    }
    let fact_id = params
        .fact_id
        .or_else(|| params.metric_code.clone())
        .unwrap_or_else(|| slug(&params.label));
    Ok(DecisionFact {
        fact_id,
        label: params.label,
        value: params.value,
        unit: params.unit,
        trend: params.trend,
        status: params.status,
        metric_code: params.metric_code,
    })
}

// ──────────────────────────────────────────────
// Actions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ActionParams {
    pub action_id: Option<String>,
    pub label: String,
    pub action_type: String,
    pub is_recommended: bool,
    pub projected_impact: Option<Decimal>,
    pub metadata: Option<serde_json::Value>,
}

pub fn create_action(params: ActionParams) -> Result<DecisionAction, ContractError> {
    if params.action_type.trim().is_empty() {
        return Err(ContractError::MissingField {
            field: "action_type",
        });
    }
    let action_id = params
        .action_id
        .unwrap_or_else(|| params.action_type.to_ascii_lowercase());
    let label = if params.label.is_empty() {
        params.action_type.clone()
    } else {
        params.label
    };
    Ok(DecisionAction {
        action_id,
        label,
        action_type: params.action_type,
        is_recommended: params.is_recommended,
        projected_impact: params.projected_impact,
        metadata: params.metadata,
    })
}

// ──────────────────────────────────────────────
// Decisions
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DecisionParams {
    /// Explicit identity; a random UUID is generated when absent.
    pub id: Option<String>,
    pub tenant_id: String,
    pub domain: Domain,
    pub decision_type: String,
    pub entity_type: Grain,
    pub entity_id: String,
    pub entity_name: String,
    pub metric_code: String,
    pub metric_version: Option<u32>,
    pub period: String,
    pub title: String,
    pub problem_statement: String,
    pub severity: Severity,
    pub owner_role: Option<String>,
    pub impact_amount: Decimal,
    pub deadline_at: OffsetDateTime,
    pub facts: Vec<DecisionFact>,
    pub actions: Vec<DecisionAction>,
    pub evidence: EvidenceContract,
}

pub fn create_decision(
    params: DecisionParams,
    now: OffsetDateTime,
) -> Result<DecisionContract, ContractError> {
    require("tenant_id", &params.tenant_id)?;
    require("decision_type", &params.decision_type)?;
    require("entity_id", &params.entity_id)?;
    require("title", &params.title)?;
    if !catalog::is_valid_metric_code(&params.metric_code) {
        return Err(ContractError::InvalidMetricCode {
            code: params.metric_code,
        });
    }

    let metric_version = params.metric_version.unwrap_or_else(|| {
        catalog::lookup(&params.metric_code)
            .map(|m| m.version)
            .unwrap_or(UNKNOWN_METRIC_VERSION)
    });

    let recommended = params.actions.iter().filter(|a| a.is_recommended).count();
    if recommended > 1 {
        tracing::warn!(
            decision_type = %params.decision_type,
            entity_id = %params.entity_id,
            recommended,
            "decision carries more than one recommended action"
        );
    }

    let entity_name = if params.entity_name.is_empty() {
        params.entity_id.clone()
    } else {
        params.entity_name
    };

    Ok(DecisionContract {
        id: params
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        tenant_id: params.tenant_id,
        domain: params.domain,
        decision_type: params.decision_type,
        entity_type: params.entity_type,
        entity_id: params.entity_id,
        entity_name,
        metric_code: params.metric_code,
        metric_version,
        period: params.period,
        title: params.title,
        problem_statement: params.problem_statement,
        severity: params.severity,
        status: DecisionStatus::Open,
        owner_role: params
            .owner_role
            .unwrap_or_else(|| params.domain.default_owner_role().to_string()),
        owner_user_id: None,
        impact_amount: params.impact_amount,
        deadline_at: params.deadline_at,
        facts: params.facts,
        actions: params.actions,
        evidence: params.evidence,
        created_at: now,
        updated_at: now,
        decision_outcome: None,
        decided_by: None,
        decided_at: None,
        escalated_to: None,
        snoozed_until: None,
        version: 0,
    })
}

fn require(field: &'static str, value: &str) -> Result<(), ContractError> {
    if value.trim().is_empty() {
        Err(ContractError::MissingField { field })
    } else {
        Ok(())
    }
}

fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}
