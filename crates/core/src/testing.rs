//! Shared fixtures for unit tests.

use rust_decimal::Decimal;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use crate::contract::{
    DataQualityFlag, DecisionContract, DecisionStatus, Domain, EvidenceContract, Grain, Severity,
};

pub(crate) const NOW: OffsetDateTime = datetime!(2025-03-01 09:00 UTC);

/// An open FDP `SKU_STOP` decision for `entity`, updated at `NOW`.
pub(crate) fn decision(id: &str, entity: &str) -> DecisionContract {
    DecisionContract {
        id: id.to_string(),
        tenant_id: "t1".to_string(),
        domain: Domain::Fdp,
        decision_type: "SKU_STOP".to_string(),
        entity_type: Grain::Sku,
        entity_id: entity.to_string(),
        entity_name: entity.to_string(),
        metric_code: "sku_margin_percent".to_string(),
        metric_version: 2,
        period: "2025-02".to_string(),
        title: format!("Stop {}", entity),
        problem_statement: "negative margin".to_string(),
        severity: Severity::High,
        status: DecisionStatus::Open,
        owner_role: "CFO".to_string(),
        owner_user_id: None,
        impact_amount: Decimal::from(-1_000),
        deadline_at: NOW + Duration::hours(24),
        facts: vec![],
        actions: vec![],
        evidence: EvidenceContract {
            as_of_timestamp: NOW,
            source_tables: vec!["v_sku_pnl".to_string()],
            data_quality_flags: vec![DataQualityFlag::Complete],
            confidence_score: 0.8,
            sample_size: None,
            data_period: None,
            computation_method: None,
        },
        created_at: NOW,
        updated_at: NOW,
        decision_outcome: None,
        decided_by: None,
        decided_at: None,
        escalated_to: None,
        snoozed_until: None,
        version: 0,
    }
}
