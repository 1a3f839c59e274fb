//! Mapping between raw `decision_cards` rows and `DecisionContract`.
//!
//! Rows come from several producers. Enum-ish columns are normalized, money
//! may arrive as a string or a number, and optional collections may be
//! absent. Only the columns without which a decision is meaningless are
//! required; anything else falls back to a neutral default.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use towerline_core::builder::{create_evidence, EvidenceParams, UNKNOWN_METRIC_VERSION};
use towerline_core::normalize::{map_fact_status, map_grain, map_severity, map_status, map_trend};
use towerline_core::{
    catalog, DecisionAction, DecisionContract, DecisionFact, Domain, EvidenceContract, FactValue,
};
use towerline_storage::Row;

use crate::error::EngineError;

pub fn decision_from_row(row: &Row) -> Result<DecisionContract, EngineError> {
    let id = required(row, "id", "?")?.to_string();
    let card_type = required(row, "card_type", &id)?;
    let domain = Domain::from_card_type(card_type).ok_or_else(|| EngineError::MalformedRow {
        id: id.clone(),
        message: format!("card_type {card_type:?} has no known domain prefix"),
    })?;
    let decision_type = card_type[domain.card_type_prefix().len()..].to_string();

    let metric_code = text(row, "metric_code").unwrap_or_default().to_string();
    let metric_version = match row.get("metric_version") {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or_else(|| {
        catalog::lookup(&metric_code)
            .map(|m| m.version)
            .unwrap_or(UNKNOWN_METRIC_VERSION)
    });

    let created_at = timestamp(row, "created_at");
    let updated_at = timestamp(row, "updated_at").or(created_at);
    let Some(updated_at) = updated_at else {
        return Err(malformed(&id, "missing created_at/updated_at"));
    };
    let deadline_at =
        timestamp(row, "deadline_at").ok_or_else(|| malformed(&id, "missing deadline_at"))?;

    let entity_id = text(row, "entity_id").unwrap_or_default().to_string();
    let entity_name = text(row, "entity_name")
        .or_else(|| text(row, "entity_label"))
        .map(str::to_string)
        .unwrap_or_else(|| entity_id.clone());

    Ok(DecisionContract {
        tenant_id: required(row, "tenant_id", &id)?.to_string(),
        domain,
        decision_type,
        entity_type: map_grain(text(row, "entity_type").unwrap_or("")),
        entity_id,
        entity_name,
        metric_version,
        metric_code,
        period: text(row, "period").unwrap_or_default().to_string(),
        title: text(row, "title").unwrap_or_default().to_string(),
        problem_statement: text(row, "problem_statement")
            .unwrap_or_default()
            .to_string(),
        severity: map_severity(text(row, "severity").unwrap_or("")),
        status: map_status(text(row, "status").unwrap_or("")),
        owner_role: text(row, "owner_role")
            .map(str::to_string)
            .unwrap_or_else(|| domain.default_owner_role().to_string()),
        owner_user_id: text(row, "owner_user_id").map(str::to_string),
        impact_amount: decimal(row.get("impact_amount")).unwrap_or(Decimal::ZERO),
        deadline_at,
        facts: facts(row),
        actions: actions(row),
        evidence: evidence(row, updated_at)?,
        created_at: created_at.unwrap_or(updated_at),
        updated_at,
        decision_outcome: text(row, "decision_outcome").map(str::to_string),
        decided_by: text(row, "decided_by").map(str::to_string),
        decided_at: timestamp(row, "decided_at"),
        escalated_to: text(row, "escalated_to").map(str::to_string),
        snoozed_until: timestamp(row, "snoozed_until"),
        version: row.get("version").and_then(Value::as_i64).unwrap_or(0),
        id,
    })
}

/// Serialize a decision into its row form, with `card_type` filled in.
pub fn decision_to_row(decision: &DecisionContract) -> Result<Row, EngineError> {
    let mut row = match serde_json::to_value(decision)? {
        Value::Object(map) => map,
        other => {
            return Err(malformed(
                &decision.id,
                &format!("decision serialized to {other}"),
            ))
        }
    };
    row.insert("card_type".into(), Value::String(decision.card_type()));
    Ok(row)
}

/// Columns a lifecycle mutation may change.
pub fn mutation_patch(decision: &DecisionContract) -> Result<Row, EngineError> {
    const MUTABLE: &[&str] = &[
        "card_type",
        "domain",
        "status",
        "owner_role",
        "owner_user_id",
        "updated_at",
        "decision_outcome",
        "decided_by",
        "decided_at",
        "escalated_to",
        "snoozed_until",
    ];
    let mut row = decision_to_row(decision)?;
    Ok(MUTABLE
        .iter()
        .map(|column| {
            let value = row.remove(*column).unwrap_or(Value::Null);
            (column.to_string(), value)
        })
        .collect())
}

// ── Column readers ──────────────────────────────────────────────────────────

fn malformed(id: &str, message: &str) -> EngineError {
    EngineError::MalformedRow {
        id: id.to_string(),
        message: message.to_string(),
    }
}

fn text<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required<'a>(row: &'a Row, column: &str, id: &str) -> Result<&'a str, EngineError> {
    text(row, column).ok_or_else(|| malformed(id, &format!("missing column {column}")))
}

fn timestamp(row: &Row, column: &str) -> Option<OffsetDateTime> {
    text(row, column).and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
}

pub(crate) fn decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::String(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok(),
        Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        _ => None,
    }
}

fn facts(row: &Row) -> Vec<DecisionFact> {
    let Some(Value::Array(items)) = row.get("facts") else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let obj = item.as_object()?;
            let value = match obj.get("value") {
                Some(Value::String(s)) => Decimal::from_str(s.trim())
                    .map(FactValue::Number)
                    .unwrap_or_else(|_| FactValue::Text(s.clone())),
                v @ Some(Value::Number(_)) => FactValue::Number(decimal(v)?),
                _ => return None,
            };
            Some(DecisionFact {
                fact_id: text(obj, "fact_id")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("fact-{i}")),
                label: text(obj, "label").unwrap_or_default().to_string(),
                value,
                unit: text(obj, "unit").unwrap_or_default().to_string(),
                trend: text(obj, "trend").and_then(map_trend),
                status: map_fact_status(text(obj, "status").unwrap_or("")),
                metric_code: text(obj, "metric_code").map(str::to_string),
            })
        })
        .collect()
}

fn actions(row: &Row) -> Vec<DecisionAction> {
    let Some(Value::Array(items)) = row.get("actions") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

fn evidence(row: &Row, as_of: OffsetDateTime) -> Result<EvidenceContract, EngineError> {
    if let Some(value) = row.get("evidence") {
        if let Ok(e) = serde_json::from_value::<EvidenceContract>(value.clone()) {
            return Ok(e);
        }
    }
    Ok(create_evidence(
        EvidenceParams {
            as_of_timestamp: Some(as_of),
            source_tables: vec![towerline_storage::tables::DECISION_CARDS.to_string()],
            ..Default::default()
        },
        as_of,
    )?)
}
