//! Per-domain scenario tables.
//!
//! Each [`ScenarioType`] maps to exactly one row of [`SCENARIOS`]. The row
//! carries everything needed to turn a detected condition into a decision:
//! metric, grain, templates, severity, owner, deadline and canned actions.
//! Adding a scenario means adding a variant and a row.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::builder::{
    create_action, create_decision, create_evidence, create_fact, ActionParams, DecisionParams,
    EvidenceParams, FactParams,
};
use crate::catalog;
use crate::contract::{
    DecisionContract, DecisionFact, Domain, EvidenceContract, FactStatus, FactValue, Grain,
    Severity,
};
use crate::error::ContractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioType {
    // FDP
    SkuStop,
    CashCritical,
    ArOverdue,
    MarginErosion,
    InventoryLocked,
    // MDP
    CampaignBurningCash,
    ChannelMarginNegative,
    RoasDecline,
    // CDP
    ChurnSpike,
    LtvDecline,
    SegmentAtRisk,
}

impl ScenarioType {
    pub const ALL: [ScenarioType; 11] = [
        ScenarioType::SkuStop,
        ScenarioType::CashCritical,
        ScenarioType::ArOverdue,
        ScenarioType::MarginErosion,
        ScenarioType::InventoryLocked,
        ScenarioType::CampaignBurningCash,
        ScenarioType::ChannelMarginNegative,
        ScenarioType::RoasDecline,
        ScenarioType::ChurnSpike,
        ScenarioType::LtvDecline,
        ScenarioType::SegmentAtRisk,
    ];

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn spec(self) -> &'static ScenarioSpec {
        // Table rows are declared in the same order as the variants.
        &SCENARIOS[self as usize]
    }

    pub fn domain(self) -> Domain {
        self.spec().domain
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioType {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        ScenarioType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| ContractError::UnknownScenario {
                name: s.to_string(),
            })
    }
}

// ──────────────────────────────────────────────
// Table
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CannedAction {
    pub action_type: &'static str,
    pub label: &'static str,
    pub recommended: bool,
}

/// One row of the scenario table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSpec {
    pub name: &'static str,
    pub domain: Domain,
    pub metric_code: &'static str,
    pub entity_type: Grain,
    /// `{entity_name}` and `{value}` are substituted.
    pub title_template: &'static str,
    pub problem_template: &'static str,
    pub severity: Severity,
    pub owner_role: &'static str,
    pub deadline_hours: i64,
    pub actions: &'static [CannedAction],
}

const fn act(action_type: &'static str, label: &'static str, recommended: bool) -> CannedAction {
    CannedAction {
        action_type,
        label,
        recommended,
    }
}

pub static SCENARIOS: [ScenarioSpec; 11] = [
    ScenarioSpec {
        name: "SKU_STOP",
        domain: Domain::Fdp,
        metric_code: "sku_margin_percent",
        entity_type: Grain::Sku,
        title_template: "Stop selling {entity_name}",
        problem_template: "{entity_name} sells at {value}% margin; every unit shipped loses money.",
        severity: Severity::Critical,
        owner_role: "CFO",
        deadline_hours: 24,
        actions: &[
            act("STOP", "Stop selling immediately", true),
            act("REPRICE", "Raise the price", false),
            act("MONITOR", "Monitor for one more week", false),
        ],
    },
    ScenarioSpec {
        name: "CASH_CRITICAL",
        domain: Domain::Fdp,
        metric_code: "cash_runway_months",
        entity_type: Grain::Tenant,
        title_template: "Cash runway critical: {value} months",
        problem_template: "At the current burn rate {entity_name} runs out of cash in {value} months.",
        severity: Severity::Critical,
        owner_role: "CFO",
        deadline_hours: 4,
        actions: &[
            act("CUT_SPEND", "Freeze discretionary spend", true),
            act("COLLECT_AR", "Accelerate receivable collection", false),
            act("RAISE_FINANCING", "Open a financing line", false),
        ],
    },
    ScenarioSpec {
        name: "AR_OVERDUE",
        domain: Domain::Fdp,
        metric_code: "ar_overdue_amount",
        entity_type: Grain::Customer,
        title_template: "Collect overdue receivables from {entity_name}",
        problem_template: "{entity_name} has {value} past due.",
        severity: Severity::High,
        owner_role: "CFO",
        deadline_hours: 72,
        actions: &[
            act("COLLECT", "Start collection call", true),
            act("SEND_REMINDER", "Send payment reminder", false),
            act("WRITE_OFF", "Provision as doubtful", false),
        ],
    },
    ScenarioSpec {
        name: "MARGIN_EROSION",
        domain: Domain::Fdp,
        metric_code: "sku_gross_profit",
        entity_type: Grain::Sku,
        title_template: "Margin eroding on {entity_name}",
        problem_template: "Gross profit on {entity_name} fell to {value}.",
        severity: Severity::Medium,
        owner_role: "CFO",
        deadline_hours: 168,
        actions: &[
            act("REPRICE", "Review pricing", true),
            act("RENEGOTIATE_COGS", "Renegotiate supplier cost", false),
            act("MONITOR", "Monitor", false),
        ],
    },
    ScenarioSpec {
        name: "INVENTORY_LOCKED",
        domain: Domain::Fdp,
        metric_code: "inventory_locked_cash",
        entity_type: Grain::Sku,
        title_template: "Release cash locked in {entity_name}",
        problem_template: "{value} is tied up in slow-moving stock of {entity_name}.",
        severity: Severity::Medium,
        owner_role: "CFO",
        deadline_hours: 168,
        actions: &[
            act("CLEARANCE", "Run a clearance sale", true),
            act("BUNDLE", "Bundle with fast movers", false),
            act("HOLD", "Hold stock", false),
        ],
    },
    ScenarioSpec {
        name: "CAMPAIGN_BURNING_CASH",
        domain: Domain::Mdp,
        metric_code: "campaign_cash_burn",
        entity_type: Grain::Campaign,
        title_template: "Pause {entity_name}: burning cash",
        problem_template: "{entity_name} spent {value} more than the contribution it brought in.",
        severity: Severity::High,
        owner_role: "CMO",
        deadline_hours: 24,
        actions: &[
            act("PAUSE", "Pause the campaign", true),
            act("REDUCE_BUDGET", "Halve the budget", false),
            act("MONITOR", "Monitor", false),
        ],
    },
    ScenarioSpec {
        name: "CHANNEL_MARGIN_NEGATIVE",
        domain: Domain::Mdp,
        metric_code: "channel_contribution_margin",
        entity_type: Grain::Channel,
        title_template: "{entity_name} is losing money",
        problem_template: "Contribution margin on {entity_name} is {value}.",
        severity: Severity::High,
        owner_role: "CMO",
        deadline_hours: 72,
        actions: &[
            act("CUT_SPEND", "Cut paid spend on the channel", true),
            act("REPRICE", "Channel-specific pricing", false),
            act("MONITOR", "Monitor", false),
        ],
    },
    ScenarioSpec {
        name: "ROAS_DECLINE",
        domain: Domain::Mdp,
        metric_code: "campaign_roas",
        entity_type: Grain::Campaign,
        title_template: "ROAS falling on {entity_name}",
        problem_template: "{entity_name} now returns {value} per unit of spend.",
        severity: Severity::Medium,
        owner_role: "CMO",
        deadline_hours: 72,
        actions: &[
            act("REALLOCATE", "Reallocate budget", true),
            act("REFRESH_CREATIVE", "Refresh creatives", false),
            act("MONITOR", "Monitor", false),
        ],
    },
    ScenarioSpec {
        name: "CHURN_SPIKE",
        domain: Domain::Cdp,
        metric_code: "customer_churn_rate",
        entity_type: Grain::Segment,
        title_template: "Churn spike in {entity_name}",
        problem_template: "Churn in {entity_name} reached {value}%.",
        severity: Severity::High,
        owner_role: "CCO",
        deadline_hours: 48,
        actions: &[
            act("WINBACK", "Launch win-back campaign", true),
            act("SURVEY", "Survey churned customers", false),
            act("MONITOR", "Monitor", false),
        ],
    },
    ScenarioSpec {
        name: "LTV_DECLINE",
        domain: Domain::Cdp,
        metric_code: "customer_ltv",
        entity_type: Grain::Cohort,
        title_template: "Lifetime value declining for {entity_name}",
        problem_template: "LTV of {entity_name} dropped to {value}.",
        severity: Severity::Medium,
        owner_role: "CCO",
        deadline_hours: 168,
        actions: &[
            act("RETENTION_OFFER", "Targeted retention offer", true),
            act("ONBOARDING_REVIEW", "Review onboarding journey", false),
            act("MONITOR", "Monitor", false),
        ],
    },
    ScenarioSpec {
        name: "SEGMENT_AT_RISK",
        domain: Domain::Cdp,
        metric_code: "segment_revenue_at_risk",
        entity_type: Grain::Segment,
        title_template: "Revenue at risk in {entity_name}",
        problem_template: "{value} of expected revenue from {entity_name} is at risk.",
        severity: Severity::High,
        owner_role: "CCO",
        deadline_hours: 72,
        actions: &[
            act("LOYALTY_CAMPAIGN", "Run loyalty campaign", true),
            act("ACCOUNT_REVIEW", "Review key accounts", false),
            act("MONITOR", "Monitor", false),
        ],
    },
];

// ──────────────────────────────────────────────
// Builders
// ──────────────────────────────────────────────

/// Inputs describing one detected condition.
#[derive(Debug, Clone)]
pub struct ScenarioInput {
    pub id: Option<String>,
    pub tenant_id: String,
    pub entity_id: String,
    pub entity_name: String,
    pub period: String,
    /// Headline value of the scenario's metric.
    pub value: Decimal,
    pub impact_amount: Decimal,
    /// Extra facts beyond the headline metric.
    pub facts: Vec<DecisionFact>,
    pub evidence: Option<EvidenceContract>,
}

pub fn build_fdp_decision(
    scenario: ScenarioType,
    input: ScenarioInput,
    now: OffsetDateTime,
) -> Result<DecisionContract, ContractError> {
    build_scenario_decision(Domain::Fdp, scenario, input, now)
}

pub fn build_mdp_decision(
    scenario: ScenarioType,
    input: ScenarioInput,
    now: OffsetDateTime,
) -> Result<DecisionContract, ContractError> {
    build_scenario_decision(Domain::Mdp, scenario, input, now)
}

pub fn build_cdp_decision(
    scenario: ScenarioType,
    input: ScenarioInput,
    now: OffsetDateTime,
) -> Result<DecisionContract, ContractError> {
    build_scenario_decision(Domain::Cdp, scenario, input, now)
}

/// Build a decision from a scenario row, checking the scenario belongs to `domain`.
pub fn build_scenario_decision(
    domain: Domain,
    scenario: ScenarioType,
    input: ScenarioInput,
    now: OffsetDateTime,
) -> Result<DecisionContract, ContractError> {
    let spec = scenario.spec();
    if spec.domain != domain {
        return Err(ContractError::ScenarioDomainMismatch {
            scenario: spec.name.to_string(),
            owner: spec.domain,
            requested: domain,
        });
    }

    let entity_name = if input.entity_name.is_empty() {
        input.entity_id.clone()
    } else {
        input.entity_name.clone()
    };
    let value = input.value.normalize().to_string();
    let render = |template: &str| {
        template
            .replace("{entity_name}", &entity_name)
            .replace("{value}", &value)
    };

    let unit = catalog::lookup(spec.metric_code)
        .map(|m| m.unit.as_str())
        .unwrap_or("");
    let headline = create_fact(FactParams {
        fact_id: None,
        label: catalog::lookup(spec.metric_code)
            .map(|m| m.label.to_string())
            .unwrap_or_else(|| spec.metric_code.to_string()),
        value: FactValue::Number(input.value),
        unit: unit.to_string(),
        trend: None,
        status: fact_status_for(spec.severity),
        metric_code: Some(spec.metric_code.to_string()),
    })?;
    let mut facts = vec![headline];
    facts.extend(input.facts);

    let actions = spec
        .actions
        .iter()
        .map(|a| {
            create_action(ActionParams {
                action_id: None,
                label: a.label.to_string(),
                action_type: a.action_type.to_string(),
                is_recommended: a.recommended,
                projected_impact: None,
                metadata: None,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let evidence = match input.evidence {
        Some(e) => e,
        None => create_evidence(
            EvidenceParams {
                source_tables: catalog::lookup(spec.metric_code)
                    .map(|m| vec![m.source_view.to_string()])
                    .unwrap_or_default(),
                data_period: Some(input.period.clone()),
                ..Default::default()
            },
            now,
        )?,
    };

    create_decision(
        DecisionParams {
            id: input.id,
            tenant_id: input.tenant_id,
            domain,
            decision_type: spec.name.to_string(),
            entity_type: spec.entity_type,
            entity_id: input.entity_id,
            entity_name: entity_name.clone(),
            metric_code: spec.metric_code.to_string(),
            metric_version: None,
            period: input.period,
            title: render(spec.title_template),
            problem_statement: render(spec.problem_template),
            severity: spec.severity,
            owner_role: Some(spec.owner_role.to_string()),
            impact_amount: input.impact_amount,
            deadline_at: now + Duration::hours(spec.deadline_hours),
            facts,
            actions,
            evidence,
        },
        now,
    )
}

fn fact_status_for(severity: Severity) -> FactStatus {
    match severity {
        Severity::Critical | Severity::High => FactStatus::Bad,
        Severity::Medium => FactStatus::Warning,
        Severity::Low => FactStatus::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-03-01 09:00 UTC);

    fn input(entity: &str, value: i64, impact: i64) -> ScenarioInput {
        ScenarioInput {
            id: None,
            tenant_id: "t1".into(),
            entity_id: entity.into(),
            entity_name: String::new(),
            period: "2025-02".into(),
            value: Decimal::from(value),
            impact_amount: Decimal::from(impact),
            facts: vec![],
            evidence: None,
        }
    }

    #[test]
    fn table_rows_line_up_with_variants() {
        for t in ScenarioType::ALL {
            let name = serde_json::to_value(t).unwrap();
            assert_eq!(name.as_str(), Some(t.as_str()));
            assert!(catalog::lookup(t.spec().metric_code).is_some(), "{t}");
            let recommended = t.spec().actions.iter().filter(|a| a.recommended).count();
            assert_eq!(recommended, 1, "{t}");
            assert_eq!(
                catalog::lookup(t.spec().metric_code).unwrap().domain,
                t.domain(),
                "{t}"
            );
        }
    }

    #[test]
    fn parse_scenario_names() {
        assert_eq!("sku_stop".parse::<ScenarioType>(), Ok(ScenarioType::SkuStop));
        assert_eq!(
            " CHURN_SPIKE ".parse::<ScenarioType>(),
            Ok(ScenarioType::ChurnSpike)
        );
        assert!(matches!(
            "SKU_EXPLODE".parse::<ScenarioType>(),
            Err(ContractError::UnknownScenario { .. })
        ));
    }

    #[test]
    fn fdp_sku_stop_builds_from_row() {
        let d = build_fdp_decision(ScenarioType::SkuStop, input("SKU-9", -12, -1_200_000), NOW)
            .unwrap();
        assert_eq!(d.domain, Domain::Fdp);
        assert_eq!(d.decision_type, "SKU_STOP");
        assert_eq!(d.card_type(), "FDP_SKU_STOP");
        assert_eq!(d.title, "Stop selling SKU-9");
        assert!(d.problem_statement.contains("-12%"));
        assert_eq!(d.deadline_at, NOW + Duration::hours(24));
        assert_eq!(d.recommended_action().unwrap().action_type, "STOP");
        assert_eq!(d.facts[0].metric_code.as_deref(), Some("sku_margin_percent"));
        assert_eq!(d.evidence.source_tables, vec!["v_sku_pnl".to_string()]);
    }

    #[test]
    fn wrong_domain_is_rejected() {
        let err = build_mdp_decision(ScenarioType::ChurnSpike, input("vip", 14, 0), NOW)
            .unwrap_err();
        assert_eq!(
            err,
            ContractError::ScenarioDomainMismatch {
                scenario: "CHURN_SPIKE".into(),
                owner: Domain::Cdp,
                requested: Domain::Mdp,
            }
        );
    }

    #[test]
    fn cdp_and_mdp_builders() {
        let d = build_cdp_decision(ScenarioType::ChurnSpike, input("vip", 14, -50_000), NOW)
            .unwrap();
        assert_eq!(d.owner_role, "CCO");
        assert_eq!(d.entity_type, Grain::Segment);
        let d = build_mdp_decision(
            ScenarioType::CampaignBurningCash,
            input("spring-sale", 300_000, -300_000),
            NOW,
        )
        .unwrap();
        assert_eq!(d.recommended_action().unwrap().action_type, "PAUSE");
    }
}
