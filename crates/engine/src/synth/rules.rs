//! Threshold rules that turn live facts into auto decisions.
//!
//! [`synthesize`] is pure: same facts, thresholds and `now` give the same
//! decisions with the same ids. Identity is `auto-<signal>-<entity>`, so
//! re-evaluating an unchanged condition never mints a new decision.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use towerline_core::builder::{
    create_action, create_decision, create_evidence, create_fact, ActionParams, DecisionParams,
    EvidenceParams, FactParams,
};
use towerline_core::{DecisionContract, Domain, FactStatus, Grain, Priority};

use super::facts::{ArAging, CampaignFacts, CashRunway, ChannelFacts, LiveFacts, SkuFacts};
use crate::error::EngineError;

/// Prefix shared by every synthesized decision id.
pub const AUTO_ID_PREFIX: &str = "auto-";

/// Static thresholds the rules compare live facts against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthThresholds {
    pub sku_margin_stop_percent: Decimal,
    pub sku_margin_warning_percent: Decimal,
    pub runway_critical_months: Decimal,
    pub runway_warning_months: Decimal,
    pub ar_overdue_min: Decimal,
    pub ar_severe_share_percent: Decimal,
    pub campaign_roas_floor: Decimal,
    pub channel_margin_floor: Decimal,
}

impl Default for SynthThresholds {
    fn default() -> Self {
        SynthThresholds {
            sku_margin_stop_percent: Decimal::ZERO,
            sku_margin_warning_percent: Decimal::from(5),
            runway_critical_months: Decimal::new(15, 1),
            runway_warning_months: Decimal::from(3),
            ar_overdue_min: Decimal::ZERO,
            ar_severe_share_percent: Decimal::from(30),
            campaign_roas_floor: Decimal::ONE,
            channel_margin_floor: Decimal::ZERO,
        }
    }
}

/// The kinds of condition the synthesizer detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    SkuStop,
    SkuMarginErosion,
    CashSurvival,
    ArCollection,
    ChannelLoss,
    CampaignBurn,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::SkuStop => "SKU_STOP",
            Signal::SkuMarginErosion => "SKU_MARGIN_EROSION",
            Signal::CashSurvival => "CASH_SURVIVAL",
            Signal::ArCollection => "AR_COLLECTION",
            Signal::ChannelLoss => "CHANNEL_LOSS",
            Signal::CampaignBurn => "CAMPAIGN_BURN",
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            Signal::SkuStop
            | Signal::SkuMarginErosion
            | Signal::CashSurvival
            | Signal::ArCollection => Domain::Fdp,
            Signal::ChannelLoss | Signal::CampaignBurn => Domain::Mdp,
        }
    }

    fn metric_code(self) -> &'static str {
        match self {
            Signal::SkuStop | Signal::SkuMarginErosion => "sku_margin_percent",
            Signal::CashSurvival => "cash_runway_months",
            Signal::ArCollection => "ar_overdue_amount",
            Signal::ChannelLoss => "channel_contribution_margin",
            Signal::CampaignBurn => "campaign_roas",
        }
    }

    fn grain(self) -> Grain {
        match self {
            Signal::SkuStop | Signal::SkuMarginErosion => Grain::Sku,
            Signal::CashSurvival | Signal::ArCollection => Grain::Tenant,
            Signal::ChannelLoss => Grain::Channel,
            Signal::CampaignBurn => Grain::Campaign,
        }
    }
}

/// `auto-<signal>-<entity>`, e.g. `auto-sku_stop-SKU-42`.
pub fn auto_id(signal: Signal, entity_id: &str) -> String {
    format!(
        "{AUTO_ID_PREFIX}{}-{entity_id}",
        signal.as_str().to_ascii_lowercase()
    )
}

pub fn is_auto_id(id: &str) -> bool {
    id.starts_with(AUTO_ID_PREFIX)
}

/// A synthesized decision plus the signal metadata that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoDecision {
    #[serde(flatten)]
    pub decision: DecisionContract,
    pub signal: Signal,
    pub priority: Priority,
    /// Days until the condition bites, where the signal has one.
    #[serde(default)]
    pub impact_window_days: Option<i64>,
}

impl AutoDecision {
    pub fn id(&self) -> &str {
        &self.decision.id
    }
}

/// Evaluate every rule against `facts`.
pub fn synthesize(
    tenant_id: &str,
    facts: &LiveFacts,
    thresholds: &SynthThresholds,
    now: OffsetDateTime,
) -> Result<Vec<AutoDecision>, EngineError> {
    let ctx = RuleContext {
        tenant_id,
        period: format!("{}-{:02}", now.year(), u8::from(now.month())),
        now,
    };
    let mut out = Vec::new();
    for sku in &facts.skus {
        if let Some(d) = sku_rule(&ctx, sku, thresholds)? {
            out.push(d);
        }
    }
    if let Some(runway) = &facts.cash_runway {
        if let Some(d) = cash_rule(&ctx, runway, thresholds)? {
            out.push(d);
        }
    }
    if let Some(ar) = &facts.ar_aging {
        if let Some(d) = ar_rule(&ctx, ar, thresholds)? {
            out.push(d);
        }
    }
    for channel in &facts.channels {
        if let Some(d) = channel_rule(&ctx, channel, thresholds)? {
            out.push(d);
        }
    }
    for campaign in &facts.campaigns {
        if let Some(d) = campaign_rule(&ctx, campaign, thresholds)? {
            out.push(d);
        }
    }
    tracing::debug!(tenant_id, synthesized = out.len(), "auto-synthesis complete");
    Ok(out)
}

// ──────────────────────────────────────────────
// Rules
// ──────────────────────────────────────────────

struct RuleContext<'a> {
    tenant_id: &'a str,
    period: String,
    now: OffsetDateTime,
}

fn sku_rule(
    ctx: &RuleContext<'_>,
    sku: &SkuFacts,
    t: &SynthThresholds,
) -> Result<Option<AutoDecision>, EngineError> {
    let name = sku.name.clone().unwrap_or_else(|| sku.sku_id.clone());
    let facts = vec![
        fact(
            "Margin",
            sku.margin_percent,
            "%",
            FactStatus::Bad,
            Some("sku_margin_percent"),
        )?,
        fact(
            "Revenue",
            sku.revenue,
            "VND",
            FactStatus::Neutral,
            Some("sku_net_revenue"),
        )?,
        fact(
            "Profit",
            sku.profit,
            "VND",
            status_of_sign(sku.profit),
            Some("sku_gross_profit"),
        )?,
    ];

    if sku.margin_percent < t.sku_margin_stop_percent {
        return build(
            ctx,
            Draft {
                signal: Signal::SkuStop,
                priority: Priority::P1,
                entity_id: &sku.sku_id,
                entity_name: &name,
                title: format!("Stop selling {name}: margin {}%", sku.margin_percent.normalize()),
                problem: format!(
                    "{name} loses money on every sale ({}% margin, {} profit on {} revenue).",
                    sku.margin_percent.normalize(),
                    sku.profit.normalize(),
                    sku.revenue.normalize()
                ),
                impact: sku.profit,
                deadline_hours: 24,
                impact_window_days: None,
                facts,
                actions: &[
                    ("STOP", "Stop selling immediately", true),
                    ("REPRICE", "Reprice", false),
                    ("MONITOR", "Monitor", false),
                ],
            },
        )
        .map(Some);
    }

    if sku.margin_percent < t.sku_margin_warning_percent {
        let shortfall = t
            .sku_margin_warning_percent
            .checked_sub(sku.margin_percent)
            .and_then(|gap| sku.revenue.checked_mul(gap))
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED));
        let Some(shortfall) = shortfall else {
            return Ok(overflowed(Signal::SkuMarginErosion, &sku.sku_id));
        };
        return build(
            ctx,
            Draft {
                signal: Signal::SkuMarginErosion,
                priority: Priority::P2,
                entity_id: &sku.sku_id,
                entity_name: &name,
                title: format!("{name} margin thin at {}%", sku.margin_percent.normalize()),
                problem: format!(
                    "{name} margin is below the {}% floor.",
                    t.sku_margin_warning_percent.normalize()
                ),
                impact: -shortfall,
                deadline_hours: 72,
                impact_window_days: None,
                facts,
                actions: &[
                    ("REPRICE", "Reprice", true),
                    ("REVIEW_COST", "Review unit cost", false),
                    ("MONITOR", "Monitor", false),
                ],
            },
        )
        .map(Some);
    }
    Ok(None)
}

fn cash_rule(
    ctx: &RuleContext<'_>,
    runway: &CashRunway,
    t: &SynthThresholds,
) -> Result<Option<AutoDecision>, EngineError> {
    let months = runway.runway_months;
    let priority = if months < t.runway_critical_months {
        Priority::P1
    } else if months < t.runway_warning_months {
        Priority::P2
    } else {
        return Ok(None);
    };
    let burn = runway.monthly_burn.unwrap_or(Decimal::ZERO);
    let window = months.checked_mul(Decimal::from(30));
    let shortfall = t
        .runway_warning_months
        .checked_sub(months)
        .and_then(|gap| burn.checked_mul(gap));
    let (Some(window), Some(shortfall)) = (window, shortfall) else {
        return Ok(overflowed(Signal::CashSurvival, ctx.tenant_id));
    };
    let window_days = window.floor().to_i64().unwrap_or(0);
    let mut facts = vec![fact(
        "Cash runway",
        months,
        "months",
        FactStatus::Bad,
        Some("cash_runway_months"),
    )?];
    if let Some(balance) = runway.cash_balance {
        facts.push(fact(
            "Cash on hand",
            balance,
            "VND",
            FactStatus::Neutral,
            Some("cash_on_hand"),
        )?);
    }
    if runway.monthly_burn.is_some() {
        facts.push(fact("Monthly burn", burn, "VND", FactStatus::Warning, None)?);
    }

    build(
        ctx,
        Draft {
            signal: Signal::CashSurvival,
            priority,
            entity_id: ctx.tenant_id,
            entity_name: "Cash position",
            title: format!("Cash runs out in {} months", months.normalize()),
            problem: format!(
                "At the current burn, cash lasts about {window_days} days; the floor is {} months.",
                t.runway_warning_months.normalize()
            ),
            impact: -shortfall.max(Decimal::ZERO),
            deadline_hours: if priority == Priority::P1 { 24 } else { 72 },
            impact_window_days: Some(window_days),
            facts,
            actions: &[
                ("CUT_COSTS", "Cut discretionary spend", true),
                ("RAISE_FINANCING", "Raise bridge financing", false),
                ("ACCELERATE_COLLECTIONS", "Accelerate collections", false),
            ],
        },
    )
    .map(Some)
}

fn ar_rule(
    ctx: &RuleContext<'_>,
    ar: &ArAging,
    t: &SynthThresholds,
) -> Result<Option<AutoDecision>, EngineError> {
    if ar.total_overdue <= t.ar_overdue_min {
        return Ok(None);
    }
    let share = if ar.total_overdue.is_zero() {
        Some(Decimal::ZERO)
    } else {
        ar.overdue_90_plus
            .checked_div(ar.total_overdue)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
    };
    let Some(share) = share else {
        return Ok(overflowed(Signal::ArCollection, ctx.tenant_id));
    };
    let priority = if share >= t.ar_severe_share_percent {
        Priority::P1
    } else {
        Priority::P2
    };
    let facts = vec![
        fact(
            "Overdue receivables",
            ar.total_overdue,
            "VND",
            FactStatus::Warning,
            Some("ar_overdue_amount"),
        )?,
        fact(
            "90+ days overdue",
            ar.overdue_90_plus,
            "VND",
            FactStatus::Bad,
            Some("ar_overdue_90_plus"),
        )?,
        fact("90+ share", share.round_dp(1), "%", FactStatus::Neutral, None)?,
    ];
    build(
        ctx,
        Draft {
            signal: Signal::ArCollection,
            priority,
            entity_id: ctx.tenant_id,
            entity_name: "Receivables",
            title: format!("Collect {} overdue receivables", ar.total_overdue.normalize()),
            problem: format!(
                "{}% of overdue receivables are more than 90 days late.",
                share.round_dp(1).normalize()
            ),
            impact: ar.total_overdue,
            deadline_hours: if priority == Priority::P1 { 48 } else { 120 },
            impact_window_days: None,
            facts,
            actions: &[
                ("COLLECT", "Start collection calls", true),
                ("ESCALATE_COLLECTIONS", "Hand to collections agency", false),
                ("WRITE_OFF", "Write off", false),
            ],
        },
    )
    .map(Some)
}

fn channel_rule(
    ctx: &RuleContext<'_>,
    channel: &ChannelFacts,
    t: &SynthThresholds,
) -> Result<Option<AutoDecision>, EngineError> {
    if channel.contribution_margin >= t.channel_margin_floor {
        return Ok(None);
    }
    let name = channel.name.clone().unwrap_or_else(|| channel.channel_id.clone());
    let facts = vec![
        fact(
            "Contribution margin",
            channel.contribution_margin,
            "VND",
            FactStatus::Bad,
            Some("channel_contribution_margin"),
        )?,
        fact("Revenue", channel.revenue, "VND", FactStatus::Neutral, None)?,
    ];
    build(
        ctx,
        Draft {
            signal: Signal::ChannelLoss,
            priority: Priority::P2,
            entity_id: &channel.channel_id,
            entity_name: &name,
            title: format!("{name} loses money after fees"),
            problem: format!(
                "{name} contribution margin is {} on {} revenue.",
                channel.contribution_margin.normalize(),
                channel.revenue.normalize()
            ),
            impact: channel.contribution_margin,
            deadline_hours: 72,
            impact_window_days: None,
            facts,
            actions: &[
                ("RENEGOTIATE_FEES", "Renegotiate channel fees", true),
                ("REDUCE_SPEND", "Reduce ad spend", false),
                ("EXIT_CHANNEL", "Exit channel", false),
            ],
        },
    )
    .map(Some)
}

fn campaign_rule(
    ctx: &RuleContext<'_>,
    campaign: &CampaignFacts,
    t: &SynthThresholds,
) -> Result<Option<AutoDecision>, EngineError> {
    let Some(roas) = campaign.effective_roas() else {
        return Ok(None);
    };
    if roas >= t.campaign_roas_floor || campaign.spend <= Decimal::ZERO {
        return Ok(None);
    }
    let Some(impact) = campaign.revenue.checked_sub(campaign.spend) else {
        return Ok(overflowed(Signal::CampaignBurn, &campaign.campaign_id));
    };
    let name = campaign.name.clone().unwrap_or_else(|| campaign.campaign_id.clone());
    let facts = vec![
        fact("ROAS", roas.round_dp(2), "x", FactStatus::Bad, Some("campaign_roas"))?,
        fact("Spend", campaign.spend, "VND", FactStatus::Neutral, Some("campaign_spend"))?,
        fact("Revenue", campaign.revenue, "VND", FactStatus::Neutral, None)?,
    ];
    build(
        ctx,
        Draft {
            signal: Signal::CampaignBurn,
            priority: Priority::P2,
            entity_id: &campaign.campaign_id,
            entity_name: &name,
            title: format!("Pause {name}: ROAS {}", roas.round_dp(2).normalize()),
            problem: format!(
                "{name} returns {} per unit of spend, below the {} floor.",
                roas.round_dp(2).normalize(),
                t.campaign_roas_floor.normalize()
            ),
            impact,
            deadline_hours: 48,
            impact_window_days: None,
            facts,
            actions: &[
                ("PAUSE", "Pause campaign", true),
                ("OPTIMIZE", "Optimize targeting", false),
                ("MONITOR", "Monitor", false),
            ],
        },
    )
    .map(Some)
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// Facts too large to compute with skip their rule.
fn overflowed(signal: Signal, entity_id: &str) -> Option<AutoDecision> {
    tracing::warn!(
        signal = signal.as_str(),
        entity_id,
        "decimal overflow in live facts, rule skipped"
    );
    None
}

struct Draft<'a> {
    signal: Signal,
    priority: Priority,
    entity_id: &'a str,
    entity_name: &'a str,
    title: String,
    problem: String,
    impact: Decimal,
    deadline_hours: i64,
    impact_window_days: Option<i64>,
    facts: Vec<towerline_core::DecisionFact>,
    actions: &'a [(&'a str, &'a str, bool)],
}

fn build(ctx: &RuleContext<'_>, draft: Draft<'_>) -> Result<AutoDecision, EngineError> {
    let deadline_at = ctx
        .now
        .checked_add(Duration::hours(draft.deadline_hours))
        .ok_or_else(|| {
            EngineError::InvalidRequest(format!("deadline after {} is out of range", ctx.now))
        })?;
    let metric_code = draft.signal.metric_code();
    let actions = draft
        .actions
        .iter()
        .map(|(action_type, label, recommended)| {
            create_action(ActionParams {
                action_id: Some(format!("{}:{}", draft.signal.as_str(), action_type)),
                label: label.to_string(),
                action_type: action_type.to_string(),
                is_recommended: *recommended,
                ..Default::default()
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let evidence = create_evidence(
        EvidenceParams {
            source_tables: towerline_core::catalog::lookup(metric_code)
                .map(|m| vec![m.source_view.to_string()])
                .unwrap_or_default(),
            data_period: Some(ctx.period.clone()),
            computation_method: Some("threshold".to_string()),
            ..Default::default()
        },
        ctx.now,
    )?;
    let decision = create_decision(
        DecisionParams {
            id: Some(auto_id(draft.signal, draft.entity_id)),
            tenant_id: ctx.tenant_id.to_string(),
            domain: draft.signal.domain(),
            decision_type: draft.signal.as_str().to_string(),
            entity_type: draft.signal.grain(),
            entity_id: draft.entity_id.to_string(),
            entity_name: draft.entity_name.to_string(),
            metric_code: metric_code.to_string(),
            metric_version: None,
            period: ctx.period.clone(),
            title: draft.title,
            problem_statement: draft.problem,
            severity: draft.priority.severity(),
            owner_role: None,
            impact_amount: draft.impact,
            deadline_at,
            facts: draft.facts,
            actions,
            evidence,
        },
        ctx.now,
    )?;
    Ok(AutoDecision {
        decision,
        signal: draft.signal,
        priority: draft.priority,
        impact_window_days: draft.impact_window_days,
    })
}

fn fact(
    label: &str,
    value: Decimal,
    unit: &str,
    status: FactStatus,
    metric: Option<&str>,
) -> Result<towerline_core::DecisionFact, EngineError> {
    let mut params = FactParams::new(label, value, unit).status(status);
    if let Some(code) = metric {
        params = params.metric(code);
    }
    Ok(create_fact(params)?)
}

fn status_of_sign(value: Decimal) -> FactStatus {
    if value.is_sign_negative() && !value.is_zero() {
        FactStatus::Bad
    } else {
        FactStatus::Good
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;
    use time::macros::datetime;
    use towerline_core::Severity;

    const NOW: OffsetDateTime = datetime!(2025-03-01 09:00 UTC);

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sku(id: &str, margin: &str, revenue: &str, profit: &str) -> SkuFacts {
        SkuFacts {
            sku_id: id.into(),
            name: None,
            revenue: dec(revenue),
            profit: dec(profit),
            margin_percent: dec(margin),
        }
    }

    fn run(facts: LiveFacts) -> Vec<AutoDecision> {
        synthesize("t1", &facts, &SynthThresholds::default(), NOW).unwrap()
    }

    #[test]
    fn sku_stop_loss() {
        let out = run(LiveFacts {
            skus: vec![sku("SKU-1", "-12.0", "10000000", "-1200000")],
            ..Default::default()
        });
        assert_eq!(out.len(), 1);
        let d = &out[0];
        assert_eq!(d.signal, Signal::SkuStop);
        assert_eq!(d.priority, Priority::P1);
        assert_eq!(d.decision.severity, Severity::Critical);
        assert_eq!(d.decision.impact_amount, dec("-1200000"));
        assert_eq!(d.decision.recommended_action().unwrap().action_type, "STOP");
        assert_eq!(d.id(), "auto-sku_stop-SKU-1");
        assert_eq!(d.decision.card_type(), "FDP_SKU_STOP");
        assert_eq!(d.decision.period, "2025-03");
    }

    #[test]
    fn thin_margin_is_erosion_not_stop() {
        let out = run(LiveFacts {
            skus: vec![
                sku("SKU-2", "3", "1000", "30"),
                sku("SKU-3", "12", "1000", "120"),
            ],
            ..Default::default()
        });
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].signal, Signal::SkuMarginErosion);
        assert_eq!(out[0].priority, Priority::P2);
        assert_eq!(out[0].decision.impact_amount, dec("-20"));
    }

    #[test]
    fn cash_critical_window() {
        let out = run(LiveFacts {
            cash_runway: Some(CashRunway {
                runway_months: dec("0.8"),
                cash_balance: None,
                monthly_burn: None,
            }),
            ..Default::default()
        });
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].signal, Signal::CashSurvival);
        assert_eq!(out[0].priority, Priority::P1);
        assert_eq!(out[0].impact_window_days, Some(24));
        assert_eq!(out[0].id(), "auto-cash_survival-t1");
    }

    #[test]
    fn cash_warning_and_healthy() {
        let warn = run(LiveFacts {
            cash_runway: Some(CashRunway {
                runway_months: dec("2.5"),
                cash_balance: Some(dec("500")),
                monthly_burn: Some(dec("200")),
            }),
            ..Default::default()
        });
        assert_eq!(warn[0].priority, Priority::P2);
        assert_eq!(warn[0].impact_window_days, Some(75));
        assert_eq!(warn[0].decision.impact_amount, dec("-100"));

        let healthy = run(LiveFacts {
            cash_runway: Some(CashRunway {
                runway_months: dec("3"),
                cash_balance: None,
                monthly_burn: None,
            }),
            ..Default::default()
        });
        assert!(healthy.is_empty());
    }

    #[test]
    fn ar_severity_by_aged_share() {
        let severe = run(LiveFacts {
            ar_aging: Some(ArAging {
                total_overdue: dec("1000"),
                overdue_90_plus: dec("300"),
                overdue_customers: None,
            }),
            ..Default::default()
        });
        assert_eq!(severe[0].priority, Priority::P1);

        let mild = run(LiveFacts {
            ar_aging: Some(ArAging {
                total_overdue: dec("1000"),
                overdue_90_plus: dec("100"),
                overdue_customers: None,
            }),
            ..Default::default()
        });
        assert_eq!(mild[0].priority, Priority::P2);

        let none = run(LiveFacts {
            ar_aging: Some(ArAging {
                total_overdue: Decimal::ZERO,
                overdue_90_plus: Decimal::ZERO,
                overdue_customers: None,
            }),
            ..Default::default()
        });
        assert!(none.is_empty());
    }

    #[test]
    fn marketing_signals() {
        let out = run(LiveFacts {
            channels: vec![ChannelFacts {
                channel_id: "shopee".into(),
                name: Some("Shopee".into()),
                revenue: dec("5000"),
                contribution_margin: dec("-250"),
            }],
            campaigns: vec![
                CampaignFacts {
                    campaign_id: "c-1".into(),
                    name: None,
                    spend: dec("1000"),
                    revenue: dec("400"),
                    roas: None,
                },
                CampaignFacts {
                    campaign_id: "c-2".into(),
                    name: None,
                    spend: dec("1000"),
                    revenue: dec("4000"),
                    roas: None,
                },
            ],
            ..Default::default()
        });
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].signal, Signal::ChannelLoss);
        assert_eq!(out[0].decision.domain, Domain::Mdp);
        assert_eq!(out[1].signal, Signal::CampaignBurn);
        assert_eq!(out[1].decision.recommended_action().unwrap().action_type, "PAUSE");
        assert_eq!(out[1].decision.impact_amount, dec("-600"));
    }

    #[test]
    fn identity_is_stable_across_runs() {
        let facts = LiveFacts {
            skus: vec![sku("SKU-1", "-12.0", "10000000", "-1200000")],
            ..Default::default()
        };
        let a = synthesize("t1", &facts, &SynthThresholds::default(), NOW).unwrap();
        let b = synthesize(
            "t1",
            &facts,
            &SynthThresholds::default(),
            NOW + Duration::hours(3),
        )
        .unwrap();
        assert_eq!(a[0].id(), b[0].id());
    }

    #[test]
    fn oversized_facts_skip_their_rule() {
        let out = run(LiveFacts {
            skus: vec![
                SkuFacts {
                    sku_id: "SKU-HUGE".into(),
                    name: None,
                    revenue: Decimal::MAX,
                    profit: Decimal::ZERO,
                    margin_percent: Decimal::from(3),
                },
                sku("SKU-1", "-12.0", "10000000", "-1200000"),
            ],
            cash_runway: Some(CashRunway {
                runway_months: Decimal::MIN,
                cash_balance: None,
                monthly_burn: Some(Decimal::MAX),
            }),
            ar_aging: Some(ArAging {
                total_overdue: Decimal::new(1, 20),
                overdue_90_plus: Decimal::MAX,
                overdue_customers: None,
            }),
            campaigns: vec![CampaignFacts {
                campaign_id: "c-huge".into(),
                name: None,
                spend: Decimal::MAX,
                revenue: Decimal::MIN,
                roas: Some(dec("0.1")),
            }],
            ..Default::default()
        });
        let ids: Vec<&str> = out.iter().map(AutoDecision::id).collect();
        assert_eq!(ids, ["auto-sku_stop-SKU-1"]);
    }

    #[test]
    fn empty_facts_synthesize_nothing() {
        assert!(run(LiveFacts::default()).is_empty());
    }

    proptest! {
        #[test]
        fn sku_signal_follows_margin_band(margin_bp in -5_000i64..5_000) {
            let margin = Decimal::new(margin_bp, 2);
            let facts = LiveFacts {
                skus: vec![SkuFacts {
                    sku_id: "SKU-P".into(),
                    name: None,
                    revenue: Decimal::from(1_000_000),
                    profit: Decimal::from(1_000_000) * margin / Decimal::ONE_HUNDRED,
                    margin_percent: margin,
                }],
                ..Default::default()
            };
            let out = run(facts);
            let t = SynthThresholds::default();
            let expected = if margin < t.sku_margin_stop_percent {
                Some(Signal::SkuStop)
            } else if margin < t.sku_margin_warning_percent {
                Some(Signal::SkuMarginErosion)
            } else {
                None
            };
            prop_assert_eq!(out.first().map(|a| a.signal), expected);
            prop_assert!(out.len() <= 1);
        }
    }
}
