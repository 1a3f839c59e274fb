//! Metric catalog: the fixed registry of metric definitions.
//!
//! The table is a compile-time constant indexed once on first access and
//! never mutated afterwards. Decisions pin the `version` of the entry they
//! were derived from, so edits here never rewrite history.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Serialize;

use crate::contract::{Domain, Grain};
use crate::error::ContractError;

/// How a metric's value is produced upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Canonical database view.
    DbView,
    /// Canonical database function.
    DbFunction,
    /// Server-side RPC returning a precomputed value.
    Rpc,
    /// Computed in the client from raw rows. Governance risk, not an error.
    ClientComputed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    Currency,
    Percent,
    Ratio,
    Days,
    Months,
    Count,
}

impl MetricUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricUnit::Currency => "currency",
            MetricUnit::Percent => "percent",
            MetricUnit::Ratio => "ratio",
            MetricUnit::Days => "days",
            MetricUnit::Months => "months",
            MetricUnit::Count => "count",
        }
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metric definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricContract {
    pub code: &'static str,
    pub label: &'static str,
    pub source_view: &'static str,
    pub source_expression: &'static str,
    pub grain: Grain,
    pub source_type: SourceType,
    pub version: u32,
    pub unit: MetricUnit,
    pub domain: Domain,
    pub is_actionable: bool,
}

impl MetricContract {
    pub fn has_trust_risk(&self) -> bool {
        self.source_type == SourceType::ClientComputed
    }
}

macro_rules! metric {
    (
        $code:literal,
        $label:literal,
        $view:literal,
        $expr:literal,
        $grain:ident,
        $src:ident,
        $ver:literal,
        $unit:ident,
        $domain:ident,
        $act:literal
    ) => {
        MetricContract {
            code: $code,
            label: $label,
            source_view: $view,
            source_expression: $expr,
            grain: Grain::$grain,
            source_type: SourceType::$src,
            version: $ver,
            unit: MetricUnit::$unit,
            domain: Domain::$domain,
            is_actionable: $act,
        }
    };
}

/// The raw catalog table.
#[rustfmt::skip]
pub const METRICS: &[MetricContract] = &[
    // ── FDP ──
    metric!("sku_margin_percent", "SKU margin %", "v_sku_pnl", "gross_profit / net_revenue * 100", Sku, DbView, 2, Percent, Fdp, true),
    metric!("sku_gross_profit", "SKU gross profit", "v_sku_pnl", "net_revenue - cogs - fulfilment_cost", Sku, DbView, 2, Currency, Fdp, true),
    metric!("sku_net_revenue", "SKU net revenue", "v_sku_pnl", "gross_revenue - discounts - returns", Sku, DbView, 1, Currency, Fdp, false),
    metric!("cash_runway_months", "Cash runway (months)", "fn_cash_runway", "cash_on_hand / avg_monthly_net_burn", Tenant, DbFunction, 1, Months, Fdp, true),
    metric!("cash_on_hand", "Cash on hand", "v_cash_position", "sum(bank_balance)", Tenant, DbView, 1, Currency, Fdp, false),
    metric!("ar_overdue_amount", "Overdue receivables", "v_ar_aging", "sum(open_amount) where due_date < today", Tenant, DbView, 1, Currency, Fdp, true),
    metric!("ar_overdue_90_plus", "Receivables 90+ days overdue", "v_ar_aging", "sum(open_amount) where days_overdue > 90", Tenant, DbView, 1, Currency, Fdp, true),
    metric!("inventory_locked_cash", "Cash locked in slow inventory", "v_inventory_aging", "sum(stock_value) where days_of_cover > 90", Sku, DbView, 1, Currency, Fdp, true),
    metric!("dso_days", "Days sales outstanding", "client", "ar_balance / revenue * period_days", Tenant, ClientComputed, 1, Days, Fdp, false),
    metric!("dpo_days", "Days payables outstanding", "client", "ap_balance / cogs * period_days", Tenant, ClientComputed, 1, Days, Fdp, false),
    metric!("ccc_days", "Cash conversion cycle", "client", "dio + dso - dpo", Tenant, ClientComputed, 1, Days, Fdp, false),
    // ── MDP ──
    metric!("campaign_roas", "Campaign ROAS", "v_campaign_performance", "attributed_revenue / spend", Campaign, DbView, 1, Ratio, Mdp, true),
    metric!("campaign_spend", "Campaign spend", "v_campaign_performance", "sum(spend)", Campaign, DbView, 1, Currency, Mdp, false),
    metric!("campaign_cash_burn", "Campaign cash burn", "v_campaign_performance", "spend - attributed_contribution", Campaign, DbView, 1, Currency, Mdp, true),
    metric!("channel_contribution_margin", "Channel contribution margin", "v_channel_pnl", "net_revenue - cogs - channel_fees - ad_spend", Channel, DbView, 2, Currency, Mdp, true),
    metric!("channel_margin_percent", "Channel margin %", "client", "contribution_margin / net_revenue * 100", Channel, ClientComputed, 1, Percent, Mdp, false),
    metric!("channel_cac", "Customer acquisition cost", "client", "ad_spend / new_customers", Channel, ClientComputed, 1, Currency, Mdp, false),
    // ── CDP ──
    metric!("customer_churn_rate", "Churn rate", "v_segment_retention", "churned / active_start * 100", Segment, DbView, 1, Percent, Cdp, true),
    metric!("customer_ltv", "Customer lifetime value", "fn_cohort_ltv", "sum(contribution) / cohort_size", Cohort, DbFunction, 1, Currency, Cdp, true),
    metric!("segment_revenue_at_risk", "Segment revenue at risk", "v_segment_risk", "sum(expected_revenue * churn_probability)", Segment, DbView, 1, Currency, Cdp, true),
    metric!("repeat_purchase_rate", "Repeat purchase rate", "client", "repeat_customers / customers * 100", Segment, ClientComputed, 1, Percent, Cdp, false),
    metric!("active_customers", "Active customers", "v_customer_activity", "count(distinct customer_id)", Tenant, Rpc, 1, Count, Cdp, false),
];

// ──────────────────────────────────────────────
// Index
// ──────────────────────────────────────────────

struct CatalogIndex {
    by_code: HashMap<&'static str, &'static MetricContract>,
}

static CATALOG: LazyLock<CatalogIndex> = LazyLock::new(|| {
    if let Err(e) = validate_catalog(METRICS) {
        tracing::error!(error = %e, "metric catalog failed validation; first entry per code wins");
    }
    let mut by_code = HashMap::with_capacity(METRICS.len());
    for m in METRICS {
        by_code.entry(m.code).or_insert(m);
    }
    CatalogIndex { by_code }
});

/// Check the `^[a-z][a-z0-9_]*$` grammar for a metric code.
pub fn is_valid_metric_code(code: &str) -> bool {
    let mut chars = code.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Validate a catalog table: codes must be well-formed and unique.
pub fn validate_catalog(metrics: &[MetricContract]) -> Result<(), ContractError> {
    let mut seen = std::collections::HashSet::new();
    for m in metrics {
        if !is_valid_metric_code(m.code) {
            return Err(ContractError::InvalidMetricCode {
                code: m.code.to_string(),
            });
        }
        if !seen.insert(m.code) {
            return Err(ContractError::InvalidCatalog {
                message: format!("duplicate metric code '{}'", m.code),
            });
        }
    }
    Ok(())
}

pub fn lookup(code: &str) -> Option<&'static MetricContract> {
    CATALOG.by_code.get(code).copied()
}

pub fn all() -> &'static [MetricContract] {
    METRICS
}

pub fn by_domain(domain: Domain) -> Vec<&'static MetricContract> {
    METRICS.iter().filter(|m| m.domain == domain).collect()
}

pub fn actionable() -> Vec<&'static MetricContract> {
    METRICS.iter().filter(|m| m.is_actionable).collect()
}

/// Metrics computed client-side rather than by a canonical view.
pub fn with_trust_risk() -> Vec<&'static MetricContract> {
    METRICS.iter().filter(|m| m.has_trust_risk()).collect()
}
