//! Live facts consumed by the synthesizer, and where they come from.
//!
//! Facts arrive already computed. Every field is optional or may be empty
//! while upstream is still loading; the synthesizer treats absence as
//! "no signal", never as an error.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuFacts {
    pub sku_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub margin_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashRunway {
    pub runway_months: Decimal,
    #[serde(default)]
    pub cash_balance: Option<Decimal>,
    #[serde(default)]
    pub monthly_burn: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArAging {
    pub total_overdue: Decimal,
    #[serde(default)]
    pub overdue_90_plus: Decimal,
    #[serde(default)]
    pub overdue_customers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFacts {
    pub channel_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub revenue: Decimal,
    pub contribution_margin: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignFacts {
    pub campaign_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub spend: Decimal,
    pub revenue: Decimal,
    /// Reported ROAS; derived from `revenue / spend` when absent.
    #[serde(default)]
    pub roas: Option<Decimal>,
}

impl CampaignFacts {
    pub fn effective_roas(&self) -> Option<Decimal> {
        self.roas.or_else(|| {
            if self.spend.is_zero() {
                None
            } else {
                self.revenue.checked_div(self.spend)
            }
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveFacts {
    pub skus: Vec<SkuFacts>,
    pub cash_runway: Option<CashRunway>,
    pub ar_aging: Option<ArAging>,
    pub channels: Vec<ChannelFacts>,
    pub campaigns: Vec<CampaignFacts>,
}

impl LiveFacts {
    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
            && self.cash_runway.is_none()
            && self.ar_aging.is_none()
            && self.channels.is_empty()
            && self.campaigns.is_empty()
    }
}

/// Upstream provider of live facts for a tenant.
#[async_trait]
pub trait FactSource: Send + Sync + 'static {
    async fn live_facts(&self, tenant_id: &str) -> Result<LiveFacts, EngineError>;
}

/// Facts held in memory, per tenant.
#[derive(Debug, Clone, Default)]
pub struct StaticFactSource {
    facts: HashMap<String, LiveFacts>,
}

impl StaticFactSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant_id: &str, facts: LiveFacts) -> Self {
        self.facts.insert(tenant_id.to_string(), facts);
        self
    }
}

#[async_trait]
impl FactSource for StaticFactSource {
    async fn live_facts(&self, tenant_id: &str) -> Result<LiveFacts, EngineError> {
        Ok(self.facts.get(tenant_id).cloned().unwrap_or_default())
    }
}

/// Fetch facts, or `None` with a warning when the source fails.
pub async fn load_facts(source: &dyn FactSource, tenant_id: &str) -> Option<LiveFacts> {
    match source.live_facts(tenant_id).await {
        Ok(facts) => Some(facts),
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "fact source unavailable, synthesizing nothing");
            None
        }
    }
}
