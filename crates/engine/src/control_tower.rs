//! Control Tower: the cross-domain view.
//!
//! Reads merge every domain's live decisions with the current auto
//! decisions. When `auto_escalate_on_read` is on, each read also applies
//! the escalation policy and escalates what qualifies, audited under the
//! system actor. A decision nobody reads is never escalated.

use std::collections::BTreeMap;

use serde::Serialize;

use towerline_core::{
    deduplicate, escalation_reason, summarize, DecisionContract, DecisionSummary, Domain,
};
use towerline_storage::{AuditStats, DecisionCounts};

use crate::cache::CacheScope;
use crate::error::EngineError;
use crate::mutation::{DecisionLifecycle, Mutation};
use crate::refresh::RefreshHandle;
use crate::service::DecisionService;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlTowerAnalytics {
    pub domains: BTreeMap<Domain, DecisionCounts>,
    pub audit: AuditStats,
}

#[derive(Clone)]
pub struct ControlTower {
    service: DecisionService,
}

impl ControlTower {
    pub fn new(service: DecisionService) -> Self {
        ControlTower { service }
    }

    /// All live decisions across domains, most urgent first.
    pub async fn list(&self, tenant_id: &str) -> Result<Vec<DecisionContract>, EngineError> {
        let mut all = Vec::new();
        for adapter in self.service.adapters() {
            all.extend(adapter.list(tenant_id).await?);
        }
        if let Some(synth) = self.service.synthesizer() {
            all.extend(synth.evaluate(tenant_id).await?.into_iter().map(|a| a.decision));
        }
        let mut decisions = deduplicate(all);

        if self.service.config().escalation.auto_escalate_on_read {
            self.escalate_on_read(tenant_id, &mut decisions).await;
        }

        decisions.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.deadline_at.cmp(&b.deadline_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(decisions)
    }

    async fn escalate_on_read(&self, tenant_id: &str, decisions: &mut [DecisionContract]) {
        let config = self.service.config();
        let policy = config.escalation.policy();
        let now = self.service.context().clock.now();
        for decision in decisions.iter_mut() {
            let Some(reason) = escalation_reason(decision, &policy, now) else {
                continue;
            };
            let mutation = Mutation::Escalate {
                reason: Some(format!("policy: {}", reason.as_str())),
            };
            match self
                .service
                .apply(tenant_id, &decision.id, mutation, Some(&config.system_actor))
                .await
            {
                Ok(updated) => {
                    tracing::info!(
                        tenant_id,
                        decision_id = %updated.id,
                        reason = reason.as_str(),
                        "escalated by policy"
                    );
                    *decision = updated;
                }
                Err(e) => tracing::warn!(
                    tenant_id,
                    decision_id = %decision.id,
                    error = %e,
                    "policy escalation failed, will retry on next read"
                ),
            }
        }
    }

    /// Cross-domain summary, cached with the control-tower TTL.
    pub async fn summary(&self, tenant_id: &str) -> Result<DecisionSummary, EngineError> {
        let cache = &self.service.context().cache;
        if let Some(hit) = cache.get(tenant_id, CacheScope::ControlTower).await {
            return Ok(hit);
        }
        self.compute_summary(tenant_id).await
    }

    pub fn refresh_summary(&self, tenant_id: &str) -> RefreshHandle<DecisionSummary> {
        let tower = self.clone();
        let tenant_id = tenant_id.to_string();
        RefreshHandle::spawn("control_tower_summary", async move {
            tower.compute_summary(&tenant_id).await
        })
    }

    async fn compute_summary(&self, tenant_id: &str) -> Result<DecisionSummary, EngineError> {
        let decisions = self.list(tenant_id).await?;
        let ctx = self.service.context();
        let summary = summarize(&decisions, ctx.clock.now());
        ctx.cache
            .put(tenant_id, CacheScope::ControlTower, summary)
            .await;
        Ok(summary)
    }

    /// Server-side counts: one aggregation per domain plus audit stats.
    pub async fn analytics(&self, tenant_id: &str) -> Result<ControlTowerAnalytics, EngineError> {
        let ctx = self.service.context();
        let now = ctx.clock.now();
        let mut domains = BTreeMap::new();
        for domain in Domain::OPERATIONAL {
            let counts = ctx
                .store
                .aggregate_decision_counts(tenant_id, domain.card_type_prefix(), now)
                .await?;
            domains.insert(domain, counts);
        }
        let audit = ctx.audit.aggregate_stats(tenant_id, now).await?;
        Ok(ControlTowerAnalytics { domains, audit })
    }
}
