//! Per-domain adapters over persisted decision rows.
//!
//! An adapter sees only rows for its tenant whose `card_type` starts with
//! its domain prefix. Rows that cannot be mapped are skipped with a
//! warning so one bad producer cannot take a whole list down.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use towerline_core::scenario::build_scenario_decision;
use towerline_core::{
    deduplicate, summarize, AuditLogEntry, CardSource, DecisionContract, DecisionSummary, Domain,
    ScenarioInput, ScenarioType,
};
use towerline_storage::{tables, Query};

use crate::cache::CacheScope;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::mutation::{DecisionLifecycle, Mutation};
use crate::refresh::RefreshHandle;
use crate::row::{decision_from_row, decision_to_row, mutation_patch};

#[derive(Clone)]
pub struct DomainAdapter {
    domain: Domain,
    ctx: Arc<EngineContext>,
}

impl DomainAdapter {
    pub fn fdp(ctx: Arc<EngineContext>) -> Self {
        DomainAdapter {
            domain: Domain::Fdp,
            ctx,
        }
    }

    pub fn mdp(ctx: Arc<EngineContext>) -> Self {
        DomainAdapter {
            domain: Domain::Mdp,
            ctx,
        }
    }

    pub fn cdp(ctx: Arc<EngineContext>) -> Self {
        DomainAdapter {
            domain: Domain::Cdp,
            ctx,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Live decisions for the tenant, one per dedupe key, newest first.
    pub async fn list(&self, tenant_id: &str) -> Result<Vec<DecisionContract>, EngineError> {
        let query = Query::new()
            .eq("tenant_id", tenant_id)
            .prefix("card_type", self.domain.card_type_prefix());
        let rows = self.ctx.store.select(tables::DECISION_CARDS, &query).await?;
        let raw = rows.len();
        let decisions: Vec<DecisionContract> = rows
            .iter()
            .filter_map(|row| match decision_from_row(row) {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::warn!(
                        domain = %self.domain,
                        tenant_id,
                        error = %e,
                        "skipping malformed decision row"
                    );
                    None
                }
            })
            .collect();
        let live = deduplicate(decisions);
        tracing::debug!(
            domain = %self.domain,
            tenant_id,
            raw,
            live = live.len(),
            "listed decisions"
        );
        Ok(live)
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<DecisionContract, EngineError> {
        let row = self.ctx.store.get(tables::DECISION_CARDS, id).await?;
        let decision = decision_from_row(&row)?;
        if decision.tenant_id != tenant_id || decision.domain != self.domain {
            return Err(EngineError::NotFound { id: id.to_string() });
        }
        Ok(decision)
    }

    /// Summary counts, served from cache while fresh.
    pub async fn summary(&self, tenant_id: &str) -> Result<DecisionSummary, EngineError> {
        let scope = CacheScope::Domain(self.domain);
        if let Some(hit) = self.ctx.cache.get(tenant_id, scope).await {
            return Ok(hit);
        }
        self.compute_summary(tenant_id).await
    }

    /// Recompute the summary on a background task.
    pub fn refresh_summary(&self, tenant_id: &str) -> RefreshHandle<DecisionSummary> {
        let adapter = self.clone();
        let tenant_id = tenant_id.to_string();
        RefreshHandle::spawn("domain_summary", async move {
            adapter.compute_summary(&tenant_id).await
        })
    }

    async fn compute_summary(&self, tenant_id: &str) -> Result<DecisionSummary, EngineError> {
        let decisions = self.list(tenant_id).await?;
        let summary = summarize(&decisions, self.ctx.clock.now());
        self.ctx
            .cache
            .put(tenant_id, CacheScope::Domain(self.domain), summary)
            .await;
        Ok(summary)
    }

    /// Build a decision from a scenario and persist it.
    pub async fn raise(
        &self,
        scenario: ScenarioType,
        input: ScenarioInput,
    ) -> Result<DecisionContract, EngineError> {
        let now = self.ctx.clock.now();
        let mut decision = build_scenario_decision(self.domain, scenario, input, now)?;
        let stored = self
            .ctx
            .store
            .insert(tables::DECISION_CARDS, decision_to_row(&decision)?)
            .await?;
        decision.version = stored.get("version").and_then(Value::as_i64).unwrap_or(0);
        self.ctx.invalidate(&decision.tenant_id, &[self.domain]).await;
        tracing::info!(
            domain = %self.domain,
            tenant_id = %decision.tenant_id,
            decision_id = %decision.id,
            scenario = scenario.as_str(),
            "decision raised"
        );
        Ok(decision)
    }

    /// Put back the lifecycle columns of `before` after the audit append
    /// failed. Only succeeds if nobody wrote the row since `version`.
    async fn restore(&self, before: &DecisionContract, version: i64) {
        let result = match mutation_patch(before) {
            Ok(patch) => self
                .ctx
                .store
                .update(tables::DECISION_CARDS, &before.id, patch, Some(version))
                .await
                .map_err(EngineError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => tracing::warn!(
                domain = %self.domain,
                decision_id = %before.id,
                "audit append failed, mutation rolled back"
            ),
            Err(e) => tracing::error!(
                domain = %self.domain,
                decision_id = %before.id,
                error = %e,
                "audit append failed and rollback did not apply"
            ),
        }
    }
}

#[async_trait]
impl DecisionLifecycle for DomainAdapter {
    async fn apply(
        &self,
        tenant_id: &str,
        id: &str,
        mutation: Mutation,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        let now = self.ctx.clock.now();
        let mut decision = self.get(tenant_id, id).await?;
        let before = decision.clone();
        let read_version = decision.version;
        let from = mutation.apply(&mut decision, &self.ctx.apply_context(actor, now))?;

        let stored = self
            .ctx
            .store
            .update(
                tables::DECISION_CARDS,
                id,
                mutation_patch(&decision)?,
                self.ctx.config.concurrency.expected_version(read_version),
            )
            .await?;
        decision.version = stored
            .get("version")
            .and_then(Value::as_i64)
            .unwrap_or(read_version + 1);
        let touched = [self.domain, decision.domain];
        self.ctx.invalidate(tenant_id, &touched).await;

        let audited = AuditLogEntry::from_decision(
            &decision,
            CardSource::Persisted,
            mutation.audit_action(&decision, actor),
            now,
        )
        .map_err(EngineError::from);
        let recorded = match audited {
            Ok(entry) => self.ctx.audit.record(&entry).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            self.restore(&before, decision.version).await;
            self.ctx.invalidate(tenant_id, &touched).await;
            return Err(e);
        }

        tracing::info!(
            domain = %self.domain,
            tenant_id,
            decision_id = id,
            action = %mutation.action(),
            from = %from,
            to = %decision.status,
            "decision updated"
        );
        Ok(decision)
    }
}
