//! Auto-synthesizer: decisions computed on read from live facts.
//!
//! Each evaluation runs the threshold rules, marks side-store states whose
//! condition has vanished as cleared, and overlays the remaining states.
//! Nothing here runs on a schedule; evaluation happens inside whichever
//! read asked for it.

pub mod facts;
pub mod overlay;
pub mod rules;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use towerline_core::{AuditLogEntry, CardSource, DecisionContract};
use towerline_storage::{tables, Query, Row, StorageError};

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::mutation::{DecisionLifecycle, Mutation};

pub use facts::{
    load_facts, ArAging, CampaignFacts, CashRunway, ChannelFacts, FactSource, LiveFacts, SkuFacts,
    StaticFactSource,
};
pub use overlay::{merge, vanished, AutoCardState};
pub use rules::{auto_id, is_auto_id, synthesize, AutoDecision, Signal, SynthThresholds};

#[derive(Clone)]
pub struct AutoSynthesizer {
    ctx: Arc<EngineContext>,
    source: Arc<dyn FactSource>,
}

impl AutoSynthesizer {
    pub fn new(ctx: Arc<EngineContext>, source: Arc<dyn FactSource>) -> Self {
        AutoSynthesizer { ctx, source }
    }

    /// Current auto decisions for the tenant with side-store state applied.
    pub async fn evaluate(&self, tenant_id: &str) -> Result<Vec<AutoDecision>, EngineError> {
        let (merged, _) = self.evaluate_with_states(tenant_id).await?;
        Ok(merged)
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<AutoDecision, EngineError> {
        let (merged, _) = self.evaluate_with_states(tenant_id).await?;
        merged
            .into_iter()
            .find(|a| a.decision.id == id)
            .ok_or_else(|| EngineError::NotFound { id: id.to_string() })
    }

    async fn evaluate_with_states(
        &self,
        tenant_id: &str,
    ) -> Result<(Vec<AutoDecision>, Vec<AutoCardState>), EngineError> {
        let now = self.ctx.clock.now();
        let states = self.load_states(tenant_id).await?;
        let Some(facts) = load_facts(self.source.as_ref(), tenant_id).await else {
            return Ok((Vec::new(), states));
        };
        if facts.is_empty() {
            tracing::debug!(tenant_id, "no live facts yet");
            return Ok((Vec::new(), states));
        }

        let base = synthesize(tenant_id, &facts, &self.ctx.config.synth, now)?;
        for state in vanished(&base, &states) {
            self.mark_cleared(state).await;
        }
        Ok((merge(base, &states, now), states))
    }

    async fn load_states(&self, tenant_id: &str) -> Result<Vec<AutoCardState>, EngineError> {
        let rows = self
            .ctx
            .store
            .select(
                tables::AUTO_CARD_STATES,
                &Query::new().eq("tenant_id", tenant_id),
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id").cloned();
                match AutoCardState::from_row(row) {
                    Ok(s) => Some(s),
                    Err(e) => {
                        tracing::warn!(id = ?id, error = %e, "skipping unreadable auto card state");
                        None
                    }
                }
            })
            .collect())
    }

    /// Clearing happens on the read path, so failure only warns.
    async fn mark_cleared(&self, state: &AutoCardState) {
        let patch = cleared_patch(self.ctx.clock.now());
        let result = self
            .ctx
            .store
            .update(
                tables::AUTO_CARD_STATES,
                &state.id,
                patch,
                Some(state.version),
            )
            .await;
        match result {
            Ok(_) => tracing::debug!(auto_card_id = %state.auto_card_id, "condition cleared"),
            Err(e) => tracing::warn!(
                auto_card_id = %state.auto_card_id,
                error = %e,
                "could not mark auto card state cleared"
            ),
        }
    }

    /// Undo `saved` after the audit append failed. A state that did not
    /// exist before is marked cleared, which makes it inert.
    async fn restore_state(&self, saved: &AutoCardState, previous: Option<&AutoCardState>) {
        let patch = match previous {
            Some(prev) => prev.to_row().map(|mut row| {
                row.remove("id");
                row.remove("version");
                row
            }),
            None => Ok(cleared_patch(self.ctx.clock.now())),
        };
        let result = match patch {
            Ok(patch) => self
                .ctx
                .store
                .update(
                    tables::AUTO_CARD_STATES,
                    &saved.id,
                    patch,
                    Some(saved.version),
                )
                .await
                .map_err(EngineError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => tracing::warn!(
                auto_card_id = %saved.auto_card_id,
                "audit append failed, auto card state rolled back"
            ),
            Err(e) => tracing::error!(
                auto_card_id = %saved.auto_card_id,
                error = %e,
                "audit append failed and auto card state rollback did not apply"
            ),
        }
    }

    async fn save_state(
        &self,
        state: &AutoCardState,
        previous: Option<&AutoCardState>,
    ) -> Result<i64, EngineError> {
        let mut row = state.to_row()?;
        let stored = match previous {
            Some(prev) => {
                row.remove("id");
                row.remove("version");
                self.ctx
                    .store
                    .update(
                        tables::AUTO_CARD_STATES,
                        &prev.id,
                        row,
                        self.ctx.config.concurrency.expected_version(prev.version),
                    )
                    .await?
            }
            None => match self.ctx.store.insert(tables::AUTO_CARD_STATES, row).await {
                Ok(stored) => stored,
                Err(StorageError::AlreadyExists { id, .. }) => {
                    return Err(EngineError::Conflict {
                        id,
                        expected: 0,
                        actual: 0,
                    })
                }
                Err(e) => return Err(e.into()),
            },
        };
        Ok(stored.get("version").and_then(Value::as_i64).unwrap_or(0))
    }
}

#[async_trait]
impl DecisionLifecycle for AutoSynthesizer {
    async fn apply(
        &self,
        tenant_id: &str,
        id: &str,
        mutation: Mutation,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        mutation.validate()?;
        let now = self.ctx.clock.now();
        let (merged, states) = self.evaluate_with_states(tenant_id).await?;
        let mut decision = merged
            .into_iter()
            .find(|a| a.decision.id == id)
            .map(|a| a.decision)
            .ok_or_else(|| EngineError::NotFound { id: id.to_string() })?;
        let previous = states.iter().find(|s| s.auto_card_id == id);
        let original_domain = decision.domain;

        let from = mutation.apply(&mut decision, &self.ctx.apply_context(actor, now))?;
        let mut state = AutoCardState::capture(
            &decision,
            mutation.action().as_str(),
            actor,
            now,
            self.ctx.config.side_store.state_ttl(),
        );
        state.version = self.save_state(&state, previous).await?;
        decision.version = state.version;
        let touched = [original_domain, decision.domain];
        self.ctx.invalidate(tenant_id, &touched).await;

        let audited = AuditLogEntry::from_decision(
            &decision,
            CardSource::Ephemeral,
            mutation.audit_action(&decision, actor),
            now,
        )
        .map_err(EngineError::from);
        let recorded = match audited {
            Ok(entry) => self.ctx.audit.record(&entry).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            self.restore_state(&state, previous).await;
            self.ctx.invalidate(tenant_id, &touched).await;
            return Err(e);
        }

        tracing::info!(
            tenant_id,
            decision_id = id,
            action = %mutation.action(),
            from = %from,
            to = %decision.status,
            "auto decision updated"
        );
        Ok(decision)
    }
}

fn cleared_patch(now: time::OffsetDateTime) -> Row {
    let mut patch = Row::new();
    patch.insert("cleared_at".into(), Value::String(format_rfc3339(now)));
    patch
}

fn format_rfc3339(t: time::OffsetDateTime) -> String {
    t.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| t.to_string())
}
