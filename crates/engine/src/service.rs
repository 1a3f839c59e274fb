//! The engine's front door: owns the adapters and the synthesizer, and
//! routes each mutation to whichever of them owns the decision id.

use std::sync::Arc;

use async_trait::async_trait;

use towerline_core::{DecisionContract, Domain};
use towerline_storage::{tables, RowStore};

use crate::adapter::DomainAdapter;
use crate::audit::AuditLog;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::control_tower::ControlTower;
use crate::error::EngineError;
use crate::mutation::{DecisionLifecycle, Mutation};
use crate::row::decision_from_row;
use crate::synth::{is_auto_id, AutoSynthesizer, FactSource};

#[derive(Clone)]
pub struct DecisionService {
    ctx: Arc<EngineContext>,
    fdp: DomainAdapter,
    mdp: DomainAdapter,
    cdp: DomainAdapter,
    synth: Option<AutoSynthesizer>,
}

impl DecisionService {
    /// Without a fact source, no auto decisions are synthesized.
    pub fn new(
        store: Arc<dyn RowStore>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        facts: Option<Arc<dyn FactSource>>,
    ) -> Self {
        let ctx = EngineContext::new(store, config, clock);
        DecisionService {
            fdp: DomainAdapter::fdp(ctx.clone()),
            mdp: DomainAdapter::mdp(ctx.clone()),
            cdp: DomainAdapter::cdp(ctx.clone()),
            synth: facts.map(|source| AutoSynthesizer::new(ctx.clone(), source)),
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn audit(&self) -> &AuditLog {
        &self.ctx.audit
    }

    pub fn adapter(&self, domain: Domain) -> Result<&DomainAdapter, EngineError> {
        match domain {
            Domain::Fdp => Ok(&self.fdp),
            Domain::Mdp => Ok(&self.mdp),
            Domain::Cdp => Ok(&self.cdp),
            Domain::ControlTower => Err(EngineError::InvalidRequest(
                "the control tower has no adapter of its own".into(),
            )),
        }
    }

    pub fn adapters(&self) -> [&DomainAdapter; 3] {
        [&self.fdp, &self.mdp, &self.cdp]
    }

    pub fn synthesizer(&self) -> Option<&AutoSynthesizer> {
        self.synth.as_ref()
    }

    pub fn control_tower(&self) -> ControlTower {
        ControlTower::new(self.clone())
    }

    /// The adapter owning persisted decision `id`, by its stored `card_type`.
    async fn owning_adapter(&self, id: &str) -> Result<&DomainAdapter, EngineError> {
        let row = self.ctx.store.get(tables::DECISION_CARDS, id).await?;
        let decision = decision_from_row(&row)?;
        self.adapter(decision.domain)
            .map_err(|_| EngineError::NotFound { id: id.to_string() })
    }
}

#[async_trait]
impl DecisionLifecycle for DecisionService {
    async fn apply(
        &self,
        tenant_id: &str,
        id: &str,
        mutation: Mutation,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        mutation.validate()?;
        if is_auto_id(id) {
            let synth = self
                .synth
                .as_ref()
                .ok_or_else(|| EngineError::NotFound { id: id.to_string() })?;
            return synth.apply(tenant_id, id, mutation, actor).await;
        }
        self.owning_adapter(id)
            .await?
            .apply(tenant_id, id, mutation, actor)
            .await
    }
}
