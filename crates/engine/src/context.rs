use std::sync::Arc;

use time::OffsetDateTime;

use towerline_core::Domain;
use towerline_storage::RowStore;

use crate::audit::AuditLog;
use crate::cache::{CacheScope, SummaryCache};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::mutation::ApplyContext;

/// Collaborators shared by every adapter and view.
pub struct EngineContext {
    pub store: Arc<dyn RowStore>,
    pub config: EngineConfig,
    pub clock: Arc<dyn Clock>,
    pub cache: SummaryCache,
    pub audit: AuditLog,
}

impl EngineContext {
    pub fn new(
        store: Arc<dyn RowStore>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(EngineContext {
            cache: SummaryCache::new(config.cache, clock.clone()),
            audit: AuditLog::new(store.clone()),
            store,
            config,
            clock,
        })
    }

    pub fn apply_context<'a>(
        &'a self,
        actor: Option<&'a str>,
        now: OffsetDateTime,
    ) -> ApplyContext<'a> {
        ApplyContext {
            actor,
            now,
            mode: self.config.transitions,
            escalated_to: &self.config.escalation.escalated_to,
        }
    }

    /// Drop cached views a write to `domains` may have made stale.
    pub async fn invalidate(&self, tenant_id: &str, domains: &[Domain]) {
        for domain in domains {
            self.cache
                .invalidate(tenant_id, CacheScope::Domain(*domain))
                .await;
        }
        self.cache.invalidate(tenant_id, CacheScope::ControlTower).await;
    }
}
