//! TTL cache for summary views.
//!
//! Entries are invalidated, never updated in place, after a mutation; the
//! next read recomputes. Readers may see counts up to one TTL stale.

use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use towerline_core::{DecisionSummary, Domain};

use crate::clock::Clock;
use crate::config::CacheConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Domain(Domain),
    ControlTower,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: DecisionSummary,
    expires_at: OffsetDateTime,
}

pub struct SummaryCache {
    entries: RwLock<HashMap<(String, CacheScope), Entry>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl SummaryCache {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        SummaryCache {
            entries: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    fn ttl(&self, scope: CacheScope) -> Duration {
        let secs = match scope {
            CacheScope::Domain(_) => self.config.summary_ttl_secs,
            CacheScope::ControlTower => self.config.control_tower_ttl_secs,
        };
        Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    }

    /// A live entry, if any.
    pub async fn get(&self, tenant_id: &str, scope: CacheScope) -> Option<DecisionSummary> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(&(tenant_id.to_string(), scope))
            .filter(|e| e.expires_at > now)
            .map(|e| e.value)
    }

    pub async fn put(&self, tenant_id: &str, scope: CacheScope, value: DecisionSummary) {
        let expires_at = self.clock.now().saturating_add(self.ttl(scope));
        self.entries
            .write()
            .await
            .insert((tenant_id.to_string(), scope), Entry { value, expires_at });
    }

    pub async fn invalidate(&self, tenant_id: &str, scope: CacheScope) {
        let removed = self
            .entries
            .write()
            .await
            .remove(&(tenant_id.to_string(), scope))
            .is_some();
        tracing::debug!(tenant_id, ?scope, removed, "summary cache invalidated");
    }

    pub async fn invalidate_tenant(&self, tenant_id: &str) {
        self.entries
            .write()
            .await
            .retain(|(tenant, _), _| tenant != tenant_id);
    }
}
