//! Append-only audit log over the `decision_audit_log` table.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use towerline_core::{AuditLogEntry, Grain};
use towerline_storage::{tables, AuditStats, Order, Query, RowStore};

use crate::error::EngineError;

#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn RowStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        AuditLog { store }
    }

    /// Append one entry. Prior entries are never touched.
    pub async fn record(&self, entry: &AuditLogEntry) -> Result<(), EngineError> {
        let row = match serde_json::to_value(entry)? {
            Value::Object(map) => map,
            _ => {
                return Err(EngineError::MalformedRow {
                    id: entry.id.clone(),
                    message: "audit entry is not an object".into(),
                })
            }
        };
        self.store.insert(tables::AUDIT_LOG, row).await?;
        tracing::debug!(
            tenant_id = %entry.tenant_id,
            card = %entry.card_identifier,
            action = %entry.action_type,
            "audit entry appended"
        );
        Ok(())
    }

    /// Entries for one entity, newest first.
    pub async fn query_by_entity(
        &self,
        tenant_id: &str,
        entity_type: Grain,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, EngineError> {
        let query = Query::new()
            .eq("tenant_id", tenant_id)
            .eq("entity_type", entity_type.as_str())
            .eq("entity_id", entity_id)
            .order_by("decided_at", Order::Desc);
        self.fetch(query).await
    }

    /// Entries for one decision id, newest first.
    pub async fn query_by_card(
        &self,
        tenant_id: &str,
        card_identifier: &str,
    ) -> Result<Vec<AuditLogEntry>, EngineError> {
        let query = Query::new()
            .eq("tenant_id", tenant_id)
            .eq("card_identifier", card_identifier)
            .order_by("decided_at", Order::Desc);
        self.fetch(query).await
    }

    /// Computed by the store, not by pulling rows.
    pub async fn aggregate_stats(
        &self,
        tenant_id: &str,
        now: OffsetDateTime,
    ) -> Result<AuditStats, EngineError> {
        Ok(self.store.aggregate_audit_stats(tenant_id, now).await?)
    }

    async fn fetch(&self, query: Query) -> Result<Vec<AuditLogEntry>, EngineError> {
        let rows = self.store.select(tables::AUDIT_LOG, &query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id").cloned();
                match serde_json::from_value::<AuditLogEntry>(Value::Object(row)) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!(id = ?id, error = %e, "skipping unreadable audit row");
                        None
                    }
                }
            })
            .collect())
    }
}
