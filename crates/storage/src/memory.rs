//! In-process `RowStore` backed by `HashMap`s behind a `tokio` lock.
//!
//! Used by the CLI `serve` command and by tests. Aggregations are computed
//! by scanning; there are no indexes.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{tables, AuditStats, DecisionCounts, Row};
use crate::traits::{Filter, Order, Query, RowStore};

#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    append_only: HashSet<String>,
    unavailable: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store with the audit log marked append-only.
    pub fn new() -> Self {
        InMemoryStore {
            tables: RwLock::new(HashMap::new()),
            append_only: HashSet::from([tables::AUDIT_LOG.to_string()]),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_append_only(mut self, table: &str) -> Self {
        self.append_only.insert(table.to_string());
        self
    }

    /// Make every subsequent call fail with `StorageError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Load rows verbatim, bypassing id and version checks. Seeds test
    /// fixtures and producer output that never went through `insert`.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut guard = self.tables.write().await;
        guard.entry(table.to_string()).or_default().extend(rows);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            tracing::warn!("in-memory store marked unavailable, failing call");
            return Err(StorageError::Unavailable("in-memory store offline".into()));
        }
        Ok(())
    }
}

// ── Value helpers ────────────────────────────────────────────────────────────

fn str_col<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

fn decimal_col(row: &Row, column: &str) -> Option<Decimal> {
    match row.get(column)? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        _ => None,
    }
}

fn time_col(row: &Row, column: &str) -> Option<OffsetDateTime> {
    str_col(row, column).and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
}

fn version_of(row: &Row) -> i64 {
    row.get("version").and_then(Value::as_i64).unwrap_or(0)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                OffsetDateTime::parse(x, &Rfc3339),
                OffsetDateTime::parse(y, &Rfc3339),
            ) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => row.get(column) == Some(value),
        Filter::Prefix(column, prefix) => {
            str_col(row, column).is_some_and(|s| s.starts_with(prefix.as_str()))
        }
        Filter::In(column, values) => row.get(column).is_some_and(|v| values.contains(v)),
    }
}

fn status_is(row: &Row, column: &str, status: &str) -> bool {
    str_col(row, column).is_some_and(|s| s.trim().eq_ignore_ascii_case(status))
}

// ── RowStore impl ────────────────────────────────────────────────────────────

#[async_trait]
impl RowStore for InMemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StorageError> {
        self.check_available()?;
        let guard = self.tables.read().await;
        let mut rows: Vec<Row> = guard
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| query.filters.iter().all(|f| matches(r, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some((column, order)) = &query.order_by {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(column), b.get(column));
                match order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, StorageError> {
        self.check_available()?;
        let id = str_col(&row, "id")
            .map(str::to_string)
            .ok_or_else(|| StorageError::InvalidRow {
                table: table.to_string(),
                message: "missing string column 'id'".into(),
            })?;
        let mut guard = self.tables.write().await;
        let rows = guard.entry(table.to_string()).or_default();
        if rows.iter().any(|r| str_col(r, "id") == Some(id.as_str())) {
            return Err(StorageError::AlreadyExists {
                table: table.to_string(),
                id,
            });
        }
        row.insert("version".into(), Value::from(0i64));
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: Row,
        expected_version: Option<i64>,
    ) -> Result<Row, StorageError> {
        self.check_available()?;
        if self.append_only.contains(table) {
            return Err(StorageError::AppendOnly {
                table: table.to_string(),
            });
        }
        let mut guard = self.tables.write().await;
        let row = guard
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| str_col(r, "id") == Some(id)))
            .ok_or_else(|| StorageError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        let actual = version_of(row);
        if let Some(expected) = expected_version {
            if expected != actual {
                tracing::debug!(table, id, expected, actual, "version check failed");
                return Err(StorageError::ConcurrentConflict {
                    table: table.to_string(),
                    id: id.to_string(),
                    expected_version: expected,
                    actual_version: actual,
                });
            }
        }
        for (column, value) in patch {
            if column == "id" || column == "version" {
                continue;
            }
            row.insert(column, value);
        }
        row.insert("version".into(), Value::from(actual + 1));
        Ok(row.clone())
    }

    async fn aggregate_decision_counts(
        &self,
        tenant_id: &str,
        card_type_prefix: &str,
        now: OffsetDateTime,
    ) -> Result<DecisionCounts, StorageError> {
        self.check_available()?;
        let guard = self.tables.read().await;
        let mut counts = DecisionCounts::default();
        let rows = guard.get(tables::DECISION_CARDS).into_iter().flatten();
        for row in rows.filter(|r| {
            str_col(r, "tenant_id") == Some(tenant_id)
                && str_col(r, "card_type").is_some_and(|t| t.starts_with(card_type_prefix))
        }) {
            counts.total += 1;
            let open = status_is(row, "status", "OPEN");
            if open {
                counts.open += 1;
                if time_col(row, "deadline_at").is_some_and(|d| d < now) {
                    counts.overdue += 1;
                }
            }
            if status_is(row, "status", "IN_PROGRESS") {
                counts.in_progress += 1;
            }
            if status_is(row, "status", "SNOOZED") {
                counts.snoozed += 1;
            }
            if status_is(row, "status", "ESCALATED") {
                counts.escalated += 1;
            }
            let decided = status_is(row, "status", "DECIDED");
            let dismissed = status_is(row, "status", "DISMISSED");
            if decided {
                counts.decided += 1;
            }
            if dismissed {
                counts.dismissed += 1;
            }
            let critical =
                status_is(row, "severity", "critical") || status_is(row, "severity", "p0");
            if critical && !decided && !dismissed {
                counts.critical += 1;
            }
        }
        Ok(counts)
    }

    async fn aggregate_audit_stats(
        &self,
        tenant_id: &str,
        now: OffsetDateTime,
    ) -> Result<AuditStats, StorageError> {
        self.check_available()?;
        let guard = self.tables.read().await;
        let mut stats = AuditStats::default();
        let rows = guard.get(tables::AUDIT_LOG).into_iter().flatten();
        for row in rows.filter(|r| str_col(r, "tenant_id") == Some(tenant_id)) {
            stats.total += 1;
            match str_col(row, "card_source") {
                Some("ephemeral") => stats.by_origin.ephemeral += 1,
                _ => stats.by_origin.persisted += 1,
            }
            if status_is(row, "decision_status", "DECIDED") {
                stats.decided += 1;
                if let Some(impact) = decimal_col(row, "impact_amount") {
                    stats.total_impact = stats.total_impact.saturating_add(impact.abs());
                }
            }
            if status_is(row, "decision_status", "DISMISSED") {
                stats.dismissed += 1;
            }
            if status_is(row, "decision_status", "SNOOZED") {
                stats.snoozed += 1;
            }
            if let Some(at) = time_col(row, "decided_at") {
                if now - at <= Duration::days(7) {
                    stats.last_7_days += 1;
                }
                if now - at <= Duration::days(30) {
                    stats.last_30_days += 1;
                }
            }
        }
        Ok(stats)
    }
}
