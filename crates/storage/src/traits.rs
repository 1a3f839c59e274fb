use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{AuditStats, DecisionCounts, Row};

/// A single column predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, Value),
    /// `column LIKE 'prefix%'` on string columns.
    Prefix(String, String),
    /// `column IN (values)`
    In(String, Vec<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Conjunctive row query with optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Order)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn prefix(mut self, column: &str, prefix: &str) -> Self {
        self.filters
            .push(Filter::Prefix(column.to_string(), prefix.to_string()));
        self
    }

    pub fn any_of(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order_by = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// The storage boundary for the decision engine.
///
/// A `RowStore` holds loosely-shaped rows in named tables. Every row has a
/// string `id` column and an integer `version` column maintained by the
/// store.
///
/// ## OCC Conflict Detection
///
/// `update` with `Some(expected_version)` performs
/// `UPDATE ... WHERE id = $id AND version = $expected`. If the stored
/// version differs, the method returns
/// `Err(StorageError::ConcurrentConflict { .. })` and the row is untouched.
/// `None` skips the check (last-write-wins).
///
/// ## Append-only tables
///
/// `update` on an append-only table (the audit log) must return
/// `Err(StorageError::AppendOnly { .. })`. No delete exists on this trait.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait RowStore: Send + Sync + 'static {
    /// Rows matching every filter in `query`.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StorageError>;

    /// Insert a new row. The store sets `version` to 0 and returns the
    /// stored row.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken and
    /// `Err(StorageError::InvalidRow)` if `id` is missing or not a string.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, StorageError>;

    /// Merge `patch` into the row with the given id and bump its version.
    /// Returns the row as stored after the update.
    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: Row,
        expected_version: Option<i64>,
    ) -> Result<Row, StorageError>;

    /// Status counts over `decision_cards` rows for one tenant whose
    /// `card_type` starts with `card_type_prefix`.
    async fn aggregate_decision_counts(
        &self,
        tenant_id: &str,
        card_type_prefix: &str,
        now: OffsetDateTime,
    ) -> Result<DecisionCounts, StorageError>;

    /// Statistics over the tenant's audit log.
    async fn aggregate_audit_stats(
        &self,
        tenant_id: &str,
        now: OffsetDateTime,
    ) -> Result<AuditStats, StorageError>;

    /// Fetch a single row by id.
    async fn get(&self, table: &str, id: &str) -> Result<Row, StorageError> {
        let rows = self.select(table, &Query::new().eq("id", id).limit(1)).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }
}
