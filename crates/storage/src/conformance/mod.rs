//! Conformance test suite for `RowStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RowStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Insert**: version 0 on insert, duplicate and malformed ids
//! - **Update / OCC**: version increments, conflict detection, conflicts leave the row alone
//! - **Append-only**: the audit log refuses updates
//! - **Aggregates**: tenant and prefix scoping of server-side counts
//! - **Concurrency**: racing conditional updates have exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use towerline_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod aggregate;
mod append_only;
mod concurrent;
mod insert;
mod update;

use std::fmt;
use std::future::Future;

use serde_json::{json, Value};

use crate::record::Row;
use crate::RowStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "insert", "update", "aggregate").
    pub category: String,
    /// Test name (e.g. "insert_sets_version_zero").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation. The factory must mark
/// `decision_audit_log` append-only.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(insert::run_insert_tests(&factory).await);
    results.extend(update::run_update_tests(&factory).await);
    results.extend(append_only::run_append_only_tests(&factory).await);
    results.extend(aggregate::run_aggregate_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: row constructors with sensible defaults ─────────────────────────

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn make_card(id: &str, tenant_id: &str, card_type: &str, status: &str) -> Row {
    object(json!({
        "id": id,
        "tenant_id": tenant_id,
        "card_type": card_type,
        "status": status,
        "severity": "high",
        "deadline_at": "2025-03-02T09:00:00Z",
        "updated_at": "2025-03-01T09:00:00Z",
    }))
}

fn make_audit_entry(id: &str, tenant_id: &str, status: &str, decided_at: &str) -> Row {
    object(json!({
        "id": id,
        "tenant_id": tenant_id,
        "card_identifier": "card-1",
        "card_source": "persisted",
        "action_type": "STOP",
        "decision_status": status,
        "decided_at": decided_at,
        "impact_amount": "-1000",
    }))
}

fn patch(column: &str, value: Value) -> Row {
    let mut row = Row::new();
    row.insert(column.to_string(), value);
    row
}

fn version_of(row: &Row) -> Result<i64, String> {
    row.get("version")
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("row has no integer version: {row:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    #[tokio::test]
    async fn in_memory_store_passes_suite() {
        let report = run_conformance_suite(|| async { InMemoryStore::new() }).await;
        assert_eq!(report.failed, 0, "{report}");
        assert!(report.total > 15);
    }
}
