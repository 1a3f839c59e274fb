use std::future::Future;

use serde_json::json;

use super::{make_audit_entry, patch, TestResult};
use crate::{tables, Order, Query, RowStore, StorageError};

pub(super) async fn run_append_only_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "append_only",
            "audit_update_is_rejected",
            audit_update_is_rejected(factory).await,
        ),
        TestResult::from_result(
            "append_only",
            "rejected_update_leaves_entry_intact",
            rejected_update_leaves_entry_intact(factory).await,
        ),
        TestResult::from_result(
            "append_only",
            "repeated_appends_all_kept_in_order",
            repeated_appends_all_kept_in_order(factory).await,
        ),
    ]
}

async fn audit_update_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert(
            tables::AUDIT_LOG,
            make_audit_entry("a1", "t1", "DECIDED", "2025-03-01T09:00:00Z"),
        )
        .await
        .map_err(|e| format!("insert: {e}"))?;
    match store
        .update(tables::AUDIT_LOG, "a1", patch("comment", json!("edited")), None)
        .await
    {
        Err(StorageError::AppendOnly { table }) if table == tables::AUDIT_LOG => Ok(()),
        Err(e) => Err(format!("expected AppendOnly, got {e}")),
        Ok(_) => Err("audit entry was updated".into()),
    }
}

async fn rejected_update_leaves_entry_intact<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert(
            tables::AUDIT_LOG,
            make_audit_entry("a1", "t1", "DECIDED", "2025-03-01T09:00:00Z"),
        )
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let _ = store
        .update(tables::AUDIT_LOG, "a1", patch("decision_status", json!("DISMISSED")), None)
        .await;
    let row = store
        .get(tables::AUDIT_LOG, "a1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if row.get("decision_status") != Some(&json!("DECIDED")) {
        return Err(format!("entry mutated: {row:?}"));
    }
    Ok(())
}

async fn repeated_appends_all_kept_in_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for (id, at) in [
        ("a1", "2025-03-01T09:00:00Z"),
        ("a2", "2025-03-01T10:00:00Z"),
        ("a3", "2025-03-01T11:00:00Z"),
    ] {
        store
            .insert(tables::AUDIT_LOG, make_audit_entry(id, "t1", "DECIDED", at))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let rows = store
        .select(
            tables::AUDIT_LOG,
            &Query::new()
                .eq("card_identifier", "card-1")
                .order_by("decided_at", Order::Desc),
        )
        .await
        .map_err(|e| format!("select: {e}"))?;
    let ids: Vec<_> = rows.iter().filter_map(|r| r.get("id")).collect();
    if ids != [&json!("a3"), &json!("a2"), &json!("a1")] {
        return Err(format!("wrong order: {ids:?}"));
    }
    Ok(())
}
