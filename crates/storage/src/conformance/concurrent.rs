use std::future::Future;
use std::sync::Arc;

use serde_json::json;

use super::{make_card, patch, version_of, TestResult};
use crate::{tables, RowStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "conditional_updates_exactly_one_wins",
            conditional_updates_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_appends_all_land",
            concurrent_appends_all_land(factory).await,
        ),
    ]
}

// ── Conditional update: exactly one wins ────────────────────────────────────

/// N tasks race to update the same card from version 0. Exactly one must
/// succeed; the rest must get ConcurrentConflict.
async fn conditional_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .insert(tables::DECISION_CARDS, make_card("c1", "t1", "FDP_SKU_STOP", "OPEN"))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.update(
                tables::DECISION_CARDS,
                "c1",
                patch("decided_by", json!(format!("actor-{i}"))),
                Some(0),
            )
            .await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for h in handles {
        match h.await.map_err(|e| format!("join: {e}"))? {
            Ok(_) => wins += 1,
            Err(StorageError::ConcurrentConflict { .. }) => conflicts += 1,
            Err(e) => return Err(format!("unexpected error: {e}")),
        }
    }
    if wins != 1 || conflicts != N - 1 {
        return Err(format!("expected 1 win / {} conflicts, got {wins}/{conflicts}", N - 1));
    }
    let row = store
        .get(tables::DECISION_CARDS, "c1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    match version_of(&row)? {
        1 => Ok(()),
        v => Err(format!("expected final version 1, got {v}")),
    }
}

async fn concurrent_appends_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.insert(
                tables::AUDIT_LOG,
                super::make_audit_entry(&format!("a{i}"), "t1", "DECIDED", "2025-03-01T09:00:00Z"),
            )
            .await
        }));
    }
    for h in handles {
        h.await
            .map_err(|e| format!("join: {e}"))?
            .map_err(|e| format!("append: {e}"))?;
    }
    let stats = store
        .aggregate_audit_stats("t1", time::macros::datetime!(2025-03-02 00:00 UTC))
        .await
        .map_err(|e| format!("stats: {e}"))?;
    if stats.total != N as u64 {
        return Err(format!("expected {N} entries, got {}", stats.total));
    }
    Ok(())
}
