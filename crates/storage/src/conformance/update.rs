use std::future::Future;

use serde_json::json;

use super::{make_card, patch, version_of, TestResult};
use crate::{tables, RowStore, StorageError};

pub(super) async fn run_update_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "update",
            "update_increments_version",
            update_increments_version(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_merges_patch",
            update_merges_patch(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_cannot_change_id",
            update_cannot_change_id(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_with_correct_version_succeeds",
            update_with_correct_version_succeeds(factory).await,
        ),
        TestResult::from_result(
            "update",
            "stale_version_returns_conflict",
            stale_version_returns_conflict(factory).await,
        ),
        TestResult::from_result(
            "update",
            "conflict_does_not_change_row",
            conflict_does_not_change_row(factory).await,
        ),
        TestResult::from_result(
            "update",
            "unconditional_update_ignores_version",
            unconditional_update_ignores_version(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_missing_returns_not_found",
            update_missing_returns_not_found(factory).await,
        ),
    ]
}

async fn seeded<S, F, Fut>(factory: &F) -> Result<S, String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert(tables::DECISION_CARDS, make_card("c1", "t1", "FDP_SKU_STOP", "OPEN"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    Ok(store)
}

async fn update_increments_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = seeded(factory).await?;
    for expected in 1..=3 {
        let row = store
            .update(tables::DECISION_CARDS, "c1", patch("status", json!("IN_PROGRESS")), None)
            .await
            .map_err(|e| format!("update {expected}: {e}"))?;
        let v = version_of(&row)?;
        if v != expected {
            return Err(format!("expected version {expected}, got {v}"));
        }
    }
    Ok(())
}

async fn update_merges_patch<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = seeded(factory).await?;
    store
        .update(tables::DECISION_CARDS, "c1", patch("status", json!("DECIDED")), Some(0))
        .await
        .map_err(|e| format!("update: {e}"))?;
    let row = store
        .get(tables::DECISION_CARDS, "c1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if row.get("status") != Some(&json!("DECIDED")) {
        return Err(format!("patch not applied: {row:?}"));
    }
    if row.get("card_type") != Some(&json!("FDP_SKU_STOP")) {
        return Err(format!("untouched column lost: {row:?}"));
    }
    Ok(())
}

async fn update_cannot_change_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = seeded(factory).await?;
    store
        .update(tables::DECISION_CARDS, "c1", patch("id", json!("c2")), None)
        .await
        .map_err(|e| format!("update: {e}"))?;
    store
        .get(tables::DECISION_CARDS, "c1")
        .await
        .map(|_| ())
        .map_err(|e| format!("row moved: {e}"))
}

async fn update_with_correct_version_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = seeded(factory).await?;
    let row = store
        .update(tables::DECISION_CARDS, "c1", patch("status", json!("SNOOZED")), Some(0))
        .await
        .map_err(|e| format!("first: {e}"))?;
    store
        .update(
            tables::DECISION_CARDS,
            "c1",
            patch("status", json!("OPEN")),
            Some(version_of(&row)?),
        )
        .await
        .map(|_| ())
        .map_err(|e| format!("second: {e}"))
}

async fn stale_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = seeded(factory).await?;
    store
        .update(tables::DECISION_CARDS, "c1", patch("status", json!("DECIDED")), Some(0))
        .await
        .map_err(|e| format!("winner: {e}"))?;
    match store
        .update(tables::DECISION_CARDS, "c1", patch("status", json!("DISMISSED")), Some(0))
        .await
    {
        Err(StorageError::ConcurrentConflict {
            id,
            expected_version,
            actual_version,
            ..
        }) => {
            if id != "c1" || expected_version != 0 || actual_version != 1 {
                return Err(format!(
                    "wrong conflict fields: {id} expected={expected_version} actual={actual_version}"
                ));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(_) => Err("expected ConcurrentConflict, got Ok".into()),
    }
}

async fn conflict_does_not_change_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = seeded(factory).await?;
    let _ = store
        .update(tables::DECISION_CARDS, "c1", patch("status", json!("DISMISSED")), Some(7))
        .await;
    let row = store
        .get(tables::DECISION_CARDS, "c1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if row.get("status") != Some(&json!("OPEN")) || version_of(&row)? != 0 {
        return Err(format!("conflicting write leaked: {row:?}"));
    }
    Ok(())
}

async fn unconditional_update_ignores_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = seeded(factory).await?;
    for _ in 0..2 {
        store
            .update(tables::DECISION_CARDS, "c1", patch("status", json!("DECIDED")), None)
            .await
            .map_err(|e| format!("update: {e}"))?;
    }
    Ok(())
}

async fn update_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store
        .update(tables::DECISION_CARDS, "ghost", patch("status", json!("DECIDED")), None)
        .await
    {
        Err(StorageError::RowNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected RowNotFound, got {e}")),
        Ok(_) => Err("expected RowNotFound, got Ok".into()),
    }
}
