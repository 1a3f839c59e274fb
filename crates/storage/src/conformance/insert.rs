use std::future::Future;

use serde_json::json;

use super::{make_card, object, version_of, TestResult};
use crate::{tables, Query, RowStore, StorageError};

pub(super) async fn run_insert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "insert",
            "insert_sets_version_zero",
            insert_sets_version_zero(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "insert_overrides_caller_version",
            insert_overrides_caller_version(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "inserted_row_is_selectable",
            inserted_row_is_selectable(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "duplicate_id_returns_already_exists",
            duplicate_id_returns_already_exists(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "missing_id_returns_invalid_row",
            missing_id_returns_invalid_row(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "get_missing_returns_not_found",
            get_missing_returns_not_found(factory).await,
        ),
    ]
}

async fn insert_sets_version_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let stored = store
        .insert(tables::DECISION_CARDS, make_card("c1", "t1", "FDP_SKU_STOP", "OPEN"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    match version_of(&stored)? {
        0 => Ok(()),
        v => Err(format!("expected version 0, got {v}")),
    }
}

async fn insert_overrides_caller_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let mut row = make_card("c1", "t1", "FDP_SKU_STOP", "OPEN");
    row.insert("version".into(), json!(41));
    store
        .insert(tables::DECISION_CARDS, row)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let back = store
        .get(tables::DECISION_CARDS, "c1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    match version_of(&back)? {
        0 => Ok(()),
        v => Err(format!("expected version 0, got {v}")),
    }
}

async fn inserted_row_is_selectable<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let rows = store
        .select(tables::DECISION_CARDS, &Query::new().eq("tenant_id", "t1"))
        .await
        .map_err(|e| format!("select: {e}"))?;
    if rows.len() != 1 {
        return Err(format!("expected 1 row, got {}", rows.len()));
    }
    if rows[0].get("card_type") != Some(&json!("FDP_SKU_STOP")) {
        return Err(format!("columns not preserved: {:?}", rows[0]));
    }
    Ok(())
}

async fn duplicate_id_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert(tables::DECISION_CARDS, make_card("c1", "t1", "FDP_SKU_STOP", "OPEN"))
        .await
        .map_err(|e| format!("first insert: {e}"))?;
    match store
        .insert(tables::DECISION_CARDS, make_card("c1", "t1", "FDP_SKU_STOP", "OPEN"))
        .await
    {
        Err(StorageError::AlreadyExists { table, id }) => {
            if table != tables::DECISION_CARDS || id != "c1" {
                return Err(format!("wrong fields: {table}/{id}"));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(_) => Err("expected AlreadyExists, got Ok".into()),
    }
}

async fn missing_id_returns_invalid_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store
        .insert(tables::DECISION_CARDS, object(json!({"tenant_id": "t1"})))
        .await
    {
        Err(StorageError::InvalidRow { .. }) => Ok(()),
        Err(e) => Err(format!("expected InvalidRow, got {e}")),
        Ok(_) => Err("expected InvalidRow, got Ok".into()),
    }
}

async fn get_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get(tables::DECISION_CARDS, "nope").await {
        Err(StorageError::RowNotFound { id, .. }) if id == "nope" => Ok(()),
        Err(e) => Err(format!("expected RowNotFound, got {e}")),
        Ok(_) => Err("expected RowNotFound, got Ok".into()),
    }
}
