use std::future::Future;

use time::macros::datetime;
use time::OffsetDateTime;

use super::{make_audit_entry, make_card, TestResult};
use crate::{tables, RowStore};

const NOW: OffsetDateTime = datetime!(2025-03-03 09:00 UTC);

pub(super) async fn run_aggregate_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "aggregate",
            "counts_scoped_by_tenant_and_prefix",
            counts_scoped_by_tenant_and_prefix(factory).await,
        ),
        TestResult::from_result(
            "aggregate",
            "counts_overdue_open_only",
            counts_overdue_open_only(factory).await,
        ),
        TestResult::from_result(
            "aggregate",
            "audit_stats_scoped_by_tenant",
            audit_stats_scoped_by_tenant(factory).await,
        ),
        TestResult::from_result(
            "aggregate",
            "empty_tenant_is_zero",
            empty_tenant_is_zero(factory).await,
        ),
    ]
}

async fn counts_scoped_by_tenant_and_prefix<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for row in [
        make_card("c1", "t1", "FDP_SKU_STOP", "OPEN"),
        make_card("c2", "t1", "FDP_CASH_SURVIVAL", "DECIDED"),
        make_card("c3", "t1", "MDP_CAMPAIGN_BURN", "OPEN"),
        make_card("c4", "t2", "FDP_SKU_STOP", "OPEN"),
    ] {
        store
            .insert(tables::DECISION_CARDS, row)
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }
    let c = store
        .aggregate_decision_counts("t1", "FDP_", NOW)
        .await
        .map_err(|e| format!("aggregate: {e}"))?;
    if c.total != 2 || c.open != 1 || c.decided != 1 {
        return Err(format!("wrong counts: {c:?}"));
    }
    Ok(())
}

async fn counts_overdue_open_only<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    // make_card deadlines are 2025-03-02, a day before NOW.
    for row in [
        make_card("c1", "t1", "FDP_SKU_STOP", "OPEN"),
        make_card("c2", "t1", "FDP_SKU_STOP", "IN_PROGRESS"),
    ] {
        store
            .insert(tables::DECISION_CARDS, row)
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }
    let c = store
        .aggregate_decision_counts("t1", "FDP_", NOW)
        .await
        .map_err(|e| format!("aggregate: {e}"))?;
    if c.overdue != 1 || c.in_progress != 1 {
        return Err(format!("wrong counts: {c:?}"));
    }
    Ok(())
}

async fn audit_stats_scoped_by_tenant<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for row in [
        make_audit_entry("a1", "t1", "DECIDED", "2025-03-01T09:00:00Z"),
        make_audit_entry("a2", "t1", "SNOOZED", "2025-01-01T09:00:00Z"),
        make_audit_entry("a3", "t2", "DECIDED", "2025-03-01T09:00:00Z"),
    ] {
        store
            .insert(tables::AUDIT_LOG, row)
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }
    let s = store
        .aggregate_audit_stats("t1", NOW)
        .await
        .map_err(|e| format!("aggregate: {e}"))?;
    if s.total != 2 || s.decided != 1 || s.snoozed != 1 || s.last_7_days != 1 {
        return Err(format!("wrong stats: {s:?}"));
    }
    if s.total_impact != rust_decimal::Decimal::from(1000) {
        return Err(format!("wrong impact: {}", s.total_impact));
    }
    Ok(())
}

async fn empty_tenant_is_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let c = store
        .aggregate_decision_counts("nobody", "FDP_", NOW)
        .await
        .map_err(|e| format!("counts: {e}"))?;
    let s = store
        .aggregate_audit_stats("nobody", NOW)
        .await
        .map_err(|e| format!("stats: {e}"))?;
    if c.total != 0 || s.total != 0 {
        return Err(format!("expected zeros: {c:?} {s:?}"));
    }
    Ok(())
}
