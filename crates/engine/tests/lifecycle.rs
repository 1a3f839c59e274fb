//! Engine integration tests over the in-memory store.
//!
//! Covers the persisted adapters, the auto-synthesizer side store, the
//! control tower's escalation on read, summary caching and optimistic
//! concurrency.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use towerline_core::{
    CardSource, DecisionStatus, Domain, Grain, ScenarioInput, ScenarioType, TransitionMode,
};
use towerline_engine::synth::{CashRunway, SkuFacts};
use towerline_engine::{
    Clock, DecisionLifecycle, DecisionService, EngineConfig, EngineError, FactSource, FixedClock,
    LiveFacts, Mutation, StaticFactSource,
};
use towerline_storage::{
    tables, AuditStats, DecisionCounts, InMemoryStore, Query, Row, RowStore, StorageError,
};

const NOW: OffsetDateTime = datetime!(2025-03-10 09:00 UTC);
const TENANT: &str = "t1";

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn losing_sku(id: &str) -> SkuFacts {
    SkuFacts {
        sku_id: id.into(),
        name: Some(format!("Product {id}")),
        revenue: dec("10000000"),
        profit: dec("-1200000"),
        margin_percent: dec("-12"),
    }
}

fn healthy_sku(id: &str) -> SkuFacts {
    SkuFacts {
        sku_id: id.into(),
        name: None,
        revenue: dec("10000000"),
        profit: dec("2000000"),
        margin_percent: dec("20"),
    }
}

fn sku_facts(skus: Vec<SkuFacts>) -> LiveFacts {
    LiveFacts {
        skus,
        ..Default::default()
    }
}

/// Facts that can be swapped between reads, or made to fail.
#[derive(Default)]
struct MutableFacts {
    facts: RwLock<LiveFacts>,
    failing: RwLock<bool>,
}

impl MutableFacts {
    fn set(&self, facts: LiveFacts) {
        *self.facts.write().unwrap() = facts;
    }

    fn fail(&self, failing: bool) {
        *self.failing.write().unwrap() = failing;
    }
}

#[async_trait]
impl FactSource for MutableFacts {
    async fn live_facts(&self, _tenant_id: &str) -> Result<LiveFacts, EngineError> {
        if *self.failing.read().unwrap() {
            return Err(EngineError::FactSource("warehouse timeout".into()));
        }
        Ok(self.facts.read().unwrap().clone())
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    clock: Arc<FixedClock>,
    service: DecisionService,
}

fn harness_with(config: EngineConfig, facts: Option<Arc<dyn FactSource>>) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(NOW));
    let service = DecisionService::new(store.clone(), config, clock.clone(), facts);
    Harness {
        store,
        clock,
        service,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default(), None)
}

fn sku_stop_input(id: &str, entity: &str) -> ScenarioInput {
    ScenarioInput {
        id: Some(id.into()),
        tenant_id: TENANT.into(),
        entity_id: entity.into(),
        entity_name: format!("Product {entity}"),
        period: "2025-03".into(),
        value: dec("-12"),
        impact_amount: dec("-1200000"),
        facts: vec![],
        evidence: None,
    }
}

async fn raise_sku_stop(h: &Harness, id: &str, entity: &str) {
    h.service
        .adapter(Domain::Fdp)
        .unwrap()
        .raise(ScenarioType::SkuStop, sku_stop_input(id, entity))
        .await
        .unwrap();
}

// ──────────────────────────────────────────────
// Persisted decisions
// ──────────────────────────────────────────────

#[tokio::test]
async fn raised_decision_is_listed_by_its_domain_only() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;

    let fdp = h.service.adapter(Domain::Fdp).unwrap().list(TENANT).await.unwrap();
    assert_eq!(fdp.len(), 1);
    assert_eq!(fdp[0].card_type(), "FDP_SKU_STOP");
    assert_eq!(fdp[0].status, DecisionStatus::Open);
    assert_eq!(fdp[0].deadline_at, NOW + Duration::hours(24));

    let mdp = h.service.adapter(Domain::Mdp).unwrap().list(TENANT).await.unwrap();
    assert!(mdp.is_empty());
    let other = h.service.adapter(Domain::Fdp).unwrap().list("t2").await.unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn mdp_scenario_cannot_be_raised_by_fdp() {
    let h = harness();
    let err = h
        .service
        .adapter(Domain::Fdp)
        .unwrap()
        .raise(ScenarioType::ChurnSpike, sku_stop_input("d1", "SKU-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Contract(_)), "{err}");
}

#[tokio::test]
async fn duplicate_rows_collapse_to_latest() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    h.clock.advance(Duration::minutes(10));
    raise_sku_stop(&h, "d2", "SKU-1").await;

    let live = h.service.adapter(Domain::Fdp).unwrap().list(TENANT).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, "d2");
}

#[tokio::test]
async fn decide_twice_appends_two_audit_entries() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;

    for _ in 0..2 {
        let d = h
            .service
            .decide(TENANT, "d1", "STOP", Some("losing money"), Some("alice"))
            .await
            .unwrap();
        assert_eq!(d.status, DecisionStatus::Decided);
        assert_eq!(d.decision_outcome.as_deref(), Some("STOP"));
    }

    let entries = h.service.audit().query_by_card(TENANT, "d1").await.unwrap();
    assert_eq!(entries.len(), 2);
    for e in &entries {
        assert_eq!(e.action_type, "STOP");
        assert_eq!(e.action_label.as_deref(), Some("Stop selling immediately"));
        assert_eq!(e.card_source, CardSource::Persisted);
        assert_eq!(e.decided_by.as_deref(), Some("alice"));
        assert_eq!(e.decision_status, DecisionStatus::Decided);
        assert!(e.verify_snapshot());
    }

    let stored = h.store.get(tables::DECISION_CARDS, "d1").await.unwrap();
    assert_eq!(stored["status"], "DECIDED");
    assert_eq!(stored["version"], 2);
}

#[tokio::test]
async fn audit_rows_cannot_be_rewritten() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    h.service.snooze(TENANT, "d1", 24, Some("bob")).await.unwrap();

    let entries = h.service.audit().query_by_card(TENANT, "d1").await.unwrap();
    let mut patch = Row::new();
    patch.insert("action_type".into(), json!("FORGED"));
    let err = h
        .store
        .update(tables::AUDIT_LOG, &entries[0].id, patch, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AppendOnly { .. }));
}

#[tokio::test]
async fn snooze_expires_back_to_open() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    let d = h.service.snooze(TENANT, "d1", 2, None).await.unwrap();
    assert_eq!(d.status, DecisionStatus::Snoozed);
    assert_eq!(d.snoozed_until, Some(NOW + Duration::hours(2)));

    let fdp = h.service.adapter(Domain::Fdp).unwrap();
    assert_eq!(fdp.summary(TENANT).await.unwrap().open, 0);
    h.clock.advance(Duration::hours(3));
    assert_eq!(fdp.summary(TENANT).await.unwrap().open, 1);
}

#[tokio::test]
async fn invalid_mutations_are_rejected_before_any_write() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;

    let err = h.service.snooze(TENANT, "d1", 0, None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
    let err = h
        .service
        .snooze(TENANT, "d1", 10_000_000_000, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
    let err = h
        .service
        .snooze(TENANT, "auto-sku_stop-SKU-1", i64::MAX, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));

    let err = h
        .service
        .reassign(TENANT, "d1", Domain::Fdp, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidReassign {
            from: Domain::Fdp,
            to: Domain::Fdp
        }
    ));

    let err = h
        .service
        .reassign(TENANT, "d1", Domain::ControlTower, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));

    assert!(h
        .service
        .audit()
        .query_by_card(TENANT, "d1")
        .await
        .unwrap()
        .is_empty());
    let stored = h.store.get(tables::DECISION_CARDS, "d1").await.unwrap();
    assert_eq!(stored["status"], "OPEN");
    assert_eq!(stored["version"], 0);
}

#[tokio::test]
async fn entity_history_spans_cards_newest_first() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    raise_sku_stop(&h, "d2", "SKU-1").await;
    raise_sku_stop(&h, "d3", "SKU-2").await;

    h.service.snooze(TENANT, "d1", 1, None).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    h.service.escalate(TENANT, "d2", None, None).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    h.service.decide(TENANT, "d3", "STOP", None, None).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    h.service.decide(TENANT, "d1", "STOP", None, None).await.unwrap();

    let history = h
        .service
        .audit()
        .query_by_entity(TENANT, Grain::Sku, "SKU-1")
        .await
        .unwrap();
    let cards: Vec<&str> = history.iter().map(|e| e.card_identifier.as_str()).collect();
    assert_eq!(cards, ["d1", "d2", "d1"]);
    let actions: Vec<&str> = history.iter().map(|e| e.action_type.as_str()).collect();
    assert_eq!(actions, ["STOP", "ESCALATE", "SNOOZE"]);
    assert!(history
        .windows(2)
        .all(|pair| pair[0].decided_at > pair[1].decided_at));
    assert_eq!(history[0].decided_at, NOW + Duration::minutes(15));

    assert!(h
        .service
        .audit()
        .query_by_entity("t2", Grain::Sku, "SKU-1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn reassign_moves_decision_between_domains() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;

    let d = h
        .service
        .reassign(TENANT, "d1", Domain::Mdp, Some("pricing is a marketing call"), None)
        .await
        .unwrap();
    assert_eq!(d.domain, Domain::Mdp);
    assert_eq!(d.status, DecisionStatus::Open);
    assert_eq!(d.owner_role, Domain::Mdp.default_owner_role());

    let fdp = h.service.adapter(Domain::Fdp).unwrap().list(TENANT).await.unwrap();
    let mdp = h.service.adapter(Domain::Mdp).unwrap().list(TENANT).await.unwrap();
    assert!(fdp.is_empty());
    assert_eq!(mdp.len(), 1);

    // Routed by the stored card type, so the new owner can act on it.
    let d = h.service.assign_owner(TENANT, "d1", "carol", None).await.unwrap();
    assert_eq!(d.status, DecisionStatus::InProgress);
    assert_eq!(d.owner_user_id.as_deref(), Some("carol"));
}

#[tokio::test]
async fn unknown_and_foreign_ids_are_not_found() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;

    let err = h.service.escalate(TENANT, "missing", None, None).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    let err = h.service.escalate("t2", "d1", None, None).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn strict_mode_refuses_to_reopen_terminal_decisions() {
    let config = EngineConfig {
        transitions: TransitionMode::Strict,
        ..Default::default()
    };
    let h = harness_with(config, None);
    raise_sku_stop(&h, "d1", "SKU-1").await;
    h.service
        .dismiss(TENANT, "d1", "not_relevant", None, Some("alice"))
        .await
        .unwrap();

    let err = h.service.snooze(TENANT, "d1", 4, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Transition(_)));

    // A retried dismiss is still accepted.
    h.service
        .dismiss(TENANT, "d1", "not_relevant", None, Some("alice"))
        .await
        .unwrap();
}

#[tokio::test]
async fn permissive_mode_lets_the_last_write_win() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    h.service.decide(TENANT, "d1", "STOP", None, None).await.unwrap();
    let d = h.service.snooze(TENANT, "d1", 4, None).await.unwrap();
    assert_eq!(d.status, DecisionStatus::Snoozed);
}

#[tokio::test]
async fn storage_outage_surfaces_as_error() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    h.store.set_unavailable(true);

    let err = h.service.decide(TENANT, "d1", "STOP", None, None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::Unavailable(_))
    ));
    let err = h
        .service
        .adapter(Domain::Fdp)
        .unwrap()
        .list(TENANT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    h.store.set_unavailable(false);
    let d = h.service.decide(TENANT, "d1", "STOP", None, None).await.unwrap();
    assert_eq!(d.status, DecisionStatus::Decided);
}

#[tokio::test]
async fn malformed_rows_are_skipped() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    let mut bad = Row::new();
    bad.insert("id".into(), json!("broken"));
    bad.insert("tenant_id".into(), json!(TENANT));
    bad.insert("card_type".into(), json!("FDP_SKU_STOP"));
    h.store.seed(tables::DECISION_CARDS, [bad]).await;

    let live = h.service.adapter(Domain::Fdp).unwrap().list(TENANT).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, "d1");
}

// ──────────────────────────────────────────────
// Optimistic concurrency
// ──────────────────────────────────────────────

/// Bumps the target row behind the engine's back right before each update.
struct Interfering {
    inner: InMemoryStore,
}

#[async_trait]
impl RowStore for Interfering {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StorageError> {
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StorageError> {
        self.inner.insert(table, row).await
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: Row,
        expected_version: Option<i64>,
    ) -> Result<Row, StorageError> {
        if table == tables::DECISION_CARDS {
            let mut other = Row::new();
            other.insert("owner_user_id".into(), json!("someone-else"));
            self.inner.update(table, id, other, None).await?;
        }
        self.inner.update(table, id, patch, expected_version).await
    }

    async fn aggregate_decision_counts(
        &self,
        tenant_id: &str,
        card_type_prefix: &str,
        now: OffsetDateTime,
    ) -> Result<DecisionCounts, StorageError> {
        self.inner
            .aggregate_decision_counts(tenant_id, card_type_prefix, now)
            .await
    }

    async fn aggregate_audit_stats(
        &self,
        tenant_id: &str,
        now: OffsetDateTime,
    ) -> Result<AuditStats, StorageError> {
        self.inner.aggregate_audit_stats(tenant_id, now).await
    }
}

fn interfering_service(config: EngineConfig) -> DecisionService {
    let store = Arc::new(Interfering {
        inner: InMemoryStore::new(),
    });
    DecisionService::new(store, config, Arc::new(FixedClock::new(NOW)), None)
}

#[tokio::test]
async fn concurrent_write_is_a_conflict() {
    let service = interfering_service(EngineConfig::default());
    service
        .adapter(Domain::Fdp)
        .unwrap()
        .raise(ScenarioType::SkuStop, sku_stop_input("d1", "SKU-1"))
        .await
        .unwrap();

    let err = service.decide(TENANT, "d1", "STOP", None, None).await.unwrap_err();
    match err {
        EngineError::Conflict {
            id,
            expected,
            actual,
        } => {
            assert_eq!(id, "d1");
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected conflict, got {other}"),
    }
    assert!(service.audit().query_by_card(TENANT, "d1").await.unwrap().is_empty());
}

#[tokio::test]
async fn last_write_wins_mode_skips_the_version_check() {
    let config = EngineConfig::from_toml_str("concurrency = \"last_write_wins\"").unwrap();
    let service = interfering_service(config);
    service
        .adapter(Domain::Fdp)
        .unwrap()
        .raise(ScenarioType::SkuStop, sku_stop_input("d1", "SKU-1"))
        .await
        .unwrap();

    let d = service.decide(TENANT, "d1", "STOP", None, None).await.unwrap();
    assert_eq!(d.status, DecisionStatus::Decided);
    assert_eq!(d.version, 2);
}

// ──────────────────────────────────────────────
// Audit append failures
// ──────────────────────────────────────────────

/// Fails inserts into the audit table while `failing` is set.
#[derive(Default)]
struct AuditOutage {
    inner: InMemoryStore,
    failing: AtomicBool,
}

impl AuditOutage {
    fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RowStore for AuditOutage {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StorageError> {
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StorageError> {
        if table == tables::AUDIT_LOG && self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("audit log offline".into()));
        }
        self.inner.insert(table, row).await
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: Row,
        expected_version: Option<i64>,
    ) -> Result<Row, StorageError> {
        self.inner.update(table, id, patch, expected_version).await
    }

    async fn aggregate_decision_counts(
        &self,
        tenant_id: &str,
        card_type_prefix: &str,
        now: OffsetDateTime,
    ) -> Result<DecisionCounts, StorageError> {
        self.inner
            .aggregate_decision_counts(tenant_id, card_type_prefix, now)
            .await
    }

    async fn aggregate_audit_stats(
        &self,
        tenant_id: &str,
        now: OffsetDateTime,
    ) -> Result<AuditStats, StorageError> {
        self.inner.aggregate_audit_stats(tenant_id, now).await
    }
}

fn outage_service(facts: Option<Arc<dyn FactSource>>) -> (Arc<AuditOutage>, DecisionService) {
    let store = Arc::new(AuditOutage::default());
    let service = DecisionService::new(
        store.clone(),
        EngineConfig::default(),
        Arc::new(FixedClock::new(NOW)),
        facts,
    );
    (store, service)
}

#[tokio::test]
async fn failed_audit_append_rolls_the_decision_back() {
    let (store, service) = outage_service(None);
    let fdp = service.adapter(Domain::Fdp).unwrap();
    fdp.raise(ScenarioType::SkuStop, sku_stop_input("d1", "SKU-1"))
        .await
        .unwrap();
    service.snooze(TENANT, "d1", 4, Some("bob")).await.unwrap();
    assert_eq!(fdp.summary(TENANT).await.unwrap().open, 0);

    store.fail(true);
    let err = service
        .decide(TENANT, "d1", "STOP", None, Some("alice"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::Unavailable(_))
    ));

    let stored = store.get(tables::DECISION_CARDS, "d1").await.unwrap();
    assert_eq!(stored["status"], "SNOOZED");
    assert!(stored["snoozed_until"].is_string());
    assert!(stored["decision_outcome"].is_null());
    assert!(stored["decided_at"].is_null());
    assert_eq!(stored["version"], 3);

    let summary = fdp.summary(TENANT).await.unwrap();
    assert_eq!(summary.decided, 0);
    assert_eq!(summary.open, 0);

    store.fail(false);
    let d = service
        .decide(TENANT, "d1", "STOP", None, Some("alice"))
        .await
        .unwrap();
    assert_eq!(d.status, DecisionStatus::Decided);
    assert_eq!(fdp.summary(TENANT).await.unwrap().decided, 1);
    let entries = service.audit().query_by_card(TENANT, "d1").await.unwrap();
    let actions: Vec<&str> = entries.iter().map(|e| e.action_type.as_str()).collect();
    assert_eq!(actions.len(), 2);
    assert!(actions.contains(&"STOP") && actions.contains(&"SNOOZE"));
}

#[tokio::test]
async fn failed_audit_append_leaves_auto_decision_untouched() {
    let source = StaticFactSource::new().with_tenant(TENANT, sku_facts(vec![losing_sku("SKU-1")]));
    let (store, service) = outage_service(Some(Arc::new(source)));
    let synth = service.synthesizer().unwrap();
    let id = "auto-sku_stop-SKU-1";

    store.fail(true);
    let err = service
        .dismiss(TENANT, id, "seasonal", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    assert_eq!(
        synth.evaluate(TENANT).await.unwrap()[0].decision.status,
        DecisionStatus::Open
    );

    store.fail(false);
    service.snooze(TENANT, id, 4, None).await.unwrap();
    store.fail(true);
    service.decide(TENANT, id, "STOP", None, None).await.unwrap_err();
    assert_eq!(
        synth.evaluate(TENANT).await.unwrap()[0].decision.status,
        DecisionStatus::Snoozed
    );

    store.fail(false);
    let entries = service.audit().query_by_card(TENANT, id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_type, "SNOOZE");
}

// ──────────────────────────────────────────────
// Summaries and caching
// ──────────────────────────────────────────────

#[tokio::test]
async fn mutation_invalidates_cached_summary() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    let fdp = h.service.adapter(Domain::Fdp).unwrap();

    let before = fdp.summary(TENANT).await.unwrap();
    assert_eq!((before.open, before.decided, before.critical), (1, 0, 1));

    h.service.decide(TENANT, "d1", "STOP", None, None).await.unwrap();
    let after = fdp.summary(TENANT).await.unwrap();
    assert_eq!((after.open, after.decided, after.critical), (0, 1, 0));
}

#[tokio::test]
async fn out_of_band_rows_show_up_after_ttl() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    let fdp = h.service.adapter(Domain::Fdp).unwrap();
    assert_eq!(fdp.summary(TENANT).await.unwrap().total, 1);

    let mut row = h.store.get(tables::DECISION_CARDS, "d1").await.unwrap();
    row.insert("id".into(), json!("d2"));
    row.insert("entity_id".into(), json!("SKU-2"));
    h.store.seed(tables::DECISION_CARDS, [row]).await;

    assert_eq!(fdp.summary(TENANT).await.unwrap().total, 1);
    h.clock.advance(Duration::seconds(31));
    assert_eq!(fdp.summary(TENANT).await.unwrap().total, 2);
}

#[tokio::test]
async fn background_refresh_fills_the_cache() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    let fdp = h.service.adapter(Domain::Fdp).unwrap();

    let summary = fdp.refresh_summary(TENANT).wait().await.unwrap();
    assert_eq!(summary.total, 1);
    let cache = &h.service.context().cache;
    assert_eq!(
        cache
            .get(TENANT, towerline_engine::CacheScope::Domain(Domain::Fdp))
            .await,
        Some(summary)
    );
}

// ──────────────────────────────────────────────
// Auto-synthesized decisions
// ──────────────────────────────────────────────

#[tokio::test]
async fn auto_decisions_have_stable_ids() {
    let source = StaticFactSource::new().with_tenant(TENANT, sku_facts(vec![losing_sku("SKU-1")]));
    let h = harness_with(EngineConfig::default(), Some(Arc::new(source)));
    let synth = h.service.synthesizer().unwrap();

    let first = synth.evaluate(TENANT).await.unwrap();
    h.clock.advance(Duration::hours(1));
    let second = synth.evaluate(TENANT).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].decision.id, "auto-sku_stop-SKU-1");
    assert_eq!(first[0].decision.id, second[0].decision.id);
    assert_eq!(first[0].decision.status, DecisionStatus::Open);
}

#[tokio::test]
async fn cash_runway_below_critical_is_p1() {
    let source = StaticFactSource::new().with_tenant(
        TENANT,
        LiveFacts {
            cash_runway: Some(CashRunway {
                runway_months: dec("0.8"),
                cash_balance: Some(dec("800000000")),
                monthly_burn: Some(dec("1000000000")),
            }),
            ..Default::default()
        },
    );
    let h = harness_with(EngineConfig::default(), Some(Arc::new(source)));
    let out = h.service.synthesizer().unwrap().evaluate(TENANT).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].decision.id, "auto-cash_survival-t1");
    assert_eq!(out[0].impact_window_days, Some(24));
}

#[tokio::test]
async fn dismissal_survives_resynthesis_and_clears_with_the_condition() {
    let facts = Arc::new(MutableFacts::default());
    facts.set(sku_facts(vec![losing_sku("SKU-1")]));
    let h = harness_with(EngineConfig::default(), Some(facts.clone()));
    let synth = h.service.synthesizer().unwrap();

    let d = h
        .service
        .dismiss(TENANT, "auto-sku_stop-SKU-1", "seasonal", None, Some("alice"))
        .await
        .unwrap();
    assert_eq!(d.status, DecisionStatus::Dismissed);

    h.clock.advance(Duration::hours(1));
    let again = synth.evaluate(TENANT).await.unwrap();
    assert_eq!(again[0].decision.status, DecisionStatus::Dismissed);

    let entries = h
        .service
        .audit()
        .query_by_card(TENANT, "auto-sku_stop-SKU-1")
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].card_source, CardSource::Ephemeral);
    assert_eq!(entries[0].dismiss_reason.as_deref(), Some("seasonal"));

    // The condition goes away: the state is marked cleared.
    facts.set(sku_facts(vec![healthy_sku("SKU-1")]));
    assert!(synth.evaluate(TENANT).await.unwrap().is_empty());
    let state = h
        .store
        .get(tables::AUTO_CARD_STATES, "t1:auto-sku_stop-SKU-1")
        .await
        .unwrap();
    assert!(state["cleared_at"].is_string());

    // It comes back: a fresh, open decision.
    facts.set(sku_facts(vec![losing_sku("SKU-1")]));
    let recurred = synth.evaluate(TENANT).await.unwrap();
    assert_eq!(recurred.len(), 1);
    assert_eq!(recurred[0].decision.status, DecisionStatus::Open);
}

#[tokio::test]
async fn fact_source_failure_does_not_clear_state() {
    let facts = Arc::new(MutableFacts::default());
    facts.set(sku_facts(vec![losing_sku("SKU-1")]));
    let h = harness_with(EngineConfig::default(), Some(facts.clone()));
    let synth = h.service.synthesizer().unwrap();
    h.service
        .decide(TENANT, "auto-sku_stop-SKU-1", "STOP", None, None)
        .await
        .unwrap();

    facts.fail(true);
    assert!(synth.evaluate(TENANT).await.unwrap().is_empty());
    facts.fail(false);

    let out = synth.evaluate(TENANT).await.unwrap();
    assert_eq!(out[0].decision.status, DecisionStatus::Decided);
}

#[tokio::test]
async fn auto_snooze_wakes_up() {
    let source = StaticFactSource::new().with_tenant(TENANT, sku_facts(vec![losing_sku("SKU-1")]));
    let h = harness_with(EngineConfig::default(), Some(Arc::new(source)));
    let synth = h.service.synthesizer().unwrap();

    h.service
        .snooze(TENANT, "auto-sku_stop-SKU-1", 4, None)
        .await
        .unwrap();
    assert_eq!(
        synth.evaluate(TENANT).await.unwrap()[0].decision.status,
        DecisionStatus::Snoozed
    );
    h.clock.advance(Duration::hours(5));
    assert_eq!(
        synth.evaluate(TENANT).await.unwrap()[0].decision.status,
        DecisionStatus::Open
    );
}

#[tokio::test]
async fn auto_ids_without_a_synthesizer_are_not_found() {
    let h = harness();
    let err = h
        .service
        .decide(TENANT, "auto-sku_stop-SKU-1", "STOP", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

// ──────────────────────────────────────────────
// Control tower
// ──────────────────────────────────────────────

#[tokio::test]
async fn overdue_critical_is_escalated_on_read() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    let tower = h.service.control_tower();

    let fresh = tower.list(TENANT).await.unwrap();
    assert_eq!(fresh[0].status, DecisionStatus::Open);

    // Deadline is 24h out; escalation fires 4h after it.
    h.clock.advance(Duration::hours(28));
    let listed = tower.list(TENANT).await.unwrap();
    assert_eq!(listed[0].status, DecisionStatus::Escalated);
    assert_eq!(listed[0].escalated_to.as_deref(), Some("CONTROL_TOWER"));

    let entries = h.service.audit().query_by_card(TENANT, "d1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_type, "ESCALATE");
    assert_eq!(
        entries[0].decided_by.as_deref(),
        Some(h.service.config().system_actor.as_str())
    );
    assert_eq!(entries[0].comment.as_deref(), Some("policy: overdue"));

    // Already escalated: no second entry.
    tower.list(TENANT).await.unwrap();
    assert_eq!(
        h.service.audit().query_by_card(TENANT, "d1").await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn escalation_on_read_can_be_disabled() {
    let mut config = EngineConfig::default();
    config.escalation.auto_escalate_on_read = false;
    let h = harness_with(config, None);
    raise_sku_stop(&h, "d1", "SKU-1").await;
    h.clock.advance(Duration::hours(48));

    let listed = h.service.control_tower().list(TENANT).await.unwrap();
    assert_eq!(listed[0].status, DecisionStatus::Open);
}

#[tokio::test]
async fn control_tower_merges_domains_and_auto_decisions() {
    let source = StaticFactSource::new().with_tenant(TENANT, sku_facts(vec![losing_sku("SKU-9")]));
    let h = harness_with(EngineConfig::default(), Some(Arc::new(source)));
    raise_sku_stop(&h, "d1", "SKU-1").await;
    h.service
        .adapter(Domain::Mdp)
        .unwrap()
        .raise(
            ScenarioType::RoasDecline,
            ScenarioInput {
                id: Some("m1".into()),
                entity_id: "CMP-1".into(),
                entity_name: "Spring sale".into(),
                value: dec("0.7"),
                impact_amount: dec("-5000000"),
                ..sku_stop_input("m1", "CMP-1")
            },
        )
        .await
        .unwrap();

    let tower = h.service.control_tower();
    let all = tower.list(TENANT).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(all.len(), 3);
    assert!(ids.contains(&"d1"));
    assert!(ids.contains(&"m1"));
    assert!(ids.contains(&"auto-sku_stop-SKU-9"));
    // Critical first.
    assert!(all[0].severity >= all[2].severity);

    let summary = tower.summary(TENANT).await.unwrap();
    assert_eq!(summary.total, 3);
}

#[tokio::test]
async fn analytics_count_rows_and_audit_entries() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    raise_sku_stop(&h, "d2", "SKU-2").await;
    h.service.decide(TENANT, "d1", "STOP", None, Some("alice")).await.unwrap();

    let analytics = h.service.control_tower().analytics(TENANT).await.unwrap();
    let fdp = &analytics.domains[&Domain::Fdp];
    assert_eq!(fdp.total, 2);
    assert_eq!(fdp.decided, 1);
    assert_eq!(fdp.open, 1);
    assert_eq!(analytics.domains[&Domain::Mdp].total, 0);

    assert_eq!(analytics.audit.total, 1);
    assert_eq!(analytics.audit.decided, 1);
    assert_eq!(analytics.audit.by_origin.persisted, 1);
    assert_eq!(analytics.audit.total_impact, dec("1200000"));
    assert_eq!(h.clock.now(), NOW);
}

#[tokio::test]
async fn mutations_are_exposed_as_data() {
    let h = harness();
    raise_sku_stop(&h, "d1", "SKU-1").await;
    let d = h
        .service
        .apply(
            TENANT,
            "d1",
            Mutation::AssignOwner {
                user_id: "dave".into(),
            },
            Some("lead"),
        )
        .await
        .unwrap();
    assert_eq!(d.owner_user_id.as_deref(), Some("dave"));
    assert_eq!(d.status, DecisionStatus::InProgress);
}
