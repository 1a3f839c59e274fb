//! `towerline serve` -- HTTP JSON API over the decision engine.
//!
//! Backed by the in-memory store, optionally seeded with decision rows and
//! a per-tenant live facts file for the auto-synthesizer.
//!
//! Endpoints:
//! - GET  /health
//! - GET  /tenants/{tenant}/decisions                     - live decisions (`?domain=` to scope)
//! - GET  /tenants/{tenant}/domains/{domain}/summary      - cached per-domain counts
//! - GET  /tenants/{tenant}/control-tower                 - cross-domain view, escalates on read
//! - POST /tenants/{tenant}/decisions/{id}/{action}       - decide, dismiss, snooze, escalate, reassign, assign
//! - GET  /tenants/{tenant}/audit                         - `?entity_type=&entity_id=` or `?card_id=`
//! - GET  /tenants/{tenant}/audit/stats
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod state;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use towerline_engine::synth::{FactSource, LiveFacts, StaticFactSource};
use towerline_engine::{DecisionService, EngineConfig, SystemClock};
use towerline_storage::{tables, InMemoryStore, Row};

use self::handlers::{
    handle_apply, handle_audit, handle_audit_stats, handle_control_tower, handle_domain_summary,
    handle_health, handle_list_decisions, handle_not_found,
};
use self::state::AppState;
use crate::input::read_json;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tenants/{tenant}/decisions", get(handle_list_decisions))
        .route(
            "/tenants/{tenant}/domains/{domain}/summary",
            get(handle_domain_summary),
        )
        .route("/tenants/{tenant}/control-tower", get(handle_control_tower))
        .route(
            "/tenants/{tenant}/decisions/{id}/{action}",
            post(handle_apply),
        )
        .route("/tenants/{tenant}/audit", get(handle_audit))
        .route("/tenants/{tenant}/audit/stats", get(handle_audit_stats))
        .fallback(handle_not_found)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Build the engine from the seed and facts files, then serve until Ctrl+C.
pub async fn start_server(
    port: u16,
    config: EngineConfig,
    seed: Option<PathBuf>,
    facts: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(InMemoryStore::new());
    if let Some(path) = &seed {
        let rows: Vec<Row> = read_json(path)?;
        tracing::info!(rows = rows.len(), path = %path.display(), "seeding decision rows");
        store.seed(tables::DECISION_CARDS, rows).await;
    }

    let fact_source: Option<Arc<dyn FactSource>> = match &facts {
        Some(path) => {
            let by_tenant: HashMap<String, LiveFacts> = read_json(path)?;
            let source = by_tenant
                .into_iter()
                .fold(StaticFactSource::new(), |s, (tenant, f)| {
                    s.with_tenant(&tenant, f)
                });
            Some(Arc::new(source))
        }
        None => None,
    };

    let service = DecisionService::new(store, config, Arc::new(SystemClock), fact_source);
    let app = router(Arc::new(AppState { service }));

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "towerline listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
