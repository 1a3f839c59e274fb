//! HTTP route handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use towerline_core::normalize::{map_domain, map_grain};
use towerline_core::{deduplicate, DecisionContract, Domain};
use towerline_engine::{Clock, DecisionLifecycle, EngineError, Mutation};
use towerline_storage::StorageError;

use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

fn engine_error(e: EngineError) -> Response {
    let status = match &e {
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::Conflict { .. } | EngineError::Transition(_) => StatusCode::CONFLICT,
        EngineError::InvalidRequest(_) | EngineError::InvalidReassign { .. } => {
            StatusCode::BAD_REQUEST
        }
        EngineError::Contract(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::warn!(error = %e, "request failed");
    }
    json_error(status, &e.to_string())
}

fn parse_domain(raw: &str) -> Result<Domain, Response> {
    map_domain(raw)
        .filter(|d| Domain::OPERATIONAL.contains(d))
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, &format!("unknown domain '{raw}'")))
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

#[derive(Deserialize)]
pub(crate) struct DecisionsQuery {
    domain: Option<String>,
}

/// GET /tenants/{tenant}/decisions
///
/// With `?domain=` this is that domain's persisted decisions plus the auto
/// decisions it owns. Without it, every domain is listed. Neither form
/// escalates; that is the control tower's job.
pub(crate) async fn handle_list_decisions(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(query): Query<DecisionsQuery>,
) -> Response {
    let domains = match query.domain.as_deref() {
        Some(raw) => match parse_domain(raw) {
            Ok(d) => vec![d],
            Err(resp) => return resp,
        },
        None => Domain::OPERATIONAL.to_vec(),
    };

    let mut decisions: Vec<DecisionContract> = Vec::new();
    for domain in &domains {
        let adapter = match state.service.adapter(*domain) {
            Ok(a) => a,
            Err(e) => return engine_error(e),
        };
        match adapter.list(&tenant).await {
            Ok(list) => decisions.extend(list),
            Err(e) => return engine_error(e),
        }
    }
    if let Some(synth) = state.service.synthesizer() {
        match synth.evaluate(&tenant).await {
            Ok(autos) => decisions.extend(
                autos
                    .into_iter()
                    .map(|a| a.decision)
                    .filter(|d| domains.contains(&d.domain)),
            ),
            Err(e) => return engine_error(e),
        }
    }

    let decisions = deduplicate(decisions);
    (StatusCode::OK, Json(json!({ "decisions": decisions }))).into_response()
}

/// GET /tenants/{tenant}/domains/{domain}/summary
pub(crate) async fn handle_domain_summary(
    State(state): State<Arc<AppState>>,
    Path((tenant, domain)): Path<(String, String)>,
) -> Response {
    let domain = match parse_domain(&domain) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let adapter = match state.service.adapter(domain) {
        Ok(a) => a,
        Err(e) => return engine_error(e),
    };
    match adapter.summary(&tenant).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /tenants/{tenant}/control-tower
pub(crate) async fn handle_control_tower(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> Response {
    let tower = state.service.control_tower();
    let decisions = match tower.list(&tenant).await {
        Ok(d) => d,
        Err(e) => return engine_error(e),
    };
    let summary = match tower.summary(&tenant).await {
        Ok(s) => s,
        Err(e) => return engine_error(e),
    };
    let analytics = match tower.analytics(&tenant).await {
        Ok(a) => a,
        Err(e) => return engine_error(e),
    };
    let response = json!({
        "decisions": decisions,
        "summary": summary,
        "analytics": analytics,
    });
    (StatusCode::OK, Json(response)).into_response()
}

/// Body of a lifecycle action. Which fields are required depends on the action.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ActionRequest {
    actor: Option<String>,
    action_type: Option<String>,
    comment: Option<String>,
    reason: Option<String>,
    hours: Option<i64>,
    target: Option<String>,
    user_id: Option<String>,
}

fn missing(field: &str, action: &str) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        &format!("'{field}' is required for {action}"),
    )
}

fn to_mutation(action: &str, req: ActionRequest) -> Result<Mutation, Response> {
    Ok(match action {
        "decide" => Mutation::Decide {
            action_type: req.action_type.ok_or_else(|| missing("action_type", action))?,
            comment: req.comment,
        },
        "dismiss" => Mutation::Dismiss {
            reason: req.reason.ok_or_else(|| missing("reason", action))?,
            comment: req.comment,
        },
        "snooze" => Mutation::Snooze {
            hours: req.hours.ok_or_else(|| missing("hours", action))?,
        },
        "escalate" => Mutation::Escalate { reason: req.reason },
        "reassign" => {
            let raw = req.target.ok_or_else(|| missing("target", action))?;
            Mutation::Reassign {
                target: parse_domain(&raw)?,
                reason: req.reason,
            }
        }
        "assign" => Mutation::AssignOwner {
            user_id: req.user_id.ok_or_else(|| missing("user_id", action))?,
        },
        other => {
            return Err(json_error(
                StatusCode::NOT_FOUND,
                &format!("unknown action '{other}'"),
            ))
        }
    })
}

/// POST /tenants/{tenant}/decisions/{id}/{action}
pub(crate) async fn handle_apply(
    State(state): State<Arc<AppState>>,
    Path((tenant, id, action)): Path<(String, String, String)>,
    body: Option<Json<ActionRequest>>,
) -> Response {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let actor = req.actor.clone();
    let mutation = match to_mutation(&action, req) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    match state
        .service
        .apply(&tenant, &id, mutation, actor.as_deref())
        .await
    {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(e) => engine_error(e),
    }
}

#[derive(Deserialize)]
pub(crate) struct AuditQuery {
    entity_type: Option<String>,
    entity_id: Option<String>,
    card_id: Option<String>,
}

/// GET /tenants/{tenant}/audit
pub(crate) async fn handle_audit(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(query): Query<AuditQuery>,
) -> Response {
    let audit = state.service.audit();
    let result = match (query.card_id, query.entity_type, query.entity_id) {
        (Some(card_id), _, _) => audit.query_by_card(&tenant, &card_id).await,
        (None, Some(entity_type), Some(entity_id)) => {
            audit
                .query_by_entity(&tenant, map_grain(&entity_type), &entity_id)
                .await
        }
        _ => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "either card_id or both entity_type and entity_id are required",
            )
        }
    };
    match result {
        Ok(entries) => (StatusCode::OK, Json(json!({ "entries": entries }))).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /tenants/{tenant}/audit/stats
pub(crate) async fn handle_audit_stats(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> Response {
    let now = state.service.context().clock.now();
    match state.service.audit().aggregate_stats(&tenant, now).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => engine_error(e),
    }
}
