//! Branch identifier resolution endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use nalabranch_core::branch::ResolvedBranch;

use crate::api::status::AppError;
use crate::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct BatchRequest {
    pub values: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchItem {
    raw: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_id: Option<Uuid>,
    legacy_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct BatchResponse {
    results: Vec<BatchItem>,
}

#[derive(Deserialize)]
pub struct ContextQuery {
    #[serde(rename = "branchId")]
    pub branch_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/branches/resolve", post(resolve_batch))
        .route("/api/branches/resolve/:raw", get(resolve_one))
        .route("/api/branches/legacy/:id", get(derive_legacy))
        .route("/api/branches/context", get(branch_context))
}

async fn resolve_one(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<ResolvedBranch>, AppError> {
    Ok(Json(state.resolver.resolve(&raw)?))
}

async fn resolve_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let limit = state.config.server.max_batch;
    if req.values.len() > limit {
        return Err(AppError::BadRequest(format!(
            "batch of {} values exceeds the limit of {}",
            req.values.len(),
            limit
        )));
    }

    debug!(count = req.values.len(), "resolving branch batch");

    let results = req
        .values
        .into_iter()
        .map(|raw| match state.resolver.resolve(&raw) {
            Ok(resolved) => BatchItem {
                raw,
                ok: true,
                canonical_id: Some(resolved.canonical_id),
                legacy_id: resolved.legacy_id,
                error: None,
            },
            Err(e) => BatchItem {
                raw,
                ok: false,
                canonical_id: None,
                legacy_id: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(BatchResponse { results }))
}

async fn derive_legacy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResolvedBranch>, AppError> {
    let legacy_id: i32 = id
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("'{}' is not a legacy branch id", id)))?;

    Ok(Json(ResolvedBranch {
        canonical_id: state.resolver.derive(legacy_id),
        legacy_id: Some(legacy_id),
    }))
}

async fn branch_context(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContextQuery>,
    headers: HeaderMap,
) -> Result<Json<ResolvedBranch>, AppError> {
    let claim = headers
        .get(state.config.branch.claim_header.as_str())
        .and_then(|v| v.to_str().ok());

    state
        .resolver
        .resolve_context(query.branch_id.as_deref(), claim)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("unable to resolve branch context".into()))
}
