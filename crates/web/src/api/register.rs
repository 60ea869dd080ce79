//! Legacy branch register endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use nalabranch_core::branch::{backfill_rows, BackfillRow, BranchRegister};

use crate::api::status::AppError;
use crate::AppState;

#[derive(Serialize)]
struct RegisterResponse {
    branches: Vec<BackfillRow>,
    total: usize,
}

#[derive(Serialize)]
struct ReloadResponse {
    count: usize,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/branches/register", get(list_register))
        .route("/api/branches/register/reload", post(reload_register))
}

async fn list_register(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RegisterResponse>, AppError> {
    let register = state
        .register
        .read()
        .map_err(|e| AppError::Internal(format!("register lock: {}", e)))?;

    let branches = backfill_rows(&register, state.resolver.layout());
    let total = branches.len();
    Ok(Json(RegisterResponse { branches, total }))
}

async fn reload_register(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, AppError> {
    let path = state
        .config
        .branch
        .register_file
        .as_ref()
        .ok_or_else(|| AppError::NotFound("no branch register configured".into()))?;

    let entries = BranchRegister::load(path)
        .map_err(|e| AppError::Internal(format!("failed to reload register: {}", e)))?;
    let count = entries.len();

    {
        let mut register = state
            .register
            .write()
            .map_err(|e| AppError::Internal(format!("register lock: {}", e)))?;
        *register = entries;
    }

    info!(count, "branch register reloaded");
    Ok(Json(ReloadResponse { count }))
}
