//! # routes::stocks
//!
//! Bulk history collaborator: `GET /api/stocks/:symbol` and `POST /api/seed`.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    engine::synthetic::seed_history,
    error::AppError,
    models::Tick,
    routes::normalize_symbol,
    state::SharedState,
    store::RECENT_LIMIT,
};

// ─── GET /api/stocks/:symbol ──────────────────────────────────────────────────

/// Up to 100 most recent ticks for a symbol, ascending by timestamp.
///
/// With the store disabled the answer is the degrade envelope
/// `{ data, isMockData: true, message }` filled from deterministic mock data.
pub async fn get_stock_history(
    State(state): State<SharedState>,
    Path(symbol): Path<String>,
) -> Result<Response, AppError> {
    let symbol = normalize_symbol(&symbol)?;

    if state.store.is_enabled() {
        let rows = state.store.recent(&symbol, RECENT_LIMIT).await;
        info!(%symbol, records = rows.len(), "Stock history served from store");
        let body: Vec<Value> = rows.iter().map(Tick::to_wire).collect();
        return Ok(Json(body).into_response());
    }

    let mut mock: Vec<Tick> = seed_history(state.config.seed_rng_seed, Utc::now())
        .into_iter()
        .filter(|t| t.symbol == symbol)
        .collect();
    let skip = mock.len().saturating_sub(RECENT_LIMIT);
    let mock = mock.split_off(skip);

    let message = if mock.is_empty() {
        "No mock data available for this symbol."
    } else {
        "Store unavailable. Displaying mock data."
    };
    warn!(%symbol, records = mock.len(), "Store disabled, serving mock history");

    let data: Vec<Value> = mock.iter().map(Tick::to_wire).collect();
    Ok(Json(json!({
        "data":       data,
        "isMockData": true,
        "message":    message,
    }))
    .into_response())
}

// ─── POST /api/seed ───────────────────────────────────────────────────────────

pub async fn seed_store(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    if !state.store.is_enabled() {
        return Err(AppError::StoreUnavailable);
    }

    let created = state.store.seed(state.config.seed_rng_seed, Utc::now()).await;

    Ok(Json(json!({
        "message":        "Store seeded successfully",
        "recordsCreated": created,
    })))
}
