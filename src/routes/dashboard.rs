//! # routes::dashboard
//!
//! Dashboard-facing handlers: drive the feed controller, trigger history
//! loads and render the analytics views over the History Buffer.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::{
    engine::analytics::{average_volume_by_symbol, line_series, price_histogram, scatter_series},
    error::AppError,
    models::symbol,
    routes::normalize_symbol,
    state::SharedState,
};

// ─── Feed Controller ──────────────────────────────────────────────────────────

/// GET /api/dashboard/live — controller status including the current live tick.
pub async fn get_live(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.controller.status().await?))
}

/// POST /api/dashboard/subscribe
pub async fn subscribe(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let status = state.controller.subscribe().await?;
    info!(epoch = status.epoch, "Dashboard subscribed to live feed");
    Ok(Json(status))
}

/// POST /api/dashboard/unsubscribe
pub async fn unsubscribe(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let status = state.controller.unsubscribe().await?;
    info!(epoch = status.epoch, "Dashboard unsubscribed from live feed");
    Ok(Json(status))
}

// ─── History & Charts ─────────────────────────────────────────────────────────

/// POST /api/dashboard/history/:symbol — bulk-load a symbol into the buffer.
pub async fn load_history(
    State(state): State<SharedState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = normalize_symbol(&symbol)?;
    Ok(Json(state.loader.load(&symbol).await))
}

/// GET /api/dashboard/charts/:symbol — every analytics view for one symbol,
/// plus the average-volume comparison across the known symbols.
pub async fn get_charts(
    State(state): State<SharedState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = normalize_symbol(&symbol)?;

    let (snapshot, per_symbol) = {
        let buffer = state.buffer.read().await;
        let per_symbol: Vec<(&'static str, Vec<_>)> = symbol::tickers()
            .map(|ticker| (ticker, buffer.snapshot(ticker)))
            .collect();
        (buffer.snapshot(&symbol), per_symbol)
    };

    let average_volume =
        average_volume_by_symbol(per_symbol.iter().map(|(s, ticks)| (*s, ticks.as_slice())));

    Ok(Json(json!({
        "symbol":        symbol,
        "points":        snapshot.len(),
        "isSynthetic":   snapshot.iter().any(|t| t.origin.is_synthetic()),
        "line":          line_series(&snapshot),
        "scatter":       scatter_series(&snapshot),
        "histogram":     price_histogram(&snapshot),
        "averageVolume": average_volume,
    })))
}
