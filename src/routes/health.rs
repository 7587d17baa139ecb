//! # routes::health

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::{error::AppError, state::SharedState};

// ─── GET /api/health ──────────────────────────────────────────────────────────

pub async fn health_check(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let feed = state.controller.status().await?;
    let buffered = {
        let buffer = state.buffer.read().await;
        buffer
            .symbols()
            .into_iter()
            .map(|symbol| {
                let len = buffer.len(&symbol);
                (symbol, json!(len))
            })
            .collect::<serde_json::Map<String, serde_json::Value>>()
    };

    Ok(Json(json!({
        "ok":           true,
        "status":       "healthy",
        "uptimeSecs":   (Utc::now() - state.started_at).num_seconds(),
        "feedMode":     feed.mode,
        "validator":    feed.validator,
        "buffered":     buffered,
        "capacity":     state.buffer.read().await.capacity(),
        "storeEnabled": state.store.is_enabled(),
        "storeRecords": state.store.count().await,
    })))
}
