//! # routes
//!
//! HTTP surface of the service.
//!
//! | Group         | Routes                                                    |
//! |---------------|-----------------------------------------------------------|
//! | collaborator  | `/api/live`, `/api/stocks/:symbol`, `/api/seed`           |
//! | dashboard     | `/api/dashboard/{live,subscribe,unsubscribe}`             |
//! |               | `/api/dashboard/history/:symbol`, `/api/dashboard/charts/:symbol` |
//! | ops           | `/api/health`                                             |

pub mod dashboard;
pub mod health;
pub mod live;
pub mod stocks;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::AppError;
use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Ops ───────────────────────────────────────────────────────────────
        .route("/api/health",                     get(health::health_check))
        // ── Collaborator ──────────────────────────────────────────────────────
        .route("/api/live",                       get(live::live_stream))
        .route("/api/stocks/:symbol",             get(stocks::get_stock_history))
        .route("/api/seed",                       post(stocks::seed_store))
        // ── Dashboard ─────────────────────────────────────────────────────────
        .route("/api/dashboard/live",             get(dashboard::get_live))
        .route("/api/dashboard/subscribe",        post(dashboard::subscribe))
        .route("/api/dashboard/unsubscribe",      post(dashboard::unsubscribe))
        .route("/api/dashboard/history/:symbol",  post(dashboard::load_history))
        .route("/api/dashboard/charts/:symbol",   get(dashboard::get_charts))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Trimmed, uppercased ticker from a path segment.
pub(crate) fn normalize_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
        return Err(AppError::BadRequest(format!("invalid symbol '{raw}'")));
    }
    Ok(symbol)
}

// ─── Test Support ─────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::engine::connector::tests::ScriptedTransport;
    use crate::engine::loader::tests::{Script, ScriptedSource};
    use crate::state::{build_state_with, SharedState};

    /// State with in-memory collaborators; `vars` override config defaults.
    pub(crate) fn state(vars: &[(&str, &str)], history: Script) -> (SharedState, Arc<ScriptedTransport>) {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|key| {
            vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();

        let transport = Arc::new(ScriptedTransport::new());
        let state = build_state_with(config, transport.clone(), Arc::new(ScriptedSource(history)));
        (state, transport)
    }

    pub(crate) async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk.b").unwrap(), "BRK.B");
        assert!(normalize_symbol("  ").is_err());
        assert!(normalize_symbol("a/b").is_err());
    }
}
