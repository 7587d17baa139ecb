//! # state
//!
//! The **shared application state** handed to every Axum handler.
//!
//! ## Ownership
//!
//! * Feed state (mode, live tick, timers, connections) is owned by the feed
//!   controller task; handlers only hold a [`FeedController`] handle and talk
//!   to it over channels.
//! * The History Buffer is the one piece of mutable data shared directly: the
//!   controller appends, the History Loader replaces, handlers snapshot.
//!   `tokio::sync::RwLock` lets many chart reads run side by side.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use tracing::info;

use crate::engine::{
    buffer::{HistoryBuffer, SharedBuffer},
    connector::{FeedTransport, HttpTransport},
    controller::FeedController,
    loader::{HistoryLoader, HistorySource, HttpHistorySource},
    synthetic::{fallback_history, SyntheticGenerator, TickGenerator},
    validator::TickValidator,
};
use crate::models::symbol;
use crate::store::TickStore;

// ─── AppState ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Dashboard side ────────────────────────────────────────────────────────
    pub controller: FeedController,
    pub buffer:     SharedBuffer,
    pub loader:     Arc<HistoryLoader>,
    /// Shared by the stream connector, the poller and the loader.
    pub validator:  Arc<TickValidator>,

    // ── Collaborator side (/api/live, /api/stocks, /api/seed) ─────────────────
    pub store:      Arc<TickStore>,
    /// Source of events for `/api/live`.
    pub live_feed:  Arc<dyn TickGenerator>,

    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

/// Production wiring: HTTP transport for the push feed and HTTP source for
/// bulk history, sharing one `reqwest::Client`.
///
/// Must be called from inside the Tokio runtime (spawns the controller task).
pub fn build_state(config: Config) -> SharedState {
    let http_client = reqwest::Client::new();
    let transport = Arc::new(HttpTransport::new(http_client.clone(), config.feed_url.clone()));
    let source = Arc::new(HttpHistorySource::new(http_client, config.history_base_url.clone()));

    build_state_with(config, transport, source)
}

pub fn build_state_with(
    config:    Config,
    transport: Arc<dyn FeedTransport>,
    source:    Arc<dyn HistorySource>,
) -> SharedState {
    let buffer = preloaded_buffer();
    let validator = Arc::new(TickValidator::new());

    let controller = FeedController::spawn(
        config.feed_settings(),
        transport,
        Arc::new(SyntheticGenerator::new()),
        Arc::clone(&validator),
        buffer.clone(),
    );
    let loader = HistoryLoader::new(
        source,
        Arc::clone(&validator),
        buffer.clone(),
        config.history_timeout,
    );

    Arc::new(AppState {
        store: Arc::new(TickStore::new(config.store_enabled)),
        config: Arc::new(config),
        controller,
        buffer,
        loader: Arc::new(loader),
        validator,
        live_feed: Arc::new(SyntheticGenerator::new()),
        started_at: Utc::now(),
    })
}

/// Every known symbol starts out with a synthetic history, so the charts have
/// data before the first load or live tick.
fn preloaded_buffer() -> SharedBuffer {
    let now = Utc::now();
    let mut rng = rand::rng();
    let mut buffer = HistoryBuffer::new();
    for ticker in symbol::tickers() {
        buffer.replace(ticker, fallback_history(ticker, now, &mut rng));
    }
    info!(symbols = buffer.symbols().len(), "🧪 History buffer preloaded with synthetic data");
    buffer.into_shared()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
