//! # Stockpulse — Live Market-Data Feed Service
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌──────────────┐  GET /api/live (SSE)   ┌────────────────────────────┐
//!  │  Collaborator│ ──────────────────────▶│  FeedController task       │
//!  │  routes      │                        │  Idle → Connecting →       │
//!  │              │  GET /api/stocks/:sym  │  Streaming │ Polling       │
//!  │              │ ─────────────┐         └─────────────┬──────────────┘
//!  └──────────────┘              │                       │ append
//!                                ▼                       ▼
//!                         HistoryLoader ──replace──▶ HistoryBuffer (100 / symbol)
//!                                                        │ snapshot
//!  ┌──────────────┐  /api/dashboard/*                    ▼
//!  │  Dashboard   │ ◀──────────────────────────── analytics views
//!  └──────────────┘
//! ```
//!
//! In the default configuration the service consumes its own `/api/live` and
//! `/api/stocks` endpoints, so a single process is a complete demo.
//!
//! ## Environment Variables
//!
//! | Variable                 | Default                          | Description                      |
//! |--------------------------|----------------------------------|----------------------------------|
//! | `BIND_ADDR`              | `0.0.0.0:3000`                   | Address Axum listens on          |
//! | `FEED_URL`               | `http://127.0.0.1:3000/api/live` | SSE feed the controller consumes |
//! | `HISTORY_BASE_URL`       | `http://127.0.0.1:3000`          | Bulk history collaborator        |
//! | `FEED_GRACE_MS`          | `2000`                           | Grace window                     |
//! | `FEED_DEADLINE_MS`       | `5000`                           | Hard connect deadline            |
//! | `POLL_INTERVAL_MS`       | `3000`                           | Polling fallback period          |
//! | `HISTORY_TIMEOUT_MS`     | `5000`                           | Bulk load timeout                |
//! | `LIVE_EMIT_INTERVAL_MS`  | `3000`                           | `/api/live` event spacing        |
//! | `LIVE_IDLE_CEILING_SECS` | `600`                            | `/api/live` stream lifetime      |
//! | `STORE_ENABLED`          | `true`                           | Serve real store vs mock envelope|
//! | `SEED_RNG_SEED`          | `42`                             | Seed for `/api/seed`             |
//! | `FEED_AUTOSTART`         | `true`                           | Subscribe at startup             |
//! | `RUST_LOG`               | `stockpulse=debug`               | Tracing filter                   |

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod engine;
mod error;
mod events;
mod models;
mod routes;
mod state;
mod store;

use config::Config;
use state::build_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("stockpulse=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║              STOCKPULSE — Live Market Feed            ║
  ║   Stream · Fallback · History · Analytics             ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Config ─────────────────────────────────────────────────────────────
    let config = Config::from_env().context("invalid configuration")?;
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("BIND_ADDR '{}' is not a socket address", config.bind_addr))?;
    let autostart = config.feed_autostart;

    // ── 4. Shared state & router ──────────────────────────────────────────────
    let state = build_state(config);
    let app = routes::router(state.clone());

    // ── 5. Bind ───────────────────────────────────────────────────────────────
    info!(?addr, "🚀 Stockpulse server starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // ── 6. Autostart the live feed (after bind so a self-hosted feed is up) ───
    if autostart {
        match state.controller.subscribe().await {
            Ok(status) => info!(mode = ?status.mode, "📈 Live feed subscribed"),
            Err(e) => warn!(error = %e, "Live feed autostart failed"),
        }
    }

    // ── 7. Serve ──────────────────────────────────────────────────────────────
    axum::serve(listener, app).await?;

    Ok(())
}
