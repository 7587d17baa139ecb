//! # routes::live
//!
//! `GET /api/live` — server-sent event push feed.
//!
//! One `data: <json>` event immediately, then one per emit interval. The
//! stream ends after the idle ceiling; a client disconnect drops it earlier.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{stream, Stream, StreamExt};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::SharedState;

pub async fn live_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let generator = Arc::clone(&state.live_feed);
    let ceiling = state.config.live_idle_ceiling;

    let mut ticker = interval(state.config.live_emit_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(ceiling_secs = ceiling.as_secs(), "📡 Live feed client connected");

    let events = stream::unfold((ticker, generator), |(mut ticker, generator)| async move {
        ticker.tick().await;
        let payload = generator.next_payload();
        debug!(symbol = %payload["symbol"], "Live event");
        let event = Event::default().data(payload.to_string());
        Some((Ok(event), (ticker, generator)))
    })
    .take_until(tokio::time::sleep(ceiling));

    Sse::new(events).keep_alive(KeepAlive::default())
}
