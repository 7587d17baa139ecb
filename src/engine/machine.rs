//! # engine::machine
//!
//! The live-feed **state machine**, kept free of I/O: it consumes one
//! [`FeedEvent`] at a time and answers with the [`Effect`]s the controller
//! task must carry out, in order.
//!
//! ```text
//!            Subscribe                 MessageReceived
//!   Idle ───────────────▶ Connecting ───────────────────▶ Streaming
//!    ▲                        │                               │
//!    │   ConnectionError │ GraceTimeout │ Deadline            │ ConnectionError
//!    │                        ▼                               ▼
//!    └──── Unsubscribe ──── Polling ◀─────────────────────────┘
//! ```
//!
//! The first failure event out of `Connecting` wins; the transition cancels the
//! remaining timers in the same step, so a timer that would have fired later
//! never reaches this machine.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::events::FeedEvent;
use crate::models::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    Idle,
    Connecting,
    Streaming,
    Polling,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CloseStream,
    StopPolling,
    CancelTimers,
    /// Open a connector for the given epoch.
    OpenStream { epoch: u64 },
    /// Arm grace + deadline timers.
    ArmTimers,
    /// Start the poller for the given epoch.
    StartPolling { epoch: u64 },
    /// Append to the History Buffer.
    Record(Tick),
}

#[derive(Debug, Clone)]
pub struct FeedMachine {
    mode:       FeedMode,
    epoch:      u64,
    live:       Option<Tick>,
    last_error: Option<String>,
}

impl FeedMachine {
    pub fn new() -> Self {
        Self {
            mode:       FeedMode::Idle,
            epoch:      0,
            live:       None,
            last_error: None,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    /// Generation of the current subscription; bumps on every subscribe and
    /// every effective unsubscribe.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn live(&self) -> Option<&Tick> {
        self.live.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn handle(&mut self, event: FeedEvent) -> Vec<Effect> {
        let from = self.mode;
        let name = event.name();

        let effects = match (self.mode, event) {
            // ── Subscribe: always restart from a clean Connecting ────────────
            (_, FeedEvent::Subscribe) => {
                self.epoch += 1;
                self.mode = FeedMode::Connecting;
                self.last_error = None;
                vec![
                    Effect::CancelTimers,
                    Effect::CloseStream,
                    Effect::StopPolling,
                    Effect::OpenStream { epoch: self.epoch },
                    Effect::ArmTimers,
                ]
            }

            // ── Unsubscribe ──────────────────────────────────────────────────
            (FeedMode::Idle, FeedEvent::Unsubscribe) => Vec::new(),
            (_, FeedEvent::Unsubscribe) => {
                self.epoch += 1;
                self.mode = FeedMode::Idle;
                self.live = None;
                self.last_error = None;
                vec![Effect::CancelTimers, Effect::CloseStream, Effect::StopPolling]
            }

            // ── Stream became healthy ────────────────────────────────────────
            (FeedMode::Connecting, FeedEvent::MessageReceived(tick)) => {
                self.mode = FeedMode::Streaming;
                self.live = Some(tick.clone());
                vec![Effect::CancelTimers, Effect::Record(tick)]
            }
            (FeedMode::Streaming, FeedEvent::MessageReceived(tick)) => {
                self.live = Some(tick.clone());
                vec![Effect::Record(tick)]
            }

            // ── Fallback: first failure signal wins ──────────────────────────
            (FeedMode::Connecting, FeedEvent::ConnectionError(reason))
            | (FeedMode::Streaming, FeedEvent::ConnectionError(reason)) => {
                self.fall_back(reason)
            }
            (FeedMode::Connecting, FeedEvent::GraceTimeout) => {
                self.fall_back("no message within grace window".to_string())
            }
            (FeedMode::Connecting, FeedEvent::Deadline) => {
                self.fall_back("connection deadline exceeded".to_string())
            }

            // ── Synthetic ticks only count while polling ─────────────────────
            (FeedMode::Polling, FeedEvent::PolledTick(tick)) => {
                self.live = Some(tick.clone());
                vec![Effect::Record(tick)]
            }

            // ── Everything else is stale ─────────────────────────────────────
            (mode, _) => {
                debug!(?mode, event = name, "Ignoring event in current mode");
                Vec::new()
            }
        };

        if from != self.mode {
            info!(from = ?from, to = ?self.mode, event = name, epoch = self.epoch, "Feed transition");
        }
        effects
    }

    fn fall_back(&mut self, reason: String) -> Vec<Effect> {
        warn!(%reason, "⚠️ Live stream unhealthy, switching to polling");
        self.mode = FeedMode::Polling;
        self.last_error = Some(reason);
        vec![
            Effect::CancelTimers,
            Effect::CloseStream,
            Effect::StartPolling { epoch: self.epoch },
        ]
    }
}

impl Default for FeedMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
