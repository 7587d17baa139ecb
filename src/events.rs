//! # events
//!
//! Defines [`FeedEvent`] — every input the live-feed state machine reacts to —
//! and [`Signal`], the envelope connectors and pollers use to send events back
//! to the controller task.
//!
//! Signals carry the subscription epoch they were produced under. The
//! controller drops any signal whose epoch is not the current one, which is how
//! a late message from a torn-down connector is ignored.

use crate::models::Tick;

/// Named inputs of the feed state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Subscribe,

    /// A validated tick from the push stream.
    MessageReceived(Tick),

    /// A validated synthetic tick from the polling fallback.
    PolledTick(Tick),

    /// Transport failure or end of stream.
    ConnectionError(String),

    /// Grace window elapsed with no valid message.
    GraceTimeout,

    /// Hard deadline elapsed with no valid message.
    Deadline,

    Unsubscribe,
}

impl FeedEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            FeedEvent::Subscribe          => "Subscribe",
            FeedEvent::MessageReceived(_) => "MessageReceived",
            FeedEvent::PolledTick(_)      => "PolledTick",
            FeedEvent::ConnectionError(_) => "ConnectionError",
            FeedEvent::GraceTimeout       => "GraceTimeout",
            FeedEvent::Deadline           => "Deadline",
            FeedEvent::Unsubscribe        => "Unsubscribe",
        }
    }
}

/// An event from a connector or poller, stamped with its subscription epoch.
#[derive(Debug, Clone)]
pub struct Signal {
    pub epoch: u64,
    pub event: FeedEvent,
}

impl Signal {
    pub fn new(epoch: u64, event: FeedEvent) -> Self {
        Self { epoch, event }
    }
}

pub type SignalSender = tokio::sync::mpsc::UnboundedSender<Signal>;
pub type SignalReceiver = tokio::sync::mpsc::UnboundedReceiver<Signal>;
