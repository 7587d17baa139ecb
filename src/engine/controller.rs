//! # engine::controller
//!
//! **Live Feed Controller** — a single task that owns the [`FeedMachine`], the
//! liveness timers, the [`StreamConnector`] and the [`PollingFallback`].
//!
//! ```text
//!   FeedController (handle, Clone)            controller task
//!   ─────────────────────────────             ─────────────────────────────────
//!   subscribe() / unsubscribe() ──Command──▶  select! {
//!   status()                    ◀─oneshot──     commands  ─┐
//!                                               signals   ─┼─▶ FeedMachine::handle
//!   StreamConnector ──Signal{epoch}──────────▶  grace     ─┤        │
//!   PollingFallback ──Signal{epoch}──────────▶  deadline  ─┘        ▼
//!                                             }               apply(Effect)
//! ```
//!
//! Everything that mutates feed state runs inside one `select!` arm at a time,
//! so a timer firing and a message arrival can never interleave. Signals from a
//! superseded epoch are dropped before they reach the machine.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Sleep};
use tracing::{debug, info};

use crate::engine::buffer::SharedBuffer;
use crate::engine::connector::{FeedTransport, StreamConnector};
use crate::engine::machine::{Effect, FeedMachine, FeedMode};
use crate::engine::polling::{PollingFallback, DEFAULT_POLL_INTERVAL};
use crate::engine::synthetic::TickGenerator;
use crate::engine::validator::{TickValidator, ValidatorStats};
use crate::error::AppError;
use crate::events::{FeedEvent, Signal, SignalReceiver, SignalSender};
use crate::models::Tick;

pub const DEFAULT_GRACE: Duration = Duration::from_millis(2000);
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(5000);

const COMMAND_QUEUE: usize = 32;

// ─── Settings & Status ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    pub grace:         Duration,
    pub deadline:      Duration,
    pub poll_interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            grace:         DEFAULT_GRACE,
            deadline:      DEFAULT_DEADLINE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Read-only view of the controller for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub mode:           FeedMode,
    pub epoch:          u64,
    pub live:           Option<Tick>,
    pub last_error:     Option<String>,
    /// True when the current live tick was generated locally.
    pub is_synthetic:   bool,
    pub connector_open: bool,
    pub polling:        bool,
    pub validator:      ValidatorStats,
}

#[derive(Debug)]
enum Command {
    Subscribe(oneshot::Sender<FeedStatus>),
    Unsubscribe(oneshot::Sender<FeedStatus>),
    Status(oneshot::Sender<FeedStatus>),
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Cheap, cloneable handle to the controller task.
#[derive(Debug, Clone)]
pub struct FeedController {
    commands: mpsc::Sender<Command>,
}

impl FeedController {
    /// Spawn the controller task in `Idle`. Nothing connects until
    /// [`subscribe`](Self::subscribe) is called.
    pub fn spawn(
        settings:  FeedSettings,
        transport: Arc<dyn FeedTransport>,
        generator: Arc<dyn TickGenerator>,
        validator: Arc<TickValidator>,
        buffer:    SharedBuffer,
    ) -> Self {
        Self::spawn_with_signals(settings, transport, generator, validator, buffer).0
    }

    /// Like [`spawn`](Self::spawn), also returning a sender into the task's
    /// signal queue (the one connectors and pollers report through).
    pub(crate) fn spawn_with_signals(
        settings:  FeedSettings,
        transport: Arc<dyn FeedTransport>,
        generator: Arc<dyn TickGenerator>,
        validator: Arc<TickValidator>,
        buffer:    SharedBuffer,
    ) -> (Self, SignalSender) {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (signals, signal_rx) = mpsc::unbounded_channel();

        let actor = ControllerTask {
            settings,
            transport,
            generator,
            validator,
            buffer,
            machine: FeedMachine::new(),
            connector: None,
            poller: None,
            grace: None,
            deadline: None,
            commands: command_rx,
            signals: signals.clone(),
            signal_rx,
        };
        tokio::spawn(actor.run());

        (Self { commands }, signals)
    }

    /// Tear down whatever is running and start connecting afresh.
    pub async fn subscribe(&self) -> Result<FeedStatus, AppError> {
        self.request(Command::Subscribe).await
    }

    /// Close the connector and stop the poller. Returns once both are gone;
    /// no tick reaches the History Buffer afterwards.
    pub async fn unsubscribe(&self) -> Result<FeedStatus, AppError> {
        self.request(Command::Unsubscribe).await
    }

    pub async fn status(&self) -> Result<FeedStatus, AppError> {
        self.request(Command::Status).await
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<FeedStatus>) -> Command,
    ) -> Result<FeedStatus, AppError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| AppError::ControllerUnavailable)?;
        rx.await.map_err(|_| AppError::ControllerUnavailable)
    }
}

// ─── Task ─────────────────────────────────────────────────────────────────────

struct ControllerTask {
    settings:  FeedSettings,
    transport: Arc<dyn FeedTransport>,
    generator: Arc<dyn TickGenerator>,
    validator: Arc<TickValidator>,
    buffer:    SharedBuffer,

    machine:   FeedMachine,
    connector: Option<StreamConnector>,
    poller:    Option<PollingFallback>,
    grace:     Option<Pin<Box<Sleep>>>,
    deadline:  Option<Pin<Box<Sleep>>>,

    commands:  mpsc::Receiver<Command>,
    signals:   SignalSender,
    signal_rx: SignalReceiver,
}

impl ControllerTask {
    async fn run(mut self) {
        info!(
            grace_ms = self.settings.grace.as_millis() as u64,
            deadline_ms = self.settings.deadline.as_millis() as u64,
            poll_ms = self.settings.poll_interval.as_millis() as u64,
            "🎛️ Feed controller started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                Some(signal) = self.signal_rx.recv() => self.on_signal(signal).await,
                _ = expire(&mut self.grace) => {
                    self.grace = None;
                    self.dispatch(FeedEvent::GraceTimeout).await;
                }
                _ = expire(&mut self.deadline) => {
                    self.deadline = None;
                    self.dispatch(FeedEvent::Deadline).await;
                }
            }
        }

        // All handles dropped: release the connection and the timer.
        self.dispatch(FeedEvent::Unsubscribe).await;
        info!("Feed controller stopped");
    }

    async fn on_command(&mut self, command: Command) {
        let reply = match command {
            Command::Subscribe(reply) => {
                self.dispatch(FeedEvent::Subscribe).await;
                reply
            }
            Command::Unsubscribe(reply) => {
                self.dispatch(FeedEvent::Unsubscribe).await;
                reply
            }
            Command::Status(reply) => reply,
        };
        // Caller may have given up waiting.
        let _ = reply.send(self.status());
    }

    async fn on_signal(&mut self, signal: Signal) {
        if signal.epoch != self.machine.epoch() {
            debug!(
                signal_epoch = signal.epoch,
                current_epoch = self.machine.epoch(),
                event = signal.event.name(),
                "Dropping signal from superseded subscription"
            );
            return;
        }
        self.dispatch(signal.event).await;
    }

    async fn dispatch(&mut self, event: FeedEvent) {
        for effect in self.machine.handle(event) {
            self.apply(effect).await;
        }
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::CancelTimers => {
                self.grace = None;
                self.deadline = None;
            }
            Effect::CloseStream => {
                if let Some(mut connector) = self.connector.take() {
                    debug!(saw_message = connector.saw_message(), "Closing stream connector");
                    connector.close();
                }
            }
            Effect::StopPolling => {
                if let Some(mut poller) = self.poller.take() {
                    poller.stop();
                }
            }
            Effect::OpenStream { epoch } => {
                self.connector = Some(StreamConnector::open(
                    Arc::clone(&self.transport),
                    Arc::clone(&self.validator),
                    epoch,
                    self.signals.clone(),
                ));
            }
            Effect::ArmTimers => {
                self.grace = Some(Box::pin(sleep(self.settings.grace)));
                self.deadline = Some(Box::pin(sleep(self.settings.deadline)));
            }
            Effect::StartPolling { epoch } => {
                self.poller = Some(PollingFallback::start(
                    self.settings.poll_interval,
                    Arc::clone(&self.generator),
                    Arc::clone(&self.validator),
                    epoch,
                    self.signals.clone(),
                ));
            }
            Effect::Record(tick) => {
                let symbol = tick.symbol.clone();
                self.buffer.write().await.append(&symbol, tick);
            }
        }
    }

    fn status(&self) -> FeedStatus {
        let live = self.machine.live().cloned();
        FeedStatus {
            mode:           self.machine.mode(),
            epoch:          self.machine.epoch(),
            is_synthetic:   live.as_ref().is_some_and(|t| t.origin.is_synthetic()),
            live,
            last_error:     self.machine.last_error().map(str::to_string),
            connector_open: self.connector.as_ref().is_some_and(StreamConnector::is_open),
            polling:        self.poller.as_ref().is_some_and(PollingFallback::is_running),
            validator:      self.validator.stats(),
        }
    }
}

/// Resolves when the timer fires; never resolves when it is not armed.
async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(deadline) => deadline.as_mut().await,
        None => pending::<()>().await,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::HistoryBuffer;
    use crate::engine::connector::tests::{frame, ScriptedTransport};
    use crate::engine::synthetic::SyntheticGenerator;
    use crate::error::FeedError;
    use crate::models::Origin;

    const AAPL: &str = r#"{"id":"a1","symbol":"AAPL","price":175.25,"volume":1200}"#;

    fn controller(transport: Arc<ScriptedTransport>) -> (FeedController, SharedBuffer) {
        let buffer = HistoryBuffer::new().into_shared();
        let controller = FeedController::spawn(
            FeedSettings::default(),
            transport,
            Arc::new(SyntheticGenerator::seeded(11)),
            Arc::new(TickValidator::new()),
            buffer.clone(),
        );
        (controller, buffer)
    }

    fn streamed(symbol: &str, price: f64) -> Tick {
        Tick {
            id:        format!("{symbol}-{price}"),
            symbol:    symbol.into(),
            price,
            volume:    100,
            timestamp: chrono::Utc::now(),
            origin:    Origin::Streamed,
        }
    }

    async fn total_ticks(buffer: &SharedBuffer) -> usize {
        let buffer = buffer.read().await;
        buffer.symbols().iter().map(|s| buffer.len(s)).sum()
    }

    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_idle() {
        let (controller, _) = controller(Arc::new(ScriptedTransport::new()));
        let status = controller.status().await.unwrap();

        assert_eq!(status.mode, FeedMode::Idle);
        assert!(!status.connector_open && !status.polling);
        assert!(status.live.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_appends_to_buffer() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = transport.push_connection();
        let (controller, buffer) = controller(transport);

        let status = controller.subscribe().await.unwrap();
        assert_eq!(status.mode, FeedMode::Connecting);

        body.send(frame(AAPL)).unwrap();
        body.send(frame(AAPL)).unwrap();
        settle().await;

        let status = controller.status().await.unwrap();
        assert_eq!(status.mode, FeedMode::Streaming);
        assert!(!status.is_synthetic);
        assert_eq!(status.live.as_ref().map(|t| t.price), Some(175.25));
        assert_eq!(buffer.read().await.len("AAPL"), 2);

        // grace and deadline were cancelled by the first message
        sleep(Duration::from_secs(10)).await;
        assert_eq!(controller.status().await.unwrap().mode, FeedMode::Streaming);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_falls_back_after_grace() {
        let transport = Arc::new(ScriptedTransport::new());
        let _body = transport.push_connection();
        let (controller, buffer) = controller(transport);

        controller.subscribe().await.unwrap();
        sleep(Duration::from_millis(1990)).await;
        assert_eq!(controller.status().await.unwrap().mode, FeedMode::Connecting);

        sleep(Duration::from_millis(20)).await;
        let status = controller.status().await.unwrap();
        assert_eq!(status.mode, FeedMode::Polling);
        assert!(!status.connector_open);
        assert!(status.polling);
        assert!(status.last_error.is_some());

        // first poll fires one interval after the fallback started
        sleep(Duration::from_millis(3000)).await;
        let status = controller.status().await.unwrap();
        assert!(status.is_synthetic);
        assert_eq!(status.live.map(|t| t.origin), Some(Origin::Synthetic));
        assert_eq!(total_ticks(&buffer).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_error_falls_back_and_ignores_late_message() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = transport.push_connection();
        let (controller, buffer) = controller(transport);

        controller.subscribe().await.unwrap();
        body.send(Err(FeedError::Connection("reset by peer".into()))).unwrap();
        settle().await;

        let status = controller.status().await.unwrap();
        assert_eq!(status.mode, FeedMode::Polling);
        assert!(status.last_error.unwrap().contains("reset by peer"));

        // connector is gone; anything it would have said is never recorded
        let _ = body.send(frame(AAPL));
        settle().await;
        assert_eq!(controller.status().await.unwrap().mode, FeedMode::Polling);
        assert_eq!(buffer.read().await.len("AAPL"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_falls_back_immediately() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_refusal();
        let (controller, _) = controller(transport);

        controller.subscribe().await.unwrap();
        settle().await;
        assert_eq!(controller.status().await.unwrap().mode, FeedMode::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_subscribe_leaves_one_connector() {
        let transport = Arc::new(ScriptedTransport::new());
        let first = transport.push_connection();
        let second = transport.push_connection();
        let (controller, buffer) = controller(transport.clone());

        controller.subscribe().await.unwrap();
        settle().await;
        let status = controller.subscribe().await.unwrap();
        assert_eq!(status.epoch, 2);
        assert!(status.connector_open);
        assert!(!status.polling);

        // the first connection was torn down, only the second one feeds
        let _ = first.send(frame(AAPL));
        second.send(frame(AAPL)).unwrap();
        settle().await;

        let status = controller.status().await.unwrap();
        assert_eq!(status.mode, FeedMode::Streaming);
        assert_eq!(buffer.read().await.len("AAPL"), 1);
        assert_eq!(transport.connects.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_twice_is_identical() {
        let transport = Arc::new(ScriptedTransport::new());
        let _body = transport.push_connection();
        let (controller, buffer) = controller(transport);

        controller.subscribe().await.unwrap();
        sleep(Duration::from_millis(5500)).await;
        assert_eq!(controller.status().await.unwrap().mode, FeedMode::Polling);

        let first = controller.unsubscribe().await.unwrap();
        let second = controller.unsubscribe().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.mode, FeedMode::Idle);
        assert!(!first.connector_open && !first.polling);

        let recorded = total_ticks(&buffer).await;
        sleep(Duration::from_secs(30)).await;
        assert_eq!(total_ticks(&buffer).await, recorded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_after_unsubscribe_restarts_connecting() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_refusal();
        let _body = transport.push_connection();
        let (controller, _) = controller(transport);

        controller.subscribe().await.unwrap();
        settle().await;
        controller.unsubscribe().await.unwrap();

        let status = controller.subscribe().await.unwrap();
        assert_eq!(status.mode, FeedMode::Connecting);
        assert!(status.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_clears_live_tick() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = transport.push_connection();
        let (controller, _) = controller(transport);

        controller.subscribe().await.unwrap();
        body.send(frame(AAPL)).unwrap();
        settle().await;
        assert_eq!(controller.status().await.unwrap().live.map(|t| t.price), Some(175.25));

        let status = controller.unsubscribe().await.unwrap();
        assert_eq!(status.mode, FeedMode::Idle);
        assert!(status.live.is_none());
        assert!(!status.is_synthetic);
        assert!(status.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signals_from_superseded_epochs_are_dropped() {
        let transport = Arc::new(ScriptedTransport::new());
        let _first = transport.push_connection();
        let _second = transport.push_connection();
        let buffer = HistoryBuffer::new().into_shared();
        let (controller, signals) = FeedController::spawn_with_signals(
            FeedSettings::default(),
            transport,
            Arc::new(SyntheticGenerator::seeded(11)),
            Arc::new(TickValidator::new()),
            buffer.clone(),
        );

        controller.subscribe().await.unwrap();
        controller.unsubscribe().await.unwrap();
        let status = controller.subscribe().await.unwrap();
        assert_eq!(status.epoch, 3);

        // late reports from the first subscription and from the unsubscribe gap
        for epoch in [1, 2] {
            signals
                .send(Signal::new(epoch, FeedEvent::MessageReceived(streamed("AAPL", 180.0))))
                .unwrap();
            signals
                .send(Signal::new(epoch, FeedEvent::ConnectionError("stale".into())))
                .unwrap();
        }
        settle().await;

        let status = controller.status().await.unwrap();
        assert_eq!(status.mode, FeedMode::Connecting);
        assert!(status.live.is_none());
        assert!(status.last_error.is_none());
        assert_eq!(total_ticks(&buffer).await, 0);

        // the current epoch still gets through
        signals
            .send(Signal::new(3, FeedEvent::MessageReceived(streamed("AAPL", 181.0))))
            .unwrap();
        settle().await;

        let status = controller.status().await.unwrap();
        assert_eq!(status.mode, FeedMode::Streaming);
        assert_eq!(status.live.map(|t| t.price), Some(181.0));
        assert_eq!(buffer.read().await.len("AAPL"), 1);
    }
}
