//! # engine::connector
//!
//! **Stream Connector** — owns one push connection to the live feed.
//!
//! ```text
//! open() ──▶ spawn task ──▶ transport.connect()
//!                               │ Err ─────────────────────▶ ConnectionError
//!                               ▼
//!                          chunk stream ──▶ SseDecoder ──▶ TickValidator
//!                               │                               │ Some(tick)
//!                               │ Err / end of stream           ▼
//!                               └──────▶ ConnectionError   MessageReceived
//! ```
//!
//! The connector only reports; deciding what a failure means (and closing the
//! connector) is the controller's job. Liveness timers live in the controller
//! too so that a timer and a message are resolved in one serialized handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{future::BoxFuture, stream::BoxStream, FutureExt, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::sse::SseDecoder;
use crate::engine::validator::TickValidator;
use crate::error::FeedError;
use crate::events::{FeedEvent, Signal, SignalSender};
use crate::models::Origin;

/// Byte chunks of an open event stream.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, FeedError>>;

// ─── Transport Seam ───────────────────────────────────────────────────────────

/// Something that can open a server-sent-event stream.
pub trait FeedTransport: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'static, Result<ChunkStream, FeedError>>;
}

/// `GET <url>` with `Accept: text/event-stream`, streaming the response body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url:    String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

impl FeedTransport for HttpTransport {
    fn connect(&self) -> BoxFuture<'static, Result<ChunkStream, FeedError>> {
        let client = self.client.clone();
        let url = self.url.clone();

        async move {
            let response = client
                .get(&url)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await?
                .error_for_status()?;

            info!(%url, "📡 Live feed connection opened");

            let chunks = response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(FeedError::from))
                .boxed();
            Ok::<ChunkStream, FeedError>(chunks)
        }
        .boxed()
    }
}

// ─── Connector ────────────────────────────────────────────────────────────────

/// Owned handle to one open (or opening) push connection.
#[derive(Debug)]
pub struct StreamConnector {
    task:         Option<JoinHandle<()>>,
    saw_message:  Arc<AtomicBool>,
    epoch:        u64,
}

impl StreamConnector {
    /// Start connecting in the background. Every validated tick and the first
    /// failure are sent to `signals` stamped with `epoch`.
    pub fn open(
        transport: Arc<dyn FeedTransport>,
        validator: Arc<TickValidator>,
        epoch:     u64,
        signals:   SignalSender,
    ) -> Self {
        let saw_message = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_message);

        let task = tokio::spawn(async move {
            let reason = match run_stream(transport, &validator, epoch, &signals, &flag).await {
                Ok(()) => "live feed closed by server".to_string(),
                Err(e) => e.to_string(),
            };
            // Receiver gone means the controller has shut down.
            let _ = signals.send(Signal::new(epoch, FeedEvent::ConnectionError(reason)));
        });

        debug!(epoch, "Stream connector opened");
        Self {
            task: Some(task),
            saw_message,
            epoch,
        }
    }

    /// Abort the connection task. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(epoch = self.epoch, "Stream connector closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.task.is_some()
    }

    /// Whether at least one valid message has arrived on this connection.
    pub fn saw_message(&self) -> bool {
        self.saw_message.load(Ordering::Acquire)
    }
}

impl Drop for StreamConnector {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_stream(
    transport: Arc<dyn FeedTransport>,
    validator: &TickValidator,
    epoch:     u64,
    signals:   &SignalSender,
    saw_message: &AtomicBool,
) -> Result<(), FeedError> {
    let mut chunks = transport.connect().await?;
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| {
            warn!(epoch, error = %e, "Live feed transport error");
            e
        })?;

        for data in decoder.push(&chunk) {
            let Some(tick) = validator.admit_text(&data, Origin::Streamed) else {
                continue;
            };
            saw_message.store(true, Ordering::Release);
            debug!(epoch, symbol = %tick.symbol, price = tick.price, "SSE tick");

            if signals
                .send(Signal::new(epoch, FeedEvent::MessageReceived(tick)))
                .is_err()
            {
                return Ok(());
            }
        }
    }

    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// In-memory transport: each `connect()` hands out the next scripted
    /// connection, or fails once the script is exhausted.
    pub(crate) struct ScriptedTransport {
        connections: Mutex<Vec<Result<mpsc::UnboundedReceiver<Result<Vec<u8>, FeedError>>, FeedError>>>,
        pub(crate) connects: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self {
                connections: Mutex::new(Vec::new()),
                connects:    std::sync::atomic::AtomicUsize::new(0),
            }
        }

        /// Queue a connection; the returned sender feeds its body.
        pub(crate) fn push_connection(&self) -> mpsc::UnboundedSender<Result<Vec<u8>, FeedError>> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.connections.lock().unwrap().insert(0, Ok(rx));
            tx
        }

        pub(crate) fn push_refusal(&self) {
            self.connections
                .lock()
                .unwrap()
                .insert(0, Err(FeedError::Connection("refused".into())));
        }
    }

    impl FeedTransport for ScriptedTransport {
        fn connect(&self) -> BoxFuture<'static, Result<ChunkStream, FeedError>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let next = self
                .connections
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(FeedError::Connection("no scripted connection".into())));

            async move {
                let rx = next?;
                let body = stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok::<ChunkStream, FeedError>(body.boxed())
            }
            .boxed()
        }
    }

    pub(crate) fn frame(json: &str) -> Result<Vec<u8>, FeedError> {
        Ok(format!("data: {json}\n\n").into_bytes())
    }

    #[tokio::test]
    async fn test_valid_messages_are_forwarded_and_invalid_counted() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = transport.push_connection();
        let validator = Arc::new(TickValidator::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let connector = StreamConnector::open(transport.clone(), validator.clone(), 3, tx);

        body.send(frame(r#"{"symbol":"AAPL","price":"bad","volume":1}"#)).unwrap();
        body.send(frame(r#"{"symbol":"AAPL","price":175.5,"volume":10}"#)).unwrap();

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.epoch, 3);
        match signal.event {
            FeedEvent::MessageReceived(tick) => {
                assert_eq!(tick.symbol, "AAPL");
                assert_eq!(tick.origin, Origin::Streamed);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(connector.saw_message());
        assert_eq!(validator.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_refusal();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let connector = StreamConnector::open(transport, Arc::new(TickValidator::new()), 1, tx);

        let signal = rx.recv().await.unwrap();
        assert!(matches!(signal.event, FeedEvent::ConnectionError(_)));
        assert!(!connector.saw_message());
    }

    #[tokio::test]
    async fn test_end_of_stream_reports_error() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = transport.push_connection();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _connector = StreamConnector::open(transport, Arc::new(TickValidator::new()), 1, tx);
        drop(body);

        let signal = rx.recv().await.unwrap();
        assert!(matches!(signal.event, FeedEvent::ConnectionError(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        let _body = transport.push_connection();
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut connector = StreamConnector::open(transport, Arc::new(TickValidator::new()), 1, tx);
        assert!(connector.is_open());
        connector.close();
        connector.close();
        assert!(!connector.is_open());
    }
}
