//! # engine::loader
//!
//! **History Loader** — bulk-loads a symbol's recent history into the
//! [`HistoryBuffer`](crate::engine::buffer::HistoryBuffer).
//!
//! The fetch races a fixed timeout. Whatever happens, `load()` returns a
//! dataset: on any failure a locally generated one is substituted and flagged
//! with `is_synthetic`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::{future::BoxFuture, FutureExt};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::buffer::SharedBuffer;
use crate::engine::synthetic::fallback_history;
use crate::engine::validator::TickValidator;
use crate::error::{FeedError, ValidationError};
use crate::models::{Origin, Tick};

pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_millis(5000);

// ─── Source Seam ──────────────────────────────────────────────────────────────

/// Raw records as returned by a history collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPayload {
    pub records: Vec<Value>,
    /// Set when the collaborator answered with its degrade envelope.
    pub is_mock: bool,
    pub message: Option<String>,
}

pub trait HistorySource: Send + Sync + 'static {
    fn fetch(&self, symbol: &str) -> BoxFuture<'static, Result<HistoryPayload, FeedError>>;
}

/// `GET {base_url}/api/stocks/{symbol}`.
#[derive(Debug, Clone)]
pub struct HttpHistorySource {
    client:   reqwest::Client,
    base_url: String,
}

impl HttpHistorySource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl HistorySource for HttpHistorySource {
    fn fetch(&self, symbol: &str) -> BoxFuture<'static, Result<HistoryPayload, FeedError>> {
        let client = self.client.clone();
        let url = format!("{}/api/stocks/{}", self.base_url, symbol);

        async move {
            let body: Value = client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            parse_history_body(body)
        }
        .boxed()
    }
}

/// Accepts either a bare JSON array of ticks or the degrade envelope
/// `{ data, isMockData, message }`.
pub fn parse_history_body(body: Value) -> Result<HistoryPayload, FeedError> {
    match body {
        Value::Array(records) => Ok(HistoryPayload {
            records,
            ..HistoryPayload::default()
        }),
        Value::Object(mut envelope) => {
            let records = match envelope.remove("data") {
                Some(Value::Array(records)) => records,
                _ => {
                    return Err(ValidationError::Malformed(
                        "history envelope without a data array".into(),
                    )
                    .into())
                }
            };
            Ok(HistoryPayload {
                records,
                is_mock: envelope
                    .get("isMockData")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                message: envelope
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        }
        _ => Err(ValidationError::Malformed("history body is neither array nor envelope".into()).into()),
    }
}

// ─── Loader ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub symbol:       String,
    pub ticks:        Vec<Tick>,
    pub is_synthetic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message:      Option<String>,
}

pub struct HistoryLoader {
    source:    Arc<dyn HistorySource>,
    validator: Arc<TickValidator>,
    buffer:    SharedBuffer,
    timeout:   Duration,
    rng:       Mutex<StdRng>,
}

impl HistoryLoader {
    pub fn new(
        source:    Arc<dyn HistorySource>,
        validator: Arc<TickValidator>,
        buffer:    SharedBuffer,
        timeout:   Duration,
    ) -> Self {
        Self {
            source,
            validator,
            buffer,
            timeout,
            rng: Mutex::new(StdRng::seed_from_u64(rand::random())),
        }
    }

    /// Fetch, validate and install a symbol's history. Never fails.
    pub async fn load(&self, symbol: &str) -> LoadResult {
        let symbol = symbol.trim().to_ascii_uppercase();

        let outcome = match tokio::time::timeout(self.timeout, self.source.fetch(&symbol)).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(self.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(payload) => self.install(symbol, payload).await,
            Err(e) => self.substitute(symbol, e).await,
        }
    }

    async fn install(&self, symbol: String, payload: HistoryPayload) -> LoadResult {
        let origin = if payload.is_mock { Origin::Synthetic } else { Origin::Streamed };
        let received = payload.records.len();
        let ticks: Vec<Tick> = payload
            .records
            .iter()
            .filter_map(|record| self.validator.admit(record, origin))
            .filter(|tick| tick.symbol == symbol)
            .collect();

        if payload.is_mock {
            warn!(%symbol, message = ?payload.message, "History collaborator returned mock data");
        }
        info!(
            %symbol,
            received,
            kept = ticks.len(),
            synthetic = payload.is_mock,
            "📚 History loaded"
        );

        self.buffer.write().await.replace(&symbol, ticks.clone());
        LoadResult {
            symbol,
            ticks,
            is_synthetic: payload.is_mock,
            message: payload.message,
        }
    }

    async fn substitute(&self, symbol: String, error: FeedError) -> LoadResult {
        warn!(%symbol, %error, "⚠️ History load failed, using synthetic dataset");

        let ticks = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            fallback_history(&symbol, Utc::now(), &mut *rng)
        };

        self.buffer.write().await.replace(&symbol, ticks.clone());
        LoadResult {
            symbol,
            ticks,
            is_synthetic: true,
            message: Some(error.to_string()),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::buffer::HistoryBuffer;
    use serde_json::json;

    pub(crate) enum Script {
        Body(Value),
        Fail,
        Hang,
    }

    pub(crate) struct ScriptedSource(pub(crate) Script);

    impl HistorySource for ScriptedSource {
        fn fetch(&self, _symbol: &str) -> BoxFuture<'static, Result<HistoryPayload, FeedError>> {
            let next = match &self.0 {
                Script::Body(body) => Some(parse_history_body(body.clone())),
                Script::Fail => Some(Err(FeedError::Connection("refused".into()))),
                Script::Hang => None,
            };
            async move {
                match next {
                    Some(result) => result,
                    None => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(HistoryPayload::default())
                    }
                }
            }
            .boxed()
        }
    }

    fn loader(script: Script) -> (HistoryLoader, SharedBuffer) {
        let buffer = HistoryBuffer::new().into_shared();
        let loader = HistoryLoader::new(
            Arc::new(ScriptedSource(script)),
            Arc::new(TickValidator::new()),
            buffer.clone(),
            DEFAULT_HISTORY_TIMEOUT,
        );
        (loader, buffer)
    }

    fn record(price: f64) -> Value {
        json!({
            "id": 1,
            "stock_symbol": "MSFT",
            "price": price,
            "volume": 1000,
            "timestamp": "2024-03-01T10:00:00Z",
        })
    }

    #[tokio::test]
    async fn test_array_replaces_buffer_and_drops_invalid() {
        let body = json!([record(410.0), {"symbol": "MSFT", "price": "n/a"}, record(411.5)]);
        let (loader, buffer) = loader(Script::Body(body));
        let stale = crate::engine::validator::validate(&record(1.0), Origin::Streamed).unwrap();
        buffer.write().await.append("MSFT", stale);

        let result = loader.load("msft").await;

        assert!(!result.is_synthetic);
        assert_eq!(result.symbol, "MSFT");
        assert_eq!(result.ticks.len(), 2);
        let stored: Vec<f64> = buffer.read().await.snapshot("MSFT").iter().map(|t| t.price).collect();
        assert_eq!(stored, vec![410.0, 411.5]);
    }

    #[tokio::test]
    async fn test_records_for_other_symbols_are_not_filed() {
        let body = json!([
            record(410.0),
            {"id": 2, "symbol": "aapl", "price": 175.0, "volume": 5, "timestamp": "2024-03-01T10:01:00Z"},
            record(412.0),
        ]);
        let (loader, buffer) = loader(Script::Body(body));

        let result = loader.load("MSFT").await;

        assert_eq!(result.ticks.len(), 2);
        assert!(result.ticks.iter().all(|t| t.symbol == "MSFT"));
        let stored: Vec<f64> = buffer.read().await.snapshot("MSFT").iter().map(|t| t.price).collect();
        assert_eq!(stored, vec![410.0, 412.0]);
        assert!(buffer.read().await.snapshot("AAPL").is_empty());
    }

    #[tokio::test]
    async fn test_mock_envelope_is_synthetic() {
        let body = json!({
            "data": [record(400.0)],
            "isMockData": true,
            "message": "Database connection failed. Displaying mock data.",
        });
        let (loader, buffer) = loader(Script::Body(body));

        let result = loader.load("MSFT").await;

        assert!(result.is_synthetic);
        assert!(result.ticks.iter().all(|t| t.origin == Origin::Synthetic));
        assert_eq!(buffer.read().await.len("MSFT"), 1);
        assert!(result.message.is_some());
    }

    #[tokio::test]
    async fn test_failure_substitutes_synthetic_dataset() {
        let (loader, buffer) = loader(Script::Fail);

        let result = loader.load("TSLA").await;

        assert!(result.is_synthetic);
        assert_eq!(result.ticks.len(), 20);
        assert_eq!(buffer.read().await.snapshot("TSLA"), result.ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_substitutes_synthetic_dataset() {
        let (loader, _) = loader(Script::Hang);

        let started = tokio::time::Instant::now();
        let result = loader.load("AAPL").await;

        assert!(result.is_synthetic);
        assert!(started.elapsed() >= DEFAULT_HISTORY_TIMEOUT);
        assert!(started.elapsed() < DEFAULT_HISTORY_TIMEOUT + Duration::from_millis(10));
        assert!(result.message.unwrap().contains("5000"));
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert!(parse_history_body(json!("nope")).is_err());
        assert!(parse_history_body(json!({"isMockData": true})).is_err());

        let payload = parse_history_body(json!({"data": [], "isMockData": true})).unwrap();
        assert!(payload.is_mock && payload.records.is_empty());
    }
}
