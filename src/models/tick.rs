//! # models::tick
//!
//! Defines [`Tick`], the validated market-data observation that every part of
//! the feed works with once a raw payload has passed the Tick Validator.
//!
//! A `Tick` is never built straight from network input: the validator in
//! `engine::validator` is the only place that turns untyped JSON into one.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a tick came from.
///
/// The receiving path decides this, never the payload: the push stream yields
/// `Streamed`, the polling fallback and every locally generated dataset yield
/// `Synthetic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Streamed,
    Synthetic,
}

impl Origin {
    #[inline]
    pub fn is_synthetic(self) -> bool {
        matches!(self, Origin::Synthetic)
    }
}

/// A single validated market-data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    /// Opaque identifier. Integer ids from the wire are kept as their decimal
    /// string form.
    pub id: String,

    /// Upper-cased ticker, e.g. `"AAPL"`. Never empty.
    pub symbol: String,

    /// Non-negative, rounded to 2 fractional digits.
    pub price: f64,

    pub volume: u64,

    /// UTC instant the observation was recorded at the source.
    pub timestamp: DateTime<Utc>,

    pub origin: Origin,
}

impl Tick {
    /// Wire representation used by the push feed and the history endpoint:
    /// `{id, symbol, price, volume, timestamp}` without the receiver-side origin.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({
            "id":        self.id,
            "symbol":    self.symbol,
            "price":     self.price,
            "volume":    self.volume,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}

/// Round half away from zero to 2 fractional digits.
#[inline]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
