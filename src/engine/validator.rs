//! # engine::validator
//!
//! **Tick Validator** — the boundary between untyped feed payloads and the
//! strict [`Tick`] record.
//!
//! ```text
//! raw JSON ──▶ symbol? ──▶ price? ──▶ volume? ──▶ timestamp? ──▶ Tick
//!                 │           │           │             │
//!                 └───────────┴───────────┴─────────────┴──▶ rejected (counted)
//! ```
//!
//! Rejections never escape to the caller of [`TickValidator::admit`]; they are
//! counted and logged at `debug`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::ValidationError;
use crate::models::{round_cents, Origin, Tick};

/// Stateless rules plus two counters for status reporting.
#[derive(Debug, Default)]
pub struct TickValidator {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ValidatorStats {
    pub accepted: u64,
    pub rejected: u64,
}

impl TickValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and count. `None` means the payload was dropped.
    pub fn admit(&self, payload: &Value, origin: Origin) -> Option<Tick> {
        match validate(payload, origin) {
            Ok(tick) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Some(tick)
            }
            Err(reason) => {
                self.record_rejection(&reason);
                None
            }
        }
    }

    /// Same as [`admit`](Self::admit) for a raw text frame.
    pub fn admit_text(&self, text: &str, origin: Origin) -> Option<Tick> {
        match serde_json::from_str::<Value>(text) {
            Ok(payload) => self.admit(&payload, origin),
            Err(e) => {
                self.record_rejection(&ValidationError::Malformed(e.to_string()));
                None
            }
        }
    }

    pub fn stats(&self) -> ValidatorStats {
        ValidatorStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn record_rejection(&self, reason: &ValidationError) {
        let total = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(%reason, rejected_total = total, "Tick rejected");
    }
}

// ─── Rules ────────────────────────────────────────────────────────────────────

/// Pure validation of one payload.
pub fn validate(payload: &Value, origin: Origin) -> Result<Tick, ValidationError> {
    let obj = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    let symbol = obj
        .get("symbol")
        .or_else(|| obj.get("stock_symbol"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingSymbol)?
        .to_ascii_uppercase();

    let price = obj
        .get("price")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite())
        .ok_or(ValidationError::InvalidPrice)?;
    if price < 0.0 {
        return Err(ValidationError::NegativePrice);
    }

    let volume = obj
        .get("volume")
        .and_then(integral_volume)
        .ok_or(ValidationError::InvalidVolume)?;

    let timestamp = match obj.get("timestamp") {
        None | Some(Value::Null) => Utc::now(),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ValidationError::InvalidTimestamp(raw.clone()))?,
        Some(other) => return Err(ValidationError::InvalidTimestamp(other.to_string())),
    };

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    };

    Ok(Tick {
        id,
        symbol,
        price: round_cents(price),
        volume,
        timestamp,
        origin,
    })
}

/// `1200` and `1200.0` are both integral; `12.5`, `-3` and `NaN` are not.
fn integral_volume(value: &Value) -> Option<u64> {
    if let Some(v) = value.as_u64() {
        return Some(v);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
