//! # engine::synthetic
//!
//! Locally generated market data, used wherever the real feed is unavailable:
//!
//! | Use                         | Shape                                            |
//! |-----------------------------|--------------------------------------------------|
//! | Polling fallback / push feed | 1 tick, random symbol, `live_base ± 2%`          |
//! | History loader fallback     | 20 ticks / symbol, 1 min apart, `live_base ± 2.5%` |
//! | Store seed                  | 100 ticks / symbol, 1 h apart, `seed_base ± 20%`  |
//!
//! Generators own a seeded `StdRng` so tests (and the store seed) are
//! reproducible.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Value};

use crate::models::{round_cents, symbol, Origin, SymbolSpec, Tick};

const LIVE_SPREAD: f64 = 0.02;
const FALLBACK_SPREAD: f64 = 0.025;
const SEED_SPREAD: f64 = 0.20;

const FALLBACK_POINTS: usize = 20;
const SEED_POINTS: usize = 100;

// ─── Live Tick Generator ──────────────────────────────────────────────────────

/// Pluggable source of raw tick payloads for the polling fallback.
///
/// Payloads are untyped on purpose: they go through the Tick Validator like
/// any other inbound data.
pub trait TickGenerator: Send + Sync + 'static {
    fn next_payload(&self) -> Value;
}

/// Random walk-free generator: every payload is drawn independently around the
/// symbol's live base price.
#[derive(Debug)]
pub struct SyntheticGenerator {
    rng:     Mutex<StdRng>,
    symbols: &'static [SymbolSpec],
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng:     Mutex::new(StdRng::seed_from_u64(seed)),
            symbols: symbol::KNOWN_SYMBOLS,
        }
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TickGenerator for SyntheticGenerator {
    fn next_payload(&self) -> Value {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let spec = self.symbols[rng.random_range(0..self.symbols.len())];

        json!({
            "id":        uuid::Uuid::new_v4().to_string(),
            "symbol":    spec.ticker,
            "price":     jitter(&mut *rng, spec.live_base, LIVE_SPREAD),
            "volume":    rng.random_range(1_000_000u64..51_000_000),
            "timestamp": Utc::now().to_rfc3339(),
        })
    }
}

// ─── Datasets ─────────────────────────────────────────────────────────────────

/// Stand-in history for one symbol when the history collaborator fails:
/// 20 points one minute apart, ending at `now`.
pub fn fallback_history(ticker: &str, now: DateTime<Utc>, rng: &mut impl Rng) -> Vec<Tick> {
    let base = symbol::live_base(ticker);
    let ticker = ticker.to_ascii_uppercase();

    (0..FALLBACK_POINTS)
        .map(|i| {
            let steps_back = (FALLBACK_POINTS - 1 - i) as i64;
            Tick {
                id:        uuid::Uuid::new_v4().to_string(),
                symbol:    ticker.clone(),
                price:     jitter(rng, base, FALLBACK_SPREAD),
                volume:    rng.random_range(1_000_000u64..51_000_000),
                timestamp: now - Duration::minutes(steps_back),
                origin:    Origin::Synthetic,
            }
        })
        .collect()
}

/// Deterministic seed history for every known symbol: 100 points one hour
/// apart ending at `now`, ascending by timestamp. Ids are sequential.
pub fn seed_history(seed: u64, now: DateTime<Utc>) -> Vec<Tick> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(symbol::KNOWN_SYMBOLS.len() * SEED_POINTS);

    for spec in symbol::KNOWN_SYMBOLS {
        for i in 0..SEED_POINTS {
            let steps_back = (SEED_POINTS - 1 - i) as i64;
            out.push(Tick {
                id:        (out.len() + 1).to_string(),
                symbol:    spec.ticker.to_string(),
                price:     jitter(&mut rng, spec.seed_base, SEED_SPREAD),
                volume:    rng.random_range(100_000u64..1_100_000),
                timestamp: now - Duration::hours(steps_back),
                origin:    Origin::Synthetic,
            });
        }
    }

    out
}

/// `base ± spread·base`, uniformly, rounded to cents and never negative.
fn jitter(rng: &mut impl Rng, base: f64, spread: f64) -> f64 {
    let offset = rng.random_range(-spread..=spread);
    round_cents(base * (1.0 + offset)).max(0.0)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
