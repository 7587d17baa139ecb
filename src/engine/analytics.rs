//! # engine::analytics
//!
//! **Analytics Engine** — pure, chart-ready views over buffer snapshots.
//!
//! Every function here is deterministic over its input: the same snapshot
//! always yields the same view, regardless of how often it is asked for.
//!
//! ## Histogram binning
//! ```text
//! n == 0        → 5 placeholder bins 0-20 … 80-100, all zero
//! min == max    → 1 bin labelled with the price, count n
//! otherwise     → bins  = clamp(ceil(n / 5), 3, 10)
//!                 width = (max - min) / bins
//!                 index = min(floor((p - min) / width), bins - 1)
//! ```

use serde::Serialize;

use crate::models::Tick;

const PLACEHOLDER_BINS: usize = 5;
const PLACEHOLDER_WIDTH: f64 = 20.0;
const MIN_BINS: usize = 3;
const MAX_BINS: usize = 10;
const TICKS_PER_BIN: usize = 5;

// ─── View Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePoint {
    /// `HH:MM:SS` of the tick timestamp (UTC).
    pub timestamp: String,
    pub price:     f64,
    pub volume:    u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub price:     f64,
    pub volume:    u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolVolume {
    pub symbol:     String,
    pub avg_volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    /// `"lower-upper"`, or the single price when every price is equal.
    pub range:     String,
    pub count:     usize,
    pub min_price: f64,
    pub max_price: f64,
}

// ─── Series ───────────────────────────────────────────────────────────────────

pub fn line_series(snapshot: &[Tick]) -> Vec<LinePoint> {
    snapshot
        .iter()
        .map(|t| LinePoint {
            timestamp: t.timestamp.format("%H:%M:%S").to_string(),
            price:     t.price,
            volume:    t.volume,
        })
        .collect()
}

pub fn scatter_series(snapshot: &[Tick]) -> Vec<ScatterPoint> {
    snapshot
        .iter()
        .map(|t| ScatterPoint {
            price:     t.price,
            volume:    t.volume,
            timestamp: t.timestamp,
        })
        .collect()
}

/// Mean volume per symbol, rounded to the nearest integer, in input order.
pub fn average_volume_by_symbol<'a, I>(series: I) -> Vec<SymbolVolume>
where
    I: IntoIterator<Item = (&'a str, &'a [Tick])>,
{
    series
        .into_iter()
        .map(|(symbol, ticks)| {
            let avg_volume = if ticks.is_empty() {
                0
            } else {
                let total: u128 = ticks.iter().map(|t| u128::from(t.volume)).sum();
                (total as f64 / ticks.len() as f64).round() as u64
            };
            SymbolVolume {
                symbol: symbol.to_string(),
                avg_volume,
            }
        })
        .collect()
}

// ─── Histogram ────────────────────────────────────────────────────────────────

pub fn price_histogram(snapshot: &[Tick]) -> Vec<HistogramBin> {
    let prices: Vec<f64> = snapshot.iter().map(|t| t.price).collect();
    histogram_of(&prices)
}

/// Histogram over raw prices; [`price_histogram`] is this over a snapshot.
pub fn histogram_of(prices: &[f64]) -> Vec<HistogramBin> {
    if prices.is_empty() {
        return (0..PLACEHOLDER_BINS)
            .map(|i| {
                let lower = i as f64 * PLACEHOLDER_WIDTH;
                let upper = lower + PLACEHOLDER_WIDTH;
                HistogramBin {
                    range:     format!("{}-{}", label(lower), label(upper)),
                    count:     0,
                    min_price: lower,
                    max_price: upper,
                }
            })
            .collect();
    }

    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return vec![HistogramBin {
            range:     label(min),
            count:     prices.len(),
            min_price: min,
            max_price: max,
        }];
    }

    let bin_count = prices
        .len()
        .div_ceil(TICKS_PER_BIN)
        .clamp(MIN_BINS, MAX_BINS);
    let width = (max - min) / bin_count as f64;

    let mut bins: Vec<HistogramBin> = (0..bin_count)
        .map(|i| {
            let lower = min + i as f64 * width;
            let upper = min + (i + 1) as f64 * width;
            HistogramBin {
                range:     format!("{}-{}", label(lower), label(upper)),
                count:     0,
                min_price: lower,
                max_price: upper,
            }
        })
        .collect();

    for price in prices {
        let index = (((price - min) / width).floor() as usize).min(bin_count - 1);
        bins[index].count += 1;
    }

    bins
}

/// Integer label, rounding half away from zero.
fn label(value: f64) -> String {
    format!("{}", value.round() as i64)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
