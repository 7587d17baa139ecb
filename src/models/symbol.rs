//! # models::symbol
//!
//! The fixed universe of tickers the dashboard tracks, together with the base
//! prices synthetic data is generated around.

/// Static description of one tracked ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolSpec {
    pub ticker: &'static str,
    /// Centre price for live synthetic ticks (polling fallback, loader fallback).
    pub live_base: f64,
    /// Centre price for the deterministic seed history of the store.
    pub seed_base: f64,
}

pub const KNOWN_SYMBOLS: &[SymbolSpec] = &[
    SymbolSpec { ticker: "AAPL",  live_base: 175.0,  seed_base: 150.0 },
    SymbolSpec { ticker: "GOOGL", live_base: 2850.0, seed_base: 2800.0 },
    SymbolSpec { ticker: "MSFT",  live_base: 415.0,  seed_base: 300.0 },
    SymbolSpec { ticker: "AMZN",  live_base: 3240.0, seed_base: 3200.0 },
    SymbolSpec { ticker: "TSLA",  live_base: 790.0,  seed_base: 800.0 },
];

/// Base price used for tickers outside [`KNOWN_SYMBOLS`].
pub const FALLBACK_BASE_PRICE: f64 = 100.0;

pub fn lookup(ticker: &str) -> Option<&'static SymbolSpec> {
    KNOWN_SYMBOLS
        .iter()
        .find(|s| s.ticker.eq_ignore_ascii_case(ticker))
}

pub fn tickers() -> impl Iterator<Item = &'static str> {
    KNOWN_SYMBOLS.iter().map(|s| s.ticker)
}

/// Live base price for any ticker, known or not.
pub fn live_base(ticker: &str) -> f64 {
    lookup(ticker).map(|s| s.live_base).unwrap_or(FALLBACK_BASE_PRICE)
}
