//! # engine::buffer
//!
//! **History Buffer** — bounded per-symbol FIFO of validated ticks.
//!
//! Arrival order is preserved, not wall-clock order: a late tick with an older
//! timestamp is still appended at the back.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::Tick;

/// Ticks kept per symbol.
pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    series:   HashMap<String, VecDeque<Tick>>,
}

/// The buffer as shared between the feed controller, the history loader and
/// request handlers.
pub type SharedBuffer = Arc<RwLock<HistoryBuffer>>;

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series:   HashMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedBuffer {
        Arc::new(RwLock::new(self))
    }

    /// Append one tick, evicting the oldest entry once over capacity.
    pub fn append(&mut self, symbol: &str, tick: Tick) {
        let entry = self
            .series
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity + 1));

        entry.push_back(tick);
        while entry.len() > self.capacity {
            entry.pop_front();
        }
    }

    /// Replace a symbol's whole history. Only the last `capacity` ticks of the
    /// given sequence are kept, in the given order.
    pub fn replace(&mut self, symbol: &str, ticks: Vec<Tick>) {
        let skip = ticks.len().saturating_sub(self.capacity);
        let kept: VecDeque<Tick> = ticks.into_iter().skip(skip).collect();
        self.series.insert(symbol.to_string(), kept);
    }

    /// Owned copy of a symbol's history, oldest first. Empty if unknown.
    pub fn snapshot(&self, symbol: &str) -> Vec<Tick> {
        self.series
            .get(symbol)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.series.get(symbol).map(VecDeque::len).unwrap_or(0)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self.series.keys().cloned().collect();
        out.sort();
        out
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
