//! # store — in-memory tick store behind `/api/stocks` and `/api/seed`
//!
//! Plays the role of the persistent history collaborator. When disabled
//! (`STORE_ENABLED=false`) the bulk endpoint answers with the degrade
//! envelope built from deterministic mock data instead.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::engine::synthetic::seed_history;
use crate::models::Tick;

/// Rows returned per symbol by [`TickStore::recent`].
pub const RECENT_LIMIT: usize = 100;

#[derive(Debug)]
pub struct TickStore {
    enabled: bool,
    rows:    RwLock<Vec<Tick>>,
}

impl TickStore {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replace all rows with a freshly generated seed dataset. Returns the
    /// number of rows written.
    pub async fn seed(&self, seed: u64, now: DateTime<Utc>) -> usize {
        let rows = seed_history(seed, now);
        let created = rows.len();
        *self.rows.write().await = rows;

        info!(created, seed, "🌱 Store seeded");
        created
    }

    /// The most recent `limit` rows for `symbol`, ascending by timestamp.
    pub async fn recent(&self, symbol: &str, limit: usize) -> Vec<Tick> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Tick> = rows
            .iter()
            .filter(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .collect();

        matching.sort_by_key(|t| t.timestamp);
        let skip = matching.len().saturating_sub(limit);
        matching.split_off(skip)
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_seed_replaces_previous_rows() {
        let store = TickStore::new(true);
        let now = Utc::now();

        let first = store.seed(1, now).await;
        let second = store.seed(2, now).await;

        assert_eq!(first, 500);
        assert_eq!(second, 500);
        assert_eq!(store.count().await, 500);
    }

    #[tokio::test]
    async fn test_recent_is_latest_window_ascending() {
        let store = TickStore::new(true);
        let now = Utc::now();
        store.seed(42, now).await;

        let rows = store.recent("aapl", RECENT_LIMIT).await;
        assert_eq!(rows.len(), RECENT_LIMIT);
        assert!(rows.iter().all(|t| t.symbol == "AAPL"));
        assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let window = store.recent("AAPL", 10).await;
        assert_eq!(window.len(), 10);
        assert_eq!(window.first().map(|t| t.timestamp), Some(now - Duration::hours(9)));
        assert_eq!(window.last().map(|t| t.timestamp), Some(now));

        assert!(store.recent("NOPE", RECENT_LIMIT).await.is_empty());
    }
}
