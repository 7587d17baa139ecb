//! # config — runtime settings from environment variables
//!
//! Every value has a default; a value that is present but unparsable is a
//! startup error rather than a silent fallback.

use std::time::Duration;

use anyhow::{bail, Context};

use crate::engine::controller::{FeedSettings, DEFAULT_DEADLINE, DEFAULT_GRACE};
use crate::engine::loader::DEFAULT_HISTORY_TIMEOUT;
use crate::engine::polling::DEFAULT_POLL_INTERVAL;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address Axum listens on.
    pub bind_addr:          String,
    /// SSE endpoint the feed controller connects to.
    pub feed_url:           String,
    /// Base URL of the bulk history collaborator.
    pub history_base_url:   String,
    pub feed_grace:         Duration,
    pub feed_deadline:      Duration,
    pub poll_interval:      Duration,
    pub history_timeout:    Duration,
    /// Spacing between events on `/api/live`.
    pub live_emit_interval: Duration,
    /// `/api/live` streams are closed after this long.
    pub live_idle_ceiling:  Duration,
    /// When false, `/api/stocks` answers with the mock-data envelope.
    pub store_enabled:      bool,
    pub seed_rng_seed:      u64,
    /// Subscribe the feed controller at startup.
    pub feed_autostart:     bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let millis = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            Ok(Duration::from_millis(number(&lookup, key, default.as_millis() as u64)?))
        };

        let feed_grace = millis("FEED_GRACE_MS", DEFAULT_GRACE)?;
        let feed_deadline = millis("FEED_DEADLINE_MS", DEFAULT_DEADLINE)?;
        if feed_grace.is_zero() || feed_deadline.is_zero() {
            bail!("FEED_GRACE_MS and FEED_DEADLINE_MS must be greater than zero");
        }

        let poll_interval = millis("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL)?;
        let live_emit_interval = millis("LIVE_EMIT_INTERVAL_MS", Duration::from_millis(3000))?;
        if poll_interval.is_zero() || live_emit_interval.is_zero() {
            bail!("POLL_INTERVAL_MS and LIVE_EMIT_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            bind_addr:          text("BIND_ADDR", "0.0.0.0:3000"),
            feed_url:           text("FEED_URL", "http://127.0.0.1:3000/api/live"),
            history_base_url:   text("HISTORY_BASE_URL", "http://127.0.0.1:3000"),
            feed_grace,
            feed_deadline,
            poll_interval,
            history_timeout:    millis("HISTORY_TIMEOUT_MS", DEFAULT_HISTORY_TIMEOUT)?,
            live_emit_interval,
            live_idle_ceiling:  Duration::from_secs(number(&lookup, "LIVE_IDLE_CEILING_SECS", 600)?),
            store_enabled:      flag(&lookup, "STORE_ENABLED", true)?,
            seed_rng_seed:      number(&lookup, "SEED_RNG_SEED", 42)?,
            feed_autostart:     flag(&lookup, "FEED_AUTOSTART", true)?,
        })
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            grace:         self.feed_grace,
            deadline:      self.feed_deadline,
            poll_interval: self.poll_interval,
        }
    }
}

fn number(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> anyhow::Result<u64> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
        None => Ok(default),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> anyhow::Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got '{other}'"),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.feed_grace, Duration::from_millis(2000));
        assert_eq!(cfg.feed_deadline, Duration::from_millis(5000));
        assert_eq!(cfg.poll_interval, Duration::from_millis(3000));
        assert_eq!(cfg.live_idle_ceiling, Duration::from_secs(600));
        assert!(cfg.store_enabled);
        assert!(cfg.feed_autostart);
        assert_eq!(cfg.seed_rng_seed, 42);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[("POLL_INTERVAL_MS", "500"), ("STORE_ENABLED", "off")]).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
        assert!(!cfg.store_enabled);
        assert_eq!(cfg.feed_settings().poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_malformed_values_are_errors() {
        let err = config(&[("FEED_GRACE_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("FEED_GRACE_MS"));

        assert!(config(&[("FEED_AUTOSTART", "maybe")]).is_err());
        assert!(config(&[("POLL_INTERVAL_MS", "0")]).is_err());
    }
}
