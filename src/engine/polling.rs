//! # engine::polling
//!
//! **Polling Fallback** — a repeating timer that turns generator payloads into
//! synthetic ticks while the push stream is unhealthy.
//!
//! The first firing happens one full interval after `start()`, matching a
//! classic interval timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::synthetic::TickGenerator;
use crate::engine::validator::TickValidator;
use crate::events::{FeedEvent, Signal, SignalSender};
use crate::models::Origin;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug)]
pub struct PollingFallback {
    task:     Option<JoinHandle<()>>,
    interval: Duration,
    epoch:    u64,
}

impl PollingFallback {
    pub fn start(
        interval:  Duration,
        generator: Arc<dyn TickGenerator>,
        validator: Arc<TickValidator>,
        epoch:     u64,
        signals:   SignalSender,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let payload = generator.next_payload();
                let Some(tick) = validator.admit(&payload, Origin::Synthetic) else {
                    continue;
                };
                debug!(epoch, symbol = %tick.symbol, price = tick.price, "Polled tick");

                if signals
                    .send(Signal::new(epoch, FeedEvent::PolledTick(tick)))
                    .is_err()
                {
                    break;
                }
            }
        });

        info!(epoch, interval_ms = interval.as_millis() as u64, "⏱️ Polling fallback started");
        Self {
            task: Some(task),
            interval,
            epoch,
        }
    }

    /// Cancel the timer. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!(
                epoch = self.epoch,
                interval_ms = self.interval.as_millis() as u64,
                "Polling fallback stopped"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

}

impl Drop for PollingFallback {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::synthetic::SyntheticGenerator;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_per_interval_with_synthetic_origin() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _poller = PollingFallback::start(
            Duration::from_millis(3000),
            Arc::new(SyntheticGenerator::seeded(5)),
            Arc::new(TickValidator::new()),
            9,
            tx,
        );

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let signal = rx.try_recv().expect("first tick after one interval");
        assert_eq!(signal.epoch, 9);
        match signal.event {
            FeedEvent::PolledTick(tick) => assert_eq!(tick.origin, Origin::Synthetic),
            other => panic!("unexpected event {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(6000)).await;
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_silences_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = PollingFallback::start(
            Duration::from_millis(100),
            Arc::new(SyntheticGenerator::seeded(5)),
            Arc::new(TickValidator::new()),
            1,
            tx,
        );

        poller.stop();
        poller.stop();
        assert!(!poller.is_running());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(rx.try_recv().is_err());
    }
}
