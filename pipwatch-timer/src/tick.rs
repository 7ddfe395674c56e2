//! Tick schedulers: the "wait for next frame" seam of the update loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

/// Repeating timing signal consumed by the update loop.
#[async_trait]
pub trait TickScheduler: Send + Sync + 'static {
    /// Resolves at the next tick.
    async fn wait_for_tick(&self);
}

/// Production scheduler: one tick per fixed period.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTicks {
    period: Duration,
}

impl IntervalTicks {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for IntervalTicks {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            pipwatch_core::config::DEFAULT_TICK_INTERVAL_MS,
        ))
    }
}

#[async_trait]
impl TickScheduler for IntervalTicks {
    async fn wait_for_tick(&self) {
        tokio::time::sleep(self.period).await;
    }
}

/// Test scheduler where every tick is delivered by hand.
///
/// Only a loop that is currently parked in [`TickScheduler::wait_for_tick`]
/// can receive a tick; ticks sent while nobody waits are dropped.
#[derive(Debug, Clone, Default)]
pub struct ManualTicks {
    inner: Arc<ManualTicksInner>,
}

#[derive(Debug, Default)]
struct ManualTicksInner {
    waiter: Mutex<Option<oneshot::Sender<()>>>,
    parked: Notify,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers one tick. Returns `false` when no loop was waiting.
    pub fn tick(&self) -> bool {
        match self.inner.waiter.lock().take() {
            Some(waiter) => waiter.send(()).is_ok(),
            None => false,
        }
    }

    /// Whether a live loop is currently waiting for a tick.
    pub fn is_parked(&self) -> bool {
        self.inner
            .waiter
            .lock()
            .as_ref()
            .is_some_and(|waiter| !waiter.is_closed())
    }

    /// Waits until a loop is parked on this scheduler.
    pub async fn parked(&self) {
        loop {
            let notified = self.inner.parked.notified();
            if self.is_parked() {
                return;
            }
            notified.await;
        }
    }

    /// Delivers one tick and waits for the loop to process it and park again.
    ///
    /// Returns `false` without waiting when no loop was parked.
    pub async fn step(&self) -> bool {
        if !self.tick() {
            return false;
        }
        self.parked().await;
        true
    }
}

#[async_trait]
impl TickScheduler for ManualTicks {
    async fn wait_for_tick(&self) {
        let (tx, rx) = oneshot::channel();
        *self.inner.waiter.lock() = Some(tx);
        self.inner.parked.notify_waiters();
        // A newer waiter replacing this one drops the sender; either way the
        // caller re-checks its own state after waking.
        let _ = rx.await;
    }
}
