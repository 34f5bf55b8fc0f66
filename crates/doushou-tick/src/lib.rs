//! Fixed-cadence ticker for Doushou housekeeping.
//!
//! The service runs two periodic jobs on its dispatch loop: draining the
//! player command queue (every second) and sweeping stale desks (every
//! five minutes). Both use a [`Ticker`], which is built to sit inside a
//! `tokio::select!` next to the loop's channels:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(req) = inbound.recv() => { /* handle request */ }
//!         _ = commands_ticker.wait_for_tick() => drain_commands(),
//!         _ = sweep_ticker.wait_for_tick() => sweep_desks(),
//!     }
//! }
//! ```
//!
//! A ticker with a zero period is disabled: [`Ticker::wait_for_tick`]
//! pends forever and the `select!` simply never takes that branch.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for one [`Ticker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickConfig {
    /// Interval between ticks. `Duration::ZERO` disables the ticker.
    pub period: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl TickConfig {
    pub fn every(period: Duration) -> Self {
        Self { period }
    }

    pub fn disabled() -> Self {
        Self::every(Duration::ZERO)
    }

    /// The tick period, or `None` when disabled.
    pub fn period(&self) -> Option<Duration> {
        (!self.period.is_zero()).then_some(self.period)
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`Ticker::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number, starting at 1.
    pub tick: u64,
    /// `true` if the tick fired more than a tenth of a period late.
    pub overrun: bool,
    /// Whole periods skipped because of the overrun.
    pub ticks_skipped: u64,
}

/// Counters kept across the ticker's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// A named fixed-cadence timer.
///
/// A late wake-up never bursts: missed ticks are counted and skipped, and
/// the next tick is due a full period after the late one.
pub struct Ticker {
    name: &'static str,
    period: Option<Duration>,
    tick_count: u64,
    next_tick: Option<Instant>,
    metrics: TickMetrics,
}

impl Ticker {
    /// Creates a ticker. The first tick is due one period from now.
    pub fn new(name: &'static str, config: TickConfig) -> Self {
        let period = config.period();
        match period {
            Some(p) => debug!(ticker = name, period_ms = p.as_millis() as u64, "ticker created"),
            None => debug!(ticker = name, "ticker created disabled"),
        }

        Self {
            name,
            period,
            tick_count: 0,
            next_tick: period.map(|p| Instant::now() + p),
            metrics: TickMetrics::default(),
        }
    }

    /// Shorthand for `Ticker::new(name, TickConfig::every(period))`.
    pub fn every(name: &'static str, period: Duration) -> Self {
        Self::new(name, TickConfig::every(period))
    }

    /// Waits until the next tick is due.
    ///
    /// When disabled this future pends forever, which keeps it usable as a
    /// `select!` branch.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (Some(next), Some(period)) = (self.next_tick, self.period) else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let mut ticks_skipped = 0u64;
        if overrun {
            ticks_skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
            if ticks_skipped > 0 {
                warn!(
                    ticker = self.name,
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_millis() as u64,
                    "ticker overrun, skipping ahead"
                );
            }
            self.metrics.total_overruns += 1;
        }
        self.next_tick = Some(now + period);
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(ticker = self.name, tick = self.tick_count, overrun, "tick");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
