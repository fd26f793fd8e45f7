//! Scheduler module for running check cycles on a fixed period.

mod clock;
mod cycle;
mod due;

pub use clock::*;
pub use cycle::*;
pub use due::*;

use crate::probe::Prober;

use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Default time between the starts of two cycles.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(60_000);

/// Default minimum time between two probes of the same target.
pub const DEFAULT_MIN_RECHECK_INTERVAL: Duration = Duration::from_millis(60_000);

/// Drives check cycles forever.
pub struct Scheduler<P: Prober> {
    cycle: CheckCycle<P>,
    period: Duration,
}

impl<P: Prober> Scheduler<P> {
    pub fn new(cycle: CheckCycle<P>, period: Duration) -> Self {
        Self { cycle, period }
    }

    /// Run a cycle now, then one at every period tick, until the process exits.
    ///
    /// Cycles never overlap: a cycle that outlasts the period makes the loop
    /// skip the ticks it missed and resume on the next one.
    pub async fn start(&self, min_interval: Duration) {
        tracing::info!(
            "Starting scheduler (period {:?}, min recheck {:?})",
            self.period,
            min_interval
        );

        let mut interval = tokio::time::interval(self.period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.cycle.run_cycle(min_interval).await;
        }
    }
}
