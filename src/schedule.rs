//! Trigger timing.
//!
//! The deployment sync job runs on a fixed cadence (every five minutes by
//! default: 5:35, 5:40, ...). A trigger must only fire once that job has had
//! time to finish, so it is aligned to the next cycle boundary plus a grace
//! offset (5:36, 5:41, ...).

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::config::RelayConfig;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Sync job period and the grace offset applied after each boundary.
///
/// Invariant: `0 < offset < period` (enforced by config loading).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerCadence {
    pub period: Duration,
    pub offset: Duration,
}

impl Default for TriggerCadence {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5 * 60),
            offset: Duration::from_secs(60),
        }
    }
}

impl TriggerCadence {
    pub fn new(period: Duration, offset: Duration) -> Self {
        Self { period, offset }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.sync_period, config.sync_offset)
    }

    /// Time to wait from `now` until the next boundary plus offset.
    ///
    /// Always in `(0, period + offset]`. An instant exactly on a boundary
    /// waits just the offset.
    pub fn delay_until_next_trigger(&self, now: DateTime<Utc>) -> Duration {
        let period = self.period.as_nanos().max(1) as i128;
        let offset = self.offset.as_nanos() as i128;
        let now_ns = now.timestamp() as i128 * NANOS_PER_SEC + now.timestamp_subsec_nanos() as i128;

        let boundary = now_ns.div_euclid(period) * period;
        let boundary = if boundary < now_ns {
            boundary + period
        } else {
            boundary
        };
        let mut delay = boundary + offset - now_ns;
        if delay <= 0 {
            delay += period;
        }
        let secs = u64::try_from(delay / NANOS_PER_SEC).unwrap_or(u64::MAX);
        Duration::new(secs, (delay % NANOS_PER_SEC) as u32)
    }

    /// The instant the next trigger fires when computed at `now`.
    pub fn next_trigger_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = self.delay_until_next_trigger(now);
        now + TimeDelta::from_std(delay).unwrap_or(TimeDelta::zero())
    }
}
