//! Simulation time and the `/clock` publisher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use simbridge_sdk::{Channel, ChannelError};
use simbridge_types::{Clock, Time};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Queue depth of the `/clock` topic.
pub const CLOCK_QUEUE_DEPTH: u32 = 3;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// The time source every publisher stamps messages with.
///
/// In wall-clock mode [`now`](Self::now) is the system time. In simulated
/// mode it is the process start (whole seconds) plus the simulated time
/// elapsed so far, which only moves when [`advance`](Self::advance) is
/// called.
#[derive(Debug)]
pub struct SimTime {
    simulated: bool,
    start_secs: u64,
    elapsed_nanos: AtomicU64,
}

impl SimTime {
    pub fn wall_clock() -> Self {
        Self {
            simulated: false,
            start_secs: 0,
            elapsed_nanos: AtomicU64::new(0),
        }
    }

    /// Simulated time starting at the current wall-clock second.
    pub fn simulated() -> Self {
        let start_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::simulated_from(start_secs)
    }

    pub fn simulated_from(start_secs: u64) -> Self {
        Self {
            simulated: true,
            start_secs,
            elapsed_nanos: AtomicU64::new(0),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Move simulated time forward. Ignored in wall-clock mode.
    pub fn advance(&self, step: Duration) {
        if self.simulated {
            let nanos = u64::try_from(step.as_nanos()).unwrap_or(u64::MAX);
            self.elapsed_nanos.fetch_add(nanos, Ordering::AcqRel);
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Acquire))
    }

    pub fn now(&self) -> Time {
        if !self.simulated {
            return Time::now();
        }
        let nanos = self
            .start_secs
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(self.elapsed_nanos.load(Ordering::Acquire));
        Time::from_nanos(nanos)
    }
}

/// How far simulated time moves per update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Always the configured interval.
    Fixed,
    /// The wall time measured since the previous update.
    Measured,
}

/// Publish `sim_time` on `channel` every `interval` until stopped.
pub fn spawn_clock(
    channel: Channel,
    sim_time: Arc<SimTime>,
    interval: Duration,
    step: Step,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = channel.advertise() {
            debug!(error = %e, "Clock not advertised yet");
        }

        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();

        loop {
            tokio::select! {
                now = timer.tick() => {
                    let step = match step {
                        Step::Fixed => interval,
                        Step::Measured => now.duration_since(last),
                    };
                    last = now;
                    sim_time.advance(step);
                    publish_clock(&channel, sim_time.now());
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

fn publish_clock(channel: &Channel, now: Time) {
    match channel.publish(&Clock::new(now).into()) {
        Ok(()) => {}
        Err(ChannelError::NotConnected(_)) => debug!("Skipping clock while disconnected"),
        Err(e) => warn!(error = %e, "Failed to publish clock"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_time_starts_at_start_second() {
        let clock = SimTime::simulated_from(1_700_000_000);
        assert_eq!(clock.now(), Time::new(1_700_000_000, 0));
    }

    #[test]
    fn advance_accumulates() {
        let clock = SimTime::simulated_from(100);
        for _ in 0..3 {
            clock.advance(Duration::from_millis(50));
        }
        assert_eq!(clock.elapsed(), Duration::from_millis(150));
        assert_eq!(clock.now(), Time::new(100, 150_000_000));

        clock.advance(Duration::from_millis(900));
        assert_eq!(clock.now(), Time::new(101, 50_000_000));
    }

    #[test]
    fn wall_clock_ignores_advance() {
        let clock = SimTime::wall_clock();
        clock.advance(Duration::from_secs(3600));
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert!(!clock.is_simulated());
        assert!(clock.now().secs > 1_600_000_000);
    }
}
