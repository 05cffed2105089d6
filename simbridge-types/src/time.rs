//! ROS time values.

use core::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A ROS timestamp: whole seconds and nanoseconds since the Unix epoch.
///
/// `nsecs` is kept below one second by every constructor in this crate,
/// but values decoded from the wire are taken as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    pub secs: u32,
    pub nsecs: u32,
}

impl Time {
    pub const fn new(secs: u32, nsecs: u32) -> Self {
        Self { secs, nsecs }
    }

    /// Build a time from nanoseconds since the epoch.
    ///
    /// Seconds past `u32::MAX` saturate.
    pub fn from_nanos(nanos: u64) -> Self {
        let secs = (nanos / NANOS_PER_SEC).min(u64::from(u32::MAX)) as u32;
        Self {
            secs,
            nsecs: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    /// Build a time from a duration since the epoch.
    pub fn from_duration(since_epoch: Duration) -> Self {
        Self::from_nanos(since_epoch.as_nanos().min(u128::from(u64::MAX)) as u64)
    }

    /// The current wall-clock time.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(Self::from_duration)
            .unwrap_or_default()
    }

    /// Total nanoseconds since the epoch.
    pub fn as_nanos(&self) -> u64 {
        u64::from(self.secs) * NANOS_PER_SEC + u64::from(self.nsecs)
    }

    pub fn to_duration(&self) -> Duration {
        Duration::new(u64::from(self.secs), 0) + Duration::from_nanos(u64::from(self.nsecs))
    }
}

/// `rosgraph_msgs/Clock`: the simulated time published on `/clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clock {
    pub clock: Time,
}

impl Clock {
    pub const fn new(clock: Time) -> Self {
        Self { clock }
    }
}
