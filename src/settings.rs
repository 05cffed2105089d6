//! Application settings.
//!
//! Loaded from an optional TOML file, then `SIMBRIDGE__*` environment
//! variables (e.g. `SIMBRIDGE__BRIDGE__PORT=9091`), then command-line
//! overrides applied by the binary.

use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use simbridge_sdk::{Endpoint, Timeouts};
use simbridge_transport::TransportConfig;
use simbridge_types::{Quaternion, Vector3};

/// Longest period accepted for any timer setting.
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_FIXED_UPDATE_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(100);

/// A timer period of `secs` seconds, if it is non-zero and at most
/// [`MAX_PERIOD`] once rounded to nanoseconds.
fn period_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|period| !period.is_zero() && *period <= MAX_PERIOD)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bridge: BridgeSettings,
    pub health: HealthSettings,
    pub timeouts: TimeoutSettings,
    pub clock: ClockSettings,
    pub tf: Vec<StaticFrame>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// `tcp` or `ws`.
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// When false the application runs without a bridge connection.
    pub connect_to_ros: bool,
    pub queue_capacity: usize,
    pub probe_service: Option<String>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            protocol: "tcp".to_string(),
            host: "127.0.0.1".to_string(),
            port: 9090,
            connect_to_ros: true,
            queue_capacity: simbridge_transport::DEFAULT_QUEUE_CAPACITY,
            probe_service: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub check_health: bool,
    pub interval_secs: f64,
    pub auto_reconnect: bool,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_health: true,
            interval_secs: 1.0,
            auto_reconnect: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub connect_ms: u64,
    pub probe_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_ms: 2000,
            probe_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Publish simulated time on `/clock`.
    pub simulate_time: bool,
    /// Advance simulated time by a fixed step per update instead of the
    /// measured wall time.
    pub use_fixed_update_interval: bool,
    pub fixed_update_interval_secs: f64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            simulate_time: false,
            use_fixed_update_interval: true,
            fixed_update_interval_secs: 0.05,
        }
    }
}

/// A transform broadcast on `/tf` at a fixed rate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StaticFrame {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub translation: Vector3,
    #[serde(default)]
    pub rotation: Quaternion,
    /// Broadcasts per second.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
}

fn default_frame_rate() -> f64 {
    10.0
}

impl Settings {
    /// Layer the file at `path` (if any) under the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("SIMBRIDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("reading configuration")?
            .try_deserialize()
            .context("parsing configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            matches!(self.bridge.protocol.as_str(), "tcp" | "ws" | "websocket"),
            "unsupported bridge protocol `{}`",
            self.bridge.protocol
        );
        ensure!(
            period_from_secs(self.health.interval_secs).is_some(),
            "health.interval_secs must be a positive period of at most {MAX_PERIOD:?}, got {}",
            self.health.interval_secs
        );
        ensure!(
            period_from_secs(self.clock.fixed_update_interval_secs).is_some(),
            "clock.fixed_update_interval_secs must be a positive period of at most {MAX_PERIOD:?}, got {}",
            self.clock.fixed_update_interval_secs
        );
        for frame in &self.tf {
            ensure!(
                !frame.parent.is_empty() && !frame.child.is_empty(),
                "tf frames need a parent and a child"
            );
            ensure!(
                frame.frame_rate.is_finite()
                    && period_from_secs(frame.frame_rate.recip()).is_some(),
                "tf frame {} -> {} has an unusable frame_rate {}",
                frame.parent,
                frame.child,
                frame.frame_rate
            );
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.bridge.protocol.clone(),
            self.bridge.host.clone(),
            self.bridge.port,
        )
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            queue_capacity: self.bridge.queue_capacity,
            probe_service: self.bridge.probe_service.clone(),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(self.timeouts.connect_ms),
            probe: Duration::from_millis(self.timeouts.probe_ms),
        }
    }

    /// Falls back to the default when the setting is not a usable period.
    pub fn health_check_interval(&self) -> Duration {
        period_from_secs(self.health.interval_secs).unwrap_or(DEFAULT_HEALTH_CHECK_INTERVAL)
    }

    pub fn fixed_update_interval(&self) -> Duration {
        period_from_secs(self.clock.fixed_update_interval_secs)
            .unwrap_or(DEFAULT_FIXED_UPDATE_INTERVAL)
    }
}

impl StaticFrame {
    pub fn period(&self) -> Duration {
        period_from_secs(self.frame_rate.recip()).unwrap_or(DEFAULT_FRAME_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.endpoint(), Endpoint::tcp("127.0.0.1", 9090));
        assert!(settings.bridge.connect_to_ros);
        assert!(settings.health.check_health && settings.health.auto_reconnect);
        assert_eq!(settings.health_check_interval(), Duration::from_secs(1));
        assert_eq!(settings.timeouts(), Timeouts::default());
        assert!(!settings.clock.simulate_time);
        assert_eq!(settings.fixed_update_interval(), Duration::from_millis(50));
        assert!(settings.tf.is_empty());
    }

    #[test]
    fn reads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[bridge]
protocol = "ws"
host = "sim-host"
port = 9091

[health]
interval_secs = 2.5
auto_reconnect = false

[clock]
simulate_time = true

[[tf]]
parent = "world"
child = "robot1"
translation = {{ x = 1.0, y = 2.0, z = 3.0 }}
frame_rate = 20.0
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.endpoint(), Endpoint::new("ws", "sim-host", 9091));
        assert_eq!(settings.health_check_interval(), Duration::from_millis(2500));
        assert!(!settings.health.auto_reconnect);
        assert!(settings.health.check_health);
        assert!(settings.clock.simulate_time);

        let frame = &settings.tf[0];
        assert_eq!(frame.translation, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(frame.rotation, Quaternion::identity());
        assert_eq!(frame.period(), Duration::from_millis(50));
    }

    #[test]
    fn rejects_unknown_protocol() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[bridge]\nprotocol = \"udp\"").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn rejects_zero_frame_rate() {
        let settings = Settings {
            tf: vec![StaticFrame {
                parent: "world".into(),
                child: "base".into(),
                translation: Vector3::default(),
                rotation: Quaternion::identity(),
                frame_rate: 0.0,
            }],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    fn frame_at(frame_rate: f64) -> StaticFrame {
        StaticFrame {
            parent: "world".into(),
            child: "base".into(),
            translation: Vector3::default(),
            rotation: Quaternion::identity(),
            frame_rate,
        }
    }

    #[test]
    fn rejects_unrepresentable_periods() {
        for secs in [1e30, 1e12, f64::INFINITY, f64::NAN, -1.0, 0.0, 1e-12] {
            let mut settings = Settings::default();
            settings.health.interval_secs = secs;
            assert!(settings.validate().is_err(), "health interval {secs}");
            assert_eq!(settings.health_check_interval(), Duration::from_secs(1));

            let mut settings = Settings::default();
            settings.clock.fixed_update_interval_secs = secs;
            assert!(settings.validate().is_err(), "update interval {secs}");
            assert_eq!(settings.fixed_update_interval(), Duration::from_millis(50));
        }
    }

    #[test]
    fn rejects_frame_rates_outside_timer_range() {
        for rate in [1e300, 1e10, 1e-30, f64::INFINITY] {
            let settings = Settings {
                tf: vec![frame_at(rate)],
                ..Settings::default()
            };
            assert!(settings.validate().is_err(), "frame rate {rate}");
            assert!(!settings.tf[0].period().is_zero());
        }
    }

    #[test]
    fn accepts_periods_at_the_bounds() {
        let mut settings = Settings::default();
        settings.health.interval_secs = MAX_PERIOD.as_secs_f64();
        settings.clock.fixed_update_interval_secs = 1e-6;
        settings.tf = vec![frame_at(1e6)];
        settings.validate().unwrap();
        assert_eq!(settings.health_check_interval(), MAX_PERIOD);
        assert_eq!(settings.fixed_update_interval(), Duration::from_micros(1));
        assert_eq!(settings.tf[0].period(), Duration::from_micros(1));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
