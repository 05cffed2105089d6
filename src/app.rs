//! Application lifecycle: connect, start publishers, shut down.

use std::sync::Arc;

use anyhow::Result;
use simbridge_sdk::{Bridge, ConnectOutcome, HealthCheckHandle};
use simbridge_transport::RosbridgeFactory;
use simbridge_types::schema;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{spawn_clock, SimTime, Step, CLOCK_QUEUE_DEPTH};
use crate::settings::Settings;
use crate::tf::{spawn_broadcaster, TF_QUEUE_DEPTH, TF_TOPIC};

pub const CLOCK_TOPIC: &str = "/clock";

/// A running simbridge instance.
pub struct App {
    bridge: Option<Bridge>,
    sim_time: Arc<SimTime>,
    health: Option<HealthCheckHandle>,
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Connect (unless disabled) and start the configured publishers.
    ///
    /// An unreachable bridge is not an error: health checks keep retrying
    /// and publishers resume once the link is up.
    pub async fn start(settings: &Settings) -> Result<Self> {
        let sim_time = Arc::new(if settings.clock.simulate_time {
            SimTime::simulated()
        } else {
            SimTime::wall_clock()
        });
        let (stop, _) = watch::channel(false);

        if !settings.bridge.connect_to_ros {
            info!("Bridge connection disabled");
            return Ok(Self {
                bridge: None,
                sim_time,
                health: None,
                stop,
                tasks: Vec::new(),
            });
        }

        let bridge = Bridge::builder(RosbridgeFactory::with_config(settings.transport()))
            .endpoint(settings.endpoint())
            .timeouts(settings.timeouts())
            .health_check_interval(settings.health_check_interval())
            .check_health(settings.health.check_health)
            .auto_reconnect(settings.health.auto_reconnect)
            .build();

        info!(endpoint = %settings.endpoint(), "Connecting to bridge");
        match bridge.connect().await {
            ConnectOutcome::Connected => {}
            outcome => warn!(?outcome, "Bridge not reachable yet"),
        }
        let health = settings
            .health
            .check_health
            .then(|| bridge.start_health_checks());

        let mut tasks = Vec::new();
        if settings.clock.simulate_time {
            let clock = bridge.topic(CLOCK_TOPIC, schema::CLOCK, CLOCK_QUEUE_DEPTH)?;
            let step = if settings.clock.use_fixed_update_interval {
                Step::Fixed
            } else {
                Step::Measured
            };
            tasks.push(spawn_clock(
                clock,
                Arc::clone(&sim_time),
                settings.fixed_update_interval(),
                step,
                stop.subscribe(),
            ));
        }

        if !settings.tf.is_empty() {
            let tf = bridge.topic(TF_TOPIC, schema::TF_MESSAGE, TF_QUEUE_DEPTH)?;
            for frame in &settings.tf {
                tasks.push(spawn_broadcaster(
                    tf.clone(),
                    frame.clone(),
                    Arc::clone(&sim_time),
                    stop.subscribe(),
                ));
            }
        }

        Ok(Self {
            bridge: Some(bridge),
            sim_time,
            health,
            stop,
            tasks,
        })
    }

    pub fn bridge(&self) -> Option<&Bridge> {
        self.bridge.as_ref()
    }

    pub fn sim_time(&self) -> &Arc<SimTime> {
        &self.sim_time
    }

    /// Stop publishers and health checks, then withdraw every channel and
    /// close the connection.
    pub async fn shutdown(self) {
        info!("Shutting down");
        let _ = self.stop.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        if let Some(health) = self.health {
            health.stop().await;
        }
        if let Some(bridge) = &self.bridge {
            bridge.shutdown().await;
        }
        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use simbridge_sdk::bson::Document;
    use simbridge_transport::framing::read_frame;
    use simbridge_types::Vector3;
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::settings::{BridgeSettings, ClockSettings, StaticFrame};

    async fn next_frame(server: &mut TcpStream) -> Option<Document> {
        tokio::time::timeout(Duration::from_secs(2), read_frame(server))
            .await
            .ok()?
            .ok()?
    }

    fn op_on(frame: &Document) -> (String, String) {
        (
            frame.get_str("op").unwrap_or_default().to_string(),
            frame.get_str("topic").unwrap_or_default().to_string(),
        )
    }

    #[tokio::test]
    async fn publishes_clock_and_tf_then_withdraws() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let settings = Settings {
            bridge: BridgeSettings {
                port,
                ..BridgeSettings::default()
            },
            clock: ClockSettings {
                simulate_time: true,
                ..ClockSettings::default()
            },
            tf: vec![StaticFrame {
                parent: "world".into(),
                child: "robot1".into(),
                translation: Vector3::new(1.0, 2.0, 3.0),
                rotation: Default::default(),
                frame_rate: 20.0,
            }],
            ..Settings::default()
        };

        let (app, accepted) = tokio::join!(App::start(&settings), listener.accept());
        let app = app.unwrap();
        let (mut server, _) = accepted.unwrap();
        assert!(app.bridge().unwrap().is_connected());
        assert!(app.sim_time().is_simulated());

        let mut seen = BTreeSet::new();
        while !(seen.contains(&("publish".to_string(), CLOCK_TOPIC.to_string()))
            && seen.contains(&("publish".to_string(), TF_TOPIC.to_string())))
        {
            let frame = next_frame(&mut server).await.expect("bridge frame");
            let key = op_on(&frame);
            if key.0 == "publish" {
                assert!(seen.contains(&("advertise".to_string(), key.1.clone())));
                let msg = frame.get_document("msg").unwrap();
                if key.1 == TF_TOPIC {
                    let transforms = msg.get_array("transforms").unwrap();
                    assert_eq!(transforms.len(), 1);
                } else {
                    assert!(msg.get_document("clock").is_ok());
                }
            }
            seen.insert(key);
        }

        app.shutdown().await;

        let mut withdrawn = BTreeSet::new();
        while let Some(frame) = next_frame(&mut server).await {
            let (op, topic) = op_on(&frame);
            if op == "unadvertise" {
                withdrawn.insert(topic);
            }
        }
        assert!(withdrawn.contains(CLOCK_TOPIC));
        assert!(withdrawn.contains(TF_TOPIC));
    }

    #[tokio::test]
    async fn runs_without_bridge_when_disabled() {
        let settings = Settings {
            bridge: BridgeSettings {
                connect_to_ros: false,
                ..BridgeSettings::default()
            },
            ..Settings::default()
        };
        let app = App::start(&settings).await.unwrap();
        assert!(app.bridge().is_none());
        app.shutdown().await;
    }

    #[tokio::test]
    async fn starts_while_bridge_is_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let settings = Settings {
            bridge: BridgeSettings {
                port,
                ..BridgeSettings::default()
            },
            ..Settings::default()
        };
        let app = App::start(&settings).await.unwrap();
        assert!(!app.bridge().unwrap().is_connected());
        app.shutdown().await;
    }
}
