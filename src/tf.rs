//! Periodic broadcast of configured frames on `/tf`.

use std::sync::Arc;

use simbridge_sdk::{Channel, ChannelError};
use simbridge_types::{TfMessage, Time, TransformStamped};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::clock::SimTime;
use crate::settings::StaticFrame;

pub const TF_TOPIC: &str = "/tf";
pub const TF_QUEUE_DEPTH: u32 = 10;

/// The single-transform message broadcast for `frame`.
pub fn frame_message(frame: &StaticFrame, stamp: Time) -> TfMessage {
    let transform = TransformStamped::new(frame.parent.as_str(), frame.child.as_str())
        .with_translation(frame.translation)
        .with_rotation(frame.rotation)
        .with_stamp(stamp);
    TfMessage::new(vec![transform])
}

/// Broadcast `frame` on `channel` at its frame rate until stopped.
pub fn spawn_broadcaster(
    channel: Channel,
    frame: StaticFrame,
    sim_time: Arc<SimTime>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(frame.period());
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let message = frame_message(&frame, sim_time.now());
                    match channel.publish(&message.into()) {
                        Ok(()) => {}
                        Err(ChannelError::NotConnected(_)) => {
                            debug!(child = %frame.child, "Skipping transform while disconnected");
                        }
                        Err(e) => warn!(child = %frame.child, error = %e, "Failed to broadcast transform"),
                    }
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

#[cfg(test)]
mod tests {
    use simbridge_types::{Quaternion, Vector3};

    use super::*;

    #[test]
    fn message_carries_one_stamped_transform() {
        let frame = StaticFrame {
            parent: "world".into(),
            child: "robot1".into(),
            translation: Vector3::new(1.0, 2.0, 3.0),
            rotation: Quaternion::new(0.0, 0.0, 0.7071, 0.7071),
            frame_rate: 10.0,
        };
        let message = frame_message(&frame, Time::new(42, 7));

        assert_eq!(message.len(), 1);
        let transform = &message.transforms[0];
        assert_eq!(transform.header.frame_id, "world");
        assert_eq!(transform.header.stamp, Time::new(42, 7));
        assert_eq!(transform.child_frame_id, "robot1");
        assert_eq!(transform.transform.translation, frame.translation);
        assert_eq!(transform.transform.rotation, frame.rotation);
    }
}
