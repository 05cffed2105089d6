//! `tf2_msgs` and the stamped transform it carries.

use crate::{Header, Quaternion, Time, Transform, Vector3};

/// `geometry_msgs/TransformStamped`: the pose of `child_frame_id`
/// relative to `header.frame_id`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

impl TransformStamped {
    /// An identity transform from `frame_id` to `child_frame_id`.
    pub fn new(frame_id: impl Into<String>, child_frame_id: impl Into<String>) -> Self {
        Self {
            header: Header::new(frame_id),
            child_frame_id: child_frame_id.into(),
            transform: Transform::default(),
        }
    }

    pub fn with_translation(mut self, translation: Vector3) -> Self {
        self.transform.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: Quaternion) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn with_stamp(mut self, stamp: Time) -> Self {
        self.header.stamp = stamp;
        self
    }
}

/// `tf2_msgs/TFMessage`: a batch of stamped transforms.
///
/// A message with no transforms is representable here but is rejected by
/// the encoder; ROS consumers treat it as meaningless.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TfMessage {
    pub transforms: Vec<TransformStamped>,
}

impl TfMessage {
    pub fn new(transforms: Vec<TransformStamped>) -> Self {
        Self { transforms }
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }
}

impl FromIterator<TransformStamped> for TfMessage {
    fn from_iter<I: IntoIterator<Item = TransformStamped>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
