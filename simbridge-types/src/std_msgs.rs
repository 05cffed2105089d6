//! `std_msgs` values.

use crate::Time;

/// `std_msgs/Header`
///
/// ROS1 layout: a sequence number, a stamp and the frame the data is
/// expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    pub seq: u32,
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            seq: 0,
            stamp: Time::default(),
            frame_id: frame_id.into(),
        }
    }

    pub fn with_stamp(mut self, stamp: Time) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }
}

/// `std_msgs/String`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StringMessage {
    pub data: String,
}

impl StringMessage {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}
