//! ROS message types as they appear in rosbridge JSON.
//!
//! Field names and nesting match the ROS message definitions exactly so the
//! structs (de)serialize straight into the `msg` payload of a rosbridge
//! frame. Inbound messages use `#[serde(default)]` liberally because
//! rosbridge omits empty arrays and zero-valued fields depending on the
//! server version.

pub mod geometry_msgs;
pub mod nav_msgs;
pub mod sensor_msgs;
pub mod srv;
pub mod std_msgs;

pub use geometry_msgs::*;
pub use nav_msgs::*;
pub use sensor_msgs::*;
pub use srv::*;
pub use std_msgs::*;

use serde::{Deserialize, Serialize};

/// ROS 2 builtin_interfaces/Time
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Time {
    #[serde(default)]
    pub sec: i32,
    #[serde(default)]
    pub nanosec: u32,
}

/// std_msgs/Header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub stamp: Time,
    #[serde(default)]
    pub frame_id: String,
}

impl Header {
    pub fn with_frame(frame_id: &str) -> Self {
        Self {
            stamp: Time::default(),
            frame_id: frame_id.to_string(),
        }
    }
}
