use crate::msgs::{BatteryState, CompressedImage, JointState, LaserScan, Odometry, Pose};
use crate::utils::{now_millis, quaternion_yaw};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Planar robot pose with the heading already extracted from the
/// quaternion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RobotPose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl RobotPose {
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            x: pose.position.x,
            y: pose.position.y,
            theta: quaternion_yaw(&pose.orientation),
        }
    }
}

/// Joint name -> angle (rad) map tracked from /joint_states.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JointAngles {
    pub angles: BTreeMap<String, f64>,
    pub timestamp: u64,
}

impl JointAngles {
    pub fn apply(&mut self, state: &JointState) {
        for (name, position) in state.named_positions() {
            self.angles.insert(name.to_string(), position);
        }
        self.timestamp = now_millis();
    }

    pub fn get(&self, joint: &str) -> Option<f64> {
        self.angles.get(joint).copied()
    }
}

/// Latest compressed map frame. Frames replace each other wholesale; there
/// is no diffing or accumulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapImage {
    pub format: String,
    pub base64_len: usize,
    pub data: String,
    pub received_at: u64,
}

impl MapImage {
    pub fn apply(&mut self, image: &CompressedImage) {
        self.format = image.format.clone();
        self.base64_len = image.data.len();
        self.data = image.data.clone();
        self.received_at = now_millis();
    }
}

/// Aggregated sensor dashboard, one instance per monitor session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardState {
    pub battery_percent: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub joint_count: Option<usize>,
    pub ground_speed: Option<f64>,
    pub pose: Option<RobotPose>,
    pub scan_points: Option<usize>,
    pub scan_min_range: Option<f64>,
    pub cloud_points: Option<usize>,
    /// source name -> last update, millis since epoch
    pub updated_at: BTreeMap<String, u64>,
}

impl DashboardState {
    pub fn apply_battery(&mut self, battery: &BatteryState) {
        self.battery_percent = Some(battery.percent());
        self.battery_voltage = Some(battery.voltage);
        self.touch("battery");
    }

    pub fn apply_joints(&mut self, joints: &JointState) {
        self.joint_count = Some(joints.name.len().max(joints.position.len()));
        self.touch("joints");
    }

    pub fn apply_odometry(&mut self, odom: &Odometry) {
        self.ground_speed = Some(odom.ground_speed());
        self.pose = Some(RobotPose::from_pose(&odom.pose.pose));
        self.touch("odom");
    }

    pub fn apply_scan(&mut self, scan: &LaserScan) {
        let (count, min_range) = crate::decode::scan_summary(scan);
        self.scan_points = Some(count);
        self.scan_min_range = min_range;
        self.touch("scan");
    }

    pub fn apply_cloud(&mut self, point_count: usize) {
        self.cloud_points = Some(point_count);
        self.touch("cloud");
    }

    fn touch(&mut self, source: &str) {
        self.updated_at.insert(source.to_string(), now_millis());
    }

    /// Sources that have not reported within `max_age_ms` of `now`.
    /// Sources that never reported are not listed; absence is shown as
    /// missing data, not staleness.
    pub fn stale_sources(&self, now: u64, max_age_ms: u64) -> Vec<&str> {
        self.updated_at
            .iter()
            .filter(|(_, &at)| now.saturating_sub(at) > max_age_ms)
            .map(|(source, _)| source.as_str())
            .collect()
    }
}
