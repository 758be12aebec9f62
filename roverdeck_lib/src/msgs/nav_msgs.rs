use super::{Header, Pose, PoseStamped, PoseWithCovariance, Time, TwistWithCovariance};
use serde::{Deserialize, Serialize};

/// nav_msgs/Odometry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Odometry {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub child_frame_id: String,
    #[serde(default)]
    pub pose: PoseWithCovariance,
    #[serde(default)]
    pub twist: TwistWithCovariance,
}

impl Odometry {
    /// Planar speed magnitude from the twist, for dashboard display.
    pub fn ground_speed(&self) -> f64 {
        let v = &self.twist.twist.linear;
        (v.x * v.x + v.y * v.y).sqrt()
    }
}

/// nav_msgs/MapMetaData
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapMetaData {
    #[serde(default)]
    pub map_load_time: Time,
    #[serde(default)]
    pub resolution: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub origin: Pose,
}

/// nav_msgs/OccupancyGrid with occupancy in [0, 100], -1 unknown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OccupancyGrid {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub info: MapMetaData,
    #[serde(default)]
    pub data: Vec<i8>,
}

impl OccupancyGrid {
    /// Fraction of cells with a known occupancy value.
    pub fn known_fraction(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let known = self.data.iter().filter(|&&c| c >= 0).count();
        known as f64 / self.data.len() as f64
    }
}

/// nav_msgs/Path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Path {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub poses: Vec<PoseStamped>,
}

impl Path {
    /// Sum of straight-line segment lengths in the xy plane.
    pub fn length(&self) -> f64 {
        self.poses
            .windows(2)
            .map(|pair| {
                let a = &pair[0].pose.position;
                let b = &pair[1].pose.position;
                ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_length_sums_segments() {
        let path = Path {
            header: Header::default(),
            poses: vec![
                PoseStamped::planar("map", 0.0, 0.0, 0.0),
                PoseStamped::planar("map", 3.0, 0.0, 0.0),
                PoseStamped::planar("map", 3.0, 4.0, 0.0),
            ],
        };
        assert!((path.length() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn empty_grid_has_zero_known_fraction() {
        assert_eq!(OccupancyGrid::default().known_fraction(), 0.0);
    }

    #[test]
    fn grid_known_fraction_ignores_unknown_cells() {
        let grid = OccupancyGrid {
            data: vec![-1, 0, 100, 50],
            ..Default::default()
        };
        assert!((grid.known_fraction() - 0.75).abs() < 1e-9);
    }
}
