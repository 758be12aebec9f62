use super::Header;
use serde::{Deserialize, Serialize};

/// geometry_msgs/Vector3
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// geometry_msgs/Point
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// geometry_msgs/Quaternion
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quaternion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "identity_w")]
    pub w: f64,
}

fn identity_w() -> f64 {
    1.0
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quaternion {
    /// Pure z-axis rotation by `theta` radians.
    pub fn from_yaw(theta: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: (theta / 2.0).sin(),
            w: (theta / 2.0).cos(),
        }
    }
}

/// geometry_msgs/Twist
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Twist {
    #[serde(default)]
    pub linear: Vector3,
    #[serde(default)]
    pub angular: Vector3,
}

impl Twist {
    /// Planar base motion: forward velocity plus rotation about z.
    pub fn planar(linear_x: f64, angular_z: f64) -> Self {
        Self {
            linear: Vector3::new(linear_x, 0.0, 0.0),
            angular: Vector3::new(0.0, 0.0, angular_z),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// geometry_msgs/Pose
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub orientation: Quaternion,
}

impl Pose {
    pub fn planar(x: f64, y: f64, theta: f64) -> Self {
        Self {
            position: Point { x, y, z: 0.0 },
            orientation: Quaternion::from_yaw(theta),
        }
    }
}

/// geometry_msgs/PoseStamped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseStamped {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub pose: Pose,
}

impl PoseStamped {
    pub fn planar(frame_id: &str, x: f64, y: f64, theta: f64) -> Self {
        Self {
            header: Header::with_frame(frame_id),
            pose: Pose::planar(x, y, theta),
        }
    }
}

/// geometry_msgs/PoseWithCovariance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    #[serde(default)]
    pub pose: Pose,
    /// Row-major 6x6 covariance over (x, y, z, rot_x, rot_y, rot_z)
    #[serde(default = "zero_covariance", with = "covariance_serde")]
    pub covariance: [f64; 36],
}

impl Default for PoseWithCovariance {
    fn default() -> Self {
        Self {
            pose: Pose::default(),
            covariance: zero_covariance(),
        }
    }
}

fn zero_covariance() -> [f64; 36] {
    [0.0; 36]
}

// serde derives arrays only up to 32 elements, so the 6x6 covariance goes
// through a Vec on the wire.
mod covariance_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &[f64; 36], serializer: S) -> Result<S::Ok, S::Error> {
        value.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[f64; 36], D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        let mut out = [0.0; 36];
        for (slot, v) in out.iter_mut().zip(values) {
            *slot = v;
        }
        Ok(out)
    }
}

/// geometry_msgs/PoseWithCovarianceStamped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseWithCovarianceStamped {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub pose: PoseWithCovariance,
}

impl PoseWithCovarianceStamped {
    /// Initial pose estimate in the map frame, the shape AMCL expects on
    /// /initialpose.
    pub fn initial_estimate(x: f64, y: f64, theta: f64) -> Self {
        Self {
            header: Header::with_frame("map"),
            pose: PoseWithCovariance {
                pose: Pose::planar(x, y, theta),
                covariance: zero_covariance(),
            },
        }
    }
}

/// geometry_msgs/TwistWithCovariance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwistWithCovariance {
    #[serde(default)]
    pub twist: Twist,
    #[serde(default = "zero_covariance", with = "covariance_serde")]
    pub covariance: [f64; 36],
}

impl Default for TwistWithCovariance {
    fn default() -> Self {
        Self {
            twist: Twist::default(),
            covariance: zero_covariance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twist_planar_fills_only_x_and_yaw() {
        let twist = Twist::planar(0.5, -1.0);
        assert_eq!(twist.linear.x, 0.5);
        assert_eq!(twist.linear.y, 0.0);
        assert_eq!(twist.angular.z, -1.0);
        assert_eq!(twist.angular.x, 0.0);
    }

    #[test]
    fn quaternion_yaw_roundtrip() {
        let q = Quaternion::from_yaw(std::f64::consts::FRAC_PI_2);
        let norm = (q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w).sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn covariance_roundtrips_through_json() {
        let mut msg = PoseWithCovariance::default();
        msg.covariance[0] = 0.25;
        msg.covariance[35] = 0.07;
        let json = serde_json::to_string(&msg).unwrap();
        let back: PoseWithCovariance = serde_json::from_str(&json).unwrap();
        assert_eq!(back.covariance[0], 0.25);
        assert_eq!(back.covariance[35], 0.07);
    }

    #[test]
    fn missing_orientation_defaults_to_identity() {
        let pose: Pose = serde_json::from_str(r#"{"position": {"x": 1.0}}"#).unwrap();
        assert_eq!(pose.orientation.w, 1.0);
        assert_eq!(pose.position.x, 1.0);
    }
}
