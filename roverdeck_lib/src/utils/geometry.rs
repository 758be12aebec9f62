use crate::msgs::Quaternion;
use nalgebra::UnitQuaternion;

/// Heading (rotation about z) extracted from a quaternion, in radians.
///
/// Full yaw formula `atan2(2(wz + xy), 1 - 2(y^2 + z^2))`; for the planar
/// poses the robot publishes (x = y = 0) this reduces to the familiar
/// two-term form.
pub fn quaternion_yaw(q: &Quaternion) -> f64 {
    let siny_cosp = 2.0 * (q.w * q.z + q.x * q.y);
    let cosy_cosp = 1.0 - 2.0 * (q.y * q.y + q.z * q.z);
    siny_cosp.atan2(cosy_cosp)
}

/// Full roll/pitch/yaw via nalgebra, for telemetry displays that want all
/// three angles. Degenerate (zero-norm) quaternions yield zero angles.
pub fn quaternion_euler(q: &Quaternion) -> (f64, f64, f64) {
    let quat = nalgebra::Quaternion::new(q.w, q.x, q.y, q.z);
    match UnitQuaternion::try_new(quat, 1e-9) {
        Some(unit) => unit.euler_angles(),
        None => (0.0, 0.0, 0.0),
    }
}

/// Normalize an angle to (-pi, pi].
pub fn wrap_angle(theta: f64) -> f64 {
    use std::f64::consts::PI;
    let mut wrapped = theta % (2.0 * PI);
    if wrapped > PI {
        wrapped -= 2.0 * PI;
    } else if wrapped <= -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn yaw_of_identity_is_zero() {
        assert_eq!(quaternion_yaw(&Quaternion::default()), 0.0);
    }

    #[test]
    fn yaw_roundtrips_through_from_yaw() {
        for theta in [-PI + 0.01, -FRAC_PI_2, 0.0, 0.7, FRAC_PI_2, PI - 0.01] {
            let q = Quaternion::from_yaw(theta);
            assert!((quaternion_yaw(&q) - theta).abs() < 1e-9, "theta={}", theta);
        }
    }

    #[test]
    fn yaw_matches_nalgebra_euler() {
        let q = Quaternion::from_yaw(1.2);
        let (_, _, yaw) = quaternion_euler(&q);
        assert!((yaw - 1.2).abs() < 1e-9);
    }

    #[test]
    fn wrap_angle_stays_in_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-9);
        assert!((wrap_angle(-3.0 * PI) - PI).abs() < 1e-9);
        assert_eq!(wrap_angle(0.5), 0.5);
    }
}
