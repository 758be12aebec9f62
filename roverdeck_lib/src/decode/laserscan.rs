use super::PointXyz;
use crate::msgs::LaserScan;

/// Project a 2D laser scan into cartesian points in the sensor frame.
///
/// Each beam i sits at `angle_min + i * angle_increment`. Returns that are
/// non-finite, zero, or outside [range_min, range_max] are skipped; a
/// range_max of zero disables the upper bound for drivers that leave the
/// limits unset.
pub fn scan_to_points(scan: &LaserScan) -> Vec<PointXyz> {
    let mut points = Vec::with_capacity(scan.ranges.len());

    for (i, &range) in scan.ranges.iter().enumerate() {
        if !range.is_finite() || range == 0.0 {
            continue;
        }
        if range < scan.range_min {
            continue;
        }
        if scan.range_max > 0.0 && range > scan.range_max {
            continue;
        }

        let angle = scan.angle_min + (i as f64) * scan.angle_increment;
        points.push(PointXyz::new(
            range * angle.cos(),
            range * angle.sin(),
            0.0,
        ));
    }

    points
}

/// Summary line for dashboards: valid return count and closest obstacle.
pub fn scan_summary(scan: &LaserScan) -> (usize, Option<f64>) {
    let mut count = 0;
    let mut min_range: Option<f64> = None;

    for &range in &scan.ranges {
        if !range.is_finite() || range == 0.0 || range < scan.range_min {
            continue;
        }
        if scan.range_max > 0.0 && range > scan.range_max {
            continue;
        }
        count += 1;
        min_range = Some(min_range.map_or(range, |m: f64| m.min(range)));
    }

    (count, min_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn scan_with_ranges(ranges: Vec<f64>) -> LaserScan {
        LaserScan {
            angle_min: 0.0,
            angle_increment: FRAC_PI_2,
            range_min: 0.1,
            range_max: 10.0,
            ranges,
            ..Default::default()
        }
    }

    #[test]
    fn projects_polar_to_cartesian() {
        let scan = scan_with_ranges(vec![1.0, 2.0]);
        let points = scan_to_points(&scan);
        assert_eq!(points.len(), 2);
        // Beam 0 at angle 0 -> along x
        assert!((points[0].x - 1.0).abs() < 1e-9);
        assert!(points[0].y.abs() < 1e-9);
        // Beam 1 at pi/2 -> along y
        assert!(points[1].x.abs() < 1e-9);
        assert!((points[1].y - 2.0).abs() < 1e-9);
        assert_eq!(points[1].z, 0.0);
    }

    #[test]
    fn skips_invalid_returns() {
        let scan = scan_with_ranges(vec![0.0, f64::INFINITY, f64::NAN, 0.05, 42.0, 3.0]);
        let points = scan_to_points(&scan);
        // Only the in-range 3.0 survives: zero, inf, nan, below range_min
        // and above range_max are all dropped
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn summary_reports_count_and_min() {
        let scan = scan_with_ranges(vec![5.0, f64::INFINITY, 2.0, 7.5]);
        let (count, min_range) = scan_summary(&scan);
        assert_eq!(count, 3);
        assert_eq!(min_range, Some(2.0));
    }

    #[test]
    fn summary_of_empty_scan_is_empty() {
        let scan = scan_with_ranges(vec![]);
        assert_eq!(scan_summary(&scan), (0, None));
    }
}
