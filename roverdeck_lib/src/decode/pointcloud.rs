use super::PointXyz;
use crate::msgs::PointCloud2;
use eyre::Result;

/// Extract the xyz triples from a PointCloud2 message.
///
/// One pass over `width * height` points, reading little-endian f32 values
/// at the x/y/z field offsets inside each `point_step` stride. Points with
/// any NaN coordinate are dropped, matching how lidar drivers mark invalid
/// returns in a dense cloud.
pub fn parse_pointcloud2(cloud: &PointCloud2) -> Result<Vec<PointXyz>> {
    let (x_offset, y_offset, z_offset) = xyz_offsets(cloud)?;

    if cloud.is_bigendian {
        eyre::bail!("Big-endian point clouds are not supported");
    }

    let data = cloud.data.bytes()?;
    let point_step = cloud.point_step as usize;
    if point_step == 0 {
        eyre::bail!("PointCloud2 has zero point_step");
    }

    let total_points = (cloud.width as usize) * (cloud.height as usize);
    // The deepest read inside one point record
    let record_end = [x_offset, y_offset, z_offset]
        .into_iter()
        .max()
        .unwrap_or(0)
        + 4;
    if record_end > point_step {
        eyre::bail!(
            "Field offsets exceed point_step ({} > {})",
            record_end,
            point_step
        );
    }

    let usable_points = data.len() / point_step;
    if usable_points < total_points {
        eyre::bail!(
            "PointCloud2 data truncated: {} bytes for {} points of {} bytes",
            data.len(),
            total_points,
            point_step
        );
    }

    let mut points = Vec::with_capacity(total_points);
    for i in 0..total_points {
        let start = i * point_step;
        let x = read_f32_le(&data, start + x_offset);
        let y = read_f32_le(&data, start + y_offset);
        let z = read_f32_le(&data, start + z_offset);

        if x.is_nan() || y.is_nan() || z.is_nan() {
            continue;
        }
        points.push(PointXyz::new(x as f64, y as f64, z as f64));
    }

    Ok(points)
}

fn xyz_offsets(cloud: &PointCloud2) -> Result<(usize, usize, usize)> {
    let mut x_offset = None;
    let mut y_offset = None;
    let mut z_offset = None;

    for field in &cloud.fields {
        match field.name.as_str() {
            "x" => x_offset = Some(field.offset as usize),
            "y" => y_offset = Some(field.offset as usize),
            "z" => z_offset = Some(field.offset as usize),
            _ => {}
        }
    }

    match (x_offset, y_offset, z_offset) {
        (Some(x), Some(y), Some(z)) => Ok((x, y, z)),
        _ => eyre::bail!("Missing coordinate fields in PointCloud2"),
    }
}

fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::{CloudData, PointField, POINT_FIELD_FLOAT32};
    use base64::Engine;

    fn xyz_fields() -> Vec<PointField> {
        ["x", "y", "z"]
            .iter()
            .enumerate()
            .map(|(i, name)| PointField {
                name: name.to_string(),
                offset: (i * 4) as u32,
                datatype: POINT_FIELD_FLOAT32,
                count: 1,
            })
            .collect()
    }

    fn cloud_from_points(points: &[[f32; 3]], point_step: usize) -> PointCloud2 {
        let mut data = Vec::new();
        for p in points {
            for v in p {
                data.extend_from_slice(&v.to_le_bytes());
            }
            data.resize(data.len() + point_step - 12, 0);
        }
        PointCloud2 {
            width: points.len() as u32,
            height: 1,
            fields: xyz_fields(),
            point_step: point_step as u32,
            row_step: (point_step * points.len()) as u32,
            data: CloudData::Raw(data),
            ..Default::default()
        }
    }

    #[test]
    fn parses_tightly_packed_cloud() {
        let cloud = cloud_from_points(&[[1.0, 2.0, 3.0], [-1.5, 0.0, 0.25]], 12);
        let points = parse_pointcloud2(&cloud).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], PointXyz::new(1.0, 2.0, 3.0));
        assert_eq!(points[1], PointXyz::new(-1.5, 0.0, 0.25));
    }

    #[test]
    fn parses_padded_stride() {
        // 32-byte stride with intensity padding, like unilidar clouds
        let cloud = cloud_from_points(&[[0.5, -0.5, 1.0]], 32);
        let points = parse_pointcloud2(&cloud).unwrap();
        assert_eq!(points, vec![PointXyz::new(0.5, -0.5, 1.0)]);
    }

    #[test]
    fn drops_nan_points() {
        let cloud = cloud_from_points(&[[1.0, 1.0, 1.0], [f32::NAN, 2.0, 2.0]], 12);
        let points = parse_pointcloud2(&cloud).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn decodes_base64_data() {
        let raw = match cloud_from_points(&[[1.0, 2.0, 3.0]], 12).data {
            CloudData::Raw(bytes) => bytes,
            _ => unreachable!(),
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(&raw);
        let cloud = PointCloud2 {
            width: 1,
            height: 1,
            fields: xyz_fields(),
            point_step: 12,
            data: CloudData::Base64(encoded),
            ..Default::default()
        };
        let points = parse_pointcloud2(&cloud).unwrap();
        assert_eq!(points, vec![PointXyz::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn rejects_cloud_without_xyz_fields() {
        let mut cloud = cloud_from_points(&[[1.0, 2.0, 3.0]], 12);
        cloud.fields.retain(|f| f.name != "z");
        assert!(parse_pointcloud2(&cloud).is_err());
    }

    #[test]
    fn rejects_truncated_data() {
        let mut cloud = cloud_from_points(&[[1.0, 2.0, 3.0]], 12);
        cloud.width = 5;
        assert!(parse_pointcloud2(&cloud).is_err());
    }
}
