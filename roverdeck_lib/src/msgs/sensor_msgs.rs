use super::Header;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

/// sensor_msgs/JointState
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JointState {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub position: Vec<f64>,
    #[serde(default)]
    pub velocity: Vec<f64>,
    #[serde(default)]
    pub effort: Vec<f64>,
}

impl JointState {
    /// Iterate (name, position) pairs, tolerating mismatched lengths.
    pub fn named_positions(&self) -> impl Iterator<Item = (&str, f64)> {
        self.name
            .iter()
            .zip(self.position.iter())
            .map(|(n, p)| (n.as_str(), *p))
    }
}

/// sensor_msgs/LaserScan
///
/// rosbridge cannot encode IEEE infinities in JSON and sends `null` for
/// out-of-range returns, so `ranges` maps nulls back to `f64::INFINITY`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaserScan {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub angle_min: f64,
    #[serde(default)]
    pub angle_max: f64,
    #[serde(default)]
    pub angle_increment: f64,
    #[serde(default)]
    pub time_increment: f64,
    #[serde(default)]
    pub scan_time: f64,
    #[serde(default)]
    pub range_min: f64,
    #[serde(default)]
    pub range_max: f64,
    #[serde(default, deserialize_with = "null_as_infinity")]
    pub ranges: Vec<f64>,
    #[serde(default, deserialize_with = "null_as_infinity")]
    pub intensities: Vec<f64>,
}

fn null_as_infinity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let values = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|v| v.unwrap_or(f64::INFINITY))
        .collect())
}

/// sensor_msgs/PointField
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub datatype: u8,
    #[serde(default)]
    pub count: u32,
}

/// PointField datatype constant for little-endian float32.
pub const POINT_FIELD_FLOAT32: u8 = 7;

/// The `data` field of a PointCloud2 as rosbridge delivers it: either a
/// base64 string or a plain JSON byte array, depending on server version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CloudData {
    Base64(String),
    Raw(Vec<u8>),
}

impl Default for CloudData {
    fn default() -> Self {
        CloudData::Raw(Vec::new())
    }
}

impl CloudData {
    /// Raw point buffer, decoding base64 when needed.
    pub fn bytes(&self) -> eyre::Result<std::borrow::Cow<'_, [u8]>> {
        match self {
            CloudData::Raw(bytes) => Ok(std::borrow::Cow::Borrowed(bytes)),
            CloudData::Base64(text) => {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(text.as_bytes())
                    .map_err(|e| eyre::eyre!("Invalid base64 cloud data: {}", e))?;
                Ok(std::borrow::Cow::Owned(decoded))
            }
        }
    }
}

/// sensor_msgs/PointCloud2
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointCloud2 {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub fields: Vec<PointField>,
    #[serde(default)]
    pub is_bigendian: bool,
    #[serde(default)]
    pub point_step: u32,
    #[serde(default)]
    pub row_step: u32,
    #[serde(default)]
    pub data: CloudData,
    #[serde(default)]
    pub is_dense: bool,
}

/// sensor_msgs/CompressedImage. `data` stays base64 on this side of the
/// wire; nothing here decodes pixels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressedImage {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub data: String,
}

/// sensor_msgs/BatteryState (the fields the dashboard reads)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatteryState {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub voltage: f64,
    #[serde(default)]
    pub current: f64,
    #[serde(default)]
    pub charge: f64,
    #[serde(default)]
    pub capacity: f64,
    /// Charge fraction in [0, 1]; some drivers report percent instead.
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub power_supply_status: u8,
    #[serde(default)]
    pub present: bool,
}

impl BatteryState {
    /// Charge as a display percentage, tolerating drivers that publish
    /// either a [0, 1] fraction or a [0, 100] percent value.
    pub fn percent(&self) -> f64 {
        if self.percentage <= 1.0 {
            (self.percentage * 100.0).clamp(0.0, 100.0)
        } else {
            self.percentage.clamp(0.0, 100.0)
        }
    }
}
