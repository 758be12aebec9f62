//! Decoders turning raw sensor messages into plain point/image data.

pub mod image;
pub mod laserscan;
pub mod pointcloud;

pub use image::*;
pub use laserscan::*;
pub use pointcloud::*;

use serde::{Deserialize, Serialize};

/// A single decoded 3D point in the sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointXyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PointXyz {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}
