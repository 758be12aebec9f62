use serde::{Deserialize, Serialize};

/// std_msgs/Float64
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Float64 {
    pub data: f64,
}

impl Float64 {
    pub fn new(data: f64) -> Self {
        Self { data }
    }
}

/// std_msgs/String
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StringMsg {
    #[serde(default)]
    pub data: String,
}

/// std_msgs/MultiArrayDimension
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiArrayDimension {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub stride: u32,
}

/// std_msgs/MultiArrayLayout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiArrayLayout {
    #[serde(default)]
    pub dim: Vec<MultiArrayDimension>,
    #[serde(default)]
    pub data_offset: u32,
}

/// std_msgs/Float64MultiArray
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Float64MultiArray {
    #[serde(default)]
    pub layout: MultiArrayLayout,
    #[serde(default)]
    pub data: Vec<f64>,
}

impl Float64MultiArray {
    /// Flat array with a single unnamed dimension, the shape position
    /// controllers expect on their command topic.
    pub fn from_values(data: Vec<f64>) -> Self {
        Self {
            layout: MultiArrayLayout {
                dim: vec![MultiArrayDimension {
                    label: String::new(),
                    size: data.len() as u32,
                    stride: data.len() as u32,
                }],
                data_offset: 0,
            },
            data,
        }
    }
}
