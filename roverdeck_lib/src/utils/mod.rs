pub mod geometry;
pub mod time;
pub mod tracing;

pub use geometry::*;
pub use time::*;
pub use tracing::*;
