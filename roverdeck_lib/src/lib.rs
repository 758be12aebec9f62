//! # Roverdeck Library
//!
//! Shared message types, decoders and utilities for the roverdeck
//! teleoperation consoles. Everything that talks to the robot goes through
//! a rosbridge websocket; this crate models the messages on that wire.

pub mod decode;
pub mod msgs;
pub mod types;
pub mod utils;

// Re-export the flat types for convenience
pub use types::*;
pub use utils::*;
