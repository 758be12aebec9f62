//! # rosbridge client
//!
//! One supervised websocket connection to a rosbridge server, shared by
//! every publisher, subscriber and service caller in the process.
//!
//! The [`RosClient`] handle is cheap to clone; all handles talk to a single
//! supervisor task that owns the socket. The supervisor reconnects with
//! exponential backoff and re-establishes every live subscription and
//! advertisement after a reconnect, so consumers only ever observe a gap in
//! messages, never a dead feed.
//!
//! ```no_run
//! use rosbridge_client::{ClientOptions, RosClient};
//!
//! # async fn demo() -> Result<(), rosbridge_client::ClientError> {
//! let client = RosClient::connect("ws://192.168.2.7:9090", ClientOptions::default());
//! client.wait_connected(std::time::Duration::from_secs(5)).await?;
//!
//! let mut scans = client
//!     .subscribe::<serde_json::Value>("/scan", "sensor_msgs/LaserScan")
//!     .await?;
//! while let Some(scan) = scans.recv().await {
//!     println!("scan: {}", scan);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;

pub use client::{ClientOptions, ConnectionState, RosClient, Subscription};
pub use error::ClientError;
pub use protocol::{Inbound, Outbound};
