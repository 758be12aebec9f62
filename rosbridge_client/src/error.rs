use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong between a handle and the robot.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The socket is down right now; the supervisor is reconnecting.
    /// Publishes and service calls are not queued across the gap.
    #[error("not connected to rosbridge")]
    NotConnected,

    /// The socket dropped while this request was in flight.
    #[error("connection lost")]
    ConnectionLost,

    /// No response within the configured deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// rosbridge answered with result=false; `message` carries whatever the
    /// service put in its response.
    #[error("service {service} failed: {message}")]
    ServiceFailure { service: String, message: String },

    /// The client was shut down with [`crate::RosClient::close`].
    #[error("client closed")]
    Closed,

    /// The outgoing message could not be represented as JSON.
    #[error("could not encode message: {0}")]
    Encode(String),

    /// A service response arrived but did not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),
}
