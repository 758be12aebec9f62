//! Tracing initialization shared by every console binary.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Respects RUST_LOG (defaults to "info") and prints compact single-line
/// records without target/file noise, which keeps teleop sessions readable
/// while commands and telemetry interleave. Calling it twice is a no-op so
/// tests can initialize freely.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
