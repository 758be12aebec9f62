use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, the timestamp convention used on
/// every local state record.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Wall-clock HH:MM:SS for message logs.
pub fn local_time_string(millis: u64) -> String {
    use chrono::TimeZone;
    match chrono::Local.timestamp_millis_opt(millis as i64) {
        chrono::LocalResult::Single(time) => time.format("%H:%M:%S").to_string(),
        _ => millis.to_string(),
    }
}
