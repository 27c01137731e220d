//! Time utilities for the frame loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Frame rate configuration
pub const DEFAULT_FRAME_RATE: u32 = 60; // 60 frames per second
pub const DEFAULT_SNAPSHOT_RATE: u32 = 20; // 20 snapshots per second
/// Highest accepted frame rate; keeps one frame at a whole millisecond
pub const MAX_FRAME_RATE: u32 = 1000;

/// Delta time for one frame (in seconds)
pub fn frame_delta(frame_rate: u32) -> f32 {
    1.0 / frame_rate.max(1) as f32
}

/// Wall-clock duration of one frame, clamped to 1..=MAX_FRAME_RATE frames per second
pub fn frame_duration(frame_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / frame_rate.clamp(1, MAX_FRAME_RATE) as u64)
}

/// Frames between two snapshots, never less than one
pub fn snapshot_interval(frame_rate: u32, snapshot_rate: u32) -> u32 {
    (frame_rate / snapshot_rate.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_delta_matches_rate() {
        assert!((frame_delta(60) - 1.0 / 60.0).abs() < f32::EPSILON);
        // a zero rate is treated as one frame per second
        assert_eq!(frame_delta(0), 1.0);
    }

    #[test]
    fn snapshot_interval_is_at_least_one() {
        assert_eq!(snapshot_interval(60, 20), 3);
        assert_eq!(snapshot_interval(30, 60), 1);
        assert_eq!(snapshot_interval(60, 0), 60);
    }

    #[test]
    fn frame_duration_for_sixty_fps() {
        assert_eq!(frame_duration(60), Duration::from_micros(16_666));
    }

    #[test]
    fn frame_duration_never_reaches_zero() {
        assert_eq!(frame_duration(u32::MAX), Duration::from_millis(1));
        assert_eq!(frame_duration(2_000_000), Duration::from_millis(1));
        assert_eq!(frame_duration(0), Duration::from_secs(1));
    }
}
