//! Shared fixtures for app integration tests.

use proctor_watch_app::MonitorConfig;
use proctor_watch_capture::CameraConstraints;
use time::OffsetDateTime;

/// Small-frame config so encode cost stays negligible.
#[allow(dead_code)]
pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        camera: CameraConstraints {
            width: 16,
            height: 12,
        },
        ..MonitorConfig::default()
    }
}

/// Fixed stamp rendered as `22:13:25` in UTC.
#[allow(dead_code)]
pub fn fixed_stamp() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_005).expect("timestamp should be valid")
}
